// SPDX-License-Identifier: MIT OR Apache-2.0

//! 7KOR Core - Session Records and Wire Envelope
//!
//! This crate provides the data model shared by the matchmaking services:
//! - Lobby and room session records with TTL-based expiry
//! - The JSON datagram envelope spoken on both relay channels
//! - Collision-resistant session identifier generation

#![deny(unsafe_code)]
#![deny(clippy::all)]

pub mod envelope;
pub mod session;

pub use envelope::{ControlCommand, EnvelopeError, Role, StateCommand};
pub use session::{new_lobby_id, Lobby, LobbyId, Room};
