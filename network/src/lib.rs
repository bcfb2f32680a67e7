// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matchmaking services for 7KOR: session directory, hole-punch exchange
//! and the two-channel datagram relay, plus the expiry sweeper that bounds
//! memory growth from abandoned sessions.

#![deny(unsafe_code)]

pub mod config;
pub mod directory;
pub mod net_util;
pub mod relay;
pub mod rendezvous;
pub mod sweeper;

pub use config::NetConfig;
