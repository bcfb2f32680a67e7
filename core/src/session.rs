// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session records for the directory services.
//!
//! A [`Lobby`] is a relay-mode session: peers never learn each other's
//! addresses and exchange traffic through the datagram relay. A [`Room`]
//! is a hole-punch session: both sides publish their public and local
//! endpoints and attempt direct delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a lobby or room
pub type LobbyId = String;

/// Generate a fresh session identifier.
///
/// 122 random bits, so a collision among sessions alive within one TTL
/// window is negligible and identifiers never need a reuse ledger.
pub fn new_lobby_id() -> LobbyId {
    uuid::Uuid::new_v4().simple().to_string()
}

fn expired(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match now.signed_duration_since(created_at).to_std() {
        Ok(age) => age > ttl,
        // created_at in the future (clock skew): treat as fresh
        Err(_) => false,
    }
}

/// A relay-mode session advertised through the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    /// Unique identifier for the lobby
    pub id: LobbyId,
    /// When the lobby was created
    pub created_at: DateTime<Utc>,
    /// Address the host is reachable at (or was observed from)
    pub host_ip: String,
    /// Host port for the control channel
    pub control_port: u16,
    /// Host port for the state channel
    pub state_port: u16,
    /// Which character the host is playing (if any)
    pub host_choice: Option<String>,
}

impl Lobby {
    /// Create a new lobby with a fresh identifier and creation timestamp.
    pub fn new(
        host_ip: String,
        control_port: u16,
        state_port: u16,
        host_choice: Option<String>,
    ) -> Self {
        Self {
            id: new_lobby_id(),
            created_at: Utc::now(),
            host_ip,
            control_port,
            state_port,
            host_choice,
        }
    }

    /// Whether the lobby has outlived its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        expired(self.created_at, now, ttl)
    }
}

/// A hole-punch session holding both peers' candidate endpoints.
///
/// Client fields stay null until a join occurs; a second join overwrites
/// them (last writer wins) and never touches the host fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier for the room
    pub id: LobbyId,
    /// When the room was created
    pub created_at: DateTime<Utc>,
    /// Which character the host is playing (if any)
    pub host_choice: Option<String>,
    /// Host address as observed by the exchange
    pub host_ip: String,
    /// Host address on its own subnet, if the host supplied one
    pub host_local_ip: Option<String>,
    /// Host port for the control channel
    pub host_control_port: u16,
    /// Host port for the state channel
    pub host_state_port: u16,
    /// Client address as observed by the exchange
    pub client_ip: Option<String>,
    /// Client address on its own subnet, if the client supplied one
    pub client_local_ip: Option<String>,
    /// Client port for the control channel
    pub client_control_port: Option<u16>,
    /// Client port for the state channel
    pub client_state_port: Option<u16>,
}

impl Room {
    /// Create a new room with a fresh identifier; client fields start null.
    pub fn new(
        host_ip: String,
        host_local_ip: Option<String>,
        host_control_port: u16,
        host_state_port: u16,
        host_choice: Option<String>,
    ) -> Self {
        Self {
            id: new_lobby_id(),
            created_at: Utc::now(),
            host_choice,
            host_ip,
            host_local_ip,
            host_control_port,
            host_state_port,
            client_ip: None,
            client_local_ip: None,
            client_control_port: None,
            client_state_port: None,
        }
    }

    /// Record the joining client's endpoints, replacing any previous join.
    pub fn join(
        &mut self,
        client_ip: String,
        client_local_ip: Option<String>,
        client_control_port: u16,
        client_state_port: u16,
    ) {
        self.client_ip = Some(client_ip);
        self.client_local_ip = client_local_ip;
        self.client_control_port = Some(client_control_port);
        self.client_state_port = Some(client_state_port);
    }

    /// Whether the room has outlived its TTL at `now`.
    ///
    /// A join does not reset `created_at`; the room keeps its full TTL so
    /// the host can re-fetch and retry a failed punch attempt.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        expired(self.created_at, now, ttl)
    }
}
