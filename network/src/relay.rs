// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datagram relay: two independent UDP forwarding loops keyed by lobby id.
//!
//! The control loop carries low-frequency, host-directed command payloads;
//! the state loop fans high-frequency host snapshots out to every
//! registered client. Neither loop buffers undeliverable messages, replies
//! to unsolicited datagrams, or lets a malformed peer affect another
//! session's registrations.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use sevenkor_core::{ControlCommand, LobbyId, StateCommand};

use crate::net_util::CancellationToken;
use crate::sweeper::Expire;

/// Receive buffer for the control loop, sized for input payloads
pub const CONTROL_BUF_SIZE: usize = 2048;
/// Receive buffer for the state loop, sized for full state snapshots
pub const STATE_BUF_SIZE: usize = 8192;

/// A registered endpoint and when it last spoke
#[derive(Debug, Clone, Copy)]
struct Registration {
    addr: SocketAddr,
    last_seen: Instant,
}

/// Control-channel registry: at most one host endpoint per lobby
pub struct ControlRegistry {
    ttl: Duration,
    hosts: RwLock<HashMap<LobbyId, Registration>>,
}

impl ControlRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Record (or refresh) the host endpoint for a lobby. A host
    /// re-registering from a new address is an ordinary upsert: the last
    /// registration wins.
    pub fn upsert(&self, lobby: &str, addr: SocketAddr) {
        self.hosts.write().insert(
            lobby.to_string(),
            Registration {
                addr,
                last_seen: Instant::now(),
            },
        );
    }

    /// The registered host endpoint for a lobby, if any.
    pub fn host_addr(&self, lobby: &str) -> Option<SocketAddr> {
        self.hosts.read().get(lobby).map(|reg| reg.addr)
    }

    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.read().is_empty()
    }
}

impl Expire for ControlRegistry {
    fn label(&self) -> &'static str {
        "control-registrations"
    }

    fn remove_expired(&self) -> usize {
        let mut hosts = self.hosts.write();
        let before = hosts.len();
        hosts.retain(|_, reg| reg.last_seen.elapsed() <= self.ttl);
        before - hosts.len()
    }
}

/// State-channel registry: a set of client endpoints per lobby, keyed by
/// address so repeated registrations refresh rather than duplicate
pub struct StateRegistry {
    ttl: Duration,
    clients: RwLock<HashMap<LobbyId, HashMap<SocketAddr, Instant>>>,
}

impl StateRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Record (or refresh) a client's interest in a lobby's broadcasts.
    pub fn upsert(&self, lobby: &str, addr: SocketAddr) {
        self.clients
            .write()
            .entry(lobby.to_string())
            .or_default()
            .insert(addr, Instant::now());
    }

    /// Every client currently registered for a lobby.
    pub fn clients(&self, lobby: &str) -> Vec<SocketAddr> {
        self.clients
            .read()
            .get(lobby)
            .map(|set| set.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of lobbies with at least one registered client.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

impl Expire for StateRegistry {
    fn label(&self) -> &'static str {
        "state-registrations"
    }

    fn remove_expired(&self) -> usize {
        let mut clients = self.clients.write();
        let mut removed = 0;
        clients.retain(|_, set| {
            let before = set.len();
            set.retain(|_, last_seen| last_seen.elapsed() <= self.ttl);
            removed += before - set.len();
            // dropping the last client drops the set itself
            !set.is_empty()
        });
        removed
    }
}

/// Run the control channel: host registrations in, client payloads
/// forwarded to the registered host. Returns when the token is cancelled.
pub async fn run_control_loop(
    socket: UdpSocket,
    registry: Arc<ControlRegistry>,
    token: CancellationToken,
) {
    let mut buf = vec![0u8; CONTROL_BUF_SIZE];
    loop {
        let (len, from) = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(pair) => pair,
                Err(e) => {
                    debug!(error = %e, "control socket recv failed");
                    continue;
                }
            },
        };

        let (lobby, cmd) = match ControlCommand::parse(&buf[..len]) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!(from = %from, error = %e, "dropping malformed control datagram");
                continue;
            }
        };

        match cmd {
            ControlCommand::RegisterHost => {
                trace!(lobby = %lobby, host = %from, "host registered on control channel");
                registry.upsert(&lobby, from);
            }
            ControlCommand::ForwardToHost { payload } => {
                let Some(host) = registry.host_addr(&lobby) else {
                    trace!(lobby = %lobby, from = %from, "no host registered, dropping payload");
                    continue;
                };
                if let Err(e) = socket.send_to(payload.get().as_bytes(), host).await {
                    debug!(lobby = %lobby, dest = %host, error = %e, "control forward failed");
                }
            }
        }
    }
    debug!("control loop stopped");
}

/// Run the state channel: client registrations in, host snapshots fanned
/// out to every registered client. Returns when the token is cancelled.
pub async fn run_state_loop(
    socket: UdpSocket,
    registry: Arc<StateRegistry>,
    token: CancellationToken,
) {
    let mut buf = vec![0u8; STATE_BUF_SIZE];
    loop {
        let (len, from) = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(pair) => pair,
                Err(e) => {
                    debug!(error = %e, "state socket recv failed");
                    continue;
                }
            },
        };

        let (lobby, cmd) = match StateCommand::parse(&buf[..len]) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!(from = %from, error = %e, "dropping malformed state datagram");
                continue;
            }
        };

        match cmd {
            StateCommand::RegisterClient => {
                trace!(lobby = %lobby, client = %from, "client registered on state channel");
                registry.upsert(&lobby, from);
            }
            StateCommand::Broadcast { payload } => {
                // best effort per recipient: one failure never stops the rest
                for client in registry.clients(&lobby) {
                    if let Err(e) = socket.send_to(payload.get().as_bytes(), client).await {
                        debug!(lobby = %lobby, dest = %client, error = %e, "state broadcast send failed");
                    }
                }
            }
        }
    }
    debug!("state loop stopped");
}
