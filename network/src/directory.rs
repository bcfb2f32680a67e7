// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session Directory: the HTTP registry of relay-mode lobbies.
//!
//! Hosts create a lobby here, learn where the datagram relay listens, and
//! register with it; clients fetch the lobby record to find the same
//! coordinates. Records expire after a TTL, enforced both by the sweeper
//! and lazily on read.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::Filter;

use sevenkor_core::{Lobby, LobbyId};

use crate::config::RelayCoords;
use crate::net_util;
use crate::sweeper::Expire;

/// In-memory lobby registry with TTL-based expiry
pub struct LobbyStore {
    ttl: Duration,
    lobbies: RwLock<HashMap<LobbyId, Lobby>>,
}

impl LobbyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            lobbies: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, lobby: Lobby) {
        self.lobbies.write().insert(lobby.id.clone(), lobby);
    }

    /// Fetch a lobby. An expired record is removed on the spot and reported
    /// absent, closing the race where the sweeper has not run yet.
    pub fn get(&self, id: &str) -> Option<Lobby> {
        let now = Utc::now();
        {
            let lobbies = self.lobbies.read();
            match lobbies.get(id) {
                None => return None,
                Some(lobby) if !lobby.is_expired(now, self.ttl) => return Some(lobby.clone()),
                Some(_) => {}
            }
        }
        // re-check under the write lock; the sweeper may have beaten us
        let mut lobbies = self.lobbies.write();
        if let Some(lobby) = lobbies.get(id) {
            if !lobby.is_expired(now, self.ttl) {
                return Some(lobby.clone());
            }
            lobbies.remove(id);
            debug!(lobby = id, "removed expired lobby on read");
        }
        None
    }

    /// Remove a lobby; removing an absent lobby is not an error.
    pub fn remove(&self, id: &str) -> bool {
        self.lobbies.write().remove(id).is_some()
    }

    /// All currently-live lobbies.
    pub fn list(&self) -> Vec<Lobby> {
        let now = Utc::now();
        self.lobbies
            .read()
            .values()
            .filter(|lobby| !lobby.is_expired(now, self.ttl))
            .cloned()
            .collect()
    }

    /// Number of currently-live lobbies.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.lobbies
            .read()
            .values()
            .filter(|lobby| !lobby.is_expired(now, self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Expire for LobbyStore {
    fn label(&self) -> &'static str {
        "lobbies"
    }

    fn remove_expired(&self) -> usize {
        let now = Utc::now();
        let mut lobbies = self.lobbies.write();
        let before = lobbies.len();
        lobbies.retain(|_, lobby| !lobby.is_expired(now, self.ttl));
        before - lobbies.len()
    }
}

/// Body of `POST /lobbies`
#[derive(Debug, Default, Deserialize)]
pub struct CreateLobbyRequest {
    pub host_ip: Option<String>,
    pub control_port: Option<u16>,
    pub state_port: Option<u16>,
    pub host_choice: Option<String>,
}

/// Response of `POST /lobbies`: the stored record plus the relay's
/// coordinates so the caller knows where to register.
#[derive(Debug, Serialize)]
pub struct LobbyCreated {
    #[serde(flatten)]
    pub lobby: Lobby,
    pub relay_host: String,
    pub relay_control_port: u16,
    pub relay_state_port: u16,
}

fn with_store(
    store: Arc<LobbyStore>,
) -> impl Filter<Extract = (Arc<LobbyStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_coords(
    coords: RelayCoords,
) -> impl Filter<Extract = (RelayCoords,), Error = Infallible> + Clone {
    warp::any().map(move || coords.clone())
}

/// Build the directory's route tree.
pub fn routes(
    store: Arc<LobbyStore>,
    coords: RelayCoords,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let create = warp::post()
        .and(warp::path!("lobbies"))
        .and(warp::body::json())
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::header::optional::<String>("host"))
        .and(warp::addr::remote())
        .and(with_store(store.clone()))
        .and(with_coords(coords))
        .and_then(create_lobby);

    let get = warp::get()
        .and(warp::path!("lobbies" / String))
        .and(with_store(store.clone()))
        .and_then(get_lobby);

    let list = warp::get()
        .and(warp::path!("lobbies"))
        .and(with_store(store.clone()))
        .and_then(list_lobbies);

    let delete = warp::delete()
        .and(warp::path!("lobbies" / String))
        .and(with_store(store.clone()))
        .and_then(delete_lobby);

    let health = warp::get()
        .and(warp::path!("health"))
        .and(with_store(store))
        .and_then(health);

    create.or(get).or(list).or(delete).or(health)
}

async fn create_lobby(
    req: CreateLobbyRequest,
    forwarded: Option<String>,
    host_header: Option<String>,
    remote: Option<SocketAddr>,
    store: Arc<LobbyStore>,
    coords: RelayCoords,
) -> Result<impl warp::Reply, warp::Rejection> {
    let host_ip = req
        .host_ip
        .or_else(|| net_util::client_ip(forwarded.as_deref(), remote));
    let host_ip = match host_ip {
        Some(ip) => ip,
        None => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&json!({"error": "host_ip is required"})),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let lobby = Lobby::new(
        host_ip,
        req.control_port.unwrap_or(coords.control_port),
        req.state_port.unwrap_or(coords.state_port),
        req.host_choice,
    );
    info!(lobby = %lobby.id, host = %lobby.host_ip, "lobby created");
    store.insert(lobby.clone());

    let relay_host = coords
        .advertised_host
        .or_else(|| {
            host_header.and_then(|h| h.split(':').next().map(str::to_string))
        })
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let body = LobbyCreated {
        lobby,
        relay_host,
        relay_control_port: coords.control_port,
        relay_state_port: coords.state_port,
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&body),
        StatusCode::CREATED,
    ))
}

async fn get_lobby(id: String, store: Arc<LobbyStore>) -> Result<impl warp::Reply, warp::Rejection> {
    match store.get(&id) {
        Some(lobby) => Ok(warp::reply::with_status(
            warp::reply::json(&lobby),
            StatusCode::OK,
        )),
        None => Ok(warp::reply::with_status(
            warp::reply::json(&json!({"error": "lobby not found"})),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn list_lobbies(store: Arc<LobbyStore>) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::with_status(
        warp::reply::json(&store.list()),
        StatusCode::OK,
    ))
}

async fn delete_lobby(id: String, store: Arc<LobbyStore>) -> Result<impl warp::Reply, warp::Rejection> {
    if store.remove(&id) {
        info!(lobby = %id, "lobby deleted");
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({"ok": true})),
        StatusCode::OK,
    ))
}

async fn health(store: Arc<LobbyStore>) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({"ok": true, "lobbies": store.len()})),
        StatusCode::OK,
    ))
}
