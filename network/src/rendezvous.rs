// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hole-Punch Exchange: a directory variant whose payoff is address
//! disclosure rather than forwarding.
//!
//! The host's and client's public addresses are observed from their HTTP
//! requests; locally-bound addresses arrive in the body and are recorded
//! verbatim as an advisory same-subnet fast path. Once both sides are on
//! the record, either peer can fetch it and attempt direct delivery to
//! whichever candidate endpoint answers first.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::Filter;

use sevenkor_core::{LobbyId, Room};

use crate::net_util;
use crate::sweeper::Expire;

/// In-memory room registry with TTL-based expiry
pub struct RoomStore {
    ttl: Duration,
    default_control_port: u16,
    default_state_port: u16,
    rooms: RwLock<HashMap<LobbyId, Room>>,
}

impl RoomStore {
    pub fn new(ttl: Duration, default_control_port: u16, default_state_port: u16) -> Self {
        Self {
            ttl,
            default_control_port,
            default_state_port,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, room: Room) {
        self.rooms.write().insert(room.id.clone(), room);
    }

    /// Fetch a room, removing it on the spot if it has expired.
    pub fn get(&self, id: &str) -> Option<Room> {
        let now = Utc::now();
        {
            let rooms = self.rooms.read();
            match rooms.get(id) {
                None => return None,
                Some(room) if !room.is_expired(now, self.ttl) => return Some(room.clone()),
                Some(_) => {}
            }
        }
        let mut rooms = self.rooms.write();
        if let Some(room) = rooms.get(id) {
            if !room.is_expired(now, self.ttl) {
                return Some(room.clone());
            }
            rooms.remove(id);
            debug!(room = id, "removed expired room on read");
        }
        None
    }

    /// Fill (or overwrite) the client half of a room's record.
    ///
    /// Returns the updated record, or `None` if the room is absent or
    /// expired. Only one client is supported per room, so the last join
    /// wins without conflict detection.
    pub fn join(
        &self,
        id: &str,
        client_ip: String,
        client_local_ip: Option<String>,
        client_control_port: u16,
        client_state_port: u16,
    ) -> Option<Room> {
        let now = Utc::now();
        let mut rooms = self.rooms.write();
        match rooms.get_mut(id) {
            Some(room) if room.is_expired(now, self.ttl) => {
                rooms.remove(id);
                None
            }
            Some(room) => {
                room.join(client_ip, client_local_ip, client_control_port, client_state_port);
                Some(room.clone())
            }
            None => None,
        }
    }

    /// Number of currently-live rooms.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.rooms
            .read()
            .values()
            .filter(|room| !room.is_expired(now, self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Expire for RoomStore {
    fn label(&self) -> &'static str {
        "rooms"
    }

    fn remove_expired(&self) -> usize {
        let now = Utc::now();
        let mut rooms = self.rooms.write();
        let before = rooms.len();
        rooms.retain(|_, room| !room.is_expired(now, self.ttl));
        before - rooms.len()
    }
}

/// Body of `POST /rooms`
#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    pub host_control_port: Option<u16>,
    pub host_state_port: Option<u16>,
    pub host_local_ip: Option<String>,
    pub host_choice: Option<String>,
}

/// Body of `POST /rooms/{id}/join`
#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomRequest {
    pub client_control_port: Option<u16>,
    pub client_state_port: Option<u16>,
    pub client_local_ip: Option<String>,
}

fn with_store(
    store: Arc<RoomStore>,
) -> impl Filter<Extract = (Arc<RoomStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

/// Build the exchange's route tree.
pub fn routes(
    store: Arc<RoomStore>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let create = warp::post()
        .and(warp::path!("rooms"))
        .and(warp::body::json())
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .and(with_store(store.clone()))
        .and_then(create_room);

    let get = warp::get()
        .and(warp::path!("rooms" / String))
        .and(with_store(store.clone()))
        .and_then(get_room);

    let join = warp::post()
        .and(warp::path!("rooms" / String / "join"))
        .and(warp::body::json())
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .and(with_store(store.clone()))
        .and_then(join_room);

    let health = warp::get()
        .and(warp::path!("health"))
        .and(with_store(store))
        .and_then(health);

    create.or(get).or(join).or(health)
}

async fn create_room(
    req: CreateRoomRequest,
    forwarded: Option<String>,
    remote: Option<SocketAddr>,
    store: Arc<RoomStore>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let host_ip = match net_util::client_ip(forwarded.as_deref(), remote) {
        Some(ip) => ip,
        None => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&json!({"error": "host address unresolvable"})),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let room = Room::new(
        host_ip,
        req.host_local_ip,
        req.host_control_port.unwrap_or(store.default_control_port),
        req.host_state_port.unwrap_or(store.default_state_port),
        req.host_choice,
    );
    info!(room = %room.id, host = %room.host_ip, "room created");
    store.insert(room.clone());

    Ok(warp::reply::with_status(
        warp::reply::json(&room),
        StatusCode::OK,
    ))
}

async fn get_room(id: String, store: Arc<RoomStore>) -> Result<impl warp::Reply, warp::Rejection> {
    match store.get(&id) {
        Some(room) => Ok(warp::reply::with_status(
            warp::reply::json(&room),
            StatusCode::OK,
        )),
        None => Ok(warp::reply::with_status(
            warp::reply::json(&json!({"error": "room not found"})),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn join_room(
    id: String,
    req: JoinRoomRequest,
    forwarded: Option<String>,
    remote: Option<SocketAddr>,
    store: Arc<RoomStore>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let client_ip = match net_util::client_ip(forwarded.as_deref(), remote) {
        Some(ip) => ip,
        None => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&json!({"error": "client address unresolvable"})),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let joined = store.join(
        &id,
        client_ip,
        req.client_local_ip,
        req.client_control_port.unwrap_or(store.default_control_port),
        req.client_state_port.unwrap_or(store.default_state_port),
    );
    match joined {
        Some(room) => {
            info!(room = %id, client = ?room.client_ip, "client joined room");
            Ok(warp::reply::with_status(
                warp::reply::json(&room),
                StatusCode::OK,
            ))
        }
        None => Ok(warp::reply::with_status(
            warp::reply::json(&json!({"error": "room not found"})),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn health(store: Arc<RoomStore>) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({"ok": true, "rooms": store.len()})),
        StatusCode::OK,
    ))
}
