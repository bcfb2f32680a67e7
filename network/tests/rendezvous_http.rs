// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the hole-punch exchange's HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use sevenkor_network::rendezvous::{routes, RoomStore};

fn store() -> Arc<RoomStore> {
    Arc::new(RoomStore::new(Duration::from_secs(300), 50007, 50008))
}

// the filters are stateless, so each call builds its own route tree
// around the shared store
async fn create_room(store: &Arc<RoomStore>) -> serde_json::Value {
    let api = routes(store.clone());
    let resp = warp::test::request()
        .method("POST")
        .path("/rooms")
        .header("x-forwarded-for", "198.51.100.4")
        .json(&serde_json::json!({
            "host_local_ip": "192.168.1.10",
            "host_choice": "rogue",
        }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
    serde_json::from_slice(resp.body()).unwrap()
}

#[tokio::test]
async fn created_room_has_null_client_fields() {
    let store = store();
    let api = routes(store.clone());
    let room = create_room(&store).await;

    assert_eq!(room["host_ip"], "198.51.100.4");
    assert_eq!(room["host_local_ip"], "192.168.1.10");
    assert_eq!(room["host_control_port"], 50007);
    assert_eq!(room["host_state_port"], 50008);
    assert_eq!(room["host_choice"], "rogue");
    assert!(room["client_ip"].is_null());
    assert!(room["client_local_ip"].is_null());
    assert!(room["client_control_port"].is_null());
    assert!(room["client_state_port"].is_null());

    let id = room["id"].as_str().unwrap();
    let resp = warp::test::request()
        .method("GET")
        .path(&format!("/rooms/{id}"))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn join_discloses_both_endpoint_pairs() {
    let store = store();
    let api = routes(store.clone());
    let room = create_room(&store).await;
    let id = room["id"].as_str().unwrap();

    let resp = warp::test::request()
        .method("POST")
        .path(&format!("/rooms/{id}/join"))
        .header("x-forwarded-for", "203.0.113.9")
        .json(&serde_json::json!({
            "client_control_port": 41000,
            "client_state_port": 41001,
            "client_local_ip": "192.168.2.20",
        }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);

    let joined: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(joined["client_ip"], "203.0.113.9");
    assert_eq!(joined["client_local_ip"], "192.168.2.20");
    assert_eq!(joined["client_control_port"], 41000);
    assert_eq!(joined["client_state_port"], 41001);
    // host candidates still intact for the puncher
    assert_eq!(joined["host_ip"], "198.51.100.4");
    assert_eq!(joined["host_local_ip"], "192.168.1.10");
    // the full record is what either peer sees afterwards
    let resp = warp::test::request()
        .method("GET")
        .path(&format!("/rooms/{id}"))
        .reply(&api)
        .await;
    let fetched: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(fetched, joined);
}

#[tokio::test]
async fn second_join_overwrites_the_first() {
    let store = store();
    let api = routes(store.clone());
    let room = create_room(&store).await;
    let id = room["id"].as_str().unwrap();

    for (ip, port) in [("203.0.113.9", 41000), ("203.0.113.50", 42000)] {
        let resp = warp::test::request()
            .method("POST")
            .path(&format!("/rooms/{id}/join"))
            .header("x-forwarded-for", ip)
            .json(&serde_json::json!({
                "client_control_port": port,
                "client_state_port": port + 1,
            }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), 200);
    }

    let resp = warp::test::request()
        .method("GET")
        .path(&format!("/rooms/{id}"))
        .reply(&api)
        .await;
    let fetched: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(fetched["client_ip"], "203.0.113.50");
    assert_eq!(fetched["client_control_port"], 42000);
    assert_eq!(fetched["client_state_port"], 42001);
    // the second join did not send a local ip, so none is on record
    assert!(fetched["client_local_ip"].is_null());
    assert_eq!(fetched["host_ip"], "198.51.100.4");
    assert_eq!(fetched["created_at"], room["created_at"]);
}

#[tokio::test]
async fn join_absent_room_is_not_found() {
    let api = routes(store());

    let resp = warp::test::request()
        .method("POST")
        .path("/rooms/deadbeef/join")
        .header("x-forwarded-for", "203.0.113.9")
        .json(&serde_json::json!({}))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn expired_room_is_not_joinable() {
    let store = Arc::new(RoomStore::new(Duration::from_millis(50), 50007, 50008));
    let api = routes(store.clone());
    let room = create_room(&store).await;
    let id = room["id"].as_str().unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    let resp = warp::test::request()
        .method("POST")
        .path(&format!("/rooms/{id}/join"))
        .header("x-forwarded-for", "203.0.113.9")
        .json(&serde_json::json!({}))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 404);

    let resp = warp::test::request()
        .method("GET")
        .path(&format!("/rooms/{id}"))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn health_counts_rooms() {
    let store = store();
    let api = routes(store.clone());
    create_room(&store).await;

    let resp = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["rooms"], 1);
}
