//! Integration tests for room membership, negotiation relay and media state
//! over real WebSocket connections.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use signaling_server::config::Config;
use signaling_server::state::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port and return (state, addr).
async fn start_test_server() -> (AppState, SocketAddr) {
    start_test_server_with(Config::default()).await
}

async fn start_test_server_with(config: Config) -> (AppState, SocketAddr) {
    let state = AppState::new(&config);
    let app = signaling_server::routes::build_router(state.clone(), &config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, addr)
}

/// One signaling client with the id the server assigned to it.
struct Client {
    id: String,
    ws: WsStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .expect("Failed to connect to WebSocket");
        let mut client = Self {
            id: String::new(),
            ws,
        };
        let hello = client.recv().await;
        assert_eq!(hello["type"], "connected");
        client.id = hello["connectionId"].as_str().unwrap().to_string();
        client
    }

    async fn send(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("Failed to send");
    }

    /// Next JSON frame, skipping control frames.
    async fn recv(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
                .await
                .expect("Expected a message within timeout");
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("Server sent invalid JSON")
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("Expected text frame, got: {:?}", other),
            }
        }
    }

    async fn recv_type(&mut self, expected: &str) -> Value {
        let msg = self.recv().await;
        assert_eq!(msg["type"], expected, "Unexpected message: {}", msg);
        msg
    }

    async fn expect_silence(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(300), self.ws.next()).await;
        assert!(result.is_err(), "Expected no message, got: {:?}", result);
    }

    async fn join(&mut self, room_id: &str, user_id: &str) {
        self.send(json!({"type": "join-room", "roomId": room_id, "userId": user_id}))
            .await;
    }
}

fn roster_ids(msg: &Value) -> Vec<String> {
    let mut ids: Vec<String> = msg["participants"]
        .as_array()
        .expect("roster participants")
        .iter()
        .map(|p| p["connectionId"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_end_to_end_study_room() {
    let (state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.join("study-1", "u1").await;
    let existing = a.recv_type("existing-participants").await;
    assert_eq!(existing["participantIds"], json!([]));
    let roster = a.recv_type("roster-snapshot").await;
    assert_eq!(roster_ids(&roster), vec![a.id.clone()]);
    assert!(state.rooms.contains_room("study-1"));

    b.join("study-1", "u2").await;
    let joined = a.recv_type("participant-joined").await;
    assert_eq!(joined["connectionId"], b.id.as_str());
    assert_eq!(joined["userId"], "u2");
    let roster_a = a.recv_type("roster-snapshot").await;

    let existing = b.recv_type("existing-participants").await;
    assert_eq!(existing["participantIds"], json!([a.id.clone()]));
    let roster_b = b.recv_type("roster-snapshot").await;
    assert_eq!(roster_a, roster_b);
    assert_eq!(roster_ids(&roster_b), sorted(vec![a.id.clone(), b.id.clone()]));

    // Newcomer initiates the offer
    let payload = json!({"sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n", "type": "offer"});
    b.send(json!({
        "type": "send-offer",
        "target": a.id,
        "payload": payload,
        "roomId": "study-1",
    }))
    .await;
    let offer = a.recv_type("offer-relayed").await;
    assert_eq!(offer["from"], b.id.as_str());
    assert_eq!(offer["payload"], payload);
    assert_eq!(offer["roomId"], "study-1");

    // A drops without a leave message
    let a_id = a.id.clone();
    a.ws.close(None).await.unwrap();
    drop(a);

    let left = b.recv_type("participant-left").await;
    assert_eq!(left["connectionId"], a_id.as_str());
    assert_eq!(left["roomId"], "study-1");
    let roster = b.recv_type("roster-snapshot").await;
    assert_eq!(roster_ids(&roster), vec![b.id.clone()]);
    assert!(state.rooms.contains_room("study-1"));

    b.send(json!({"type": "leave-room", "roomId": "study-1"})).await;
    b.expect_silence().await;
    assert!(!state.rooms.contains_room("study-1"));
}

#[tokio::test]
async fn test_join_without_room_id_is_ignored() {
    let (state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;

    a.send(json!({"type": "join-room", "userId": "u1"})).await;
    a.send(json!({"type": "join-room", "roomId": ""})).await;
    a.send(json!({"not": "a message"})).await;
    a.ws.send(Message::Text("garbage".into())).await.unwrap();

    a.expect_silence().await;
    assert!(state.rooms.is_empty());
}

#[tokio::test]
async fn test_double_leave_produces_single_departure() {
    let (_state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.join("r", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    b.join("r", "u2").await;
    a.recv_type("participant-joined").await;
    a.recv_type("roster-snapshot").await;

    b.send(json!({"type": "leave-room", "roomId": "r"})).await;
    b.send(json!({"type": "leave-room", "roomId": "r"})).await;

    let left = a.recv_type("participant-left").await;
    assert_eq!(left["connectionId"], b.id.as_str());
    a.recv_type("roster-snapshot").await;
    a.expect_silence().await;
}

#[tokio::test]
async fn test_relay_to_dead_target_is_dropped() {
    let (_state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.join("r", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    b.join("r", "u2").await;
    a.recv_type("participant-joined").await;
    a.recv_type("roster-snapshot").await;
    b.recv_type("existing-participants").await;
    b.recv_type("roster-snapshot").await;

    for kind in ["send-offer", "send-answer", "send-candidate"] {
        a.send(json!({
            "type": kind,
            "target": "no-such-connection",
            "payload": {"candidate": "candidate:0 1 UDP 2122252543 10.0.0.1 50000 typ host"},
            "roomId": "r",
        }))
        .await;
    }

    a.expect_silence().await;
    b.expect_silence().await;
}

#[tokio::test]
async fn test_partial_media_toggle_is_echoed_to_room() {
    let (_state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.join("r", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    b.join("r", "u2").await;
    a.recv_type("participant-joined").await;
    a.recv_type("roster-snapshot").await;
    b.recv_type("existing-participants").await;
    b.recv_type("roster-snapshot").await;

    a.send(json!({"type": "toggle-media", "roomId": "r", "video": false}))
        .await;

    let expected = json!({
        "type": "media-state-changed",
        "connectionId": a.id,
        "audio": true,
        "video": false,
    });
    assert_eq!(a.recv().await, expected);
    assert_eq!(b.recv().await, expected);
}

#[tokio::test]
async fn test_room_is_recreated_fresh_after_emptying() {
    let (state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;

    a.join("R1", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    let first_created = state.rooms.snapshot("R1").unwrap().created_at();

    a.send(json!({"type": "leave-room", "roomId": "R1"})).await;
    a.expect_silence().await;
    assert!(!state.rooms.contains_room("R1"));

    tokio::time::sleep(Duration::from_millis(5)).await;
    a.join("R1", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    let room = state.rooms.snapshot("R1").unwrap();
    assert!(room.created_at() > first_created);
    assert_eq!(room.len(), 1);
}

#[tokio::test]
async fn test_client_ping_gets_pong() {
    let (_state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;

    a.ws.send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), a.ws.next())
        .await
        .expect("Expected pong within timeout");
    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_disconnect_cleans_up_registry_and_rooms() {
    let (state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;

    a.join("solo", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    assert_eq!(state.connections.len(), 1);

    a.ws.close(None).await.unwrap();
    drop(a);

    // Give the server a moment to clean up
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(state.connections.is_empty());
    assert!(state.rooms.is_empty());
}

#[tokio::test]
async fn test_relayed_payload_is_byte_for_byte() {
    let (_state, addr) = start_test_server().await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    let payload = r#"{"n":1.50,"e":1e2,"big":123456789012345678901234567890,"sdp":"v=0\r\n"}"#;
    let frame = format!(
        r#"{{"type":"send-answer","target":"{}","payload":{},"roomId":"study-1"}}"#,
        a.id, payload
    );
    b.ws.send(Message::Text(frame.into())).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), a.ws.next())
        .await
        .expect("Expected relayed answer within timeout");
    match received {
        Some(Ok(Message::Text(text))) => {
            assert!(text.as_str().contains(r#""type":"answer-relayed""#));
            assert!(
                text.as_str().contains(&format!(r#""payload":{}"#, payload)),
                "payload was rewritten: {}",
                text.as_str()
            );
        }
        other => panic!("Expected text frame, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_pong_timeout() {
    let config = Config {
        ping_interval_secs: 1,
        pong_timeout_secs: 1,
        ..Config::default()
    };
    let (state, addr) = start_test_server_with(config).await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.join("r", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    b.join("r", "u2").await;
    a.recv_type("participant-joined").await;
    a.recv_type("roster-snapshot").await;
    b.recv_type("existing-participants").await;
    b.recv_type("roster-snapshot").await;

    // A stops reading, so it never answers pings, but keeps its socket open.
    // B keeps reading, which answers every ping it sees.
    let left = b.recv_type("participant-left").await;
    assert_eq!(left["connectionId"], a.id.as_str());
    let roster = b.recv_type("roster-snapshot").await;
    assert_eq!(roster_ids(&roster), vec![b.id.clone()]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(state.connections.len(), 1);
    assert_eq!(state.rooms.snapshot("r").unwrap().len(), 1);
    drop(a);
}

#[tokio::test]
async fn test_unsolicited_pongs_do_not_extend_liveness() {
    let config = Config {
        ping_interval_secs: 1,
        pong_timeout_secs: 1,
        ..Config::default()
    };
    let (_state, addr) = start_test_server_with(config).await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.join("r", "u1").await;
    a.recv_type("existing-participants").await;
    a.recv_type("roster-snapshot").await;
    b.join("r", "u2").await;
    b.recv_type("existing-participants").await;
    b.recv_type("roster-snapshot").await;

    // Banked pongs must not answer pings that have not been sent yet
    let started = std::time::Instant::now();
    for _ in 0..5 {
        a.ws.send(Message::Pong(vec![0].into())).await.unwrap();
    }

    let left = b.recv_type("participant-left").await;
    assert_eq!(left["connectionId"], a.id.as_str());
    assert!(
        started.elapsed() < Duration::from_millis(3500),
        "silent client survived {:?}",
        started.elapsed()
    );
    drop(a);
}
