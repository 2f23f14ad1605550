use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use roomrelay::{AppState, Config, app, rooms::ServerEnvelope};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(AppState::new(&Config::default()));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn send(ws: &mut WsStream, frame: &str) {
    ws.send(Message::text(frame.to_owned())).await.unwrap();
}

async fn recv(ws: &mut WsStream) -> ServerEnvelope {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut WsStream) {
    assert!(
        timeout(Duration::from_millis(200), ws.next()).await.is_err(),
        "expected no frame"
    );
}

async fn join(ws: &mut WsStream, room: &str, user: &str) {
    send(ws, &format!(r#"{{"type":"join","room":"{room}","user":"{user}"}}"#)).await;
    assert_eq!(
        recv(ws).await,
        ServerEnvelope::System {
            message: format!("Joined room {room}")
        }
    );
}

fn chat(user: &str, message: &str, room: &str) -> ServerEnvelope {
    ServerEnvelope::Chat {
        user: user.to_owned(),
        message: message.to_owned(),
        room: room.to_owned(),
    }
}

#[tokio::test]
async fn lobby_round_trip() {
    let addr = spawn_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "LOBBY", "alice").await;
    join(&mut bob, "LOBBY", "bob").await;

    send(
        &mut alice,
        r#"{"type":"message","room":"LOBBY","user":"alice","message":"hi"}"#,
    )
    .await;

    assert_eq!(recv(&mut alice).await, chat("alice", "hi", "LOBBY"));
    assert_eq!(recv(&mut bob).await, chat("alice", "hi", "LOBBY"));
}

#[tokio::test]
async fn garbage_and_early_chat_keep_socket_open() {
    let addr = spawn_server().await;
    let mut alice = connect(addr).await;

    send(&mut alice, "definitely not json").await;
    send(
        &mut alice,
        r#"{"type":"message","room":"LOBBY","user":"alice","message":"too soon"}"#,
    )
    .await;
    assert_silent(&mut alice).await;

    join(&mut alice, "LOBBY", "alice").await;
}

#[tokio::test]
async fn closed_member_stops_receiving() {
    let addr = spawn_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    let mut carol = connect(addr).await;

    join(&mut alice, "LOBBY", "alice").await;
    join(&mut bob, "LOBBY", "bob").await;
    join(&mut carol, "LOBBY", "carol").await;

    bob.close(None).await.unwrap();
    drop(bob);
    tokio::time::sleep(Duration::from_millis(100)).await;

    send(
        &mut alice,
        r#"{"type":"message","room":"LOBBY","user":"alice","message":"still here?"}"#,
    )
    .await;
    assert_eq!(recv(&mut alice).await, chat("alice", "still here?", "LOBBY"));
    assert_eq!(recv(&mut carol).await, chat("alice", "still here?", "LOBBY"));
}

#[tokio::test]
async fn switching_rooms_isolates_traffic() {
    let addr = spawn_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    join(&mut alice, "X", "alice").await;
    join(&mut bob, "X", "bob").await;
    join(&mut alice, "Y", "alice").await;

    send(
        &mut bob,
        r#"{"type":"message","room":"X","user":"bob","message":"only X"}"#,
    )
    .await;
    assert_eq!(recv(&mut bob).await, chat("bob", "only X", "X"));
    assert_silent(&mut alice).await;
}
