use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::RelayError;

use super::router::MessageRouter;

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(State(router): State<MessageRouter>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_connection(router, socket))
}

async fn serve_connection(router: MessageRouter, socket: WebSocket) {
    let (outbox, mut rx) = mpsc::unbounded_channel::<String>();
    let id = router.registry().register(outbox);
    info!(connection = %id, "client connected");

    let (mut sender, mut receiver) = socket.split();

    let mut writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let reader = async {
        while let Some(Ok(msg)) = receiver.next().await {
            let result = match msg {
                Message::Text(text) => router.handle_envelope(id, text.as_str().as_bytes()),
                Message::Binary(bytes) => router.handle_envelope(id, &bytes),
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            match result {
                Ok(routed) => debug!(connection = %id, ?routed, "routed"),
                Err(err @ RelayError::MalformedEnvelope(_)) => {
                    warn!(connection = %id, error = %err, "dropped envelope")
                }
                Err(err) => debug!(connection = %id, error = %err, "dropped envelope"),
            }
        }
    };

    tokio::select! {
        _ = reader => writer_task.abort(),
        _ = &mut writer_task => {}
    }

    router.registry().disconnect(id);
    info!(connection = %id, "client disconnected");
}
