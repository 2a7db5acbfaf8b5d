use super::state::AppState;
use crate::events::{ClientChannel, ClientSink};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tracing::{debug, info, warn};

/// GET /ws/transcribe
/// Upgrade to a live transcription session
pub async fn transcribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Write half of the client WebSocket
struct WsClient(SplitSink<WebSocket, Message>);

#[async_trait::async_trait]
impl ClientChannel for WsClient {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.0.send(Message::Text(text)).await?;
        Ok(())
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let (id, session) = state.registry.create(ClientSink::new(WsClient(sender))).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => session.lock().await.on_text(&text).await,
            Ok(Message::Binary(data)) => {
                session
                    .lock()
                    .await
                    .on_audio_frame(Bytes::from(data))
                    .await
            }
            Ok(Message::Close(frame)) => {
                debug!("[{}] close frame: {:?}", id, frame);
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                warn!("[{}] WebSocket error: {}", id, e);
                break;
            }
        }
    }

    info!("[{}] client connection ended", id);
    state.registry.destroy(&id).await;
}
