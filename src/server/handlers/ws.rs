use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Extension;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::api::DynAPI;
use crate::auth::User;
use crate::hub::{ClientMessage, ServerMessage};

pub async fn connect(
    ws: WebSocketUpgrade,
    Extension(api): Extension<DynAPI>,
    user: User,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, api, user))
}

#[tracing::instrument(skip(socket, api))]
async fn session(socket: WebSocket, api: DynAPI, user: User) {
    let (connection_id, mut outbound) = api.hub().connect(user.clone()).await;
    let (mut sink, mut inbound) = socket.split();

    // ends once the hub drops this connection's queue
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(?err, "unable to encode frame");
                    continue;
                }
            };

            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }

        let _ = sink.close().await;
    });

    while let Some(Ok(frame)) = inbound.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let failure = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::SubscribeTracking { request_id }) => api
                .watch_request(user.clone(), connection_id, request_id)
                .await
                .err()
                .map(|err| err.public_message().to_string()),
            Err(err) => {
                tracing::debug!(%err, "unreadable frame");
                Some("malformed message".to_string())
            }
        };

        if let Some(message) = failure {
            api.hub()
                .notify(connection_id, ServerMessage::Error { message })
                .await;
        }
    }

    api.hub().disconnect(connection_id).await;

    if let Err(err) = writer.await {
        tracing::error!(?err, "websocket writer failed");
    }

    tracing::debug!(%connection_id, "websocket closed");
}
