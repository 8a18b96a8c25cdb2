use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bus::{Bus, BusMessage, PublishError, Publisher, Subscriber};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<Bus>,
}

#[derive(Debug, Deserialize)]
struct RetainedQuery {
    topic: String,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(default = "match_everything")]
    filter: String,
}

fn match_everything() -> String {
    "#".to_string()
}

#[derive(Debug, Serialize)]
struct HttpError {
    error: String,
}

fn http_error(status: StatusCode, error: impl ToString) -> (StatusCode, Json<HttpError>) {
    (
        status,
        Json(HttpError {
            error: error.to_string(),
        }),
    )
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/publish", post(publish))
        .route("/retained", get(retained))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn publish(
    State(state): State<AppState>,
    Json(message): Json<BusMessage>,
) -> Result<StatusCode, (StatusCode, Json<HttpError>)> {
    state
        .bus
        .publish(&message.topic, &message.payload, message.retain)
        .await
        .map_err(|err| match err {
            PublishError::InvalidTopic(_) => http_error(StatusCode::BAD_REQUEST, err),
            PublishError::Transport(_) => http_error(StatusCode::SERVICE_UNAVAILABLE, err),
        })?;
    Ok(StatusCode::ACCEPTED)
}

async fn retained(
    State(state): State<AppState>,
    Query(query): Query<RetainedQuery>,
) -> Result<Json<BusMessage>, (StatusCode, Json<HttpError>)> {
    let payload = state.bus.retained(&query.topic).ok_or_else(|| {
        http_error(
            StatusCode::NOT_FOUND,
            format!("no retained message on '{}'", query.topic),
        )
    })?;
    Ok(Json(BusMessage {
        topic: query.topic,
        payload,
        retain: true,
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, query.filter))
}

async fn ws_connection(state: AppState, socket: WebSocket, filter: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut messages = state.bus.subscribe(&filter);
    debug!(filter = %filter, "websocket subscriber attached");

    let send_task = tokio::spawn(async move {
        while let Some(message) = messages.next().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to encode bus message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_)) = receiver.next().await {}

    send_task.abort();
    debug!(filter = %filter, "websocket subscriber detached");
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
