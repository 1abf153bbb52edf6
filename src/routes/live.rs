// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live WebSocket endpoint.
//!
//! Each connected client holds one bus subscription; every published
//! event is forwarded as one JSON text frame. Inbound frames carry
//! location updates, which are relayed through the bus and never stored.
//! Disconnects drop the subscription, so departed clients cost nothing.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::header,
    response::Response,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{AppError, Result};
use crate::middleware::auth::{verify_jwt, SESSION_COOKIE};
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_upgrade))
}

#[derive(Deserialize)]
struct WsQuery {
    /// Session token; browsers cannot set headers on WebSocket requests.
    token: Option<String>,
}

/// Authenticate (query param, cookie or bearer header) and upgrade.
async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let token = query
        .token
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(|t| t.to_string())
        })
        .ok_or(AppError::Unauthorized)?;

    let user_id =
        verify_jwt(&token, &state.config.jwt_signing_key).ok_or(AppError::Unauthorized)?;
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Inbound client frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    LocationUpdate { ride_id: String, lat: f64, lng: f64 },
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: User) {
    tracing::info!(user_id = %user.id, "Live client connected");

    let mut events = state.bus.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!(error = %e, "Dropping unserializable event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // The client fell behind; it should re-fetch state.
                        tracing::warn!(user_id = %user.id, skipped, "Live client lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::LocationUpdate { ride_id, lat, lng }) => {
                                state.engine.publish_location(&user, &ride_id, lat, lng);
                            }
                            Err(e) => {
                                tracing::debug!(user_id = %user.id, error = %e, "Ignoring malformed client frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by the protocol layer
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::info!(user_id = %user.id, "Live client disconnected");
}
