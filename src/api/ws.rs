//! Streaming subscribe endpoint
//!
//! `GET /api/v1/subscribe?topics=a,b,c` upgrades to a WebSocket and pushes
//! every matching event as one JSON frame. A client text frame of `"ping"`
//! answers with the bus's current seq (the heartbeat contract).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::bus::{BackpressurePolicy, Subscription};
use crate::types::EventKind;

use super::envelope::ApiErrorResponse;
use super::handlers::ApiState;

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Comma-separated topic list; empty means all topics
    pub topics: Option<String>,
    /// Optional per-subscription policy override
    pub policy: Option<String>,
}

pub async fn subscribe(
    State(state): State<ApiState>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let topics: Vec<EventKind> = match query.topics.as_deref() {
        None | Some("") => EventKind::ALL.to_vec(),
        Some(raw) => {
            let mut parsed = Vec::new();
            for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match EventKind::parse(name) {
                    Some(kind) => parsed.push(kind),
                    None => {
                        return ApiErrorResponse::bad_request(format!("unknown topic '{name}'"))
                    }
                }
            }
            parsed
        }
    };

    let policy = match query.policy.as_deref() {
        None => None,
        Some("drop_oldest") => Some(BackpressurePolicy::DropOldest),
        Some("block_producer") => Some(BackpressurePolicy::BlockProducer),
        Some("drop_subscription") => Some(BackpressurePolicy::DropSubscription),
        Some(other) => {
            return ApiErrorResponse::bad_request(format!("unknown policy '{other}'"));
        }
    };

    let subscription = state.bus.subscribe_with(&topics, policy, None);
    ws.on_upgrade(move |socket| stream_events(socket, subscription, state))
}

async fn stream_events(socket: WebSocket, subscription: Subscription, state: ApiState) {
    let id = subscription.id();
    debug!(subscription = id, "Event stream opened");

    let (mut sender, mut receiver): (SplitSink<WebSocket, Message>, SplitStream<WebSocket>) =
        socket.split();

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    // Subscription disconnected (slow-consumer policy or shutdown)
                    let _ = sender
                        .send(Message::Text(
                            json!({"kind": "stream.closed", "reason": "subscription dropped"})
                                .to_string(),
                        ))
                        .await;
                    break;
                };
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(subscription = id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                        let heartbeat = json!({
                            "kind": "heartbeat",
                            "seq": state.bus.current_seq(),
                        });
                        if sender.send(Message::Text(heartbeat.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sender.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(subscription = id, error = %e, "Event stream read error");
                        break;
                    }
                }
            }
        }
    }

    debug!(subscription = id, "Event stream closed");
}
