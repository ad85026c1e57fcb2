//! Server-sent change hints.
//!
//! Clients get an `init` event, then a `change` event for every store
//! mutation visible to their scope, plus periodic heartbeats. The
//! payload names the entity and id only; clients re-run their queries.

use axum::{
    extract::State,
    response::{sse::Event, IntoResponse, Response, Sse},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::auth::AuthSession;
use crate::AppState;

pub async fn events_stream(State(state): State<AppState>, session: AuthSession) -> Response {
    let hb_secs: u64 = std::env::var("SSE_HEARTBEAT_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(15);

    let scope = session.scope();
    let mut rx = state.store.subscribe();
    debug!(profile = %session.profile_id, role = %session.role, "change feed subscribed");

    let body_stream = async_stream::stream! {
        let init_payload = serde_json::json!({
            "type": "init",
            "message": "connected to change feed"
        });
        yield Ok::<_, std::convert::Infallible>(
            Event::default()
                .event("init")
                .json_data(init_payload)
                .expect("valid JSON")
        );

        let mut heartbeat_interval =
            tokio::time::interval(tokio::time::Duration::from_secs(hb_secs));
        heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Ok(change) => {
                            if !change.visible_to(&scope) {
                                continue;
                            }
                            yield Ok(
                                Event::default()
                                    .event("change")
                                    .json_data(&change)
                                    .expect("valid JSON")
                            );
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "change feed client lagged");
                            yield Ok(
                                Event::default()
                                    .event("lagged")
                                    .json_data(serde_json::json!({ "missed": missed }))
                                    .expect("valid JSON")
                            );
                        }
                        Err(RecvError::Closed) => {
                            break;
                        }
                    }
                }
                _ = heartbeat_interval.tick() => {
                    yield Ok(
                        Event::default()
                            .event("heartbeat")
                            .comment("keep-alive")
                    );
                }
            }
        }
    };

    Sse::new(body_stream).into_response()
}
