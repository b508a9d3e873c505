//! Server-Sent Events (SSE) stream of pipeline events
//!
//! Observers watch stories complete and comics/analyses appear. The feed is
//! lossy: a slow client skips events rather than holding the bus back.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// GET /events
///
/// Streams `story_completed`, `comic_generated` and `analysis_generated`,
/// each as JSON with the topic as the SSE event name.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    let mut rx = state.event_bus.watch();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let topic = event.topic();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!(topic, story_id = event.story_id(), "SSE: forwarding event");
                            yield Ok(Event::default().event(topic).data(json));
                        }
                        Err(e) => warn!(topic, error = %e, "SSE: failed to serialize event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: client lagging, events skipped");
                }
                Err(RecvError::Closed) => {
                    debug!("SSE: event bus closed");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
