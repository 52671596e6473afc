use rocket::response::stream::{Event, EventStream};
use rocket::tokio::select;
use rocket::tokio::sync::broadcast::error::RecvError;
use rocket::{Shutdown, State, get};

use crate::models::{AppState, EventKind};

/// Server-sent event stream for the configured broadcast channel.
///
/// Any other channel is a 404. Opening the stream starts a coordinator
/// session for this client; the session stops (and hands over the timer, if
/// it owned it) when the client disconnects.
#[get("/events/<channel>")]
pub fn events(
    channel: &str,
    state: &State<AppState>,
    mut shutdown: Shutdown,
) -> Option<EventStream![]> {
    if channel != state.channel() {
        tracing::debug!("Rejected SSE subscription to unknown channel '{}'", channel);
        return None;
    }

    let mut rx = state.hub.subscribe(state.channel());
    let session = state.coordinator.start_session();
    let snapshots = state.processor.snapshots().clone();

    Some(EventStream! {
        let session = session;
        tracing::debug!("SSE client attached to session {}", session.session_id());

        // Current state right away instead of after the first snapshot tick
        let snapshot = snapshots.build().await;
        yield Event::json(&snapshot).event(EventKind::Status.as_str());

        loop {
            let message = select! {
                received = rx.recv() => match received {
                    Ok(message) => message,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(
                            "SSE client on session {} lagged, skipped {} events",
                            session.session_id(),
                            skipped
                        );
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            yield Event::json(&message.payload).event(message.event.as_str());
        }
    })
}
