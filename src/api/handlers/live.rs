//! Server-sent event streams over the notification hub.
//!
//! Events are hints: clients re-fetch slots or bookings over the regular
//! endpoints to get authoritative state. A lagging client silently skips
//! the events it missed.

use std::convert::Infallible;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::engine::EngineError;
use crate::model::{Actor, CourtId, UserId};

/// Turn a broadcast receiver into an SSE stream of JSON events named `name`.
fn event_stream<T>(
    rx: broadcast::Receiver<T>,
    name: &'static str,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    T: Clone + Serialize + Send + 'static,
{
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => match Event::default().event(name).json_data(&item) {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), rx)),
                    Err(e) => tracing::warn!("dropping unserializable {name} event: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "live stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// Slot invalidations for one court. Public, like the slot listing.
pub async fn court_live(
    State(state): State<AppState>,
    court_id: Result<Path<CourtId>, PathRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Path(court_id) = court_id?;
    if state.engine.court(&court_id).is_none() {
        return Err(EngineError::court_not_found(court_id).into());
    }
    let rx = state.hub.subscribe_court(court_id);
    Ok(Sse::new(event_stream(rx, "slots")).keep_alive(KeepAlive::default()))
}

/// A user's own notifications.
pub async fn user_notifications(
    State(state): State<AppState>,
    actor: Actor,
    user_id: Result<Path<UserId>, PathRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Path(user_id) = user_id?;
    if actor.user_id != user_id {
        return Err(EngineError::Forbidden("cannot follow another user's notifications").into());
    }
    let rx = state.hub.subscribe_user(user_id);
    Ok(Sse::new(event_stream(rx, "notification")).keep_alive(KeepAlive::default()))
}
