use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::api::state::AppState;
use crate::engine::{MatchPair, StatusUpdate};
use crate::model::{Actor, Booking, BookingId, BookingStats, UserId};

pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<CreateBookingBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Booking>>), ApiError> {
    let Json(body) = body?;
    let booking = state.engine.create_booking(&actor, body.into_request()?).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(booking))))
}

pub async fn join_matchmaking(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<JoinBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<MatchPair>>), ApiError> {
    let Json(body) = body?;
    let pair = state.engine.join_matchmaking(&actor, body.into_request()?).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(pair))))
}

pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<BookingId>, PathRejection>,
) -> Result<Json<Envelope<Booking>>, ApiError> {
    let Path(id) = id?;
    let booking = state.engine.get_booking(&actor, id).await?;
    Ok(Json(Envelope::ok(booking)))
}

pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<BookingId>, PathRejection>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Envelope<Booking>>, ApiError> {
    let Path(id) = id?;
    let Json(update) = body?;
    let booking = state.engine.update_status(&actor, id, update).await?;
    Ok(Json(Envelope::ok(booking)))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<BookingId>, PathRejection>,
) -> Result<Json<Envelope<Booking>>, ApiError> {
    let Path(id) = id?;
    let booking = state.engine.cancel_booking(&actor, id).await?;
    Ok(Json(Envelope::ok(booking)))
}

pub async fn user_bookings(
    State(state): State<AppState>,
    actor: Actor,
    user_id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<Envelope<Vec<Booking>>>, ApiError> {
    let Path(user_id) = user_id?;
    let bookings = state.engine.list_user_bookings(&actor, user_id).await?;
    Ok(Json(Envelope::ok(bookings)))
}

pub async fn stats(
    State(state): State<AppState>,
    actor: Actor,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<Envelope<BookingStats>>, ApiError> {
    let Query(query) = query?;
    let stats = state.engine.stats(&actor, query.court_id).await?;
    Ok(Json(Envelope::ok(stats)))
}
