use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::api::state::AppState;
use crate::engine::{find_slot, EngineError, NewCourt};
use crate::limits::MAX_PRICE_ENTRIES;
use crate::model::{Actor, Booking, Court, CourtId, SlotView};
use crate::pricing::PriceEntry;

pub async fn list_slots(
    State(state): State<AppState>,
    court_id: Result<Path<CourtId>, PathRejection>,
    query: Result<Query<SlotsQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<SlotView>>>, ApiError> {
    let Path(court_id) = court_id?;
    let Query(query) = query?;
    let slots = state.engine.list_slots(court_id, query.date).await?;
    Ok(Json(Envelope::ok(slots)))
}

pub async fn register_court(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<NewCourt>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Court>>), ApiError> {
    let Json(body) = body?;
    let court = state.engine.register_court(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(court))))
}

/// Replace-or-insert price entries for one court. With a prices file configured
/// the whole table is written back, so updates survive a restart; without one
/// they live in memory only.
pub async fn set_prices(
    State(state): State<AppState>,
    actor: Actor,
    court_id: Result<Path<CourtId>, PathRejection>,
    body: Result<Json<Vec<PriceBody>>, JsonRejection>,
) -> Result<Json<Envelope<PricesUpdated>>, ApiError> {
    let Path(court_id) = court_id?;
    let Json(entries) = body?;
    state.engine.managed_court(&actor, court_id)?;
    if entries.len() > MAX_PRICE_ENTRIES {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_PRICE_ENTRIES} price entries per request"
        )));
    }

    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let (start, end) = entry.times()?;
        let slot = find_slot(start, end)
            .ok_or_else(|| ApiError::BadRequest("price entry is not a bookable slot".into()))?;
        if entry.price.is_sign_negative() {
            return Err(ApiError::BadRequest("price cannot be negative".into()));
        }
        parsed.push(PriceEntry {
            court_id,
            slot_label: slot.label(),
            match_size: entry.match_size,
            price: entry.price,
        });
    }

    let count = parsed.len();
    for entry in parsed {
        state.prices.set(entry);
    }
    if let Some(path) = state.prices_file.clone() {
        let prices = state.prices.clone();
        let saved = tokio::task::spawn_blocking(move || prices.save_json(&path))
            .await
            .map_err(|e| EngineError::Store(format!("price write-back task failed: {e}")))?;
        if let Err(e) = saved {
            tracing::error!(%court_id, "price write-back failed: {e}");
            return Err(EngineError::Store(format!("price write-back failed: {e}")).into());
        }
    }
    tracing::info!(%court_id, entries = count, actor = %actor.user_id, "prices updated");
    Ok(Json(Envelope::ok(PricesUpdated {
        court_id,
        entries: count,
    })))
}

pub async fn court_bookings(
    State(state): State<AppState>,
    actor: Actor,
    court_id: Result<Path<CourtId>, PathRejection>,
    query: Result<Query<CourtBookingsQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Booking>>>, ApiError> {
    let Path(court_id) = court_id?;
    let Query(query) = query?;
    let bookings = state
        .engine
        .list_court_bookings(&actor, court_id, query.date)
        .await?;
    Ok(Json(Envelope::ok(bookings)))
}
