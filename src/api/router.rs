use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::observability::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

use super::handlers::{bookings, courts, health, live};
use super::state::AppState;

async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".into());
    let started = Instant::now();
    let response = next.run(req).await;
    metrics::counter!(HTTP_REQUESTS_TOTAL,
        "route" => route.clone(),
        "status" => response.status().as_u16().to_string())
    .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "route" => route)
        .record(started.elapsed().as_secs_f64());
    response
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/courts", post(courts::register_court))
        .route("/courts/{court_id}/slots", get(courts::list_slots))
        .route("/courts/{court_id}/live", get(live::court_live))
        .route("/courts/{court_id}/prices", put(courts::set_prices))
        .route("/courts/{court_id}/bookings", get(courts::court_bookings))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/join", post(bookings::join_matchmaking))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/status", patch(bookings::update_status))
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/users/{user_id}/bookings", get(bookings::user_bookings))
        .route("/users/{user_id}/notifications", get(live::user_notifications))
        .route("/stats", get(bookings::stats))
        .route_layer(middleware::from_fn(track_metrics));

    Router::new()
        .route("/health", get(health))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
