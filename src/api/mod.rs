//! HTTP surface: axum routes over the booking engine.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
