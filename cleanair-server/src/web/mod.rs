//! Web layer for operating the provider data core.
//!
//! JSON endpoints for health, metrics, interpolated air quality, pollen and
//! directions, plus cache administration.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
