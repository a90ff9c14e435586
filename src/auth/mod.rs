use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod repo;

pub use extractors::AuthSession;

pub fn router() -> Router<AppState> {
    handlers::me_routes()
}
