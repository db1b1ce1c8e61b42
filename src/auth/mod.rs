use std::sync::Arc;

use axum::Router;

use crate::{rate_limit::RateLimiter, state::AppState};

mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod reset;
pub mod services;
pub mod validation;

pub use claims::Claims;

pub fn router(login_limiter: Arc<RateLimiter>) -> Router<AppState> {
    Router::new().merge(handlers::auth_routes(login_limiter))
}
