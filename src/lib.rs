pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod users;

pub use app::{build_app, serve};
pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;
