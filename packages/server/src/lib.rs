//! HTTP server for tenant sites and the editor API.

pub mod config;
pub mod routes;
pub mod seed;
pub mod state;
pub mod telemetry;

pub use config::{Args, ServerConfig, DEFAULT_CONFIG_NAME};
pub use routes::{router, ApiError, USER_HEADER};
pub use state::AppState;
