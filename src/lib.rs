pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod tracing_config;
pub mod utils;

use std::sync::Arc;

use config::Config;
use db::DBClient;

/// Shared application state injected into every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
}
