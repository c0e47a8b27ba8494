use std::sync::Arc;

use axum::Json;

use crate::config::AppConfig;
use crate::services::erp::SchemaResolver;

pub mod sync;
pub mod quotations;
pub mod orders;
pub mod products;
pub mod clients;
pub mod configuration;

/// Shared handler state: the configuration (with both pools) plus the
/// process-wide ERP schema cache.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub resolver: Arc<SchemaResolver>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let resolver = Arc::new(SchemaResolver::new(config.erp_pool.clone()));
        Self { config, resolver }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
