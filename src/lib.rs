pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod handlers;
pub mod middleware;

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    clients::{get_client, list_clients, list_sellers},
    configuration::{
        get_all_configurations, get_configuration, get_stock_validation_status, set_configuration,
        set_stock_validation_orders,
    },
    health_check,
    orders::{get_order, list_orders},
    products::{get_product, search_products, update_product},
    quotations::{
        convert_quotation, create_quotation, delete_quotation, get_quotation, list_quotations,
        update_quotation,
    },
    sync::{get_sync_logs, get_sync_status, reconcile_pending, sync_from_erp, sync_to_erp},
    AppState,
};

/// Sync passes and conversions walk entire ERP tables; the generous
/// request timeout accommodates the slowest known installation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub fn create_app(state: AppState) -> Router {
    let cors_origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!("Invalid CORS origin '{}': {}", origin, err);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/sync",
            Router::new()
                .route("/status", get(get_sync_status))
                .route("/from-erp", post(sync_from_erp))
                .route("/to-erp", post(sync_to_erp))
                .route("/logs", get(get_sync_logs))
                .route("/reconcile", post(reconcile_pending)),
        )
        .nest(
            "/api/quotations",
            Router::new()
                .route("/", post(create_quotation))
                .route("/", get(list_quotations))
                .route("/:codigo", get(get_quotation))
                .route("/:codigo", put(update_quotation))
                .route("/:codigo", delete(delete_quotation))
                .route("/:codigo/convert", post(convert_quotation)),
        )
        .nest(
            "/api/orders",
            Router::new()
                .route("/", get(list_orders))
                .route("/:codigo", get(get_order)),
        )
        .nest(
            "/api/products",
            Router::new()
                .route("/", get(search_products))
                .route("/:codigo", get(get_product))
                .route("/:codigo", put(update_product)),
        )
        .nest(
            "/api/clients",
            Router::new()
                .route("/", get(list_clients))
                .route("/:codigo", get(get_client)),
        )
        .route("/api/sellers", get(list_sellers))
        .nest(
            "/config",
            Router::new()
                .route("/", get(get_all_configurations))
                .route("/stock-validation/status", get(get_stock_validation_status))
                .route("/stock-validation/orders", put(set_stock_validation_orders))
                .route("/:chave", get(get_configuration))
                .route("/:chave", put(set_configuration)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(
            |req: Request<Body>, next: Next| async move {
                tracing::info!("{} {}", req.method(), req.uri());
                let response = next.run(req).await;
                tracing::info!("Response status: {}", response.status());
                response
            },
        ))
}
