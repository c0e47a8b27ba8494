use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use erp_sales_bridge::config::AppConfig;
use erp_sales_bridge::handlers::AppState;
use erp_sales_bridge::services::ConfigurationService;
use erp_sales_bridge::create_app;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "erp_sales_bridge=info,tower_http=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().await?;

    sqlx::migrate!("./migrations")
        .run(&config.database_pool)
        .await?;

    ConfigurationService::new(config.database_pool.clone())
        .initialize()
        .await?;

    let addr = config.server_address();
    let app = create_app(AppState::new(config));

    tracing::info!("Starting ERP sales bridge on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
