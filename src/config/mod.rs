use std::env;

use anyhow::Result;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    /// Reads `<PREFIX>_HOST`, `<PREFIX>_PORT`, ... so the same shape covers
    /// both the local mirror database and the ERP database.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix));

        Ok(Self {
            host: var("HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: var("PORT").unwrap_or_else(|_| "5432".to_string()).parse()?,
            username: var("USER").unwrap_or_else(|_| "postgres".to_string()),
            password: var("PASSWORD")?,
            database: var("NAME").unwrap_or_else(|_| "vendas".to_string()),
            ssl_mode: var("SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
        })
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub erp_database: DatabaseConfig,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    /// Local mirror store (orcamentos, pedidos, produtos, ...).
    pub database_pool: PgPool,
    /// Legacy ERP store, schema resolved at runtime.
    pub erp_pool: PgPool,
}

impl AppConfig {
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let database = DatabaseConfig::from_env("DATABASE")?;
        let erp_database = DatabaseConfig::from_env("ERP_DATABASE")?;

        let database_pool = PgPool::connect(&database.connection_string()).await?;
        let erp_pool = PgPool::connect(&erp_database.connection_string()).await?;

        Ok(Self {
            database,
            erp_database,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cors_origins,
            database_pool,
            erp_pool,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
