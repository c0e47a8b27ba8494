// Process-wide key/value settings scoped by company code.
//
// The table is created and seeded lazily on process start; initialize() is
// idempotent and safe to call on every boot. Values are stored as strings
// and coerced on read according to the record's declared type. Concurrent
// set() calls on the same key race at the storage layer; last writer wins,
// which is acceptable for rare admin-driven configuration changes.

use sqlx::{PgPool, Row};

use crate::middleware::error_handling::Result;
use crate::models::configuration::{
    ConfigValue, ConfigValueType, Configuration, VALIDATE_STOCK_ORDERS_KEY,
    VALIDATE_STOCK_QUOTATIONS_KEY,
};

pub struct ConfigurationService {
    pool: PgPool,
}

impl ConfigurationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the configuration table exists and default keys are present.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_configurations (
                id BIGSERIAL PRIMARY KEY,
                chave TEXT NOT NULL,
                valor TEXT NOT NULL,
                descricao TEXT,
                tipo TEXT NOT NULL DEFAULT 'string',
                cod_empresa INTEGER NOT NULL DEFAULT 1,
                UNIQUE (chave, cod_empresa)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let defaults = [
            (
                VALIDATE_STOCK_ORDERS_KEY,
                "true",
                "Valida estoque ao converter orcamento em pedido",
            ),
            (
                VALIDATE_STOCK_QUOTATIONS_KEY,
                "false",
                "Valida estoque ao incluir item no orcamento",
            ),
        ];

        for (chave, valor, descricao) in defaults {
            sqlx::query(
                r#"
                INSERT INTO system_configurations (chave, valor, descricao, tipo, cod_empresa)
                VALUES ($1, $2, $3, 'boolean', $4)
                ON CONFLICT (chave, cod_empresa) DO NOTHING
                "#,
            )
            .bind(chave)
            .bind(valor)
            .bind(descricao)
            .bind(crate::models::company::DEFAULT_COMPANY_CODE)
            .execute(&self.pool)
            .await?;
        }

        tracing::info!("Configuration store initialized");
        Ok(())
    }

    pub async fn get(&self, chave: &str, cod_empresa: i32) -> Result<Option<Configuration>> {
        let row = sqlx::query(
            "SELECT id, chave, valor, descricao, tipo, cod_empresa
             FROM system_configurations
             WHERE chave = $1 AND cod_empresa = $2",
        )
        .bind(chave)
        .bind(cod_empresa)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_configuration).transpose()
    }

    pub async fn get_all(&self, cod_empresa: i32) -> Result<Vec<Configuration>> {
        let rows = sqlx::query(
            "SELECT id, chave, valor, descricao, tipo, cod_empresa
             FROM system_configurations
             WHERE cod_empresa = $1
             ORDER BY chave",
        )
        .bind(cod_empresa)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_configuration).collect()
    }

    pub async fn get_bool(&self, chave: &str, default: bool, cod_empresa: i32) -> Result<bool> {
        let config = self.get(chave, cod_empresa).await?;
        Ok(config
            .map(|c| match c.coerced_value() {
                ConfigValue::Boolean(b) => b,
                ConfigValue::Text(s) => s.eq_ignore_ascii_case("true"),
                ConfigValue::Number(n) => n != 0.0,
            })
            .unwrap_or(default))
    }

    pub async fn get_string(&self, chave: &str, default: &str, cod_empresa: i32) -> Result<String> {
        let config = self.get(chave, cod_empresa).await?;
        Ok(config.map(|c| c.valor).unwrap_or_else(|| default.to_string()))
    }

    pub async fn get_number(&self, chave: &str, default: f64, cod_empresa: i32) -> Result<f64> {
        let config = self.get(chave, cod_empresa).await?;
        Ok(config
            .map(|c| match c.coerced_value() {
                ConfigValue::Number(n) => n,
                ConfigValue::Text(s) => s.parse().unwrap_or(default),
                ConfigValue::Boolean(b) => {
                    if b {
                        1.0
                    } else {
                        0.0
                    }
                }
            })
            .unwrap_or(default))
    }

    /// Upsert a key. The value is flattened to its string representation;
    /// when no type is supplied it is inferred from the JSON value.
    pub async fn set(
        &self,
        chave: &str,
        valor: &serde_json::Value,
        descricao: Option<&str>,
        tipo: Option<ConfigValueType>,
        cod_empresa: i32,
    ) -> Result<Configuration> {
        let tipo = tipo.unwrap_or(match valor {
            serde_json::Value::Bool(_) => ConfigValueType::Boolean,
            serde_json::Value::Number(_) => ConfigValueType::Number,
            _ => ConfigValueType::String,
        });

        let stored = match valor {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let row = sqlx::query(
            r#"
            INSERT INTO system_configurations (chave, valor, descricao, tipo, cod_empresa)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chave, cod_empresa) DO UPDATE
            SET valor = EXCLUDED.valor,
                descricao = COALESCE(EXCLUDED.descricao, system_configurations.descricao),
                tipo = EXCLUDED.tipo
            RETURNING id, chave, valor, descricao, tipo, cod_empresa
            "#,
        )
        .bind(chave)
        .bind(stored)
        .bind(descricao)
        .bind(tipo.as_str())
        .bind(cod_empresa)
        .fetch_one(&self.pool)
        .await?;

        map_configuration(row)
    }
}

fn map_configuration(row: sqlx::postgres::PgRow) -> Result<Configuration> {
    Ok(Configuration {
        id: row.try_get("id")?,
        chave: row.try_get("chave")?,
        valor: row.try_get("valor")?,
        descricao: row.try_get("descricao")?,
        tipo: row.try_get("tipo")?,
        cod_empresa: row.try_get("cod_empresa")?,
    })
}
