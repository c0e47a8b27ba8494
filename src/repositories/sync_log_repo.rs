use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::middleware::error_handling::Result;
use crate::models::sync_log::{SyncDirection, SyncLogEntry, SyncStatus};

pub struct SyncLogRepository {
    pool: PgPool,
}

fn map_entry(row: &PgRow) -> Result<SyncLogEntry> {
    Ok(SyncLogEntry {
        id: row.try_get("id")?,
        data_sincronizacao: row.try_get("data_sincronizacao")?,
        direcao: row.try_get("direcao")?,
        status: row.try_get("status")?,
        tipo_entidade: row.try_get("tipo_entidade")?,
        entidade_id: row.try_get("entidade_id")?,
        mensagem: row.try_get("mensagem")?,
    })
}

impl SyncLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        direcao: SyncDirection,
        status: SyncStatus,
        tipo_entidade: Option<&str>,
        entidade_id: Option<&str>,
        mensagem: Option<&str>,
    ) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO log_sincronizacao (data_sincronizacao, direcao, status, tipo_entidade, entidade_id, mensagem)
             VALUES (NOW(), $1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(direcao.as_str())
        .bind(status.as_str())
        .bind(tipo_entidade)
        .bind(entidade_id)
        .bind(mensagem)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Finalizes a conversion's PENDING row; the only in-place update the
    /// log permits.
    pub async fn finalize(&self, id: i64, status: SyncStatus, mensagem: &str) -> Result<()> {
        sqlx::query(
            "UPDATE log_sincronizacao
             SET status = $2, mensagem = $3, data_sincronizacao = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(mensagem)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<SyncLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, data_sincronizacao, direcao, status, tipo_entidade, entidade_id, mensagem
             FROM log_sincronizacao ORDER BY data_sincronizacao DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_entry).collect()
    }

    pub async fn last_success(&self, direcao: SyncDirection) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT MAX(data_sincronizacao) AS last_sync FROM log_sincronizacao
             WHERE direcao = $1 AND status = $2",
        )
        .bind(direcao.as_str())
        .bind(SyncStatus::Success.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("last_sync")?)
    }

    /// Conversions whose ERP write phase never confirmed; input to the
    /// reconciliation pass.
    pub async fn pending_conversions(&self) -> Result<Vec<SyncLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, data_sincronizacao, direcao, status, tipo_entidade, entidade_id, mensagem
             FROM log_sincronizacao
             WHERE status = $1 AND tipo_entidade = 'pedido'
             ORDER BY data_sincronizacao",
        )
        .bind(SyncStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_entry).collect()
    }
}
