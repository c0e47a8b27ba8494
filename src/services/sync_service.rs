// Sync orchestration: the FROM_ERP pass (extract + replicate), the TO_ERP
// pass (reverse push), the status surface, and the reconciliation job that
// sweeps PENDING conversion entries left behind by failed ERP writes.

use std::sync::Arc;

use serde::Serialize;
use sqlx::{PgPool, Row};

use crate::middleware::error_handling::Result;
use crate::models::sync_log::{SyncDirection, SyncLogEntry, SyncStatus, SyncStatusResponse};
use crate::repositories::SyncLogRepository;
use crate::services::erp::extractor::ErpExtractor;
use crate::services::erp::push::ErpPushEngine;
use crate::services::erp::replicator::LocalReplicator;
use crate::services::erp::schema::{ErpEntity, ResolvedTable, SchemaResolver};

#[derive(Debug, Default, Serialize)]
pub struct ReconcileSummary {
    pub examined: usize,
    pub confirmed: usize,
    pub failed: usize,
}

pub struct SyncService {
    erp_pool: PgPool,
    resolver: Arc<SchemaResolver>,
    extractor: ErpExtractor,
    replicator: LocalReplicator,
    push_engine: ErpPushEngine,
    sync_log_repo: SyncLogRepository,
}

impl SyncService {
    pub fn new(local_pool: PgPool, erp_pool: PgPool, resolver: Arc<SchemaResolver>) -> Self {
        Self {
            extractor: ErpExtractor::new(erp_pool.clone(), resolver.clone()),
            replicator: LocalReplicator::new(local_pool.clone()),
            push_engine: ErpPushEngine::new(local_pool.clone(), erp_pool.clone(), resolver.clone()),
            sync_log_repo: SyncLogRepository::new(local_pool),
            erp_pool,
            resolver,
        }
    }

    /// Full ERP -> local pass. The schema cache is invalidated first so the
    /// pass always runs against the ERP's current table layout.
    pub async fn sync_from_erp(&self) -> Result<String> {
        self.resolver.invalidate().await;

        let outcome: Result<String> = async {
            let snapshot = self.extractor.extract().await?;
            let message = format!(
                "Sincronizados {} clientes, {} vendedores, {} produtos, {} orcamentos do ERP",
                snapshot.clients.len(),
                snapshot.sellers.len(),
                snapshot.products.len(),
                snapshot.quotations.len()
            );
            self.replicator.replicate(&snapshot).await?;
            Ok(message)
        }
        .await;

        match outcome {
            Ok(message) => Ok(message),
            Err(err) => {
                self.record_failure(SyncDirection::FromErp, &err).await;
                Err(err)
            }
        }
    }

    /// Local -> ERP pass.
    pub async fn sync_to_erp(&self) -> Result<String> {
        match self.push_engine.push().await {
            Ok(summary) => Ok(format!(
                "{} registros atualizados no ERP",
                summary.total()
            )),
            Err(err) => {
                self.record_failure(SyncDirection::ToErp, &err).await;
                Err(err)
            }
        }
    }

    pub async fn status(&self) -> Result<SyncStatusResponse> {
        Ok(SyncStatusResponse {
            last_sync_from_erp: self.sync_log_repo.last_success(SyncDirection::FromErp).await?,
            last_sync_to_erp: self.sync_log_repo.last_success(SyncDirection::ToErp).await?,
        })
    }

    pub async fn logs(&self, limit: i64) -> Result<Vec<SyncLogEntry>> {
        self.sync_log_repo.list(limit).await
    }

    /// Sweeps PENDING conversion entries: each is finalized SUCCESS when its
    /// order header exists in the ERP, FAILED otherwise. No automatic retry;
    /// a FAILED row is the operator's cue to re-issue the ERP write.
    pub async fn reconcile_pending(&self) -> Result<ReconcileSummary> {
        let pending = self.sync_log_repo.pending_conversions().await?;
        let erp_orders = self
            .resolver
            .resolve(ErpEntity::Orders)
            .await?
            .as_resolved()
            .cloned();

        let mut summary = ReconcileSummary {
            examined: pending.len(),
            ..Default::default()
        };

        for entry in pending {
            let Some(pedido_codigo) = entry.entidade_id.as_deref() else {
                continue;
            };

            let present = match erp_orders {
                Some(ref table) => self.erp_order_exists(table, pedido_codigo).await?,
                None => false,
            };

            if present {
                self.sync_log_repo
                    .finalize(
                        entry.id,
                        SyncStatus::Success,
                        &format!("Pedido {} confirmado no ERP na reconciliacao", pedido_codigo),
                    )
                    .await?;
                summary.confirmed += 1;
            } else {
                self.sync_log_repo
                    .finalize(
                        entry.id,
                        SyncStatus::Failed,
                        &format!("Pedido {} ausente no ERP apos conversao", pedido_codigo),
                    )
                    .await?;
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    async fn erp_order_exists(&self, table: &ResolvedTable, pedido_codigo: &str) -> Result<bool> {
        let Some(col) = table.column(&["codigo", "cod_pedido", "numero"]) else {
            return Ok(false);
        };

        // Codes compare numerically when possible: the ERP may store them
        // unpadded while the local side zero-pads.
        let sql = match pedido_codigo.parse::<i64>() {
            Ok(_) => format!(
                "SELECT EXISTS (
                    SELECT 1 FROM {table}
                    WHERE {col}::text ~ '^[0-9]+$' AND {col}::text::bigint = $1::bigint
                ) AS present",
                col = col,
                table = table.table
            ),
            Err(_) => format!(
                "SELECT EXISTS (SELECT 1 FROM {table} WHERE {col}::text = $1) AS present",
                col = col,
                table = table.table
            ),
        };

        let row = sqlx::query(&sql)
            .bind(pedido_codigo)
            .fetch_one(&self.erp_pool)
            .await?;
        Ok(row.try_get::<bool, _>("present")?)
    }

    async fn record_failure(&self, direcao: SyncDirection, err: &crate::middleware::AppError) {
        if let Err(log_err) = self
            .sync_log_repo
            .append(
                direcao,
                SyncStatus::Failed,
                Some("snapshot"),
                None,
                Some(&err.to_string()),
            )
            .await
        {
            tracing::error!("Failed to record sync failure: {}", log_err);
        }
    }
}
