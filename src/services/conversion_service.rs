// Quotation -> sales order conversion.
//
// The conversion is a saga across two stores, in this order:
//
//   1. validations (existence, single-conversion guard, items, stock)
//   2. order code allocation against both numbering authorities
//   3. local transaction: order + items + stock decrements + quotation
//      status flip (atomic; rolls back as one)
//   4. durable PENDING sync-log row
//   5. ERP writes in three phases: header skeleton, line items, header
//      finalize with the accumulated discounted total
//   6. sync-log finalize to SUCCESS
//
// There is no distributed transaction: once the local commit lands, a
// failing ERP write leaves the PENDING row in place as the durable signal
// for reconciliation. ERP writes already issued are never compensated.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::company::DEFAULT_COMPANY_CODE;
use crate::models::configuration::VALIDATE_STOCK_ORDERS_KEY;
use crate::models::order::{
    format_order_code, ConvertQuotationRequest, ConvertQuotationResponse, SalesOrder,
    SalesOrderItem,
};
use crate::models::quotation::{Quotation, QuotationItem};
use crate::models::sync_log::{SyncDirection, SyncStatus};
use crate::repositories::{
    OrderRepository, ProductRepository, QuotationRepository, SyncLogRepository,
};
use crate::services::configuration_service::ConfigurationService;
use crate::services::erp::schema::{ErpEntity, ResolvedTable, SchemaResolver};

/// Bounded optimistic allocation; exceeding this is a fatal, operator-visible
/// error rather than a silent fallback.
const MAX_CODE_ATTEMPTS: i64 = 10;

/// ERP order status meaning "transmitted", set on header finalize.
const ERP_STATUS_TRANSMITTED: &str = "3";
const ERP_DEFAULT_PRICE_TABLE: &str = "1";
const ERP_DEFAULT_STOCK_LOCATION: &str = "1";
/// Multi-unit items are not modeled on the ERP write path; every line goes
/// out as one unit of "UN".
const ERP_UNIT: &str = "UN";
const ERP_UNIT_CONVERSION: i32 = 1;
const ERP_USER: &str = "bridge";

pub fn insufficient_stock_message(shortages: &[String]) -> String {
    format!("Estoque insuficiente para: {}", shortages.join(", "))
}

pub struct ConversionService {
    local_pool: PgPool,
    erp_pool: PgPool,
    resolver: Arc<SchemaResolver>,
    quotation_repo: QuotationRepository,
    order_repo: OrderRepository,
    product_repo: ProductRepository,
    sync_log_repo: SyncLogRepository,
    configuration: ConfigurationService,
}

impl ConversionService {
    pub fn new(local_pool: PgPool, erp_pool: PgPool, resolver: Arc<SchemaResolver>) -> Self {
        Self {
            quotation_repo: QuotationRepository::new(local_pool.clone()),
            order_repo: OrderRepository::new(local_pool.clone()),
            product_repo: ProductRepository::new(local_pool.clone()),
            sync_log_repo: SyncLogRepository::new(local_pool.clone()),
            configuration: ConfigurationService::new(local_pool.clone()),
            local_pool,
            erp_pool,
            resolver,
        }
    }

    pub async fn convert(
        &self,
        quotation_id: &str,
        request: &ConvertQuotationRequest,
    ) -> Result<ConvertQuotationResponse> {
        // 1. Existence.
        let quotation = self
            .quotation_repo
            .find_by_codigo(quotation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Orcamento {} nao encontrado", quotation_id)))?;

        // 2. Single conversion per quotation, guarded by the origin lookup.
        if let Some(existing) = self.order_repo.find_by_origem(quotation_id).await? {
            return Err(AppError::BadRequest(format!(
                "Orcamento {} ja convertido no pedido {}",
                quotation_id, existing.codigo
            )));
        }

        // 3. An order needs at least one line.
        let items = self.quotation_repo.items_for(quotation_id).await?;
        if items.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Orcamento {} nao possui itens",
                quotation_id
            )));
        }

        // 4. Stock sufficiency, only when the flag says so. All failures
        // are aggregated into one message and nothing is mutated.
        let validate_stock = self
            .configuration
            .get_bool(VALIDATE_STOCK_ORDERS_KEY, true, DEFAULT_COMPANY_CODE)
            .await?;
        if validate_stock {
            let shortages = self.check_stock(&items).await?;
            if !shortages.is_empty() {
                return Err(AppError::BadRequest(insufficient_stock_message(&shortages)));
            }
        }

        // 5. Code allocation across both numbering authorities.
        let erp_orders = self.resolved(ErpEntity::Orders).await?;
        let pedido_codigo = self.allocate_order_code(erp_orders.as_ref()).await?;

        // 6-8. Local mutations, one transaction.
        let now = Utc::now();
        let order = SalesOrder {
            codigo: pedido_codigo.clone(),
            orcamento_origem: quotation.codigo.clone(),
            cod_cliente: quotation.cod_cliente.clone(),
            cod_vendedor: quotation.cod_vendedor.clone(),
            cod_transportadora: request
                .cod_transportadora
                .clone()
                .or_else(|| quotation.cod_transportadora.clone()),
            vl_produtos: quotation.vl_produtos,
            vl_desconto: quotation.vl_desconto,
            vl_total: quotation.vl_total,
            cod_forma_pagto: request
                .cod_forma_pagto
                .clone()
                .or_else(|| quotation.cod_forma_pagto.clone()),
            cod_cond_pagto: request
                .cod_cond_pagto
                .clone()
                .or_else(|| quotation.cod_cond_pagto.clone()),
            status: "ABERTO".to_string(),
            dt_criacao: now,
        };

        let mut tx = self.local_pool.begin().await?;
        self.order_repo.insert(&mut tx, &order).await?;

        for item in &items {
            let order_item = SalesOrderItem {
                pedido_codigo: pedido_codigo.clone(),
                produto_codigo: item.produto_codigo.clone(),
                quantidade: item.quantidade,
                vl_unitario: item.vl_unitario,
                vl_total: item.discounted_value(),
            };
            self.order_repo.insert_item(&mut tx, &order_item).await?;
            // Always decremented; the flag above gates only the check.
            self.product_repo
                .decrement_stock(&mut tx, &item.produto_codigo, item.quantidade)
                .await?;
        }

        self.quotation_repo
            .mark_converted(
                &mut tx,
                &quotation.codigo,
                now,
                request.cod_forma_pagto.as_deref(),
                request.cod_cond_pagto.as_deref(),
                request.cod_transportadora.as_deref(),
            )
            .await?;

        tx.commit().await?;

        // 9. Durable PENDING row, outside any transaction so it survives a
        // failing ERP phase as the reconciliation hook.
        let log_id = self
            .sync_log_repo
            .append(
                SyncDirection::ToErp,
                SyncStatus::Pending,
                Some("pedido"),
                Some(&pedido_codigo),
                Some(&format!("Conversao do orcamento {}", quotation.codigo)),
            )
            .await?;

        // 10-12. ERP write phases.
        match erp_orders {
            Some(ref erp_table) => {
                self.write_erp_order(erp_table, &order, &quotation, &items)
                    .await?;
                // 13. Finalize.
                self.sync_log_repo
                    .finalize(
                        log_id,
                        SyncStatus::Success,
                        &format!("Pedido {} transmitido ao ERP", pedido_codigo),
                    )
                    .await?;
            }
            None => {
                // No resolvable ERP order table: the local order stands and
                // the log row says the ERP side was skipped.
                self.sync_log_repo
                    .finalize(
                        log_id,
                        SyncStatus::Success,
                        &format!(
                            "Pedido {} criado localmente; tabela de pedidos do ERP indisponivel",
                            pedido_codigo
                        ),
                    )
                    .await?;
            }
        }

        tracing::info!(
            pedido = %pedido_codigo,
            orcamento = %quotation.codigo,
            "Quotation converted to sales order"
        );

        Ok(ConvertQuotationResponse {
            success: true,
            pedido_codigo,
        })
    }

    async fn resolved(&self, entity: ErpEntity) -> Result<Option<ResolvedTable>> {
        Ok(self.resolver.resolve(entity).await?.as_resolved().cloned())
    }

    /// Fan out one product load per item, await all, aggregate failures.
    async fn check_stock(&self, items: &[QuotationItem]) -> Result<Vec<String>> {
        let lookups = items
            .iter()
            .map(|item| self.product_repo.find_by_codigo(&item.produto_codigo));
        let products = futures::future::join_all(lookups).await;

        let mut shortages = Vec::new();
        for (item, product) in items.iter().zip(products) {
            match product? {
                Some(product) => {
                    if product.estoque < item.quantidade {
                        shortages.push(format!(
                            "{} (disponivel {}, solicitado {})",
                            product.descricao, product.estoque, item.quantidade
                        ));
                    }
                }
                None => shortages.push(format!("produto {} nao encontrado", item.produto_codigo)),
            }
        }

        Ok(shortages)
    }

    /// Candidate = max(erp_max, local_max) + 1, then probe the ERP (the
    /// stricter authority, since its insert happens last) and step forward
    /// on collision, up to MAX_CODE_ATTEMPTS. Optimistic by design: two
    /// concurrent conversions can still race between probe and insert.
    async fn allocate_order_code(&self, erp_orders: Option<&ResolvedTable>) -> Result<String> {
        let local_max = self.order_repo.max_code().await?;
        let erp_max = match erp_orders {
            Some(table) => self.erp_max_code(table).await?,
            None => 0,
        };
        let base = local_max.max(erp_max) + 1;

        for attempt in 0..MAX_CODE_ATTEMPTS {
            let candidate = base + attempt;
            let collides = match erp_orders {
                Some(table) => self.erp_code_exists(table, candidate).await?,
                None => false,
            };
            if !collides {
                if attempt > 0 {
                    tracing::warn!(
                        "Order code allocation took {} attempts, settled on {}",
                        attempt + 1,
                        candidate
                    );
                }
                return Ok(format_order_code(candidate));
            }
        }

        Err(AppError::Internal(anyhow!(
            "Nao foi possivel alocar codigo de pedido unico apos {} tentativas",
            MAX_CODE_ATTEMPTS
        )))
    }

    async fn erp_max_code(&self, table: &ResolvedTable) -> Result<i64> {
        let Some(col) = table.column(&["codigo", "cod_pedido", "numero"]) else {
            return Ok(0);
        };

        // Codes are compared as integers; non-numeric strays are ignored.
        let sql = format!(
            "SELECT COALESCE(MAX({col}::text::bigint), 0) AS max_codigo
             FROM {table} WHERE {col}::text ~ '^[0-9]+$'",
            col = col,
            table = table.table
        );

        let row = sqlx::query(&sql).fetch_one(&self.erp_pool).await?;
        Ok(row.try_get("max_codigo")?)
    }

    async fn erp_code_exists(&self, table: &ResolvedTable, candidate: i64) -> Result<bool> {
        let Some(col) = table.column(&["codigo", "cod_pedido", "numero"]) else {
            return Ok(false);
        };

        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM {table}
                WHERE {col}::text ~ '^[0-9]+$' AND {col}::text::bigint = $1
            ) AS present",
            col = col,
            table = table.table
        );

        let row = sqlx::query(&sql)
            .bind(candidate)
            .fetch_one(&self.erp_pool)
            .await?;
        Ok(row.try_get::<bool, _>("present")?)
    }

    /// Phases 10-12: header skeleton, lines, header finalize. The skeleton
    /// is intentionally minimal; the ERP computes derived tax fields only
    /// after line items exist, so totals land in the final update.
    async fn write_erp_order(
        &self,
        erp_table: &ResolvedTable,
        order: &SalesOrder,
        quotation: &Quotation,
        items: &[QuotationItem],
    ) -> Result<()> {
        self.insert_erp_skeleton(erp_table, order).await?;

        let erp_items = self.resolved(ErpEntity::OrderItems).await?;
        let mut discounted_total = Decimal::ZERO;
        if let Some(ref items_table) = erp_items {
            for (index, item) in items.iter().enumerate() {
                let line_value = item.discounted_value();
                self.insert_erp_line(items_table, order, item, (index + 1) as i32, line_value)
                    .await?;
                discounted_total += line_value;
            }
        } else {
            // Header still gets the discounted base so ERP-side tax engines
            // compute from the right total.
            discounted_total = items.iter().map(|i| i.discounted_value()).sum();
            tracing::warn!(
                "ERP order items table unavailable, header for {} written without lines",
                order.codigo
            );
        }

        self.finalize_erp_header(erp_table, order, quotation, discounted_total)
            .await?;
        Ok(())
    }

    async fn insert_erp_skeleton(&self, table: &ResolvedTable, order: &SalesOrder) -> Result<()> {
        let Some(col_codigo) = table.column(&["codigo", "cod_pedido", "numero"]) else {
            return Err(AppError::Internal(anyhow!(
                "Tabela de pedidos do ERP '{}' nao possui coluna de codigo",
                table.table
            )));
        };

        let mut columns = vec![col_codigo.to_string()];
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");

        // Collected first so the VALUES list can be built in one pass.
        let col_vendedor = table.column(&["cod_vendedor", "vendedor", "cod_vend"]);
        let col_data = table.column(&["dt_criacao", "data_criacao", "dt_pedido", "data"]);
        let col_usuario = table.column(&["usuario", "usuario_criacao", "usr_criacao"]);

        if let Some(col) = col_vendedor {
            columns.push(col.to_string());
        }
        if let Some(col) = col_data {
            columns.push(col.to_string());
        }
        if let Some(col) = col_usuario {
            columns.push(col.to_string());
        }

        qb.push(format!(
            "INSERT INTO {} ({}) VALUES (",
            table.table,
            columns.join(", ")
        ));
        qb.push_bind(&order.codigo);
        if col_vendedor.is_some() {
            qb.push(", ");
            qb.push_bind(&order.cod_vendedor);
        }
        if col_data.is_some() {
            qb.push(", ");
            qb.push_bind(order.dt_criacao);
        }
        if col_usuario.is_some() {
            qb.push(", ");
            qb.push_bind(ERP_USER);
        }
        qb.push(")");

        qb.build().execute(&self.erp_pool).await?;
        Ok(())
    }

    async fn insert_erp_line(
        &self,
        table: &ResolvedTable,
        order: &SalesOrder,
        item: &QuotationItem,
        sequence: i32,
        line_value: Decimal,
    ) -> Result<()> {
        let Some(col_pedido) = table.column(&["pedido_codigo", "cod_pedido", "codigo_pedido"]) else {
            return Err(AppError::Internal(anyhow!(
                "Tabela de itens do ERP '{}' nao possui coluna de pedido",
                table.table
            )));
        };
        let Some(col_produto) = table.column(&["produto_codigo", "cod_produto", "produto"]) else {
            return Err(AppError::Internal(anyhow!(
                "Tabela de itens do ERP '{}' nao possui coluna de produto",
                table.table
            )));
        };

        let mut columns = vec![col_pedido.to_string(), col_produto.to_string()];
        let col_seq = table.column(&["sequencia", "seq", "numero_item", "item"]);
        let col_qtde = table.column(&["quantidade", "qtde"]);
        let col_unit = table.column(&["vl_unitario", "preco_unitario", "vl_unit"]);
        let col_total = table.column(&["vl_total", "valor_total", "vl_liquido"]);
        let col_tabela = table.column(&["cod_tabela_preco", "tabela_preco"]);
        let col_local = table.column(&["cod_local_estoque", "local_estoque"]);
        let col_unidade = table.column(&["unidade", "un"]);
        let col_fator = table.column(&["fator_conversao", "fator"]);

        for col in [col_seq, col_qtde, col_unit, col_total, col_tabela, col_local, col_unidade, col_fator]
            .into_iter()
            .flatten()
        {
            columns.push(col.to_string());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            table.table,
            columns.join(", ")
        ));
        qb.push_bind(&order.codigo);
        qb.push(", ");
        qb.push_bind(&item.produto_codigo);
        if col_seq.is_some() {
            qb.push(", ");
            qb.push_bind(sequence);
        }
        if col_qtde.is_some() {
            qb.push(", ");
            qb.push_bind(item.quantidade);
        }
        if col_unit.is_some() {
            qb.push(", ");
            qb.push_bind(item.vl_unitario);
        }
        if col_total.is_some() {
            qb.push(", ");
            qb.push_bind(line_value);
        }
        if col_tabela.is_some() {
            qb.push(", ");
            qb.push_bind(ERP_DEFAULT_PRICE_TABLE);
        }
        if col_local.is_some() {
            qb.push(", ");
            qb.push_bind(ERP_DEFAULT_STOCK_LOCATION);
        }
        if col_unidade.is_some() {
            qb.push(", ");
            qb.push_bind(ERP_UNIT);
        }
        if col_fator.is_some() {
            qb.push(", ");
            qb.push_bind(ERP_UNIT_CONVERSION);
        }
        qb.push(")");

        qb.build().execute(&self.erp_pool).await?;
        Ok(())
    }

    /// The accumulated discounted total lands as both the product value and
    /// the order total so ERP-side tax engines compute from the discounted
    /// base rather than the gross base.
    async fn finalize_erp_header(
        &self,
        table: &ResolvedTable,
        order: &SalesOrder,
        quotation: &Quotation,
        discounted_total: Decimal,
    ) -> Result<()> {
        let Some(col_codigo) = table.column(&["codigo", "cod_pedido", "numero"]) else {
            return Ok(());
        };

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("UPDATE {} SET ", table.table));
        let mut has_fields = false;

        if let Some(col) = table.column(&["vl_produtos", "valor_produtos"]) {
            qb.push(format!("{} = ", col));
            qb.push_bind(discounted_total);
            has_fields = true;
        }
        if let Some(col) = table.column(&["vl_total", "valor_total", "total"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(discounted_total);
            has_fields = true;
        }
        if let Some(col) = table.column(&["cod_cliente", "cliente", "cod_cli"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(&order.cod_cliente);
            has_fields = true;
        }
        if let Some(col) = table.column(&["cod_transportadora", "transportadora"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(&order.cod_transportadora);
            has_fields = true;
        }
        if let Some(col) = table.column(&["cod_forma_pagto", "forma_pagto"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(&order.cod_forma_pagto);
            has_fields = true;
        }
        if let Some(col) = table.column(&["cod_cond_pagto", "cond_pagto"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(&order.cod_cond_pagto);
            has_fields = true;
        }
        if let Some(col) = table.column(&["vl_desconto", "valor_desconto"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(quotation.vl_desconto);
            has_fields = true;
        }
        if let Some(col) = table.column(&["status", "situacao"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(ERP_STATUS_TRANSMITTED);
            has_fields = true;
        }
        if let Some(col) = table.column(&["dt_transmissao", "data_transmissao"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(Utc::now());
            has_fields = true;
        }
        if let Some(col) = table.column(&["hr_transmissao", "hora_transmissao"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(Utc::now().format("%H:%M:%S").to_string());
            has_fields = true;
        }

        if !has_fields {
            return Ok(());
        }

        qb.push(format!(" WHERE {}::text = ", col_codigo));
        qb.push_bind(&order.codigo);

        qb.build().execute(&self.erp_pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_aggregates_all_products() {
        let msg = insufficient_stock_message(&[
            "Parafuso M4 (disponivel 5, solicitado 10)".to_string(),
            "Porca M4 (disponivel 0, solicitado 2)".to_string(),
        ]);
        assert!(msg.starts_with("Estoque insuficiente para:"));
        assert!(msg.contains("Parafuso M4"));
        assert!(msg.contains("Porca M4"));
    }
}
