// Reverse sync — propagates local master-data edits back onto the ERP.
//
// One ERP-side transaction, one UPDATE ... WHERE codigo = $n per row per
// entity. No inserts: rows are assumed to pre-exist in the ERP (created by
// the ERP's own tooling or by the conversion engine's insert path). A local
// row whose code has no ERP counterpart updates zero rows; that soft
// failure is logged at debug and otherwise ignored.

use std::sync::Arc;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::middleware::error_handling::Result;
use crate::models::sync_log::{SyncDirection, SyncStatus};
use crate::repositories::{
    ClientRepository, CompanyRepository, ProductRepository, QuotationRepository, SyncLogRepository,
};
use crate::services::erp::schema::{ErpEntity, ResolvedTable, SchemaResolver};

#[derive(Debug, Default)]
pub struct PushSummary {
    pub companies: usize,
    pub clients: usize,
    pub products: usize,
    pub sellers: usize,
    pub quotations: usize,
    pub quotation_items: usize,
}

impl PushSummary {
    pub fn total(&self) -> usize {
        self.companies
            + self.clients
            + self.products
            + self.sellers
            + self.quotations
            + self.quotation_items
    }
}

pub struct ErpPushEngine {
    erp_pool: PgPool,
    resolver: Arc<SchemaResolver>,
    company_repo: CompanyRepository,
    client_repo: ClientRepository,
    product_repo: ProductRepository,
    quotation_repo: QuotationRepository,
    sync_log_repo: SyncLogRepository,
}

impl ErpPushEngine {
    pub fn new(local_pool: PgPool, erp_pool: PgPool, resolver: Arc<SchemaResolver>) -> Self {
        Self {
            erp_pool,
            resolver,
            company_repo: CompanyRepository::new(local_pool.clone()),
            client_repo: ClientRepository::new(local_pool.clone()),
            product_repo: ProductRepository::new(local_pool.clone()),
            quotation_repo: QuotationRepository::new(local_pool.clone()),
            sync_log_repo: SyncLogRepository::new(local_pool),
        }
    }

    pub async fn push(&self) -> Result<PushSummary> {
        let mut tx = self.erp_pool.begin().await?;
        let mut summary = PushSummary::default();

        summary.companies = self.push_company(&mut tx).await?;
        summary.clients = self.push_clients(&mut tx).await?;
        summary.products = self.push_products(&mut tx).await?;
        summary.sellers = self.push_sellers(&mut tx).await?;
        summary.quotations = self.push_quotations(&mut tx).await?;
        summary.quotation_items = self.push_quotation_items(&mut tx).await?;

        tx.commit().await?;

        self.sync_log_repo
            .append(
                SyncDirection::ToErp,
                SyncStatus::Success,
                Some("snapshot"),
                None,
                Some(&format!("{} registros atualizados no ERP", summary.total())),
            )
            .await?;

        tracing::info!(total = summary.total(), "Reverse sync to ERP completed");
        Ok(summary)
    }

    async fn resolved(&self, entity: ErpEntity) -> Result<Option<ResolvedTable>> {
        Ok(self.resolver.resolve(entity).await?.as_resolved().cloned())
    }

    async fn push_company(&self, tx: &mut Transaction<'_, Postgres>) -> Result<usize> {
        let Some(table) = self.resolved(ErpEntity::Companies).await? else {
            return Ok(0);
        };
        let Some(company) = self.company_repo.get().await? else {
            return Ok(0);
        };
        let Some(col_codigo) = table.column(&["codigo", "cod_empresa"]) else {
            return Ok(0);
        };

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("UPDATE {} SET ", table.table));
        let mut has_fields = false;

        if let Some(col) = table.column(&["razao_social", "razao"]) {
            qb.push(format!("{} = ", col));
            qb.push_bind(&company.razao_social);
            has_fields = true;
        }
        if let Some(col) = table.column(&["nome_fantasia", "fantasia"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(&company.nome_fantasia);
            has_fields = true;
        }
        if let Some(col) = table.column(&["cnpj", "cnpj_cpf"]) {
            if has_fields {
                qb.push(", ");
            }
            qb.push(format!("{} = ", col));
            qb.push_bind(&company.cnpj);
            has_fields = true;
        }

        if !has_fields {
            return Ok(0);
        }

        qb.push(format!(" WHERE {}::text = ", col_codigo));
        qb.push_bind(company.codigo.to_string());

        let result = qb.build().execute(&mut **tx).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn push_clients(&self, tx: &mut Transaction<'_, Postgres>) -> Result<usize> {
        let Some(table) = self.resolved(ErpEntity::Clients).await? else {
            return Ok(0);
        };
        let Some(col_codigo) = table.column(&["codigo", "cod_cliente", "id"]) else {
            return Ok(0);
        };

        let mut updated = 0;
        for client in self.client_repo.all().await? {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("UPDATE {} SET ", table.table));
            let mut has_fields = false;

            if let Some(col) = table.column(&["nome", "razao_social", "razao"]) {
                qb.push(format!("{} = ", col));
                qb.push_bind(&client.nome);
                has_fields = true;
            }
            if let Some(col) = table.column(&["cnpj_cpf", "cpf_cnpj", "cnpj"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&client.cnpj_cpf);
                has_fields = true;
            }
            if let Some(col) = table.column(&["situacao", "status"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&client.situacao);
                has_fields = true;
            }

            if !has_fields {
                return Ok(0);
            }

            qb.push(format!(" WHERE {}::text = ", col_codigo));
            qb.push_bind(&client.codigo);

            let result = qb.build().execute(&mut **tx).await?;
            if result.rows_affected() == 0 {
                tracing::debug!("Cliente {} has no ERP counterpart, skipped", client.codigo);
            } else {
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn push_products(&self, tx: &mut Transaction<'_, Postgres>) -> Result<usize> {
        let Some(table) = self.resolved(ErpEntity::Products).await? else {
            return Ok(0);
        };
        let Some(col_codigo) = table.column(&["codigo", "cod_produto", "id"]) else {
            return Ok(0);
        };

        let mut updated = 0;
        for product in self.product_repo.all().await? {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("UPDATE {} SET ", table.table));
            let mut has_fields = false;

            if let Some(col) = table.column(&["preco_venda", "vl_venda", "preco"]) {
                qb.push(format!("{} = ", col));
                qb.push_bind(product.preco_venda);
                has_fields = true;
            }
            // Stock is the critical reconciliation target: conversions
            // decrement it locally and the ERP must converge.
            if let Some(col) = table.column(&["estoque", "qtde_estoque", "saldo_estoque"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(product.estoque);
                has_fields = true;
            }
            if let Some(col) = table.column(&["situacao", "status"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&product.situacao);
                has_fields = true;
            }

            if !has_fields {
                return Ok(0);
            }

            qb.push(format!(" WHERE {}::text = ", col_codigo));
            qb.push_bind(&product.codigo);

            let result = qb.build().execute(&mut **tx).await?;
            if result.rows_affected() == 0 {
                tracing::debug!("Produto {} has no ERP counterpart, skipped", product.codigo);
            } else {
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn push_sellers(&self, tx: &mut Transaction<'_, Postgres>) -> Result<usize> {
        let Some(table) = self.resolved(ErpEntity::Sellers).await? else {
            return Ok(0);
        };
        let Some(col_codigo) = table.column(&["codigo", "cod_vendedor", "id"]) else {
            return Ok(0);
        };

        let mut updated = 0;
        for seller in self.client_repo.list_sellers().await? {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("UPDATE {} SET ", table.table));
            let mut has_fields = false;

            if let Some(col) = table.column(&["nome", "razao_social"]) {
                qb.push(format!("{} = ", col));
                qb.push_bind(&seller.nome);
                has_fields = true;
            }
            if let Some(col) = table.column(&["situacao", "status"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&seller.situacao);
                has_fields = true;
            }

            if !has_fields {
                return Ok(0);
            }

            qb.push(format!(" WHERE {}::text = ", col_codigo));
            qb.push_bind(&seller.codigo);

            let result = qb.build().execute(&mut **tx).await?;
            if result.rows_affected() == 0 {
                tracing::debug!("Vendedor {} has no ERP counterpart, skipped", seller.codigo);
            } else {
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn push_quotations(&self, tx: &mut Transaction<'_, Postgres>) -> Result<usize> {
        let Some(table) = self.resolved(ErpEntity::Quotations).await? else {
            return Ok(0);
        };
        let Some(col_codigo) = table.column(&["codigo", "cod_orcamento", "id"]) else {
            return Ok(0);
        };

        let mut updated = 0;
        for quotation in self.quotation_repo.all().await? {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("UPDATE {} SET ", table.table));
            let mut has_fields = false;

            if let Some(col) = table.column(&["status", "situacao"]) {
                qb.push(format!("{} = ", col));
                qb.push_bind(&quotation.status);
                has_fields = true;
            }
            if let Some(col) = table.column(&["vl_produtos", "valor_produtos"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(quotation.vl_produtos);
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
            if let Some(col) = table.column(&["vl_total", "valor_total"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(quotation.vl_total);
                has_fields = true;
            }
            if let Some(col) = table.column(&["cod_forma_pagto", "forma_pagto"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&quotation.cod_forma_pagto);
                has_fields = true;
            }
            if let Some(col) = table.column(&["cod_cond_pagto", "cond_pagto"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&quotation.cod_cond_pagto);
                has_fields = true;
            }
            if let Some(col) = table.column(&["cod_transportadora", "transportadora"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(&quotation.cod_transportadora);
                has_fields = true;
            }

            if !has_fields {
                return Ok(0);
            }

            qb.push(format!(" WHERE {}::text = ", col_codigo));
            qb.push_bind(&quotation.codigo);

            let result = qb.build().execute(&mut **tx).await?;
            if result.rows_affected() == 0 {
                tracing::debug!("Orcamento {} has no ERP counterpart, skipped", quotation.codigo);
            } else {
                updated += 1;
            }
        }

        Ok(updated)
    }

    /// Items carry no shared surrogate key with the ERP, so they are keyed
    /// by (quotation, product).
    async fn push_quotation_items(&self, tx: &mut Transaction<'_, Postgres>) -> Result<usize> {
        let Some(table) = self.resolved(ErpEntity::QuotationItems).await? else {
            return Ok(0);
        };
        let Some(col_orcamento) = table.column(&["orcamento_codigo", "cod_orcamento"]) else {
            return Ok(0);
        };
        let Some(col_produto) = table.column(&["produto_codigo", "cod_produto"]) else {
            return Ok(0);
        };

        let mut updated = 0;
        for item in self.quotation_repo.all_items().await? {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("UPDATE {} SET ", table.table));
            let mut has_fields = false;

            if let Some(col) = table.column(&["quantidade", "qtde"]) {
                qb.push(format!("{} = ", col));
                qb.push_bind(item.quantidade);
                has_fields = true;
            }
            if let Some(col) = table.column(&["vl_unitario", "preco_unitario", "vl_unit"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(item.vl_unitario);
                has_fields = true;
            }
            if let Some(col) = table.column(&["vl_desconto", "valor_desconto"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(item.vl_desconto);
                has_fields = true;
            }
            if let Some(col) = table.column(&["vl_liquido", "valor_liquido"]) {
                if has_fields {
                    qb.push(", ");
                }
                qb.push(format!("{} = ", col));
                qb.push_bind(item.vl_liquido);
                has_fields = true;
            }

            if !has_fields {
                return Ok(0);
            }

            qb.push(format!(" WHERE {}::text = ", col_orcamento));
            qb.push_bind(&item.orcamento_codigo);
            qb.push(format!(" AND {}::text = ", col_produto));
            qb.push_bind(&item.produto_codigo);

            let result = qb.build().execute(&mut **tx).await?;
            if result.rows_affected() == 0 {
                tracing::debug!(
                    "Item ({}, {}) has no ERP counterpart, skipped",
                    item.orcamento_codigo,
                    item.produto_codigo
                );
            } else {
                updated += 1;
            }
        }

        Ok(updated)
    }
}
