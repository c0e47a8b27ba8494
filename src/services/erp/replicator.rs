// Local replication — atomically refreshes the mirror tables from an ERP
// snapshot.
//
// One transaction: dependent tables are cleared leaf-to-root, reloaded
// root-to-leaf, and a FROM_ERP sync-log row is appended before commit. Any
// unhandled error rolls the whole pass back; no partial local state
// survives. Two tables deviate from wipe-and-reload because they persist
// across runs: class_fiscal_dados is upserted on (cod_ncm, uf) and
// class_fiscal_tributacoes is merged in batches of 100 with a savepoint
// per row so a bad row is skipped without aborting the batch.

use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};

use crate::middleware::error_handling::Result;
use crate::models::sync_log::{SyncDirection, SyncStatus};
use crate::services::erp::extractor::ErpSnapshot;

const TAXATION_MERGE_BATCH: usize = 100;

pub struct LocalReplicator {
    pool: PgPool,
}

impl LocalReplicator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the local mirror with the given snapshot.
    pub async fn replicate(&self, snapshot: &ErpSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        self.clear_mirror(&mut tx).await?;
        self.load_company(&mut tx, snapshot).await?;
        self.load_clients(&mut tx, snapshot).await?;
        self.load_products(&mut tx, snapshot).await?;
        self.load_sellers(&mut tx, snapshot).await?;
        self.load_quotations(&mut tx, snapshot).await?;
        self.load_fiscal_rules(&mut tx, snapshot).await?;
        self.load_fiscal_classifications(&mut tx, snapshot).await?;
        self.merge_classification_data(&mut tx, snapshot).await?;
        self.merge_taxations(&mut tx, snapshot).await?;

        sqlx::query(
            "INSERT INTO log_sincronizacao (data_sincronizacao, direcao, status, tipo_entidade, mensagem)
             VALUES (NOW(), $1, $2, 'snapshot', $3)",
        )
        .bind(SyncDirection::FromErp.as_str())
        .bind(SyncStatus::Success.as_str())
        .bind(format!(
            "Sincronizados {} clientes, {} produtos, {} orcamentos",
            snapshot.clients.len(),
            snapshot.products.len(),
            snapshot.quotations.len()
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Local mirror replicated from ERP snapshot");
        Ok(())
    }

    /// Leaf-to-root so no delete trips a foreign key.
    async fn clear_mirror(&self, tx: &mut Transaction<'_, Postgres>) -> Result<()> {
        for table in [
            "orcamentos_itens",
            "orcamentos",
            "vendedores",
            "produtos",
            "clientes",
            "empresas",
            "regras_icms_itens",
            "regras_icms_cadastro",
            "class_fiscal",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn load_company(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        if let Some(company) = &snapshot.company {
            sqlx::query(
                "INSERT INTO empresas (codigo, razao_social, nome_fantasia, cnpj)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(company.codigo)
            .bind(&company.razao_social)
            .bind(&company.nome_fantasia)
            .bind(&company.cnpj)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_clients(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for client in &snapshot.clients {
            sqlx::query(
                "INSERT INTO clientes (codigo, nome, cnpj_cpf, situacao, contato)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&client.codigo)
            .bind(&client.nome)
            .bind(&client.cnpj_cpf)
            .bind(&client.situacao)
            .bind(&client.contato)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_sellers(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for seller in &snapshot.sellers {
            sqlx::query(
                "INSERT INTO vendedores (codigo, nome, cnpj_cpf, situacao, contato)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&seller.codigo)
            .bind(&seller.nome)
            .bind(&seller.cnpj_cpf)
            .bind(&seller.situacao)
            .bind(&seller.contato)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for product in &snapshot.products {
            sqlx::query(
                "INSERT INTO produtos (codigo, descricao, preco_venda, estoque, situacao,
                                       cod_class_fiscal, aliq_ipi, aliq_icms, cod_regra_icms, cod_origem_prod)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(&product.codigo)
            .bind(&product.descricao)
            .bind(product.preco_venda)
            .bind(product.estoque)
            .bind(&product.situacao)
            .bind(&product.cod_class_fiscal)
            .bind(product.aliq_ipi)
            .bind(product.aliq_icms)
            .bind(&product.cod_regra_icms)
            .bind(&product.cod_origem_prod)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_quotations(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for quotation in &snapshot.quotations {
            sqlx::query(
                "INSERT INTO orcamentos (codigo, cod_cliente, cod_vendedor, dt_orcamento,
                                         vl_produtos, vl_servicos, vl_frete, vl_desconto, vl_impostos,
                                         vl_total, status, cod_forma_pagto, cod_cond_pagto,
                                         cod_transportadora, dt_conversao)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            )
            .bind(&quotation.codigo)
            .bind(&quotation.cod_cliente)
            .bind(&quotation.cod_vendedor)
            .bind(quotation.dt_orcamento)
            .bind(quotation.vl_produtos)
            .bind(quotation.vl_servicos)
            .bind(quotation.vl_frete)
            .bind(quotation.vl_desconto)
            .bind(quotation.vl_impostos)
            .bind(quotation.vl_total)
            .bind(&quotation.status)
            .bind(&quotation.cod_forma_pagto)
            .bind(&quotation.cod_cond_pagto)
            .bind(&quotation.cod_transportadora)
            .bind(quotation.dt_conversao)
            .execute(&mut **tx)
            .await?;
        }

        for item in &snapshot.quotation_items {
            sqlx::query(
                "INSERT INTO orcamentos_itens (orcamento_codigo, produto_codigo, quantidade,
                                               vl_unitario, vl_bruto, vl_desconto, vl_liquido, vl_ipi, vl_icms)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&item.orcamento_codigo)
            .bind(&item.produto_codigo)
            .bind(item.quantidade)
            .bind(item.vl_unitario)
            .bind(item.vl_bruto)
            .bind(item.vl_desconto)
            .bind(item.vl_liquido)
            .bind(item.vl_ipi)
            .bind(item.vl_icms)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Rule headers are wholesale-reloaded; rule items are deleted and
    /// reinserted per (rule, state) with a manually tracked sequence code,
    /// because the physical table's flat auto-increment is not preserved
    /// by extraction.
    async fn load_fiscal_rules(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for rule in &snapshot.fiscal_rules {
            sqlx::query("INSERT INTO regras_icms_cadastro (codigo, descricao) VALUES ($1, $2)")
                .bind(&rule.codigo)
                .bind(&rule.descricao)
                .execute(&mut **tx)
                .await?;
        }

        let row = sqlx::query("SELECT COALESCE(MAX(codigo), 0) AS max_codigo FROM regras_icms_itens")
            .fetch_one(&mut **tx)
            .await?;
        let mut next_codigo: i32 = row.try_get::<i32, _>("max_codigo")? + 1;

        for item in &snapshot.fiscal_rule_items {
            sqlx::query("DELETE FROM regras_icms_itens WHERE cod_regra_icms = $1 AND uf = $2")
                .bind(&item.cod_regra_icms)
                .bind(&item.uf)
                .execute(&mut **tx)
                .await?;
        }

        for item in &snapshot.fiscal_rule_items {
            sqlx::query(
                "INSERT INTO regras_icms_itens (codigo, cod_regra_icms, uf, st_icms, aliq_icms, red_icms)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(next_codigo)
            .bind(&item.cod_regra_icms)
            .bind(&item.uf)
            .bind(&item.st_icms)
            .bind(item.aliq_icms)
            .bind(item.red_icms)
            .execute(&mut **tx)
            .await?;
            next_codigo += 1;
        }

        Ok(())
    }

    async fn load_fiscal_classifications(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for classification in &snapshot.fiscal_classifications {
            sqlx::query("INSERT INTO class_fiscal (codigo, cod_ncm, descricao) VALUES ($1, $2, $3)")
                .bind(&classification.codigo)
                .bind(&classification.cod_ncm)
                .bind(&classification.descricao)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// class_fiscal_dados persists across runs; NCM changes reconcile via
    /// upsert on the composite key instead of blind insert.
    async fn merge_classification_data(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        for data in &snapshot.fiscal_classification_data {
            sqlx::query(
                "INSERT INTO class_fiscal_dados (cod_ncm, uf, aliq_fcp, aliq_fcpst, aliq_pst, iva)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (cod_ncm, uf) DO UPDATE
                 SET aliq_fcp = EXCLUDED.aliq_fcp,
                     aliq_fcpst = EXCLUDED.aliq_fcpst,
                     aliq_pst = EXCLUDED.aliq_pst,
                     iva = EXCLUDED.iva",
            )
            .bind(&data.cod_ncm)
            .bind(&data.uf)
            .bind(data.aliq_fcp)
            .bind(data.aliq_fcpst)
            .bind(data.aliq_pst)
            .bind(data.iva)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Taxation rows merge with existence-check-then-update-or-insert
    /// semantics, a savepoint per row so a failing row is skipped without
    /// poisoning the enclosing transaction.
    async fn merge_taxations(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &ErpSnapshot,
    ) -> Result<()> {
        let mut merged = 0usize;
        let mut skipped = 0usize;

        for batch in snapshot.fiscal_taxations.chunks(TAXATION_MERGE_BATCH) {
            for taxation in batch {
                let mut savepoint = tx.begin().await?;
                let outcome: Result<()> = async {
                    let row = sqlx::query(
                        "SELECT EXISTS (
                            SELECT 1 FROM class_fiscal_tributacoes WHERE codigo = $1 AND uf = $2
                        ) AS present",
                    )
                    .bind(&taxation.codigo)
                    .bind(&taxation.uf)
                    .fetch_one(&mut *savepoint)
                    .await?;

                    if row.try_get::<bool, _>("present")? {
                        sqlx::query(
                            "UPDATE class_fiscal_tributacoes SET cest = $3, iva = $4
                             WHERE codigo = $1 AND uf = $2",
                        )
                        .bind(&taxation.codigo)
                        .bind(&taxation.uf)
                        .bind(&taxation.cest)
                        .bind(taxation.iva)
                        .execute(&mut *savepoint)
                        .await?;
                    } else {
                        sqlx::query(
                            "INSERT INTO class_fiscal_tributacoes (codigo, uf, cest, iva)
                             VALUES ($1, $2, $3, $4)",
                        )
                        .bind(&taxation.codigo)
                        .bind(&taxation.uf)
                        .bind(&taxation.cest)
                        .bind(taxation.iva)
                        .execute(&mut *savepoint)
                        .await?;
                    }
                    Ok(())
                }
                .await;

                match outcome {
                    Ok(()) => {
                        savepoint.commit().await?;
                        merged += 1;
                    }
                    Err(err) => {
                        savepoint.rollback().await?;
                        skipped += 1;
                        tracing::warn!(
                            "Skipping taxation row ({}, {}): {}",
                            taxation.codigo,
                            taxation.uf,
                            err
                        );
                    }
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("Taxation merge finished with {} merged, {} skipped", merged, skipped);
        }
        Ok(())
    }
}
