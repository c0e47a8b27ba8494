// ERP extraction — builds a consistent snapshot of ERP reference and
// transactional data for the local replicator.
//
// Every query is assembled against the schema resolved at runtime: code
// columns are cast to text (the ERP stores them as integers or strings
// depending on the table generation) and value columns to numeric, with
// safe defaults substituted for columns a given installation lacks.
// Fiscal slices are best-effort: a failure there logs a warning and yields
// an empty slice instead of aborting the extraction of core entities.

use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::middleware::error_handling::Result;
use crate::models::client::{Client, Seller};
use crate::models::company::Company;
use crate::models::fiscal::{
    FiscalClassification, FiscalClassificationData, FiscalRule, FiscalRuleItem, FiscalTaxation,
};
use crate::models::product::Product;
use crate::models::quotation::{Quotation, QuotationItem};
use crate::services::erp::schema::{ErpEntity, ResolvedTable, SchemaResolver};

#[derive(Debug, Default)]
pub struct ErpSnapshot {
    pub company: Option<Company>,
    pub clients: Vec<Client>,
    pub sellers: Vec<Seller>,
    pub products: Vec<Product>,
    pub fiscal_rules: Vec<FiscalRule>,
    pub fiscal_rule_items: Vec<FiscalRuleItem>,
    pub fiscal_classifications: Vec<FiscalClassification>,
    pub fiscal_classification_data: Vec<FiscalClassificationData>,
    pub fiscal_taxations: Vec<FiscalTaxation>,
    pub quotations: Vec<Quotation>,
    pub quotation_items: Vec<QuotationItem>,
}

pub struct ErpExtractor {
    erp_pool: PgPool,
    resolver: Arc<SchemaResolver>,
}

/// SELECT expression for a logical column: first physical candidate that
/// exists, cast and aliased; otherwise the given default expression.
fn select_expr(table: &ResolvedTable, candidates: &[&str], cast: &str, alias: &str, default: &str) -> String {
    match table.column(candidates) {
        Some(col) => format!("{}::{} AS {}", col, cast, alias),
        None => format!("{} AS {}", default, alias),
    }
}

fn text_expr(table: &ResolvedTable, candidates: &[&str], alias: &str) -> String {
    select_expr(table, candidates, "text", alias, "NULL::text")
}

fn numeric_expr(table: &ResolvedTable, candidates: &[&str], alias: &str) -> String {
    select_expr(table, candidates, "numeric", alias, "0::numeric")
}

fn opt_numeric_expr(table: &ResolvedTable, candidates: &[&str], alias: &str) -> String {
    select_expr(table, candidates, "numeric", alias, "NULL::numeric")
}

impl ErpExtractor {
    pub fn new(erp_pool: PgPool, resolver: Arc<SchemaResolver>) -> Self {
        Self { erp_pool, resolver }
    }

    /// Extract every slice needed by the replicator. Core entities
    /// propagate failures; fiscal slices degrade to empty.
    pub async fn extract(&self) -> Result<ErpSnapshot> {
        let mut snapshot = ErpSnapshot {
            company: self.extract_company().await?,
            clients: self.extract_clients().await?,
            sellers: self.extract_sellers().await?,
            products: self.extract_products().await?,
            quotations: self.extract_quotations().await?,
            quotation_items: self.extract_quotation_items().await?,
            ..Default::default()
        };

        snapshot.fiscal_rules = self.best_effort("regras ICMS", self.extract_fiscal_rules()).await;
        snapshot.fiscal_rule_items = self
            .best_effort("itens de regras ICMS", self.extract_fiscal_rule_items())
            .await;
        snapshot.fiscal_classifications = self
            .best_effort("classificacoes fiscais", self.extract_fiscal_classifications())
            .await;
        snapshot.fiscal_classification_data = self
            .best_effort("dados de classificacao fiscal", self.extract_fiscal_classification_data())
            .await;
        snapshot.fiscal_taxations = self
            .best_effort("tributacoes CEST/IVA", self.extract_fiscal_taxations())
            .await;

        tracing::info!(
            clients = snapshot.clients.len(),
            sellers = snapshot.sellers.len(),
            products = snapshot.products.len(),
            quotations = snapshot.quotations.len(),
            taxations = snapshot.fiscal_taxations.len(),
            "ERP snapshot extracted"
        );

        Ok(snapshot)
    }

    async fn best_effort<T>(
        &self,
        slice: &str,
        fut: impl std::future::Future<Output = Result<Vec<T>>>,
    ) -> Vec<T> {
        match fut.await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!("Extraction of {} failed, continuing with empty slice: {}", slice, err);
                Vec::new()
            }
        }
    }

    async fn resolved(&self, entity: ErpEntity) -> Result<Option<ResolvedTable>> {
        Ok(self.resolver.resolve(entity).await?.as_resolved().cloned())
    }

    async fn extract_company(&self) -> Result<Option<Company>> {
        let Some(table) = self.resolved(ErpEntity::Companies).await? else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {}, {}, {}, {} FROM {} ORDER BY 1 LIMIT 1",
            select_expr(&table, &["codigo", "cod_empresa"], "integer", "codigo", "1"),
            text_expr(&table, &["razao_social", "razao"], "razao_social"),
            text_expr(&table, &["nome_fantasia", "fantasia"], "nome_fantasia"),
            text_expr(&table, &["cnpj", "cnpj_cpf"], "cnpj"),
            table.table
        );

        let row = sqlx::query(&sql).fetch_optional(&self.erp_pool).await?;
        row.map(|row| {
            Ok(Company {
                codigo: row.try_get("codigo")?,
                razao_social: row
                    .try_get::<Option<String>, _>("razao_social")?
                    .unwrap_or_default(),
                nome_fantasia: row.try_get("nome_fantasia")?,
                cnpj: row.try_get("cnpj")?,
            })
        })
        .transpose()
    }

    async fn extract_clients(&self) -> Result<Vec<Client>> {
        let Some(table) = self.resolved(ErpEntity::Clients).await? else {
            return Ok(Vec::new());
        };

        let rows = self.fetch_party_rows(&table).await?;
        rows.into_iter()
            .map(|row| {
                Ok(Client {
                    codigo: row.try_get("codigo")?,
                    nome: row.try_get::<Option<String>, _>("nome")?.unwrap_or_default(),
                    cnpj_cpf: row.try_get("cnpj_cpf")?,
                    situacao: row.try_get("situacao")?,
                    contato: row.try_get("contato")?,
                })
            })
            .collect()
    }

    async fn extract_sellers(&self) -> Result<Vec<Seller>> {
        let Some(table) = self.resolved(ErpEntity::Sellers).await? else {
            return Ok(Vec::new());
        };

        let rows = self.fetch_party_rows(&table).await?;
        rows.into_iter()
            .map(|row| {
                Ok(Seller {
                    codigo: row.try_get("codigo")?,
                    nome: row.try_get::<Option<String>, _>("nome")?.unwrap_or_default(),
                    cnpj_cpf: row.try_get("cnpj_cpf")?,
                    situacao: row.try_get("situacao")?,
                    contato: row.try_get("contato")?,
                })
            })
            .collect()
    }

    /// Clients and sellers share the same party shape in every known ERP
    /// generation, so they share one SELECT builder.
    async fn fetch_party_rows(&self, table: &ResolvedTable) -> Result<Vec<PgRow>> {
        let sql = format!(
            "SELECT {}, {}, {}, {}, {} FROM {} ORDER BY 1",
            text_expr(table, &["codigo", "cod_cliente", "cod_vendedor", "id"], "codigo"),
            text_expr(table, &["nome", "razao_social", "razao"], "nome"),
            text_expr(table, &["cnpj_cpf", "cpf_cnpj", "cnpj", "cpf"], "cnpj_cpf"),
            text_expr(table, &["situacao", "status"], "situacao"),
            text_expr(table, &["contato", "email", "telefone"], "contato"),
            table.table
        );

        Ok(sqlx::query(&sql).fetch_all(&self.erp_pool).await?)
    }

    async fn extract_products(&self) -> Result<Vec<Product>> {
        let Some(table) = self.resolved(ErpEntity::Products).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY 1",
            text_expr(&table, &["codigo", "cod_produto", "id"], "codigo"),
            text_expr(&table, &["descricao", "nome"], "descricao"),
            numeric_expr(&table, &["preco_venda", "vl_venda", "preco"], "preco_venda"),
            numeric_expr(&table, &["estoque", "qtde_estoque", "saldo_estoque"], "estoque"),
            text_expr(&table, &["situacao", "status"], "situacao"),
            text_expr(&table, &["cod_class_fiscal", "class_fiscal", "cod_ncm"], "cod_class_fiscal"),
            numeric_expr(&table, &["aliq_ipi"], "aliq_ipi"),
            numeric_expr(&table, &["aliq_icms"], "aliq_icms"),
            text_expr(&table, &["cod_regra_icms", "regra_icms"], "cod_regra_icms"),
            text_expr(&table, &["cod_origem_prod", "origem_prod", "origem"], "cod_origem_prod"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(Product {
                    codigo: row.try_get("codigo")?,
                    descricao: row
                        .try_get::<Option<String>, _>("descricao")?
                        .unwrap_or_default(),
                    preco_venda: row.try_get("preco_venda")?,
                    estoque: row.try_get("estoque")?,
                    situacao: row.try_get("situacao")?,
                    cod_class_fiscal: row.try_get("cod_class_fiscal")?,
                    aliq_ipi: row.try_get("aliq_ipi")?,
                    aliq_icms: row.try_get("aliq_icms")?,
                    cod_regra_icms: row.try_get("cod_regra_icms")?,
                    cod_origem_prod: row.try_get("cod_origem_prod")?,
                })
            })
            .collect()
    }

    async fn extract_fiscal_rules(&self) -> Result<Vec<FiscalRule>> {
        let Some(table) = self.resolved(ErpEntity::FiscalRules).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {} FROM {} ORDER BY 1",
            text_expr(&table, &["codigo", "cod_regra_icms"], "codigo"),
            text_expr(&table, &["descricao", "nome"], "descricao"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(FiscalRule {
                    codigo: row.try_get("codigo")?,
                    descricao: row.try_get("descricao")?,
                })
            })
            .collect()
    }

    /// The ERP stores rule items as a one-to-many under the rule header;
    /// they come out flat, tagged with the state, and the replicator
    /// re-splits them per (rule, state) on load.
    async fn extract_fiscal_rule_items(&self) -> Result<Vec<FiscalRuleItem>> {
        let Some(table) = self.resolved(ErpEntity::FiscalRuleItems).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {}, {}, {}, {} FROM {} ORDER BY 1, 2",
            text_expr(&table, &["cod_regra_icms", "regra_icms", "codigo_regra"], "cod_regra_icms"),
            text_expr(&table, &["uf", "estado"], "uf"),
            text_expr(&table, &["st_icms", "situacao_tributaria"], "st_icms"),
            numeric_expr(&table, &["aliq_icms", "aliquota"], "aliq_icms"),
            numeric_expr(&table, &["red_icms", "reducao"], "red_icms"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(FiscalRuleItem {
                    // Sequence codes are reassigned by the replicator.
                    codigo: 0,
                    cod_regra_icms: row
                        .try_get::<Option<String>, _>("cod_regra_icms")?
                        .unwrap_or_default(),
                    uf: row.try_get::<Option<String>, _>("uf")?.unwrap_or_default(),
                    st_icms: row.try_get("st_icms")?,
                    aliq_icms: row.try_get("aliq_icms")?,
                    red_icms: row.try_get("red_icms")?,
                })
            })
            .collect()
    }

    async fn extract_fiscal_classifications(&self) -> Result<Vec<FiscalClassification>> {
        let Some(table) = self.resolved(ErpEntity::FiscalClassifications).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {}, {} FROM {} ORDER BY 1",
            text_expr(&table, &["codigo", "cod_class_fiscal"], "codigo"),
            text_expr(&table, &["cod_ncm", "ncm"], "cod_ncm"),
            text_expr(&table, &["descricao"], "descricao"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(FiscalClassification {
                    codigo: row.try_get("codigo")?,
                    cod_ncm: row.try_get("cod_ncm")?,
                    descricao: row.try_get("descricao")?,
                })
            })
            .collect()
    }

    async fn extract_fiscal_classification_data(&self) -> Result<Vec<FiscalClassificationData>> {
        let Some(table) = self.resolved(ErpEntity::FiscalClassificationData).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {}, {}, {}, {}, {} FROM {} ORDER BY 1, 2",
            text_expr(&table, &["cod_ncm", "ncm"], "cod_ncm"),
            text_expr(&table, &["uf", "estado"], "uf"),
            numeric_expr(&table, &["aliq_fcp"], "aliq_fcp"),
            numeric_expr(&table, &["aliq_fcpst"], "aliq_fcpst"),
            numeric_expr(&table, &["aliq_pst"], "aliq_pst"),
            numeric_expr(&table, &["iva", "mva"], "iva"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(FiscalClassificationData {
                    cod_ncm: row.try_get::<Option<String>, _>("cod_ncm")?.unwrap_or_default(),
                    uf: row.try_get::<Option<String>, _>("uf")?.unwrap_or_default(),
                    aliq_fcp: row.try_get("aliq_fcp")?,
                    aliq_fcpst: row.try_get("aliq_fcpst")?,
                    aliq_pst: row.try_get("aliq_pst")?,
                    iva: row.try_get("iva")?,
                })
            })
            .collect()
    }

    /// Primary path reads the taxation table directly. When that table is
    /// absent the fallback crosses the alternate CEST code table with the
    /// static state list, zeroing the rate fields.
    async fn extract_fiscal_taxations(&self) -> Result<Vec<FiscalTaxation>> {
        if let Some(table) = self.resolved(ErpEntity::FiscalTaxations).await? {
            let sql = format!(
                "SELECT {}, {}, {}, {} FROM {} ORDER BY 1, 2",
                text_expr(&table, &["codigo", "cod_class_fiscal"], "codigo"),
                text_expr(&table, &["uf", "estado"], "uf"),
                text_expr(&table, &["cest", "cod_cest"], "cest"),
                numeric_expr(&table, &["iva", "mva"], "iva"),
                table.table
            );

            let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
            return rows
                .into_iter()
                .map(|row| {
                    Ok(FiscalTaxation {
                        codigo: row.try_get::<Option<String>, _>("codigo")?.unwrap_or_default(),
                        uf: row.try_get::<Option<String>, _>("uf")?.unwrap_or_default(),
                        cest: row.try_get("cest")?,
                        iva: row.try_get("iva")?,
                    })
                })
                .collect();
        }

        let Some(cest_table) = self.resolved(ErpEntity::CestCodes).await? else {
            return Ok(Vec::new());
        };

        tracing::warn!(
            "Taxation table absent, synthesizing per-state rows from '{}'",
            cest_table.table
        );

        let sql = format!(
            "SELECT {}, {} FROM {} ORDER BY 1",
            text_expr(&cest_table, &["codigo", "cod_class_fiscal"], "codigo"),
            text_expr(&cest_table, &["cest", "cod_cest"], "cest"),
            cest_table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        let mut taxations = Vec::new();
        for row in rows {
            let codigo: Option<String> = row.try_get("codigo")?;
            let cest: Option<String> = row.try_get("cest")?;
            taxations.extend(FiscalTaxation::synthesize_for_states(
                codigo.as_deref().unwrap_or_default(),
                cest.as_deref(),
            ));
        }

        Ok(taxations)
    }

    async fn extract_quotations(&self) -> Result<Vec<Quotation>> {
        let Some(table) = self.resolved(ErpEntity::Quotations).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY 1",
            text_expr(&table, &["codigo", "cod_orcamento", "id"], "codigo"),
            text_expr(&table, &["cod_cliente", "cliente"], "cod_cliente"),
            text_expr(&table, &["cod_vendedor", "vendedor", "cod_vend"], "cod_vendedor"),
            select_expr(&table, &["dt_orcamento", "data_orcamento", "data"], "timestamptz", "dt_orcamento", "now()"),
            numeric_expr(&table, &["vl_produtos", "valor_produtos"], "vl_produtos"),
            numeric_expr(&table, &["vl_servicos", "valor_servicos"], "vl_servicos"),
            numeric_expr(&table, &["vl_frete", "valor_frete"], "vl_frete"),
            numeric_expr(&table, &["vl_desconto", "valor_desconto"], "vl_desconto"),
            numeric_expr(&table, &["vl_impostos", "valor_impostos"], "vl_impostos"),
            numeric_expr(&table, &["vl_total", "valor_total"], "vl_total"),
            text_expr(&table, &["status", "situacao"], "status"),
            text_expr(&table, &["cod_forma_pagto", "forma_pagto"], "cod_forma_pagto"),
            text_expr(&table, &["cod_cond_pagto", "cond_pagto"], "cod_cond_pagto"),
            text_expr(&table, &["cod_transportadora", "transportadora"], "cod_transportadora"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(Quotation {
                    codigo: row.try_get("codigo")?,
                    cod_cliente: row
                        .try_get::<Option<String>, _>("cod_cliente")?
                        .unwrap_or_default(),
                    cod_vendedor: row.try_get("cod_vendedor")?,
                    dt_orcamento: row.try_get("dt_orcamento")?,
                    vl_produtos: row.try_get("vl_produtos")?,
                    vl_servicos: row.try_get("vl_servicos")?,
                    vl_frete: row.try_get("vl_frete")?,
                    vl_desconto: row.try_get("vl_desconto")?,
                    vl_impostos: row.try_get("vl_impostos")?,
                    vl_total: row.try_get("vl_total")?,
                    status: row
                        .try_get::<Option<String>, _>("status")?
                        .unwrap_or_else(|| crate::models::quotation::STATUS_PENDENTE.to_string()),
                    cod_forma_pagto: row.try_get("cod_forma_pagto")?,
                    cod_cond_pagto: row.try_get("cod_cond_pagto")?,
                    cod_transportadora: row.try_get("cod_transportadora")?,
                    dt_conversao: None,
                })
            })
            .collect()
    }

    async fn extract_quotation_items(&self) -> Result<Vec<QuotationItem>> {
        let Some(table) = self.resolved(ErpEntity::QuotationItems).await? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY 1",
            text_expr(&table, &["orcamento_codigo", "cod_orcamento"], "orcamento_codigo"),
            text_expr(&table, &["produto_codigo", "cod_produto"], "produto_codigo"),
            numeric_expr(&table, &["quantidade", "qtde"], "quantidade"),
            numeric_expr(&table, &["vl_unitario", "preco_unitario", "vl_unit"], "vl_unitario"),
            opt_numeric_expr(&table, &["vl_bruto", "valor_bruto"], "vl_bruto"),
            opt_numeric_expr(&table, &["vl_desconto", "valor_desconto"], "vl_desconto"),
            opt_numeric_expr(&table, &["vl_liquido", "valor_liquido"], "vl_liquido"),
            opt_numeric_expr(&table, &["vl_ipi"], "vl_ipi"),
            opt_numeric_expr(&table, &["vl_icms"], "vl_icms"),
            table.table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.erp_pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(QuotationItem {
                    codigo: 0,
                    orcamento_codigo: row
                        .try_get::<Option<String>, _>("orcamento_codigo")?
                        .unwrap_or_default(),
                    produto_codigo: row
                        .try_get::<Option<String>, _>("produto_codigo")?
                        .unwrap_or_default(),
                    quantidade: row.try_get("quantidade")?,
                    vl_unitario: row.try_get("vl_unitario")?,
                    vl_bruto: row.try_get("vl_bruto")?,
                    vl_desconto: row.try_get("vl_desconto")?,
                    vl_liquido: row.try_get("vl_liquido")?,
                    vl_ipi: row.try_get("vl_ipi")?,
                    vl_icms: row.try_get("vl_icms")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn table(columns: &[&str]) -> ResolvedTable {
        ResolvedTable {
            table: "produtos".to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn test_select_expr_uses_first_existing_candidate() {
        let t = table(&["vl_venda", "preco"]);
        assert_eq!(
            numeric_expr(&t, &["preco_venda", "vl_venda", "preco"], "preco_venda"),
            "vl_venda::numeric AS preco_venda"
        );
    }

    #[test]
    fn test_select_expr_defaults_when_column_missing() {
        let t = table(&["codigo"]);
        assert_eq!(
            numeric_expr(&t, &["aliq_ipi"], "aliq_ipi"),
            "0::numeric AS aliq_ipi"
        );
        assert_eq!(
            text_expr(&t, &["situacao", "status"], "situacao"),
            "NULL::text AS situacao"
        );
    }
}
