// Schema resolution for the ERP database.
//
// ERP installations drift: the same logical entity lives under different
// physical table names (and column spellings) depending on the deployment
// generation. Candidates are probed in priority order against
// information_schema once per process; callers receive either a resolved
// table with its concrete column set or Unavailable, in which case they
// degrade to empty data instead of failing the whole sync.

use std::collections::{HashMap, HashSet};

use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::middleware::error_handling::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErpEntity {
    Companies,
    Clients,
    Sellers,
    Products,
    FiscalRules,
    FiscalRuleItems,
    FiscalClassifications,
    FiscalClassificationData,
    FiscalTaxations,
    /// Alternate CEST code table used to synthesize taxation rows when the
    /// primary taxation table is absent.
    CestCodes,
    Quotations,
    QuotationItems,
    Orders,
    OrderItems,
}

impl ErpEntity {
    /// Physical table candidates in priority order; first existing wins.
    pub fn table_candidates(&self) -> &'static [&'static str] {
        match self {
            ErpEntity::Companies => &["empresas", "cad_empresas", "empresa"],
            ErpEntity::Clients => &["clientes", "cad_clientes", "cliente"],
            ErpEntity::Sellers => &["vendedores", "cad_vendedores", "vendedor"],
            ErpEntity::Products => &["produtos", "cad_produtos", "produto"],
            ErpEntity::FiscalRules => &["regras_icms_cadastro", "regras_icms", "regra_icms"],
            ErpEntity::FiscalRuleItems => &["regras_icms_itens", "regra_icms_itens"],
            ErpEntity::FiscalClassifications => &["class_fiscal", "classificacao_fiscal"],
            ErpEntity::FiscalClassificationData => &["class_fiscal_dados", "class_fiscal_dado"],
            ErpEntity::FiscalTaxations => &["class_fiscal_tributacoes", "class_fiscal_tributacao"],
            ErpEntity::CestCodes => &["cest_codigos", "codigos_cest", "cest"],
            ErpEntity::Quotations => &["orcamentos", "mob_orcamentos", "orcamento"],
            ErpEntity::QuotationItems => &["orcamentos_itens", "mob_orcamentos_itens", "itens_orcamento"],
            ErpEntity::Orders => &[
                "pedidos_venda",
                "mob_pedidos_venda",
                "pedidos",
                "pedido_venda",
                "vendas",
                "pedidos_vendas",
            ],
            ErpEntity::OrderItems => &[
                "itens_pedidos_venda",
                "mob_itens_pedidos_venda",
                "pedidos_venda_itens",
                "itens_pedido_venda",
            ],
        }
    }
}

/// A table that exists in the ERP, with its physical column set.
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub table: String,
    pub columns: HashSet<String>,
}

impl ResolvedTable {
    /// First candidate present in the physical column set.
    pub fn column<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().find(|c| self.columns.contains(**c)).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }
}

#[derive(Debug, Clone)]
pub enum SchemaResolution {
    Resolved(ResolvedTable),
    Unavailable,
}

impl SchemaResolution {
    pub fn as_resolved(&self) -> Option<&ResolvedTable> {
        match self {
            SchemaResolution::Resolved(t) => Some(t),
            SchemaResolution::Unavailable => None,
        }
    }
}

pub struct SchemaResolver {
    erp_pool: PgPool,
    cache: RwLock<HashMap<ErpEntity, SchemaResolution>>,
}

impl SchemaResolver {
    pub fn new(erp_pool: PgPool) -> Self {
        Self {
            erp_pool,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an entity, serving from cache after the first probe.
    pub async fn resolve(&self, entity: ErpEntity) -> Result<SchemaResolution> {
        if let Some(cached) = self.cache.read().await.get(&entity) {
            return Ok(cached.clone());
        }

        let resolution = self.probe(entity).await?;
        self.cache
            .write()
            .await
            .insert(entity, resolution.clone());
        Ok(resolution)
    }

    /// Drop all cached resolutions. Called at the start of each full
    /// FROM_ERP sync so a sync pass always sees the current ERP schema.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    async fn probe(&self, entity: ErpEntity) -> Result<SchemaResolution> {
        for candidate in entity.table_candidates() {
            if self.table_exists(candidate).await? {
                let columns = self.table_columns(candidate).await?;
                tracing::debug!("ERP entity {:?} resolved to table '{}'", entity, candidate);
                return Ok(SchemaResolution::Resolved(ResolvedTable {
                    table: (*candidate).to_string(),
                    columns,
                }));
            }
        }

        tracing::warn!(
            "ERP entity {:?} not found under any candidate table {:?}",
            entity,
            entity.table_candidates()
        );
        Ok(SchemaResolution::Unavailable)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            ) AS present",
        )
        .bind(table)
        .fetch_one(&self.erp_pool)
        .await?;

        Ok(row.try_get::<bool, _>("present")?)
    }

    async fn table_columns(&self, table: &str) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1",
        )
        .bind(table)
        .fetch_all(&self.erp_pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(row.try_get::<String, _>("column_name")?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(columns: &[&str]) -> ResolvedTable {
        ResolvedTable {
            table: "pedidos".to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_column_resolution_respects_priority_order() {
        let table = resolved(&["vendedor", "cod_vend"]);
        assert_eq!(
            table.column(&["cod_vendedor", "vendedor", "cod_vend"]),
            Some("vendedor")
        );
    }

    #[test]
    fn test_column_resolution_none_when_absent() {
        let table = resolved(&["codigo"]);
        assert_eq!(table.column(&["cod_vendedor", "vendedor"]), None);
    }

    #[test]
    fn test_order_table_candidates_priority() {
        let candidates = ErpEntity::Orders.table_candidates();
        assert_eq!(candidates[0], "pedidos_venda");
        assert!(candidates.contains(&"vendas"));
        assert!(candidates.contains(&"mob_pedidos_venda"));
    }
}
