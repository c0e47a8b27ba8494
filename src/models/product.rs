use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub codigo: String,
    pub descricao: String,
    pub preco_venda: Decimal,
    /// Mutated locally by order conversion (decremented per line item) and
    /// reconciled back to the ERP on the next TO_ERP pass.
    pub estoque: Decimal,
    pub situacao: Option<String>,
    pub cod_class_fiscal: Option<String>,
    pub aliq_ipi: Decimal,
    pub aliq_icms: Decimal,
    pub cod_regra_icms: Option<String>,
    pub cod_origem_prod: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    pub preco_venda: Option<Decimal>,
    pub estoque: Option<Decimal>,
    pub situacao: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchProductsQuery {
    pub descricao: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
