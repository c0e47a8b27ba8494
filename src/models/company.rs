use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Single-tenant deployment: every configuration and sync pass runs against
/// company 1, matching the ERP installation this bridge targets.
pub const DEFAULT_COMPANY_CODE: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub codigo: i32,
    pub razao_social: String,
    pub nome_fantasia: Option<String>,
    pub cnpj: Option<String>,
}
