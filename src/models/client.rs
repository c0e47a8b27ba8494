use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// ERP-owned master data. Codes arrive from the ERP as either integers or
/// strings depending on the table generation; they are normalized to text
/// on extraction and never originated locally.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub codigo: String,
    pub nome: String,
    pub cnpj_cpf: Option<String>,
    pub situacao: Option<String>,
    pub contato: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seller {
    pub codigo: String,
    pub nome: String,
    pub cnpj_cpf: Option<String>,
    pub situacao: Option<String>,
    pub contato: Option<String>,
}
