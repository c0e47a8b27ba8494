use sqlx::{PgPool, Row};

use crate::middleware::error_handling::Result;
use crate::models::company::Company;

pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Option<Company>> {
        let row = sqlx::query(
            "SELECT codigo, razao_social, nome_fantasia, cnpj FROM empresas ORDER BY codigo LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Company {
                codigo: row.try_get("codigo")?,
                razao_social: row.try_get("razao_social")?,
                nome_fantasia: row.try_get("nome_fantasia")?,
                cnpj: row.try_get("cnpj")?,
            })
        })
        .transpose()
    }
}
