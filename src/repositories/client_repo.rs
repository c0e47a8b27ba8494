use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::client::{Client, Seller};

pub struct ClientRepository {
    pool: PgPool,
}

fn map_party(row: &PgRow) -> Result<(String, String, Option<String>, Option<String>, Option<String>)> {
    Ok((
        row.try_get("codigo")?,
        row.try_get("nome")?,
        row.try_get("cnpj_cpf")?,
        row.try_get("situacao")?,
        row.try_get("contato")?,
    ))
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            "SELECT codigo, nome, cnpj_cpf, situacao, contato FROM clientes
             ORDER BY nome LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let (codigo, nome, cnpj_cpf, situacao, contato) = map_party(row)?;
                Ok(Client { codigo, nome, cnpj_cpf, situacao, contato })
            })
            .collect()
    }

    pub async fn find_by_codigo(&self, codigo: &str) -> Result<Client> {
        let row = sqlx::query(
            "SELECT codigo, nome, cnpj_cpf, situacao, contato FROM clientes WHERE codigo = $1",
        )
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cliente {} nao encontrado", codigo)))?;

        let (codigo, nome, cnpj_cpf, situacao, contato) = map_party(&row)?;
        Ok(Client { codigo, nome, cnpj_cpf, situacao, contato })
    }

    pub async fn all(&self) -> Result<Vec<Client>> {
        self.list(i64::MAX, 0).await
    }

    pub async fn list_sellers(&self) -> Result<Vec<Seller>> {
        let rows = sqlx::query(
            "SELECT codigo, nome, cnpj_cpf, situacao, contato FROM vendedores ORDER BY nome",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let (codigo, nome, cnpj_cpf, situacao, contato) = map_party(row)?;
                Ok(Seller { codigo, nome, cnpj_cpf, situacao, contato })
            })
            .collect()
    }
}
