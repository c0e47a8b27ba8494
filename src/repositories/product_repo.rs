use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::product::{Product, UpdateProductRequest};

const PRODUCT_COLUMNS: &str = "codigo, descricao, preco_venda, estoque, situacao, \
     cod_class_fiscal, aliq_ipi, aliq_icms, cod_regra_icms, cod_origem_prod";

pub struct ProductRepository {
    pool: PgPool,
}

fn map_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        codigo: row.try_get("codigo")?,
        descricao: row.try_get("descricao")?,
        preco_venda: row.try_get("preco_venda")?,
        estoque: row.try_get("estoque")?,
        situacao: row.try_get("situacao")?,
        cod_class_fiscal: row.try_get("cod_class_fiscal")?,
        aliq_ipi: row.try_get("aliq_ipi")?,
        aliq_icms: row.try_get("aliq_icms")?,
        cod_regra_icms: row.try_get("cod_regra_icms")?,
        cod_origem_prod: row.try_get("cod_origem_prod")?,
    })
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_codigo(&self, codigo: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM produtos WHERE codigo = $1",
            PRODUCT_COLUMNS
        ))
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_product).transpose()
    }

    pub async fn search(
        &self,
        descricao: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>> {
        let rows = match descricao {
            Some(filter) => {
                sqlx::query(&format!(
                    "SELECT {} FROM produtos WHERE descricao ILIKE $1
                     ORDER BY descricao LIMIT $2 OFFSET $3",
                    PRODUCT_COLUMNS
                ))
                .bind(format!("%{}%", filter))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM produtos ORDER BY descricao LIMIT $1 OFFSET $2",
                    PRODUCT_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(map_product).collect()
    }

    pub async fn all(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!("SELECT {} FROM produtos ORDER BY codigo", PRODUCT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_product).collect()
    }

    pub async fn update(&self, codigo: &str, request: &UpdateProductRequest) -> Result<Product> {
        use sqlx::QueryBuilder;

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE produtos SET ");
        let mut has_fields = false;

        if let Some(preco_venda) = request.preco_venda {
            query_builder.push("preco_venda = ");
            query_builder.push_bind(preco_venda);
            has_fields = true;
        }

        if let Some(estoque) = request.estoque {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("estoque = ");
            query_builder.push_bind(estoque);
            has_fields = true;
        }

        if let Some(ref situacao) = request.situacao {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("situacao = ");
            query_builder.push_bind(situacao);
            has_fields = true;
        }

        if !has_fields {
            return self
                .find_by_codigo(codigo)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Produto {} nao encontrado", codigo)));
        }

        query_builder.push(" WHERE codigo = ");
        query_builder.push_bind(codigo);
        query_builder.push(format!(" RETURNING {}", PRODUCT_COLUMNS));

        let row = query_builder
            .build()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Produto {} nao encontrado", codigo)))?;

        map_product(&row)
    }

    /// Stock decrement inside the conversion transaction. Stock may go
    /// negative when the validation flag is off; the sufficiency check, when
    /// enabled, runs before any decrement.
    pub async fn decrement_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        codigo: &str,
        quantidade: Decimal,
    ) -> Result<()> {
        sqlx::query("UPDATE produtos SET estoque = estoque - $1 WHERE codigo = $2")
            .bind(quantidade)
            .bind(codigo)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
