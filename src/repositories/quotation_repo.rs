use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::quotation::{
    CreateQuotationRequest, Quotation, QuotationItem, UpdateQuotationRequest, STATUS_PENDENTE,
};

const QUOTATION_COLUMNS: &str = "codigo, cod_cliente, cod_vendedor, dt_orcamento, vl_produtos, \
     vl_servicos, vl_frete, vl_desconto, vl_impostos, vl_total, status, cod_forma_pagto, \
     cod_cond_pagto, cod_transportadora, dt_conversao";

const ITEM_COLUMNS: &str = "codigo, orcamento_codigo, produto_codigo, quantidade, vl_unitario, \
     vl_bruto, vl_desconto, vl_liquido, vl_ipi, vl_icms";

pub struct QuotationRepository {
    pool: PgPool,
}

fn map_quotation(row: &PgRow) -> Result<Quotation> {
    Ok(Quotation {
        codigo: row.try_get("codigo")?,
        cod_cliente: row.try_get("cod_cliente")?,
        cod_vendedor: row.try_get("cod_vendedor")?,
        dt_orcamento: row.try_get("dt_orcamento")?,
        vl_produtos: row.try_get("vl_produtos")?,
        vl_servicos: row.try_get("vl_servicos")?,
        vl_frete: row.try_get("vl_frete")?,
        vl_desconto: row.try_get("vl_desconto")?,
        vl_impostos: row.try_get("vl_impostos")?,
        vl_total: row.try_get("vl_total")?,
        status: row.try_get("status")?,
        cod_forma_pagto: row.try_get("cod_forma_pagto")?,
        cod_cond_pagto: row.try_get("cod_cond_pagto")?,
        cod_transportadora: row.try_get("cod_transportadora")?,
        dt_conversao: row.try_get("dt_conversao")?,
    })
}

fn map_item(row: &PgRow) -> Result<QuotationItem> {
    Ok(QuotationItem {
        codigo: row.try_get("codigo")?,
        orcamento_codigo: row.try_get("orcamento_codigo")?,
        produto_codigo: row.try_get("produto_codigo")?,
        quantidade: row.try_get("quantidade")?,
        vl_unitario: row.try_get("vl_unitario")?,
        vl_bruto: row.try_get("vl_bruto")?,
        vl_desconto: row.try_get("vl_desconto")?,
        vl_liquido: row.try_get("vl_liquido")?,
        vl_ipi: row.try_get("vl_ipi")?,
        vl_icms: row.try_get("vl_icms")?,
    })
}

impl QuotationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_codigo(&self, codigo: &str) -> Result<Option<Quotation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orcamentos WHERE codigo = $1",
            QUOTATION_COLUMNS
        ))
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_quotation).transpose()
    }

    pub async fn list(
        &self,
        status: Option<&str>,
        cod_cliente: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Quotation>> {
        use sqlx::QueryBuilder;

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM orcamentos WHERE 1 = 1",
            QUOTATION_COLUMNS
        ));

        if let Some(status) = status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        if let Some(cod_cliente) = cod_cliente {
            query_builder.push(" AND cod_cliente = ");
            query_builder.push_bind(cod_cliente);
        }

        query_builder.push(" ORDER BY dt_orcamento DESC LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_quotation).collect()
    }

    pub async fn all(&self) -> Result<Vec<Quotation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orcamentos ORDER BY codigo",
            QUOTATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_quotation).collect()
    }

    pub async fn items_for(&self, orcamento_codigo: &str) -> Result<Vec<QuotationItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orcamentos_itens WHERE orcamento_codigo = $1 ORDER BY codigo",
            ITEM_COLUMNS
        ))
        .bind(orcamento_codigo)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_item).collect()
    }

    pub async fn all_items(&self) -> Result<Vec<QuotationItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orcamentos_itens ORDER BY codigo",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_item).collect()
    }

    pub async fn create(
        &self,
        codigo: &str,
        request: &CreateQuotationRequest,
        totals: QuotationTotals,
    ) -> Result<Quotation> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO orcamentos (codigo, cod_cliente, cod_vendedor, dt_orcamento,
                                     vl_produtos, vl_servicos, vl_frete, vl_desconto, vl_impostos,
                                     vl_total, status, cod_forma_pagto, cod_cond_pagto, cod_transportadora)
             VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {}",
            QUOTATION_COLUMNS
        ))
        .bind(codigo)
        .bind(&request.cod_cliente)
        .bind(&request.cod_vendedor)
        .bind(totals.vl_produtos)
        .bind(totals.vl_servicos)
        .bind(totals.vl_frete)
        .bind(totals.vl_desconto)
        .bind(totals.vl_impostos)
        .bind(totals.vl_total)
        .bind(STATUS_PENDENTE)
        .bind(&request.cod_forma_pagto)
        .bind(&request.cod_cond_pagto)
        .bind(&request.cod_transportadora)
        .fetch_one(&mut *tx)
        .await?;

        for item in &request.itens {
            sqlx::query(
                "INSERT INTO orcamentos_itens (orcamento_codigo, produto_codigo, quantidade,
                                               vl_unitario, vl_bruto, vl_desconto, vl_liquido, vl_ipi, vl_icms)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(codigo)
            .bind(&item.produto_codigo)
            .bind(item.quantidade)
            .bind(item.vl_unitario)
            .bind(item.vl_bruto)
            .bind(item.vl_desconto)
            .bind(item.vl_liquido)
            .bind(item.vl_ipi)
            .bind(item.vl_icms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        map_quotation(&row)
    }

    pub async fn update(&self, codigo: &str, request: &UpdateQuotationRequest) -> Result<Quotation> {
        use sqlx::QueryBuilder;

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE orcamentos SET ");
        let mut has_fields = false;

        if let Some(ref cod_vendedor) = request.cod_vendedor {
            query_builder.push("cod_vendedor = ");
            query_builder.push_bind(cod_vendedor);
            has_fields = true;
        }

        if let Some(vl_frete) = request.vl_frete {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("vl_frete = ");
            query_builder.push_bind(vl_frete);
            has_fields = true;
        }

        if let Some(vl_desconto) = request.vl_desconto {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("vl_desconto = ");
            query_builder.push_bind(vl_desconto);
            has_fields = true;
        }

        if let Some(ref cod_forma_pagto) = request.cod_forma_pagto {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("cod_forma_pagto = ");
            query_builder.push_bind(cod_forma_pagto);
            has_fields = true;
        }

        if let Some(ref cod_cond_pagto) = request.cod_cond_pagto {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("cod_cond_pagto = ");
            query_builder.push_bind(cod_cond_pagto);
            has_fields = true;
        }

        if let Some(ref cod_transportadora) = request.cod_transportadora {
            if has_fields {
                query_builder.push(", ");
            }
            query_builder.push("cod_transportadora = ");
            query_builder.push_bind(cod_transportadora);
            has_fields = true;
        }

        if !has_fields {
            return self
                .find_by_codigo(codigo)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Orcamento {} nao encontrado", codigo)));
        }

        query_builder.push(" WHERE codigo = ");
        query_builder.push_bind(codigo);
        query_builder.push(format!(" RETURNING {}", QUOTATION_COLUMNS));

        let row = query_builder
            .build()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Orcamento {} nao encontrado", codigo)))?;

        map_quotation(&row)
    }

    pub async fn delete(&self, codigo: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM orcamentos_itens WHERE orcamento_codigo = $1")
            .bind(codigo)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM orcamentos WHERE codigo = $1")
            .bind(codigo)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Orcamento {} nao encontrado", codigo)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Conversion-time status transition. Carrier and payment fields are
    /// backfilled only where the quotation had no value and the request
    /// supplied one.
    pub async fn mark_converted(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        codigo: &str,
        converted_at: DateTime<Utc>,
        cod_forma_pagto: Option<&str>,
        cod_cond_pagto: Option<&str>,
        cod_transportadora: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE orcamentos
             SET status = $2,
                 dt_conversao = $3,
                 cod_forma_pagto = COALESCE(cod_forma_pagto, $4),
                 cod_cond_pagto = COALESCE(cod_cond_pagto, $5),
                 cod_transportadora = COALESCE(cod_transportadora, $6)
             WHERE codigo = $1",
        )
        .bind(codigo)
        .bind(crate::models::quotation::STATUS_CONVERTIDO)
        .bind(converted_at)
        .bind(cod_forma_pagto)
        .bind(cod_cond_pagto)
        .bind(cod_transportadora)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// Totals computed by the service layer before insert.
#[derive(Debug, Clone, Copy)]
pub struct QuotationTotals {
    pub vl_produtos: rust_decimal::Decimal,
    pub vl_servicos: rust_decimal::Decimal,
    pub vl_frete: rust_decimal::Decimal,
    pub vl_desconto: rust_decimal::Decimal,
    pub vl_impostos: rust_decimal::Decimal,
    pub vl_total: rust_decimal::Decimal,
}
