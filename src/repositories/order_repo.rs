use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::middleware::error_handling::Result;
use crate::models::order::{SalesOrder, SalesOrderItem};

const ORDER_COLUMNS: &str = "codigo, orcamento_origem, cod_cliente, cod_vendedor, \
     cod_transportadora, vl_produtos, vl_desconto, vl_total, cod_forma_pagto, cod_cond_pagto, \
     status, dt_criacao";

pub struct OrderRepository {
    pool: PgPool,
}

fn map_order(row: &PgRow) -> Result<SalesOrder> {
    Ok(SalesOrder {
        codigo: row.try_get("codigo")?,
        orcamento_origem: row.try_get("orcamento_origem")?,
        cod_cliente: row.try_get("cod_cliente")?,
        cod_vendedor: row.try_get("cod_vendedor")?,
        cod_transportadora: row.try_get("cod_transportadora")?,
        vl_produtos: row.try_get("vl_produtos")?,
        vl_desconto: row.try_get("vl_desconto")?,
        vl_total: row.try_get("vl_total")?,
        cod_forma_pagto: row.try_get("cod_forma_pagto")?,
        cod_cond_pagto: row.try_get("cod_cond_pagto")?,
        status: row.try_get("status")?,
        dt_criacao: row.try_get("dt_criacao")?,
    })
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotency guard for conversion: at most one order per quotation.
    pub async fn find_by_origem(&self, orcamento_codigo: &str) -> Result<Option<SalesOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pedidos WHERE orcamento_origem = $1",
            ORDER_COLUMNS
        ))
        .bind(orcamento_codigo)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_order).transpose()
    }

    pub async fn find_by_codigo(&self, codigo: &str) -> Result<Option<SalesOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pedidos WHERE codigo = $1",
            ORDER_COLUMNS
        ))
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_order).transpose()
    }

    pub async fn list(
        &self,
        cod_cliente: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SalesOrder>> {
        let rows = match cod_cliente {
            Some(cliente) => {
                sqlx::query(&format!(
                    "SELECT {} FROM pedidos WHERE cod_cliente = $1
                     ORDER BY dt_criacao DESC LIMIT $2 OFFSET $3",
                    ORDER_COLUMNS
                ))
                .bind(cliente)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM pedidos ORDER BY dt_criacao DESC LIMIT $1 OFFSET $2",
                    ORDER_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(map_order).collect()
    }

    pub async fn items_for(&self, pedido_codigo: &str) -> Result<Vec<SalesOrderItem>> {
        let rows = sqlx::query(
            "SELECT pedido_codigo, produto_codigo, quantidade, vl_unitario, vl_total
             FROM pedidos_itens WHERE pedido_codigo = $1 ORDER BY produto_codigo",
        )
        .bind(pedido_codigo)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SalesOrderItem {
                    pedido_codigo: row.try_get("pedido_codigo")?,
                    produto_codigo: row.try_get("produto_codigo")?,
                    quantidade: row.try_get("quantidade")?,
                    vl_unitario: row.try_get("vl_unitario")?,
                    vl_total: row.try_get("vl_total")?,
                })
            })
            .collect()
    }

    /// Highest local order code as an integer; codes are zero-padded
    /// numeric strings.
    pub async fn max_code(&self) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(codigo::bigint), 0) AS max_codigo FROM pedidos",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("max_codigo")?)
    }

    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>, order: &SalesOrder) -> Result<()> {
        sqlx::query(
            "INSERT INTO pedidos (codigo, orcamento_origem, cod_cliente, cod_vendedor,
                                  cod_transportadora, vl_produtos, vl_desconto, vl_total,
                                  cod_forma_pagto, cod_cond_pagto, status, dt_criacao)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&order.codigo)
        .bind(&order.orcamento_origem)
        .bind(&order.cod_cliente)
        .bind(&order.cod_vendedor)
        .bind(&order.cod_transportadora)
        .bind(order.vl_produtos)
        .bind(order.vl_desconto)
        .bind(order.vl_total)
        .bind(&order.cod_forma_pagto)
        .bind(&order.cod_cond_pagto)
        .bind(&order.status)
        .bind(order.dt_criacao)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn insert_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        item: &SalesOrderItem,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO pedidos_itens (pedido_codigo, produto_codigo, quantidade, vl_unitario, vl_total)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&item.pedido_codigo)
        .bind(&item.produto_codigo)
        .bind(item.quantidade)
        .bind(item.vl_unitario)
        .bind(item.vl_total)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
