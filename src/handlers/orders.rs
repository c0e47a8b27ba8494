use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::order::{ListOrdersQuery, SalesOrder, SalesOrderWithItems};
use crate::repositories::OrderRepository;

use super::AppState;

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<SalesOrder>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let orders = OrderRepository::new(state.config.database_pool.clone())
        .list(query.cod_cliente.as_deref(), limit, offset)
        .await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<SalesOrderWithItems>> {
    let repo = OrderRepository::new(state.config.database_pool.clone());

    let pedido = repo
        .find_by_codigo(&codigo)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pedido {} nao encontrado", codigo)))?;
    let itens = repo.items_for(&codigo).await?;

    Ok(Json(SalesOrderWithItems { pedido, itens }))
}
