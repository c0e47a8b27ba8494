use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::product::{Product, SearchProductsQuery, UpdateProductRequest};
use crate::repositories::ProductRepository;

use super::AppState;

pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchProductsQuery>,
) -> Result<Json<Vec<Product>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let products = ProductRepository::new(state.config.database_pool.clone())
        .search(query.descricao.as_deref(), limit, offset)
        .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.config.database_pool.clone())
        .find_by_codigo(&codigo)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Produto {} nao encontrado", codigo)))?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>> {
    request.validate()?;

    let product = ProductRepository::new(state.config.database_pool.clone())
        .update(&codigo, &request)
        .await?;
    Ok(Json(product))
}
