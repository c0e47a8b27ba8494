use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::middleware::error_handling::Result;
use crate::models::client::{Client, Seller};
use crate::repositories::ClientRepository;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ListClientsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Vec<Client>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let clients = ClientRepository::new(state.config.database_pool.clone())
        .list(limit, offset)
        .await?;
    Ok(Json(clients))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<Client>> {
    let client = ClientRepository::new(state.config.database_pool.clone())
        .find_by_codigo(&codigo)
        .await?;
    Ok(Json(client))
}

pub async fn list_sellers(State(state): State<AppState>) -> Result<Json<Vec<Seller>>> {
    let sellers = ClientRepository::new(state.config.database_pool.clone())
        .list_sellers()
        .await?;
    Ok(Json(sellers))
}
