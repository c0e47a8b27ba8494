use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::company::DEFAULT_COMPANY_CODE;
use crate::models::configuration::{
    ConfigurationResponse, SetConfigurationRequest, SetStockValidationRequest,
    VALIDATE_STOCK_ORDERS_KEY, VALIDATE_STOCK_QUOTATIONS_KEY,
};
use crate::services::ConfigurationService;

use super::AppState;

fn configuration_service(state: &AppState) -> ConfigurationService {
    ConfigurationService::new(state.config.database_pool.clone())
}

pub async fn get_all_configurations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConfigurationResponse>>> {
    let configs = configuration_service(&state)
        .get_all(DEFAULT_COMPANY_CODE)
        .await?;
    Ok(Json(configs.into_iter().map(Into::into).collect()))
}

pub async fn get_configuration(
    State(state): State<AppState>,
    Path(chave): Path<String>,
) -> Result<Json<ConfigurationResponse>> {
    let config = configuration_service(&state)
        .get(&chave, DEFAULT_COMPANY_CODE)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Configuracao {} nao encontrada", chave)))?;
    Ok(Json(config.into()))
}

pub async fn set_configuration(
    State(state): State<AppState>,
    Path(chave): Path<String>,
    Json(request): Json<SetConfigurationRequest>,
) -> Result<Json<ConfigurationResponse>> {
    let config = configuration_service(&state)
        .set(
            &chave,
            &request.valor,
            request.descricao.as_deref(),
            request.tipo,
            DEFAULT_COMPANY_CODE,
        )
        .await?;
    Ok(Json(config.into()))
}

/// Convenience view of the two stock-validation flags.
pub async fn get_stock_validation_status(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>> {
    let service = configuration_service(&state);
    let orders = service
        .get_bool(VALIDATE_STOCK_ORDERS_KEY, true, DEFAULT_COMPANY_CODE)
        .await?;
    let quotations = service
        .get_bool(VALIDATE_STOCK_QUOTATIONS_KEY, false, DEFAULT_COMPANY_CODE)
        .await?;

    Ok(Json(json!({
        "validar_estoque_pedidos": orders,
        "validar_estoque_orcamentos": quotations,
    })))
}

pub async fn set_stock_validation_orders(
    State(state): State<AppState>,
    Json(request): Json<SetStockValidationRequest>,
) -> Result<Json<ConfigurationResponse>> {
    let config = configuration_service(&state)
        .set(
            VALIDATE_STOCK_ORDERS_KEY,
            &serde_json::Value::Bool(request.enabled),
            None,
            None,
            DEFAULT_COMPANY_CODE,
        )
        .await?;
    Ok(Json(config.into()))
}
