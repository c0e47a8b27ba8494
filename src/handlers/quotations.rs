use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::Validate;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::order::ConvertQuotationRequest;
use crate::models::quotation::{
    CreateQuotationRequest, ListQuotationsQuery, Quotation, QuotationWithItems,
    UpdateQuotationRequest,
};
use crate::services::{ConversionService, QuotationService};

use super::AppState;

fn quotation_service(state: &AppState) -> QuotationService {
    QuotationService::new(state.config.database_pool.clone())
}

pub async fn create_quotation(
    State(state): State<AppState>,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<Quotation>)> {
    request.validate()?;

    let quotation = quotation_service(&state).create(request).await?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn list_quotations(
    State(state): State<AppState>,
    Query(query): Query<ListQuotationsQuery>,
) -> Result<Json<Vec<Quotation>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let quotations = quotation_service(&state)
        .list(query.status.as_deref(), query.cod_cliente.as_deref(), limit, offset)
        .await?;
    Ok(Json(quotations))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<QuotationWithItems>> {
    let quotation = quotation_service(&state).get_with_items(&codigo).await?;
    Ok(Json(quotation))
}

pub async fn update_quotation(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
    Json(request): Json<UpdateQuotationRequest>,
) -> Result<Json<Quotation>> {
    request.validate()?;

    let quotation = quotation_service(&state).update(&codigo, request).await?;
    Ok(Json(quotation))
}

pub async fn delete_quotation(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<StatusCode> {
    quotation_service(&state).delete(&codigo).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The convert contract answers `{ success, pedido_codigo }` on success and
/// `{ success: false, message }` on failure, so errors are mapped here
/// instead of through the default AppError response body.
pub async fn convert_quotation(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
    request: Option<Json<ConvertQuotationRequest>>,
) -> Response {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let service = ConversionService::new(
        state.config.database_pool.clone(),
        state.config.erp_pool.clone(),
        state.resolver.clone(),
    );

    match service.convert(&codigo, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            let (status, message) = match &err {
                AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                AppError::Internal(inner) => {
                    tracing::error!("Conversion of {} failed: {:?}", codigo, inner);
                    (StatusCode::INTERNAL_SERVER_ERROR, inner.to_string())
                }
                other => {
                    tracing::error!("Conversion of {} failed: {:?}", codigo, other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Erro interno ao converter orcamento".to_string(),
                    )
                }
            };

            (status, Json(json!({ "success": false, "message": message }))).into_response()
        }
    }
}
