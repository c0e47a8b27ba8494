use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::quotation::{
    CreateQuotationRequest, Quotation, QuotationWithItems, UpdateQuotationRequest,
};
use crate::repositories::quotation_repo::QuotationTotals;
use crate::repositories::{OrderRepository, QuotationRepository};

pub struct QuotationService {
    quotation_repo: QuotationRepository,
    order_repo: OrderRepository,
}

impl QuotationService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            quotation_repo: QuotationRepository::new(pool.clone()),
            order_repo: OrderRepository::new(pool),
        }
    }

    pub async fn create(&self, request: CreateQuotationRequest) -> Result<Quotation> {
        let codigo = request
            .codigo
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if self.quotation_repo.find_by_codigo(&codigo).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "Orcamento {} ja existe",
                codigo
            )));
        }

        let vl_produtos: Decimal = request
            .itens
            .iter()
            .map(|item| {
                item.vl_bruto
                    .unwrap_or(item.vl_unitario * item.quantidade)
            })
            .sum();
        let vl_servicos = request.vl_servicos.unwrap_or(Decimal::ZERO);
        let vl_frete = request.vl_frete.unwrap_or(Decimal::ZERO);
        let vl_desconto = request.vl_desconto.unwrap_or(Decimal::ZERO);
        let vl_impostos = request.vl_impostos.unwrap_or(Decimal::ZERO);
        let vl_total = vl_produtos + vl_servicos + vl_frete + vl_impostos - vl_desconto;

        self.quotation_repo
            .create(
                &codigo,
                &request,
                QuotationTotals {
                    vl_produtos,
                    vl_servicos,
                    vl_frete,
                    vl_desconto,
                    vl_impostos,
                    vl_total,
                },
            )
            .await
    }

    pub async fn get_with_items(&self, codigo: &str) -> Result<QuotationWithItems> {
        let orcamento = self
            .quotation_repo
            .find_by_codigo(codigo)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Orcamento {} nao encontrado", codigo)))?;
        let itens = self.quotation_repo.items_for(codigo).await?;

        Ok(QuotationWithItems { orcamento, itens })
    }

    pub async fn list(
        &self,
        status: Option<&str>,
        cod_cliente: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Quotation>> {
        self.quotation_repo
            .list(status, cod_cliente, limit, offset)
            .await
    }

    /// Converted quotations are frozen: their items back an order.
    pub async fn update(&self, codigo: &str, request: UpdateQuotationRequest) -> Result<Quotation> {
        let quotation = self
            .quotation_repo
            .find_by_codigo(codigo)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Orcamento {} nao encontrado", codigo)))?;

        if quotation.is_converted() {
            return Err(AppError::BadRequest(format!(
                "Orcamento {} ja foi convertido e nao pode ser alterado",
                codigo
            )));
        }

        self.quotation_repo.update(codigo, &request).await
    }

    pub async fn delete(&self, codigo: &str) -> Result<()> {
        if let Some(order) = self.order_repo.find_by_origem(codigo).await? {
            return Err(AppError::BadRequest(format!(
                "Orcamento {} referenciado pelo pedido {} e nao pode ser excluido",
                codigo, order.codigo
            )));
        }

        self.quotation_repo.delete(codigo).await
    }
}
