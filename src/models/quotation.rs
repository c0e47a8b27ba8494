use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const STATUS_PENDENTE: &str = "PENDENTE";
pub const STATUS_CONVERTIDO: &str = "CONVERTIDO";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quotation {
    /// UUID for locally created quotations, ERP-assigned code for synced ones.
    pub codigo: String,
    pub cod_cliente: String,
    pub cod_vendedor: Option<String>,
    pub dt_orcamento: DateTime<Utc>,
    pub vl_produtos: Decimal,
    pub vl_servicos: Decimal,
    pub vl_frete: Decimal,
    pub vl_desconto: Decimal,
    pub vl_impostos: Decimal,
    pub vl_total: Decimal,
    pub status: String,
    pub cod_forma_pagto: Option<String>,
    pub cod_cond_pagto: Option<String>,
    pub cod_transportadora: Option<String>,
    pub dt_conversao: Option<DateTime<Utc>>,
}

impl Quotation {
    pub fn is_converted(&self) -> bool {
        self.status == STATUS_CONVERTIDO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotationItem {
    pub codigo: i64,
    pub orcamento_codigo: String,
    pub produto_codigo: String,
    pub quantidade: Decimal,
    pub vl_unitario: Decimal,
    pub vl_bruto: Option<Decimal>,
    pub vl_desconto: Option<Decimal>,
    pub vl_liquido: Option<Decimal>,
    pub vl_ipi: Option<Decimal>,
    pub vl_icms: Option<Decimal>,
}

impl QuotationItem {
    /// Line value carried into the ERP order write. Depending on how the
    /// quotation was built upstream, only a subset of the value fields is
    /// populated; the first known value wins:
    /// net value, then gross minus discount, then gross, then unit x qty.
    pub fn discounted_value(&self) -> Decimal {
        if let Some(liquido) = self.vl_liquido {
            return liquido;
        }
        if let Some(bruto) = self.vl_bruto {
            return bruto - self.vl_desconto.unwrap_or(Decimal::ZERO);
        }
        self.vl_unitario * self.quantidade
    }
}

#[derive(Debug, Serialize)]
pub struct QuotationWithItems {
    #[serde(flatten)]
    pub orcamento: Quotation,
    pub itens: Vec<QuotationItem>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationItemRequest {
    #[validate(length(min = 1, message = "Product code required"))]
    pub produto_codigo: String,
    pub quantidade: Decimal,
    pub vl_unitario: Decimal,
    pub vl_bruto: Option<Decimal>,
    pub vl_desconto: Option<Decimal>,
    pub vl_liquido: Option<Decimal>,
    pub vl_ipi: Option<Decimal>,
    pub vl_icms: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationRequest {
    /// Optional explicit code; a v4 UUID is assigned when absent.
    pub codigo: Option<String>,
    #[validate(length(min = 1, message = "Client code required"))]
    pub cod_cliente: String,
    pub cod_vendedor: Option<String>,
    pub vl_servicos: Option<Decimal>,
    pub vl_frete: Option<Decimal>,
    pub vl_desconto: Option<Decimal>,
    pub vl_impostos: Option<Decimal>,
    pub cod_forma_pagto: Option<String>,
    pub cod_cond_pagto: Option<String>,
    pub cod_transportadora: Option<String>,
    #[validate(length(min = 1, message = "At least one item required"), nested)]
    pub itens: Vec<CreateQuotationItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuotationRequest {
    pub cod_vendedor: Option<String>,
    pub vl_frete: Option<Decimal>,
    pub vl_desconto: Option<Decimal>,
    pub cod_forma_pagto: Option<String>,
    pub cod_cond_pagto: Option<String>,
    pub cod_transportadora: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuotationsQuery {
    pub status: Option<String>,
    pub cod_cliente: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(
        vl_unitario: Decimal,
        quantidade: Decimal,
        vl_bruto: Option<Decimal>,
        vl_desconto: Option<Decimal>,
        vl_liquido: Option<Decimal>,
    ) -> QuotationItem {
        QuotationItem {
            codigo: 1,
            orcamento_codigo: "Q1".to_string(),
            produto_codigo: "P1".to_string(),
            quantidade,
            vl_unitario,
            vl_bruto,
            vl_desconto,
            vl_liquido,
            vl_ipi: None,
            vl_icms: None,
        }
    }

    #[test]
    fn test_discounted_value_prefers_net_value() {
        let it = item(dec!(10), dec!(10), Some(dec!(100)), Some(dec!(5)), Some(dec!(90)));
        assert_eq!(it.discounted_value(), dec!(90));
    }

    #[test]
    fn test_discounted_value_falls_back_to_gross_minus_discount() {
        let it = item(dec!(10), dec!(10), Some(dec!(100)), Some(dec!(5)), None);
        assert_eq!(it.discounted_value(), dec!(95));
    }

    #[test]
    fn test_discounted_value_uses_gross_when_no_discount() {
        let it = item(dec!(10), dec!(10), Some(dec!(100)), None, None);
        assert_eq!(it.discounted_value(), dec!(100));
    }

    #[test]
    fn test_discounted_value_last_resort_unit_times_quantity() {
        let it = item(dec!(10), dec!(10), None, None, None);
        assert_eq!(it.discounted_value(), dec!(100));
    }

    #[test]
    fn test_is_converted() {
        let q = Quotation {
            codigo: "Q1".to_string(),
            cod_cliente: "C1".to_string(),
            cod_vendedor: None,
            dt_orcamento: Utc::now(),
            vl_produtos: Decimal::ZERO,
            vl_servicos: Decimal::ZERO,
            vl_frete: Decimal::ZERO,
            vl_desconto: Decimal::ZERO,
            vl_impostos: Decimal::ZERO,
            vl_total: Decimal::ZERO,
            status: STATUS_CONVERTIDO.to_string(),
            cod_forma_pagto: None,
            cod_cond_pagto: None,
            cod_transportadora: None,
            dt_conversao: None,
        };
        assert!(q.is_converted());
    }
}
