use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Width of the numeric order code shared by the local and ERP order tables.
pub const ORDER_CODE_WIDTH: usize = 6;

/// Zero-padded order code, e.g. 137 -> "000137".
pub fn format_order_code(n: i64) -> String {
    format!("{:0width$}", n, width = ORDER_CODE_WIDTH)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalesOrder {
    pub codigo: String,
    /// FK to the originating quotation; at most one order per quotation.
    pub orcamento_origem: String,
    pub cod_cliente: String,
    pub cod_vendedor: Option<String>,
    pub cod_transportadora: Option<String>,
    pub vl_produtos: Decimal,
    pub vl_desconto: Decimal,
    pub vl_total: Decimal,
    pub cod_forma_pagto: Option<String>,
    pub cod_cond_pagto: Option<String>,
    pub status: String,
    pub dt_criacao: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalesOrderItem {
    pub pedido_codigo: String,
    pub produto_codigo: String,
    pub quantidade: Decimal,
    pub vl_unitario: Decimal,
    pub vl_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SalesOrderWithItems {
    #[serde(flatten)]
    pub pedido: SalesOrder,
    pub itens: Vec<SalesOrderItem>,
}

/// Body of POST /api/quotations/:id/convert. Request-supplied payment and
/// carrier codes take precedence over the ones stored on the quotation.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuotationRequest {
    pub cod_forma_pagto: Option<String>,
    pub cod_cond_pagto: Option<String>,
    pub cod_transportadora: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConvertQuotationResponse {
    pub success: bool,
    pub pedido_codigo: String,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub cod_cliente: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_order_code_zero_pads_to_six_digits() {
        assert_eq!(format_order_code(1), "000001");
        assert_eq!(format_order_code(137), "000137");
        assert_eq!(format_order_code(999999), "999999");
    }

    #[test]
    fn test_format_order_code_beyond_width_keeps_digits() {
        assert_eq!(format_order_code(1234567), "1234567");
    }
}
