// Conversion and sync rules that hold without a live database: value
// fallback ordering, order code formatting, schema candidate priority,
// configuration coercion and the taxation state fallback.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use erp_sales_bridge::models::configuration::{ConfigValue, Configuration};
use erp_sales_bridge::models::fiscal::{FiscalTaxation, BRAZILIAN_STATES};
use erp_sales_bridge::models::order::format_order_code;
use erp_sales_bridge::models::quotation::QuotationItem;
use erp_sales_bridge::services::conversion_service::insufficient_stock_message;
use erp_sales_bridge::services::erp::ErpEntity;

fn item(
    quantidade: Decimal,
    vl_unitario: Decimal,
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
fn discounted_value_priority_prefers_net_over_everything() {
    // net 90, gross 100, discount 5, unit*qty 100 -> net wins
    let it = item(dec!(10), dec!(10), Some(dec!(100)), Some(dec!(5)), Some(dec!(90)));
    assert_eq!(it.discounted_value(), dec!(90));
}

#[test]
fn discounted_value_with_only_unit_and_quantity() {
    let it = item(dec!(10), dec!(10), None, None, None);
    assert_eq!(it.discounted_value(), dec!(100));
}

#[test]
fn discounted_total_accumulates_across_lines() {
    let items = [
        item(dec!(2), dec!(50), Some(dec!(100)), Some(dec!(10)), None),
        item(dec!(1), dec!(30), None, None, Some(dec!(25))),
        item(dec!(3), dec!(10), None, None, None),
    ];
    let total: Decimal = items.iter().map(|i| i.discounted_value()).sum();
    assert_eq!(total, dec!(90) + dec!(25) + dec!(30));
}

#[test]
fn order_codes_are_six_digit_zero_padded_and_increasing() {
    let base = 137i64;
    let codes: Vec<String> = (0..5).map(|n| format_order_code(base + n)).collect();
    assert_eq!(codes[0], "000137");
    assert_eq!(codes[4], "000141");

    let mut sorted = codes.clone();
    sorted.sort();
    // Zero padding keeps lexicographic and numeric order aligned.
    assert_eq!(sorted, codes);
}

#[test]
fn order_table_candidates_include_every_known_generation() {
    let candidates = ErpEntity::Orders.table_candidates();
    for expected in [
        "pedidos_venda",
        "mob_pedidos_venda",
        "pedidos",
        "pedido_venda",
        "vendas",
        "pedidos_vendas",
    ] {
        assert!(candidates.contains(&expected), "missing candidate {}", expected);
    }
    // "vendas" is a fallback, never the preferred resolution.
    assert!(
        candidates.iter().position(|c| *c == "vendas").unwrap()
            > candidates.iter().position(|c| *c == "pedidos_venda").unwrap()
    );
}

#[test]
fn boolean_configuration_round_trips_through_string_storage() {
    let stored = Configuration {
        id: 1,
        chave: "validar_estoque_pedidos".to_string(),
        valor: "true".to_string(),
        descricao: None,
        tipo: "boolean".to_string(),
        cod_empresa: 1,
    };
    assert_eq!(stored.coerced_value(), ConfigValue::Boolean(true));
}

#[test]
fn insufficient_stock_error_lists_every_shortage() {
    let msg = insufficient_stock_message(&[
        "Produto A (disponivel 5, solicitado 10)".to_string(),
        "Produto B (disponivel 1, solicitado 3)".to_string(),
    ]);
    assert!(msg.contains("Produto A"));
    assert!(msg.contains("Produto B"));
}

#[test]
fn taxation_fallback_crosses_codes_with_all_states() {
    let rows = FiscalTaxation::synthesize_for_states("42", Some("01.001.00"));
    assert_eq!(rows.len(), BRAZILIAN_STATES.len());
    assert!(rows.iter().all(|r| r.codigo == "42" && r.iva == Decimal::ZERO));
}
