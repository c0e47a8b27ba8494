use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// All 27 Brazilian state codes (26 states + DF). Used to synthesize
/// per-state taxation rows when the ERP lacks the primary CEST table.
pub const BRAZILIAN_STATES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB",
    "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

/// ICMS rule header (regras_icms_cadastro).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalRule {
    pub codigo: String,
    pub descricao: Option<String>,
}

/// Per-state ICMS rule line (regras_icms_itens). The physical table carries
/// a flat sequence code the ERP extraction does not preserve, so the
/// replicator assigns `codigo` manually (max existing + 1).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalRuleItem {
    pub codigo: i32,
    pub cod_regra_icms: String,
    pub uf: String,
    pub st_icms: Option<String>,
    pub aliq_icms: Decimal,
    pub red_icms: Decimal,
}

/// NCM classification header (class_fiscal).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalClassification {
    pub codigo: String,
    pub cod_ncm: Option<String>,
    pub descricao: Option<String>,
}

/// Per-state NCM data (class_fiscal_dados), upsert-keyed on (cod_ncm, uf).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalClassificationData {
    pub cod_ncm: String,
    pub uf: String,
    pub aliq_fcp: Decimal,
    pub aliq_fcpst: Decimal,
    pub aliq_pst: Decimal,
    pub iva: Decimal,
}

/// CEST/IVA taxation (class_fiscal_tributacoes), merge-keyed on (codigo, uf).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalTaxation {
    pub codigo: String,
    pub uf: String,
    pub cest: Option<String>,
    pub iva: Decimal,
}

impl FiscalTaxation {
    /// Synthetic per-state rows derived from an alternate CEST code table
    /// when the primary taxation table is absent. Rates default to zero —
    /// an approximation policy, not a guess.
    pub fn synthesize_for_states(codigo: &str, cest: Option<&str>) -> Vec<FiscalTaxation> {
        BRAZILIAN_STATES
            .iter()
            .map(|uf| FiscalTaxation {
                codigo: codigo.to_string(),
                uf: (*uf).to_string(),
                cest: cest.map(|c| c.to_string()),
                iva: Decimal::ZERO,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_state_list_covers_all_27_ufs() {
        let unique: HashSet<_> = BRAZILIAN_STATES.iter().collect();
        assert_eq!(unique.len(), 27);
        assert!(unique.contains(&"SP"));
        assert!(unique.contains(&"DF"));
    }

    #[test]
    fn test_synthesized_taxation_spans_states_with_zero_rates() {
        let rows = FiscalTaxation::synthesize_for_states("123", Some("01.001.00"));
        assert_eq!(rows.len(), 27);
        assert!(rows.iter().all(|r| r.iva == Decimal::ZERO));
        assert!(rows.iter().all(|r| r.cest.as_deref() == Some("01.001.00")));
    }
}
