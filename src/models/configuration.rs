use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Gates the stock sufficiency check during quotation -> order conversion.
/// The decrement itself always happens; only the check is conditional.
pub const VALIDATE_STOCK_ORDERS_KEY: &str = "validar_estoque_pedidos";
/// Same gate for quotation creation in the web app.
pub const VALIDATE_STOCK_QUOTATIONS_KEY: &str = "validar_estoque_orcamentos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigValueType {
    String,
    Boolean,
    Number,
}

impl ConfigValueType {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigValueType::String => "string",
            ConfigValueType::Boolean => "boolean",
            ConfigValueType::Number => "number",
        }
    }

    /// Unknown stored types fall back to string, the permissive default.
    pub fn parse(s: &str) -> Self {
        match s {
            "boolean" => ConfigValueType::Boolean,
            "number" => ConfigValueType::Number,
            _ => ConfigValueType::String,
        }
    }
}

/// Value coerced according to the record's stored type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Text(String),
    Boolean(bool),
    Number(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Configuration {
    pub id: i64,
    pub chave: String,
    /// Stored as its string representation regardless of type.
    pub valor: String,
    pub descricao: Option<String>,
    pub tipo: String,
    pub cod_empresa: i32,
}

impl Configuration {
    /// Boolean: case-insensitive "true" comparison. Number: float parse,
    /// zero on garbage. Anything else: the raw string.
    pub fn coerced_value(&self) -> ConfigValue {
        match ConfigValueType::parse(&self.tipo) {
            ConfigValueType::Boolean => ConfigValue::Boolean(self.valor.eq_ignore_ascii_case("true")),
            ConfigValueType::Number => ConfigValue::Number(self.valor.parse().unwrap_or(0.0)),
            ConfigValueType::String => ConfigValue::Text(self.valor.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigurationResponse {
    pub chave: String,
    pub valor: ConfigValue,
    pub descricao: Option<String>,
    pub tipo: String,
    pub cod_empresa: i32,
}

impl From<Configuration> for ConfigurationResponse {
    fn from(config: Configuration) -> Self {
        let valor = config.coerced_value();
        ConfigurationResponse {
            chave: config.chave,
            valor,
            descricao: config.descricao,
            tipo: config.tipo,
            cod_empresa: config.cod_empresa,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetConfigurationRequest {
    pub valor: serde_json::Value,
    pub descricao: Option<String>,
    pub tipo: Option<ConfigValueType>,
}

#[derive(Debug, Deserialize)]
pub struct SetStockValidationRequest {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(valor: &str, tipo: &str) -> Configuration {
        Configuration {
            id: 1,
            chave: "k".to_string(),
            valor: valor.to_string(),
            descricao: None,
            tipo: tipo.to_string(),
            cod_empresa: 1,
        }
    }

    #[test]
    fn test_boolean_coercion_is_case_insensitive() {
        assert_eq!(config("TRUE", "boolean").coerced_value(), ConfigValue::Boolean(true));
        assert_eq!(config("true", "boolean").coerced_value(), ConfigValue::Boolean(true));
        assert_eq!(config("false", "boolean").coerced_value(), ConfigValue::Boolean(false));
        assert_eq!(config("yes", "boolean").coerced_value(), ConfigValue::Boolean(false));
    }

    #[test]
    fn test_number_coercion_parses_floats() {
        assert_eq!(config("2.5", "number").coerced_value(), ConfigValue::Number(2.5));
        assert_eq!(config("garbage", "number").coerced_value(), ConfigValue::Number(0.0));
    }

    #[test]
    fn test_unknown_type_falls_back_to_string() {
        assert_eq!(
            config("abc", "whatever").coerced_value(),
            ConfigValue::Text("abc".to_string())
        );
    }
}
