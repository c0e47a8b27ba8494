use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDirection {
    FromErp,
    ToErp,
}

impl SyncDirection {
    pub fn as_str(&self) -> &str {
        match self {
            SyncDirection::FromErp => "FROM_ERP",
            SyncDirection::ToErp => "TO_ERP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Success,
    Pending,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Pending => "PENDING",
            SyncStatus::Failed => "FAILED",
        }
    }
}

/// Append-only audit row. Updated in place only to finalize a conversion's
/// PENDING entry to SUCCESS or FAILED.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncLogEntry {
    pub id: i64,
    pub data_sincronizacao: DateTime<Utc>,
    pub direcao: String,
    pub status: String,
    pub tipo_entidade: Option<String>,
    pub entidade_id: Option<String>,
    pub mensagem: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    #[serde(rename = "lastSyncFromERP")]
    pub last_sync_from_erp: Option<DateTime<Utc>>,
    #[serde(rename = "lastSyncToERP")]
    pub last_sync_to_erp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SyncMessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSyncLogsQuery {
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_as_str() {
        assert_eq!(SyncDirection::FromErp.as_str(), "FROM_ERP");
        assert_eq!(SyncDirection::ToErp.as_str(), "TO_ERP");
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(SyncStatus::Success.as_str(), "SUCCESS");
        assert_eq!(SyncStatus::Pending.as_str(), "PENDING");
        assert_eq!(SyncStatus::Failed.as_str(), "FAILED");
    }
}
