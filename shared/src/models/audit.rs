//! Audit Log Model

use serde::{Deserialize, Serialize};

/// Audited operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    #[serde(rename = "order.commit")]
    OrderCommitted,
    #[serde(rename = "backup.restore")]
    BackupRestored,
    #[serde(rename = "user.create")]
    UserCreated,
    #[serde(rename = "auth.login_failed")]
    LoginFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCommitted => "order.commit",
            Self::BackupRestored => "backup.restore",
            Self::UserCreated => "user.create",
            Self::LoginFailed => "auth.login_failed",
        }
    }
}

/// Audit log row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// JSON document
    pub details: Option<String>,
    pub created_at: i64,
}

/// New audit record
#[derive(Debug, Clone)]
pub struct AuditCreate {
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl AuditCreate {
    pub fn new(action: AuditAction) -> Self {
        Self {
            user_id: None,
            action,
            entity_type: None,
            entity_id: None,
            details: None,
        }
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
