//! Expense Model

use serde::{Deserialize, Serialize};

/// Expense entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub notes: Option<String>,
    /// Day the expense applies to (Unix millis)
    pub expense_date: i64,
    pub created_at: i64,
}

/// Create expense payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseCreate {
    pub title: String,
    pub amount: f64,
    pub category: Option<String>,
    pub notes: Option<String>,
    /// Defaults to now
    pub expense_date: Option<i64>,
}
