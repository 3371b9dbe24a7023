//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity
///
/// Never physically deleted: deletion clears `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub cost_price: f64,
    /// Tax rate in percentage (e.g., 15.0 = 15%)
    pub tax_rate: f64,
    pub stock_quantity: i64,
    pub unit: String,
    pub category: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create product payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCreate {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub cost_price: Option<f64>,
    pub tax_rate: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub unit: Option<String>,
    pub category: Option<String>,
}

/// Update product payload (absent fields are left untouched)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub cost_price: Option<f64>,
    pub tax_rate: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

/// Manual stock correction (receiving goods, breakage, counting)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StockAdjustment {
    pub id: i64,
    pub product_id: i64,
    pub quantity_change: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: i64,
}

/// Stock adjustment payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentCreate {
    pub product_id: i64,
    /// Signed delta applied to `stock_quantity`
    pub quantity_change: i64,
    pub reason: String,
    pub notes: Option<String>,
}
