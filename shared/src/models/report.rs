//! Report Models

use serde::{Deserialize, Serialize};

/// Aggregated sales over a time range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total_orders: i64,
    pub total_revenue: f64,
    pub total_tax: f64,
    pub total_discounts: f64,
    pub average_order_value: f64,
}

/// Best seller row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TopProduct {
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: String,
    pub total_sold: i64,
    pub revenue: f64,
}

/// Sales report (summary + top 10 products)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReport {
    pub summary: SalesSummary,
    pub top_products: Vec<TopProduct>,
}

/// Profit report: revenue − cost of goods − expenses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitReport {
    pub revenue: f64,
    pub cogs: f64,
    pub expenses: f64,
    pub profit: f64,
}
