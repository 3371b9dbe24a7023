//! Order Model
//!
//! Row types for `orders`, `order_item` and `payment`, plus the cart
//! payload accepted by the commit engine.

use serde::{Deserialize, Serialize};

/// Order status
///
/// Orders are created `COMPLETED`; `REFUNDED` is reserved for a later
/// status transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Completed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Refunded => "REFUNDED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COMPLETED" => Some(Self::Completed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Order header row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    /// Stored as text, see [`OrderStatus`]
    pub status: String,
    pub subtotal: f64,
    pub discount: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub notes: Option<String>,
    /// Method of the first payment, or `split` for split tender
    pub payment_method: String,
    /// Cashier who rang the sale up
    #[serde(default)]
    pub user_id: Option<i64>,
    pub created_at: i64,
}

/// Order line, a snapshot of the product at time of sale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub tax: f64,
    /// quantity × unit_price, tax excluded
    pub line_total: f64,
}

/// Payment row (an order may carry several: split tender)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount: f64,
    pub method: String,
    pub reference: Option<String>,
    pub created_at: i64,
}

/// Composed read-only view consumed by receipt/invoice rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

// =============================================================================
// Cart payload
// =============================================================================

/// Optional customer fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// One priced cart line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemInput {
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i64,
    pub unit_price: f64,
    /// Tax contribution of the whole line in currency unit
    pub tax: f64,
}

/// One tender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub amount: f64,
    pub method: String,
    pub reference: Option<String>,
}

/// Precomputed aggregate totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
}

/// Fully-priced cart handed to the commit engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartInput {
    #[serde(default)]
    pub customer: Option<CustomerInfo>,
    pub notes: Option<String>,
    pub items: Vec<CartItemInput>,
    pub payments: Vec<PaymentInput>,
    pub totals: CartTotals,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Unpriced cart line, resolved against the catalog by SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineRequest {
    pub sku: String,
    pub quantity: i64,
}

/// Cart as a front end submits it: SKUs and quantities, priced at commit
/// time from the current catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartRequest {
    #[serde(default)]
    pub customer: Option<CustomerInfo>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<CartLineRequest>,
    pub payments: Vec<PaymentInput>,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub shipping: f64,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedOrder {
    pub order_id: i64,
    pub order_number: String,
}
