//! Report Repository
//!
//! Aggregates over completed orders in a `[start, end)` millis range.

use super::RepoResult;
use shared::models::{ProfitReport, SalesReport, SalesSummary, TopProduct};
use sqlx::SqlitePool;

pub async fn sales(pool: &SqlitePool, start: i64, end: i64) -> RepoResult<SalesReport> {
    let (total_orders, total_revenue, total_tax, total_discounts): (i64, f64, f64, f64) =
        sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total), 0.0), COALESCE(SUM(tax), 0.0), COALESCE(SUM(discount), 0.0) FROM orders WHERE status = 'COMPLETED' AND created_at >= ? AND created_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

    let average_order_value = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };

    let top_products = sqlx::query_as::<_, TopProduct>(
        "SELECT oi.product_id, oi.product_name, oi.product_sku, SUM(oi.quantity) AS total_sold, COALESCE(SUM(oi.line_total), 0.0) AS revenue FROM order_item oi JOIN orders o ON o.id = oi.order_id WHERE o.status = 'COMPLETED' AND o.created_at >= ? AND o.created_at < ? GROUP BY oi.product_id ORDER BY total_sold DESC, revenue DESC LIMIT 10",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(SalesReport {
        summary: SalesSummary {
            total_orders,
            total_revenue,
            total_tax,
            total_discounts,
            average_order_value,
        },
        top_products,
    })
}

/// revenue − cost of goods sold (qty × current cost price) − expenses
pub async fn profit(pool: &SqlitePool, start: i64, end: i64) -> RepoResult<ProfitReport> {
    let revenue: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total), 0.0) FROM orders WHERE status = 'COMPLETED' AND created_at >= ? AND created_at < ?",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let cogs: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(oi.quantity * p.cost_price), 0.0) FROM order_item oi JOIN orders o ON o.id = oi.order_id JOIN product p ON p.id = oi.product_id WHERE o.status = 'COMPLETED' AND o.created_at >= ? AND o.created_at < ?",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let expenses: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0.0) FROM expense WHERE expense_date >= ? AND expense_date < ?",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(ProfitReport {
        revenue,
        cogs,
        expenses,
        profit: revenue - cogs - expenses,
    })
}
