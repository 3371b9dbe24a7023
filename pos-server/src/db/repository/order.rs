//! Order Repository
//!
//! Write functions take `&mut SqliteConnection` so the commit engine can
//! run them inside one transaction; reads take the pool.

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderDetail, OrderItem, Payment};
use sqlx::{SqliteConnection, SqlitePool};

const ORDER_SELECT: &str = "SELECT id, order_number, status, subtotal, discount, shipping, tax, total, customer_name, customer_phone, customer_email, notes, payment_method, user_id, created_at FROM orders";

pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, status, subtotal, discount, shipping, tax, total, customer_name, customer_phone, customer_email, notes, payment_method, user_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.status)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.shipping)
    .bind(order.tax)
    .bind(order.total)
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(&order.customer_email)
    .bind(&order.notes)
    .bind(&order.payment_method)
    .bind(order.user_id)
    .bind(order.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO order_item (id, order_id, product_id, product_name, product_sku, quantity, unit_price, tax, line_total) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(item.id)
    .bind(item.order_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(&item.product_sku)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.tax)
    .bind(item.line_total)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO payment (id, order_id, amount, method, reference, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(&payment.method)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Decrement stock by `quantity`
///
/// With `guard_negative`, the update only applies when enough stock is on
/// hand. Returns `NotFound` for an unknown product and `Validation` when the
/// guard rejects the decrement.
pub async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
    guard_negative: bool,
    now: i64,
) -> RepoResult<()> {
    let sql = if guard_negative {
        "UPDATE product SET stock_quantity = stock_quantity - ?1, updated_at = ?2 WHERE id = ?3 AND stock_quantity >= ?1"
    } else {
        "UPDATE product SET stock_quantity = stock_quantity - ?1, updated_at = ?2 WHERE id = ?3"
    };
    let rows = sqlx::query(sql)
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    if rows.rows_affected() > 0 {
        return Ok(());
    }

    let stock: Option<i64> = sqlx::query_scalar("SELECT stock_quantity FROM product WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    match stock {
        None => Err(RepoError::NotFound(format!("Product {product_id} not found"))),
        Some(on_hand) => Err(RepoError::Validation(format!(
            "Insufficient stock for product {product_id}: {on_hand} on hand, {quantity} requested"
        ))),
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<OrderDetail>> {
    let order = sqlx::query_as::<_, Order>(&format!("{ORDER_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match order {
        Some(order) => Ok(Some(load_detail(pool, order).await?)),
        None => Ok(None),
    }
}

pub async fn find_by_number(pool: &SqlitePool, order_number: &str) -> RepoResult<Option<OrderDetail>> {
    let order = sqlx::query_as::<_, Order>(&format!("{ORDER_SELECT} WHERE order_number = ?"))
        .bind(order_number)
        .fetch_optional(pool)
        .await?;
    match order {
        Some(order) => Ok(Some(load_detail(pool, order).await?)),
        None => Ok(None),
    }
}

/// Order headers, newest first
pub async fn find_all(pool: &SqlitePool, limit: i64, offset: i64) -> RepoResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "{ORDER_SELECT} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

pub async fn find_items(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, product_name, product_sku, quantity, unit_price, tax, line_total FROM order_item WHERE order_id = ? ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn find_payments(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT id, order_id, amount, method, reference, created_at FROM payment WHERE order_id = ? ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(payments)
}

async fn load_detail(pool: &SqlitePool, order: Order) -> RepoResult<OrderDetail> {
    let items = find_items(pool, order.id).await?;
    let payments = find_payments(pool, order.id).await?;
    Ok(OrderDetail {
        order,
        items,
        payments,
    })
}

pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

pub async fn count_items(pool: &SqlitePool) -> RepoResult<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM order_item")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

pub async fn count_payments(pool: &SqlitePool) -> RepoResult<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM payment")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
