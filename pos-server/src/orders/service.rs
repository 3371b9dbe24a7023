//! Order commit service

use std::sync::Arc;

use shared::models::{
    AuditAction, AuditCreate, CartInput, CartRequest, CommittedOrder, Order, OrderItem,
    OrderStatus, Payment,
};
use sqlx::SqliteConnection;

use super::money::{self, CartBuilder, is_fully_paid};
use super::number::OrderNumberGenerator;
use crate::db::DbService;
use crate::db::repository::{RepoError, audit, order as order_repo, product as product_repo};
use crate::utils::{AppError, AppResult, ErrorCode};

/// Attempts before giving up on a colliding order number / id
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Business rules the engine enforces on top of atomicity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPolicy {
    /// Accept orders whose payments sum to less than the total
    /// (credit / pay-later sales)
    pub allow_partial_payment: bool,
    /// Let a sale take stock below zero
    pub allow_negative_stock: bool,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            allow_partial_payment: true,
            allow_negative_stock: true,
        }
    }
}

/// Order Commit Engine
#[derive(Clone)]
pub struct OrderService {
    db: DbService,
    policy: OrderPolicy,
    numbers: Arc<OrderNumberGenerator>,
}

impl OrderService {
    pub fn new(db: DbService, policy: OrderPolicy) -> Self {
        Self {
            db,
            policy,
            numbers: Arc::new(OrderNumberGenerator::new()),
        }
    }

    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    /// Price a SKU cart from the current catalog
    ///
    /// Each line snapshots the active product's name, price and tax rate.
    pub async fn price_cart(&self, request: CartRequest) -> AppResult<CartInput> {
        let pool = self.db.pool().await?;
        let mut builder = CartBuilder::new()
            .discount(request.discount)
            .shipping(request.shipping)
            .cashier(request.user_id);
        if let Some(customer) = request.customer {
            builder = builder.customer(customer);
        }
        if let Some(notes) = request.notes {
            builder = builder.notes(notes);
        }

        for (index, line) in request.items.iter().enumerate() {
            let product = product_repo::find_by_sku(&pool, &line.sku)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::ProductNotFound,
                        format!("No active product with SKU '{}'", line.sku),
                    )
                    .with_detail("item_index", index)
                })?;
            builder = builder.item(&product, line.quantity);
        }

        for payment in request.payments {
            builder = match payment.reference {
                Some(reference) => {
                    builder.payment_with_reference(payment.amount, payment.method, reference)
                }
                None => builder.payment(payment.amount, payment.method),
            };
        }
        Ok(builder.build())
    }

    /// [`price_cart`](Self::price_cart) then [`commit_order`](Self::commit_order)
    pub async fn commit_request(&self, request: CartRequest) -> AppResult<CommittedOrder> {
        let cart = self.price_cart(request).await?;
        self.commit_order(cart).await
    }

    /// Persist `cart` as one order: header, items, stock decrements and
    /// payments are written in a single transaction, or not at all.
    pub async fn commit_order(&self, cart: CartInput) -> AppResult<CommittedOrder> {
        validate_cart(&cart, &self.policy)?;
        let pool = self.db.pool().await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let order_id = shared::util::snowflake_id();
            let order_number = self.numbers.next();

            let mut tx = pool
                .begin()
                .await
                .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

            match self.write_order(&mut *tx, &cart, order_id, &order_number).await {
                Ok(()) => {}
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::error!(error = %rollback, "Rollback failed");
                    }
                    if e.code == ErrorCode::OrderNumberConflict && attempt < MAX_COMMIT_ATTEMPTS {
                        tracing::warn!(order_number = %order_number, "Order number collision, retrying");
                        continue;
                    }
                    tracing::warn!(code = %e.code, error = %e, "Order commit rolled back");
                    return Err(e);
                }
            }

            tx.commit()
                .await
                .map_err(|e| AppError::database(format!("Failed to commit order: {e}")))?;

            tracing::info!(
                order_number = %order_number,
                items = cart.items.len(),
                payments = cart.payments.len(),
                total = cart.totals.total,
                "Order committed"
            );
            return Ok(CommittedOrder {
                order_id,
                order_number,
            });
        }
    }

    async fn write_order(
        &self,
        conn: &mut SqliteConnection,
        cart: &CartInput,
        order_id: i64,
        order_number: &str,
    ) -> AppResult<()> {
        let now = shared::util::now_millis();
        let customer = cart.customer.clone().unwrap_or_default();

        let order = Order {
            id: order_id,
            order_number: order_number.to_string(),
            status: OrderStatus::Completed.as_str().to_string(),
            subtotal: cart.totals.subtotal,
            discount: cart.totals.discount,
            shipping: cart.totals.shipping,
            tax: cart.totals.tax,
            total: cart.totals.total,
            customer_name: customer.name,
            customer_phone: customer.phone,
            customer_email: customer.email,
            notes: cart.notes.clone(),
            payment_method: summary_method(cart),
            user_id: cart.user_id,
            created_at: now,
        };
        order_repo::insert_order(&mut *conn, &order)
            .await
            .map_err(|e| match e {
                RepoError::Duplicate(_) => AppError::with_message(
                    ErrorCode::OrderNumberConflict,
                    format!("Order number {order_number} already exists"),
                ),
                RepoError::Validation(_) if cart.user_id.is_some() => AppError::with_message(
                    ErrorCode::ValidationFailed,
                    format!("Unknown user {}", cart.user_id.unwrap_or_default()),
                )
                .with_detail("user_id", cart.user_id),
                other => AppError::from(other),
            })?;

        for item in &cart.items {
            order_repo::decrement_stock(
                &mut *conn,
                item.product_id,
                item.quantity,
                !self.policy.allow_negative_stock,
                now,
            )
            .await
            .map_err(|e| match e {
                RepoError::NotFound(msg) => {
                    AppError::with_message(ErrorCode::ProductNotFound, msg)
                        .with_detail("product_id", item.product_id)
                }
                RepoError::Validation(msg) => {
                    AppError::with_message(ErrorCode::InsufficientStock, msg)
                        .with_detail("product_id", item.product_id)
                }
                other => AppError::from(other),
            })?;

            let row = OrderItem {
                id: shared::util::snowflake_id(),
                order_id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                product_sku: item.product_sku.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                tax: item.tax,
                line_total: money::line_total(item.quantity, item.unit_price),
            };
            order_repo::insert_item(&mut *conn, &row).await?;
        }

        for payment in &cart.payments {
            let row = Payment {
                id: shared::util::snowflake_id(),
                order_id,
                amount: payment.amount,
                method: payment.method.clone(),
                reference: payment.reference.clone(),
                created_at: now,
            };
            order_repo::insert_payment(&mut *conn, &row).await?;
        }

        let entry = AuditCreate::new(AuditAction::OrderCommitted)
            .user(cart.user_id)
            .entity("order", order_id)
            .details(serde_json::json!({
                "order_number": order_number,
                "total": cart.totals.total,
                "items": cart.items.len(),
                "payments": cart.payments.len(),
            }));
        audit::insert(&mut *conn, entry).await?;

        Ok(())
    }
}

/// Method of the single payment, or `split` for split tender
fn summary_method(cart: &CartInput) -> String {
    match cart.payments.as_slice() {
        [only] => only.method.clone(),
        _ => "split".to_string(),
    }
}

fn require_amount(value: f64, field_name: &str) -> AppResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::with_message(
            ErrorCode::InvalidAmount,
            format!("{field_name} must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(())
}

/// Reject a malformed cart before any write
fn validate_cart(cart: &CartInput, policy: &OrderPolicy) -> AppResult<()> {
    if cart.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    if cart.payments.is_empty() {
        return Err(AppError::new(ErrorCode::PaymentRequired));
    }

    for (index, item) in cart.items.iter().enumerate() {
        if item.quantity < 1 {
            return Err(AppError::with_message(
                ErrorCode::InvalidQuantity,
                format!("Quantity must be at least 1, got {}", item.quantity),
            )
            .with_detail("item_index", index));
        }
        require_amount(item.unit_price, "unit_price")?;
        require_amount(item.tax, "tax")?;
    }

    for payment in &cart.payments {
        if !payment.amount.is_finite() || payment.amount <= 0.0 {
            return Err(AppError::with_message(
                ErrorCode::InvalidAmount,
                format!("Payment amount must be positive, got {}", payment.amount),
            ));
        }
        if payment.method.trim().is_empty() {
            return Err(AppError::new(ErrorCode::PaymentInvalidMethod));
        }
    }

    let totals = &cart.totals;
    require_amount(totals.subtotal, "subtotal")?;
    require_amount(totals.discount, "discount")?;
    require_amount(totals.shipping, "shipping")?;
    require_amount(totals.tax, "tax")?;
    require_amount(totals.total, "total")?;

    if !policy.allow_partial_payment && !is_fully_paid(&cart.payments, totals.total) {
        return Err(AppError::with_message(
            ErrorCode::PaymentInsufficientAmount,
            format!(
                "Payments total {} is less than order total {}",
                money::to_f64(money::payments_total(&cart.payments)),
                totals.total
            ),
        ));
    }

    Ok(())
}
