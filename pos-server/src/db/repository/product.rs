//! Product Repository

use super::{RepoError, RepoResult};
use shared::models::{Product, ProductCreate, ProductUpdate, StockAdjustment, StockAdjustmentCreate};
use sqlx::SqlitePool;

const PRODUCT_SELECT: &str = "SELECT id, sku, name, description, price, cost_price, tax_rate, stock_quantity, unit, category, is_active, created_at, updated_at FROM product";

fn validate_price(value: f64, field_name: &str) -> RepoResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RepoError::Validation(format!(
            "{field_name} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

fn validate_tax_rate(rate: f64) -> RepoResult<()> {
    if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
        return Err(RepoError::Validation(format!(
            "Tax rate must be between 0 and 100, got {rate}"
        )));
    }
    Ok(())
}

fn map_sku_conflict(sku: &str) -> impl FnOnce(sqlx::Error) -> RepoError + '_ {
    move |e| match RepoError::from(e) {
        RepoError::Duplicate(_) => RepoError::DuplicateSku(sku.to_string()),
        other => other,
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(product)
}

pub async fn find_by_sku(pool: &SqlitePool, sku: &str) -> RepoResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE sku = ?"))
        .bind(sku)
        .fetch_optional(pool)
        .await?;
    Ok(product)
}

/// Active products, by name
pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "{PRODUCT_SELECT} WHERE is_active = 1 ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(products)
}

/// Active products whose name, sku or description contains `query`
pub async fn search(pool: &SqlitePool, query: &str) -> RepoResult<Vec<Product>> {
    let pattern = format!("%{query}%");
    let products = sqlx::query_as::<_, Product>(&format!(
        "{PRODUCT_SELECT} WHERE is_active = 1 AND (name LIKE ?1 OR sku LIKE ?1 OR description LIKE ?1) ORDER BY name LIMIT 50"
    ))
    .bind(pattern)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

/// Active products at or below `threshold`, lowest stock first
pub async fn find_low_stock(pool: &SqlitePool, threshold: i64) -> RepoResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "{PRODUCT_SELECT} WHERE is_active = 1 AND stock_quantity <= ? ORDER BY stock_quantity, name"
    ))
    .bind(threshold)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

pub async fn create(pool: &SqlitePool, data: ProductCreate) -> RepoResult<Product> {
    if data.sku.trim().is_empty() {
        return Err(RepoError::Validation("SKU is required".into()));
    }
    if data.name.trim().is_empty() {
        return Err(RepoError::Validation("Product name is required".into()));
    }
    validate_price(data.price, "Price")?;
    let cost_price = data.cost_price.unwrap_or(0.0);
    validate_price(cost_price, "Cost price")?;
    let tax_rate = data.tax_rate.unwrap_or(0.0);
    validate_tax_rate(tax_rate)?;

    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO product (id, sku, name, description, price, cost_price, tax_rate, stock_quantity, unit, category, is_active, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)",
    )
    .bind(id)
    .bind(&data.sku)
    .bind(&data.name)
    .bind(data.description.unwrap_or_default())
    .bind(data.price)
    .bind(cost_price)
    .bind(tax_rate)
    .bind(data.stock_quantity.unwrap_or(0))
    .bind(data.unit.unwrap_or_else(|| "piece".to_string()))
    .bind(data.category.unwrap_or_default())
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_sku_conflict(&data.sku))?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create product".into()))
}

/// Partial update; absent fields keep their value. Stock is changed only
/// through [`adjust_stock`] and order commits.
pub async fn update(pool: &SqlitePool, id: i64, data: ProductUpdate) -> RepoResult<Product> {
    if let Some(sku) = &data.sku
        && sku.trim().is_empty()
    {
        return Err(RepoError::Validation("SKU cannot be empty".into()));
    }
    if let Some(price) = data.price {
        validate_price(price, "Price")?;
    }
    if let Some(cost_price) = data.cost_price {
        validate_price(cost_price, "Cost price")?;
    }
    if let Some(rate) = data.tax_rate {
        validate_tax_rate(rate)?;
    }

    let sku = data.sku.clone().unwrap_or_default();
    let now = shared::util::now_millis();
    let rows = sqlx::query(
        "UPDATE product SET sku = COALESCE(?1, sku), name = COALESCE(?2, name), description = COALESCE(?3, description), price = COALESCE(?4, price), cost_price = COALESCE(?5, cost_price), tax_rate = COALESCE(?6, tax_rate), unit = COALESCE(?7, unit), category = COALESCE(?8, category), is_active = COALESCE(?9, is_active), updated_at = ?10 WHERE id = ?11",
    )
    .bind(data.sku)
    .bind(data.name)
    .bind(data.description)
    .bind(data.price)
    .bind(data.cost_price)
    .bind(data.tax_rate)
    .bind(data.unit)
    .bind(data.category)
    .bind(data.is_active)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .map_err(map_sku_conflict(&sku))?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Product {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))
}

/// Deactivate; products are never physically deleted
pub async fn soft_delete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE product SET is_active = 0, updated_at = ?1 WHERE id = ?2")
        .bind(shared::util::now_millis())
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Product {id} not found")));
    }
    Ok(())
}

/// Apply a manual stock delta and record it, atomically
pub async fn adjust_stock(
    pool: &SqlitePool,
    data: StockAdjustmentCreate,
) -> RepoResult<StockAdjustment> {
    if data.quantity_change == 0 {
        return Err(RepoError::Validation(
            "Quantity change cannot be zero".into(),
        ));
    }
    if data.reason.trim().is_empty() {
        return Err(RepoError::Validation("Adjustment reason is required".into()));
    }

    let now = shared::util::now_millis();
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE product SET stock_quantity = stock_quantity + ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(data.quantity_change)
    .bind(now)
    .bind(data.product_id)
    .execute(&mut *tx)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Product {} not found",
            data.product_id
        )));
    }

    let adjustment = StockAdjustment {
        id: shared::util::snowflake_id(),
        product_id: data.product_id,
        quantity_change: data.quantity_change,
        reason: data.reason,
        notes: data.notes,
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO stock_adjustment (id, product_id, quantity_change, reason, notes, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(adjustment.id)
    .bind(adjustment.product_id)
    .bind(adjustment.quantity_change)
    .bind(&adjustment.reason)
    .bind(&adjustment.notes)
    .bind(adjustment.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::test_pool;
    use shared::error::{AppError, ErrorCode};

    fn coffee() -> ProductCreate {
        ProductCreate {
            sku: "COF-001".into(),
            name: "Coffee Beans".into(),
            price: 12.5,
            cost_price: Some(7.0),
            tax_rate: Some(5.0),
            stock_quantity: Some(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = test_pool().await;
        let p = create(&pool, coffee()).await.unwrap();
        assert_eq!(p.sku, "COF-001");
        assert_eq!(p.unit, "piece");
        assert!(p.is_active);

        let by_sku = find_by_sku(&pool, "COF-001").await.unwrap().unwrap();
        assert_eq!(by_sku.id, p.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let pool = test_pool().await;
        create(&pool, coffee()).await.unwrap();
        let err = create(&pool, coffee()).await.unwrap_err();
        assert!(matches!(&err, RepoError::DuplicateSku(sku) if sku == "COF-001"));
        assert_eq!(AppError::from(err).code, ErrorCode::SkuExists);
    }

    #[tokio::test]
    async fn test_update_to_taken_sku_rejected() {
        let pool = test_pool().await;
        create(&pool, coffee()).await.unwrap();
        let tea = create(
            &pool,
            ProductCreate {
                sku: "TEA-001".into(),
                name: "Green Tea".into(),
                price: 4.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = update(
            &pool,
            tea.id,
            ProductUpdate {
                sku: Some("COF-001".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::DuplicateSku(_)));
    }

    #[tokio::test]
    async fn test_validation() {
        let pool = test_pool().await;
        let mut bad = coffee();
        bad.sku = "  ".into();
        assert!(matches!(
            create(&pool, bad).await,
            Err(RepoError::Validation(_))
        ));

        let mut bad = coffee();
        bad.price = f64::NAN;
        assert!(matches!(
            create(&pool, bad).await,
            Err(RepoError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let pool = test_pool().await;
        let p = create(&pool, coffee()).await.unwrap();
        let updated = update(
            &pool,
            p.id,
            ProductUpdate {
                price: Some(13.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.price, 13.0);
        assert_eq!(updated.name, "Coffee Beans");
        assert_eq!(updated.stock_quantity, 20);

        let err = update(&pool, 42, ProductUpdate::default()).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_row() {
        let pool = test_pool().await;
        let p = create(&pool, coffee()).await.unwrap();
        soft_delete(&pool, p.id).await.unwrap();

        assert!(find_all(&pool).await.unwrap().is_empty());
        let still_there = find_by_id(&pool, p.id).await.unwrap().unwrap();
        assert!(!still_there.is_active);
    }

    #[tokio::test]
    async fn test_adjust_stock_records_adjustment() {
        let pool = test_pool().await;
        let p = create(&pool, coffee()).await.unwrap();
        adjust_stock(
            &pool,
            StockAdjustmentCreate {
                product_id: p.id,
                quantity_change: -5,
                reason: "breakage".into(),
                notes: None,
            },
        )
        .await
        .unwrap();

        let p = find_by_id(&pool, p.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 15);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_adjustment")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_adjust_stock_unknown_product_writes_nothing() {
        let pool = test_pool().await;
        let err = adjust_stock(
            &pool,
            StockAdjustmentCreate {
                product_id: 7,
                quantity_change: 3,
                reason: "receiving".into(),
                notes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_adjustment")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_search_and_low_stock() {
        let pool = test_pool().await;
        create(&pool, coffee()).await.unwrap();
        create(
            &pool,
            ProductCreate {
                sku: "TEA-001".into(),
                name: "Green Tea".into(),
                price: 4.0,
                stock_quantity: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let found = search(&pool, "tea").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sku, "TEA-001");

        let low = find_low_stock(&pool, 10).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Green Tea");
    }
}
