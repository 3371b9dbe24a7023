//! Setting Repository

use super::{RepoError, RepoResult};
use shared::models::{SettingKey, SettingRow, StoreSettings};
use sqlx::SqlitePool;

pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<SettingRow>> {
    let rows = sqlx::query_as::<_, SettingRow>("SELECT key, value FROM setting ORDER BY key")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &SqlitePool, key: &str) -> RepoResult<Option<String>> {
    let value = sqlx::query_scalar("SELECT value FROM setting WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn upsert(pool: &SqlitePool, key: &str, value: &str) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO setting (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Upsert several rows in one transaction
pub async fn upsert_many(pool: &SqlitePool, rows: &[SettingRow]) -> RepoResult<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO setting (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(&row.key)
        .bind(&row.value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Set a known key after checking the value parses for it
pub async fn set_known(pool: &SqlitePool, key: SettingKey, value: &str) -> RepoResult<()> {
    let mut scratch = StoreSettings::default();
    scratch
        .apply(key, value)
        .map_err(|reason| RepoError::Validation(format!("{}: {reason}", key.as_str())))?;
    upsert(pool, key.as_str(), value).await
}

/// Typed view over the stored rows
pub async fn load(pool: &SqlitePool) -> RepoResult<StoreSettings> {
    let rows = find_all(pool).await?;
    Ok(StoreSettings::from_rows(&rows))
}

/// Insert the default value of every known key that is not stored yet
pub async fn seed_defaults(pool: &SqlitePool) -> RepoResult<()> {
    let mut tx = pool.begin().await?;
    for row in StoreSettings::default().to_rows() {
        sqlx::query("INSERT OR IGNORE INTO setting (key, value) VALUES (?1, ?2)")
            .bind(&row.key)
            .bind(&row.value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
