//! Audit Log Repository

use super::RepoResult;
use shared::models::{AuditCreate, AuditEntry};
use sqlx::{SqliteConnection, SqlitePool};

/// Append one record; runs on the caller's connection so it can join an
/// open transaction
pub async fn insert(conn: &mut SqliteConnection, entry: AuditCreate) -> RepoResult<AuditEntry> {
    let row = AuditEntry {
        id: shared::util::snowflake_id(),
        user_id: entry.user_id,
        action: entry.action.as_str().to_string(),
        entity_type: entry.entity_type,
        entity_id: entry.entity_id,
        details: entry.details.map(|d| d.to_string()),
        created_at: shared::util::now_millis(),
    };
    sqlx::query(
        "INSERT INTO audit_log (id, user_id, action, entity_type, entity_id, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(row.id)
    .bind(row.user_id)
    .bind(&row.action)
    .bind(&row.entity_type)
    .bind(&row.entity_id)
    .bind(&row.details)
    .bind(row.created_at)
    .execute(conn)
    .await?;
    Ok(row)
}

/// [`insert`] on a pooled connection
pub async fn record(pool: &SqlitePool, entry: AuditCreate) -> RepoResult<AuditEntry> {
    let mut conn = pool.acquire().await?;
    insert(&mut conn, entry).await
}

/// Newest first
pub async fn find_recent(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<AuditEntry>> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT id, user_id, action, entity_type, entity_id, details, created_at FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

pub async fn find_by_action(pool: &SqlitePool, action: &str) -> RepoResult<Vec<AuditEntry>> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT id, user_id, action, entity_type, entity_id, details, created_at FROM audit_log WHERE action = ? ORDER BY created_at, id",
    )
    .bind(action)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::test_pool;
    use shared::models::AuditAction;

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        insert(
            &mut conn,
            AuditCreate::new(AuditAction::OrderCommitted)
                .entity("order", 42)
                .details(serde_json::json!({ "total": 9.5 })),
        )
        .await
        .unwrap();
        insert(&mut conn, AuditCreate::new(AuditAction::BackupRestored))
            .await
            .unwrap();
        drop(conn);

        let recent = find_recent(&pool, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "backup.restore");

        let commits = find_by_action(&pool, "order.commit").await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].entity_id.as_deref(), Some("42"));
        let details: serde_json::Value =
            serde_json::from_str(commits[0].details.as_deref().unwrap()).unwrap();
        assert_eq!(details["total"], 9.5);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let result = insert(
            &mut conn,
            AuditCreate::new(AuditAction::UserCreated).user(Some(404)),
        )
        .await;
        assert!(matches!(result, Err(crate::db::repository::RepoError::Validation(_))));
    }
}
