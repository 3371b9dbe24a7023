//! User Repository

use super::{RepoError, RepoResult};
use crate::utils::password;
use shared::models::{User, UserCreate};
use sqlx::SqlitePool;

const USER_SELECT: &str = "SELECT id, username, password_hash, display_name, role, is_active, created_at FROM user";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Includes inactive accounts
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> RepoResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE username = ? LIMIT 1"))
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// All accounts including inactive, by username
pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY username"))
        .fetch_all(pool)
        .await?;
    Ok(users)
}

pub async fn create(pool: &SqlitePool, data: UserCreate) -> RepoResult<User> {
    let username = data.username.trim().to_string();
    if username.is_empty() {
        return Err(RepoError::Validation("Username is required".into()));
    }
    if data.password.is_empty() {
        return Err(RepoError::Validation("Password is required".into()));
    }
    if find_by_username(pool, &username).await?.is_some() {
        return Err(RepoError::Duplicate(format!(
            "Username '{username}' already exists"
        )));
    }

    let password_hash = password::hash_password(&data.password)
        .map_err(|e| RepoError::Database(format!("Failed to hash password: {e}")))?;
    let display_name = data
        .display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| username.clone());

    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO user (id, username, password_hash, display_name, role, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
    )
    .bind(id)
    .bind(&username)
    .bind(&password_hash)
    .bind(&display_name)
    .bind(data.role.unwrap_or_default().as_str())
    .bind(shared::util::now_millis())
    .execute(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create user".into()))
}

/// Enable or disable an account; rows are never deleted since orders and
/// audit records point at them
pub async fn set_active(pool: &SqlitePool, username: &str, active: bool) -> RepoResult<User> {
    let rows = sqlx::query("UPDATE user SET is_active = ? WHERE username = ?")
        .bind(active)
        .bind(username)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("User '{username}' not found")));
    }
    find_by_username(pool, username)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("User '{username}' not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::test_pool;
    use shared::models::UserRole;

    fn alice() -> UserCreate {
        UserCreate {
            username: "alice".into(),
            password: "pa55word".into(),
            display_name: Some("Alice".into()),
            role: Some(UserRole::Manager),
        }
    }

    #[tokio::test]
    async fn test_create_stores_hash_not_password() {
        let pool = test_pool().await;
        let user = create(&pool, alice()).await.unwrap();
        assert_eq!(user.role, "manager");
        assert!(user.is_active);
        assert_ne!(user.password_hash, "pa55word");
        assert!(password::verify_password("pa55word", &user.password_hash));

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let pool = test_pool().await;
        create(&pool, alice()).await.unwrap();
        let err = create(&pool, alice()).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_defaults_and_validation() {
        let pool = test_pool().await;
        let user = create(
            &pool,
            UserCreate {
                username: " bob ".into(),
                password: "x".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(user.display_name, "bob");
        assert_eq!(user.role, "cashier");

        let err = create(
            &pool,
            UserCreate {
                username: "carol".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_set_active() {
        let pool = test_pool().await;
        create(&pool, alice()).await.unwrap();
        let user = set_active(&pool, "alice", false).await.unwrap();
        assert!(!user.is_active);
        assert_eq!(find_all(&pool).await.unwrap().len(), 1);

        let err = set_active(&pool, "nobody", true).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
