//! Account creation and login

use shared::models::{AuditAction, AuditCreate, User, UserCreate};

use crate::db::DbService;
use crate::db::repository::{RepoError, audit, user};
use crate::utils::{AppError, AppResult, ErrorCode, password};

#[derive(Clone)]
pub struct AuthService {
    db: DbService,
}

impl AuthService {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, data: UserCreate) -> AppResult<User> {
        let pool = self.db.pool().await?;
        let created = user::create(&pool, data).await.map_err(|e| match e {
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::UsernameExists, msg),
            other => AppError::from(other),
        })?;

        let entry = AuditCreate::new(AuditAction::UserCreated)
            .entity("user", created.id)
            .details(serde_json::json!({
                "username": created.username,
                "role": created.role,
            }));
        audit::record(&pool, entry).await?;

        tracing::info!(username = %created.username, role = %created.role, "User created");
        Ok(created)
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let pool = self.db.pool().await?;
        Ok(user::find_all(&pool).await?)
    }

    /// Unknown usernames and wrong passwords fail alike with
    /// `InvalidCredentials`; a correct password on a disabled account
    /// fails with `AccountDisabled`.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<User> {
        let pool = self.db.pool().await?;
        let found = user::find_by_username(&pool, username).await?;

        let account = match found {
            Some(account) if password::verify_password(password, &account.password_hash) => {
                account
            }
            other => {
                let reason = if other.is_some() {
                    "invalid_credentials"
                } else {
                    "user_not_found"
                };
                let entry = AuditCreate::new(AuditAction::LoginFailed)
                    .user(other.as_ref().map(|u| u.id))
                    .entity("user", username)
                    .details(serde_json::json!({ "reason": reason }));
                if let Err(e) = audit::record(&pool, entry).await {
                    tracing::warn!(error = %e, "Failed to record login failure");
                }
                tracing::warn!(username = %username, reason, "Login failed");
                return Err(AppError::new(ErrorCode::InvalidCredentials));
            }
        };

        if !account.is_active {
            tracing::warn!(username = %username, "Login refused, account disabled");
            return Err(AppError::new(ErrorCode::AccountDisabled));
        }

        tracing::info!(username = %username, "Login succeeded");
        Ok(account)
    }

    pub async fn set_active(&self, username: &str, active: bool) -> AppResult<User> {
        let pool = self.db.pool().await?;
        Ok(user::set_active(&pool, username, active).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::UserRole;

    async fn service() -> (tempfile::TempDir, AuthService) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbService::open(dir.path().join("pos.db")).await.unwrap();
        (dir, AuthService::new(db))
    }

    fn cashier() -> UserCreate {
        UserCreate {
            username: "dana".into(),
            password: "till-1234".into(),
            display_name: Some("Dana".into()),
            role: Some(UserRole::Cashier),
        }
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let (_dir, auth) = service().await;
        let created = auth.create_user(cashier()).await.unwrap();

        let user = auth.login("dana", "till-1234").await.unwrap();
        assert_eq!(user.id, created.id);

        let err = auth.login("dana", "wrong").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
        let err = auth.login("nobody", "till-1234").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_disabled_account_refused() {
        let (_dir, auth) = service().await;
        auth.create_user(cashier()).await.unwrap();
        auth.set_active("dana", false).await.unwrap();

        let err = auth.login("dana", "till-1234").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AccountDisabled);
        let err = auth.login("dana", "wrong").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_duplicate_username_code() {
        let (_dir, auth) = service().await;
        auth.create_user(cashier()).await.unwrap();
        let err = auth.create_user(cashier()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UsernameExists);
    }

    #[tokio::test]
    async fn test_creation_and_failures_are_audited() {
        let (_dir, auth) = service().await;
        auth.create_user(cashier()).await.unwrap();
        let _ = auth.login("dana", "wrong").await;

        let pool = auth.db.pool().await.unwrap();
        let created = audit::find_by_action(&pool, "user.create").await.unwrap();
        assert_eq!(created.len(), 1);
        let failed = audit::find_by_action(&pool, "auth.login_failed").await.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].user_id.is_some());
        assert!(!failed[0].details.as_deref().unwrap().contains("wrong"));
    }
}
