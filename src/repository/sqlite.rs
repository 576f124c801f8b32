// src/repository/sqlite.rs
//! SQLite implementation of the auth repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use super::{
    AuthRepository, NewAccount, NewSession, NewUser, NewVerificationToken, ProfileUpdate,
    RepoResult, RepositoryError,
};
use crate::auth::models::{Account, Session, User, VerificationToken};
use crate::common::id_generator::{
    generate_account_id, generate_session_id, generate_token_id, generate_user_id,
};

const USER_COLUMNS: &str = "id, email, email_verified, phone, phone_verified, password, name, \
     avatar, role, two_factor_enabled, two_factor_secret, created_at, updated_at, last_login_at";

const ACCOUNT_COLUMNS: &str = "id, user_id, type, provider, provider_account_id, access_token, \
     refresh_token, expires_at, created_at";

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token, user_agent, ip_address, expires_at, created_at";

const TOKEN_COLUMNS: &str = "id, user_id, token, type, expires_at, created_at";

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn insert_user<'e, E>(executor: E, id: &str, user: &NewUser, now: DateTime<Utc>) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO users (id, email, email_verified, phone, password, name, avatar, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'USER', ?, ?)
        "#,
    )
    .bind(id)
    .bind(&user.email)
    .bind(user.email_verified)
    .bind(&user.phone)
    .bind(&user.password)
    .bind(&user.name)
    .bind(&user.avatar)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_account<'e, E>(
    executor: E,
    id: &str,
    user_id: &str,
    account: &NewAccount,
    now: DateTime<Utc>,
) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO accounts (id, user_id, type, provider, provider_account_id, access_token, refresh_token, expires_at, created_at)
        VALUES (?, ?, 'oauth', ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&account.provider)
    .bind(&account.provider_account_id)
    .bind(&account.access_token)
    .bind(&account.refresh_token)
    .bind(account.expires_at)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

async fn fetch_user<'e, E>(executor: E, id: &str) -> RepoResult<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_one(executor)
        .await?;
    Ok(user)
}

#[async_trait]
impl AuthRepository for SqliteRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let id = generate_user_id();
        insert_user(&self.pool, &id, &user, Utc::now()).await?;
        debug!(user_id = %id, "User created");
        fetch_user(&self.pool, &id).await
    }

    async fn find_user_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user_profile(&self, id: &str, update: &ProfileUpdate) -> RepoResult<User> {
        let result = sqlx::query("UPDATE users SET name = ?, avatar = ?, updated_at = ? WHERE id = ?")
            .bind(&update.name)
            .bind(&update.avatar)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        fetch_user(&self.pool, id).await
    }

    async fn update_user_password(&self, id: &str, digest: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
            .bind(digest)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET email_verified = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> RepoResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE provider = ? AND provider_account_id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_accounts_for_user(&self, user_id: &str) -> RepoResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY created_at",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn create_account(&self, user_id: &str, account: &NewAccount) -> RepoResult<Account> {
        let id = generate_account_id();
        insert_account(&self.pool, &id, user_id, account, Utc::now()).await?;

        let created = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> RepoResult<()> {
        sqlx::query(
            "UPDATE accounts SET access_token = ?, refresh_token = ?, expires_at = ? WHERE id = ?",
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_account(&self, account_id: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_user_with_account(
        &self,
        user: NewUser,
        account: &NewAccount,
    ) -> RepoResult<User> {
        let now = Utc::now();
        let user_id = generate_user_id();
        let account_id = generate_account_id();

        let mut tx = self.pool.begin().await?;
        insert_user(&mut *tx, &user_id, &user, now).await?;
        insert_account(&mut *tx, &account_id, &user_id, account, now).await?;
        let created = fetch_user(&mut *tx, &user_id).await?;
        tx.commit().await?;

        debug!(
            user_id = %user_id,
            provider = %account.provider,
            "User created with linked account"
        );
        Ok(created)
    }

    async fn create_session(&self, session: NewSession) -> RepoResult<Session> {
        let id = generate_session_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token, user_agent, ip_address, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&session.user_id)
        .bind(&session.refresh_token)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Session {
            id,
            user_id: session.user_id,
            refresh_token: session.refresh_token,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            expires_at: session.expires_at,
            created_at: now,
        })
    }

    async fn find_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> RepoResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE refresh_token = ?",
            SESSION_COLUMNS
        ))
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn rotate_session(
        &self,
        session_id: &str,
        current_refresh_token: &str,
        new_refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<Option<Session>> {
        let result = sqlx::query(
            "UPDATE sessions SET refresh_token = ?, expires_at = ? WHERE id = ? AND refresh_token = ?",
        )
        .bind(new_refresh_token)
        .bind(expires_at)
        .bind(session_id)
        .bind(current_refresh_token)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            debug!(session_id = %session_id, "Session rotation lost to a concurrent refresh");
            return Ok(None);
        }

        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, session_id: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_verification_token(
        &self,
        token: NewVerificationToken,
    ) -> RepoResult<VerificationToken> {
        let id = generate_token_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO verification_tokens (id, user_id, token, type, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&token.user_id)
        .bind(&token.token)
        .bind(token.token_type)
        .bind(token.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(VerificationToken {
            id,
            user_id: token.user_id,
            token: token.token,
            token_type: token.token_type,
            expires_at: token.expires_at,
            created_at: now,
        })
    }

    async fn find_verification_token(&self, token: &str) -> RepoResult<Option<VerificationToken>> {
        let found = sqlx::query_as::<_, VerificationToken>(&format!(
            "SELECT {} FROM verification_tokens WHERE token = ?",
            TOKEN_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found)
    }

    async fn delete_verification_token(&self, id: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{Role, TokenType};
    use crate::common::test_support::migrated_pool;
    use chrono::Duration;

    async fn setup() -> SqliteRepository {
        SqliteRepository::new(migrated_pool().await)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: Some(email.to_string()),
            password: Some("digest".to_string()),
            ..Default::default()
        }
    }

    fn new_account(provider: &str, id: &str) -> NewAccount {
        NewAccount {
            provider: provider.to_string(),
            provider_account_id: id.to_string(),
            access_token: "provider-access".to_string(),
            refresh_token: None,
            expires_at: Utc::now().timestamp() + 3600,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = setup().await;
        let user = repo.create_user(new_user("a@x.com")).await.unwrap();

        assert!(user.id.starts_with("U_"));
        assert_eq!(user.role, Role::User);
        assert!(!user.email_verified);

        let by_email = repo.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = repo.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email.as_deref(), Some("a@x.com"));
        assert!(repo.find_user_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let repo = setup().await;
        repo.create_user(new_user("a@x.com")).await.unwrap();

        let err = repo.create_user(new_user("a@x.com")).await.unwrap_err();
        assert!(err.is_unique_violation(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_users_without_email_coexist() {
        let repo = setup().await;
        repo.create_user(NewUser::default()).await.unwrap();
        repo.create_user(NewUser::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_user_with_account_rolls_back() {
        let repo = setup().await;
        let existing = repo.create_user(new_user("taken@x.com")).await.unwrap();
        repo.create_account(&existing.id, &new_account("google", "g-1"))
            .await
            .unwrap();

        // Account key collides, so the new user must not survive
        let err = repo
            .create_user_with_account(new_user("fresh@x.com"), &new_account("google", "g-1"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(repo.find_user_by_email("fresh@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_account_lookup_and_token_update() {
        let repo = setup().await;
        let user = repo
            .create_user_with_account(new_user("a@x.com"), &new_account("github", "42"))
            .await
            .unwrap();

        let account = repo.find_account("github", "42").await.unwrap().unwrap();
        assert_eq!(account.user_id, user.id);
        assert_eq!(account.account_type, "oauth");

        repo.update_account_tokens(&account.id, "new-access", Some("new-refresh"), 99)
            .await
            .unwrap();
        let updated = repo.find_account("github", "42").await.unwrap().unwrap();
        assert_eq!(updated.access_token.as_deref(), Some("new-access"));
        assert_eq!(updated.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(updated.expires_at, Some(99));
    }

    #[tokio::test]
    async fn test_session_rotation_and_delete() {
        let repo = setup().await;
        let user = repo.create_user(new_user("a@x.com")).await.unwrap();
        let session = repo
            .create_session(NewSession {
                user_id: user.id.clone(),
                refresh_token: "r1".to_string(),
                user_agent: Some("tests".to_string()),
                ip_address: None,
                expires_at: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();

        let rotated = repo
            .rotate_session(&session.id, "r1", "r2", Utc::now() + Duration::days(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rotated.id, session.id);
        assert!(repo.find_session_by_refresh_token("r1").await.unwrap().is_none());
        assert!(repo.find_session_by_refresh_token("r2").await.unwrap().is_some());

        // A stale current value no longer matches the row
        let stale = repo
            .rotate_session(&session.id, "r1", "r3", Utc::now() + Duration::days(7))
            .await
            .unwrap();
        assert!(stale.is_none());
        assert!(repo.find_session_by_refresh_token("r2").await.unwrap().is_some());
        assert!(repo.find_session_by_refresh_token("r3").await.unwrap().is_none());

        repo.delete_session(&session.id).await.unwrap();
        assert!(repo.find_session_by_refresh_token("r2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let repo = setup().await;
        let user = repo
            .create_user_with_account(new_user("a@x.com"), &new_account("google", "g-1"))
            .await
            .unwrap();
        repo.create_session(NewSession {
            user_id: user.id.clone(),
            refresh_token: "r1".to_string(),
            user_agent: None,
            ip_address: None,
            expires_at: Utc::now() + Duration::days(1),
        })
        .await
        .unwrap();
        repo.create_verification_token(NewVerificationToken {
            user_id: user.id.clone(),
            token: "t1".to_string(),
            token_type: TokenType::EmailVerification,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

        repo.delete_user(&user.id).await.unwrap();

        assert!(repo.find_account("google", "g-1").await.unwrap().is_none());
        assert!(repo.find_session_by_refresh_token("r1").await.unwrap().is_none());
        assert!(repo.find_verification_token("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verification_token_round_trip() {
        let repo = setup().await;
        let user = repo.create_user(new_user("a@x.com")).await.unwrap();
        let created = repo
            .create_verification_token(NewVerificationToken {
                user_id: user.id.clone(),
                token: "opaque".to_string(),
                token_type: TokenType::PasswordReset,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();
        assert!(created.id.starts_with("K_"));

        let found = repo.find_verification_token("opaque").await.unwrap().unwrap();
        assert_eq!(found.token_type, TokenType::PasswordReset);
        assert_eq!(found.user_id, user.id);

        assert!(repo.delete_verification_token(&found.id).await.unwrap());
        assert!(repo.find_verification_token("opaque").await.unwrap().is_none());
        assert!(!repo.delete_verification_token(&found.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_profile_and_password_updates() {
        let repo = setup().await;
        let user = repo.create_user(new_user("a@x.com")).await.unwrap();

        let updated = repo
            .update_user_profile(
                &user.id,
                &ProfileUpdate {
                    name: Some("Ada".to_string()),
                    avatar: Some("https://img/ada.png".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Ada"));

        repo.update_user_password(&user.id, "new-digest").await.unwrap();
        repo.mark_email_verified(&user.id).await.unwrap();
        let reloaded = repo.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password.as_deref(), Some("new-digest"));
        assert!(reloaded.email_verified);

        assert!(matches!(
            repo.update_user_password("U_MISSING", "x").await,
            Err(RepositoryError::NotFound)
        ));
    }
}
