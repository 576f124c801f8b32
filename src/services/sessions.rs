// src/services/sessions.rs
//! Session store adapter: the only server-side record of refresh capability.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::models::{ClientInfo, Session};
use crate::repository::{AuthRepository, NewSession, RepoResult};

#[derive(Clone)]
pub struct SessionStore {
    repo: Arc<dyn AuthRepository>,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn AuthRepository>, max_age: Duration) -> Self {
        Self { repo, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub async fn create(
        &self,
        user_id: &str,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> RepoResult<Session> {
        let session = self
            .repo
            .create_session(NewSession {
                user_id: user_id.to_string(),
                refresh_token: refresh_token.to_string(),
                user_agent: client.user_agent.clone(),
                ip_address: client.ip_address.clone(),
                expires_at: Utc::now() + self.max_age,
            })
            .await?;
        debug!(user_id = %user_id, session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Session holding exactly this refresh token, if it has not expired.
    pub async fn find_active(&self, refresh_token: &str) -> RepoResult<Option<Session>> {
        let session = self.repo.find_session_by_refresh_token(refresh_token).await?;
        Ok(session.filter(|s| !s.is_expired(Utc::now())))
    }

    /// Overwrites the session's refresh token in place and renews its expiry.
    /// Returns `None` when the row no longer holds `session.refresh_token`.
    pub async fn rotate(
        &self,
        session: &Session,
        new_refresh_token: &str,
    ) -> RepoResult<Option<Session>> {
        let rotated = self
            .repo
            .rotate_session(
                &session.id,
                &session.refresh_token,
                new_refresh_token,
                Utc::now() + self.max_age,
            )
            .await?;
        if rotated.is_some() {
            debug!(session_id = %session.id, "Session rotated");
        }
        Ok(rotated)
    }

    /// Deletes the session holding this refresh token. Returns the removed
    /// session, or `None` if nothing matched.
    pub async fn revoke(&self, refresh_token: &str) -> RepoResult<Option<Session>> {
        let Some(session) = self.repo.find_session_by_refresh_token(refresh_token).await? else {
            return Ok(None);
        };
        self.repo.delete_session(&session.id).await?;
        debug!(session_id = %session.id, "Session revoked");
        Ok(Some(session))
    }

    pub async fn revoke_all(&self, user_id: &str) -> RepoResult<u64> {
        let removed = self.repo.delete_sessions_for_user(user_id).await?;
        info!(user_id = %user_id, removed = removed, "All sessions revoked");
        Ok(removed)
    }
}
