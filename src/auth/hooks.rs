//! Lifecycle notifications
//!
//! Hooks run after the triggering operation has committed. A hook error is
//! logged and never changes the operation's outcome.

use async_trait::async_trait;

use super::models::{Session, User};

#[async_trait]
pub trait AuthHooks: Send + Sync {
    async fn on_user_created(&self, _user: &User) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_login(&self, _user: &User, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_logout(&self, _user_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_email_verified(&self, _user: &User) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Default hooks: every notification is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl AuthHooks for NoopHooks {}
