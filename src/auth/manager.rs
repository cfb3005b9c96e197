use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::{
    api::ApiClient,
    db::{models::UserAccount, Database},
};

use super::Session;

/// Login and logout against the remote API, persisting the account locally.
pub struct AuthManager {
    api: ApiClient,
    db: Database,
    session: Arc<Session>,
}

impl AuthManager {
    pub fn new(api: ApiClient, db: Database, session: Arc<Session>) -> Self {
        Self { api, db, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Errors from the API stay downcastable to `ApiError`.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserAccount> {
        let (account, groups) = self.api.login(username, password).await?;
        let token = account.auth_token.clone().unwrap_or_default();

        let stored = self
            .db
            .save_login(account, groups)
            .await
            .context("failed to store account")?;
        self.session.set_token(token)?;

        info!("Logged in as {}", stored.full_name());
        Ok(stored)
    }

    /// Discard the token. The stored account and groups are kept.
    pub async fn logout(&self) -> Result<()> {
        self.session.clear()?;
        self.db.clear_auth_token().await?;
        info!("Logged out");
        Ok(())
    }

    /// The stored account while a session is active.
    pub async fn current_user(&self) -> Result<Option<UserAccount>> {
        if !self.session.is_authenticated() {
            return Ok(None);
        }
        self.db.current_user().await
    }
}
