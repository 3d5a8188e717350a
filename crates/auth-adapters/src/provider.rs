//! [`AuthService`] backed by the user repository, Argon2 and JWT.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{AuthError, AuthService, Clock, User, UserRepository};
use tracing::{debug, instrument, warn};

use crate::jwt::JwtKeys;
use crate::password;

pub struct PasswordAuth {
    users: Arc<dyn UserRepository>,
    keys: JwtKeys,
    clock: Arc<dyn Clock>,
}

impl PasswordAuth {
    pub fn new(users: Arc<dyn UserRepository>, keys: JwtKeys, clock: Arc<dyn Clock>) -> Self {
        Self { users, keys, clock }
    }
}

#[async_trait]
impl AuthService for PasswordAuth {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        // Argon2 is CPU-bound; run it on the blocking pool.
        let plain = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(hash)
    }

    #[instrument(skip(self, password))]
    async fn verify_credentials(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_user_by_username(username).await? else {
            debug!("login for unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let candidate = password.to_owned();
        let stored = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || password::verify_password(&candidate, &stored))
            .await
            .map_err(anyhow::Error::from)?;

        if !matches {
            warn!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        self.keys.issue(user.id, self.clock.now())
    }

    async fn resolve_token(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self.keys.verify(token, self.clock.now())?;
        self.users
            .find_user(user_id)
            .await?
            .ok_or(AuthError::UnknownUser)
    }
}
