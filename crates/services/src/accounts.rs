//! Account registration and "who is calling" resolution.
//!
//! Credential hashing and tokens belong to the [`AuthService`] adapter; this
//! service only validates input and keeps usernames and emails unique.

use std::sync::Arc;

use domains::{AuthService, Clock, DomainError, Result, Role, User, UserRepository};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(DomainError::Validation(format!(
                "username must be {} to {} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            )));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(DomainError::Validation(
                "username may only contain letters, digits, '_', '.' and '-'".to_string(),
            ));
        }

        let mut parts = self.email.trim().split('@');
        let valid_email = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
        );
        if !valid_email {
            return Err(DomainError::Validation("email address is not valid".to_string()));
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    auth: Arc<dyn AuthService>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, auth: Arc<dyn AuthService>, clock: Arc<dyn Clock>) -> Self {
        Self { users, auth, clock }
    }

    /// Creates a regular account.
    pub async fn register(&self, registration: Registration) -> Result<User> {
        self.create_with_role(registration, Role::User).await
    }

    /// Creates an account with an explicit role. Used for bootstrapping the
    /// first admin; public sign-up goes through [`AccountService::register`].
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn create_with_role(&self, registration: Registration, role: Role) -> Result<User> {
        registration.validate()?;

        let password_hash = self.auth.hash_password(&registration.password).await?;
        let user = User {
            id: Uuid::now_v7(),
            username: registration.username.trim().to_string(),
            email: registration.email.trim().to_lowercase(),
            password_hash,
            role,
            created_at: self.clock.now(),
        };

        if !self.users.insert_user(&user).await? {
            return Err(DomainError::Conflict(
                "username or email already exists".to_string(),
            ));
        }
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Checks the credentials and hands back a session token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self.auth.verify_credentials(username, password).await?;
        Ok(self.auth.issue_token(&user).await?)
    }

    /// Resolves the acting user for a request.
    pub async fn current_user(&self, token: &str) -> Result<User> {
        Ok(self.auth.resolve_token(token).await?)
    }

    pub async fn find(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{AuthError, FixedClock, MockAuthService, MockUserRepository};

    fn registration() -> Registration {
        Registration {
            username: "julia_c".into(),
            email: "Julia@Example.com ".into(),
            password: "boeuf-bourguignon".into(),
        }
    }

    fn service(users: MockUserRepository, auth: MockAuthService) -> AccountService {
        AccountService::new(
            Arc::new(users),
            Arc::new(auth),
            Arc::new(FixedClock::new(Utc::now())),
        )
    }

    #[test]
    fn test_registration_rules() {
        assert!(registration().validate().is_ok());

        let mut r = registration();
        r.username = "jc".into();
        assert!(r.validate().is_err());

        let mut r = registration();
        r.username = "julia child".into();
        assert!(r.validate().is_err());

        let mut r = registration();
        r.email = "julia@".into();
        assert!(r.validate().is_err());

        let mut r = registration();
        r.email = "a@b@c".into();
        assert!(r.validate().is_err());

        let mut r = registration();
        r.password = "short".into();
        assert!(r.validate().is_err());
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_defaults_role() {
        let mut auth = MockAuthService::new();
        auth.expect_hash_password()
            .returning(|_| Ok("$argon2id$stub".to_string()));
        let mut users = MockUserRepository::new();
        users.expect_insert_user().times(1).returning(|_| Ok(true));

        let user = service(users, auth).register(registration()).await.unwrap();
        assert_eq!(user.email, "julia@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.password_hash, "$argon2id$stub");
    }

    #[tokio::test]
    async fn test_duplicate_account_is_conflict() {
        let mut auth = MockAuthService::new();
        auth.expect_hash_password().returning(|_| Ok("h".to_string()));
        let mut users = MockUserRepository::new();
        users.expect_insert_user().returning(|_| Ok(false));

        let err = service(users, auth).register(registration()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bad_login_surfaces_auth_error() {
        let mut auth = MockAuthService::new();
        auth.expect_verify_credentials()
            .returning(|_, _| Err(AuthError::InvalidCredentials));
        auth.expect_issue_token().never();

        let err = service(MockUserRepository::new(), auth)
            .login("julia_c", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Auth(AuthError::InvalidCredentials)));
    }
}
