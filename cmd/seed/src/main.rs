//! Applies migrations and creates the initial admin account.
//!
//! Safe to run repeatedly: an existing admin is left untouched.

use std::sync::Arc;

use anyhow::{Context, Result};
use auth_adapters::{JwtKeys, PasswordAuth};
use configs::{LogFormat, LogSettings, Settings};
use domains::{Clock, DomainError, Role, SystemClock};
use secrecy::ExposeSecret;
use services::{AccountService, Registration};
use storage_adapters::PgStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log: &LogSettings) {
    let json = log.format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log.level.as_str().into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    init_tracing(&settings.log);

    let store = Arc::new(
        PgStore::connect(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
        )
        .await
        .context("Failed to connect to database")?,
    );
    store.migrate().await.context("Failed to run migrations")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let keys = JwtKeys::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::minutes(settings.auth.token_ttl_minutes),
    );
    let auth = Arc::new(PasswordAuth::new(store.clone(), keys, clock.clone()));
    let accounts = AccountService::new(store, auth, clock);

    let password = settings
        .seed
        .admin_password
        .as_ref()
        .context("KITCHEN__SEED__ADMIN_PASSWORD must be set")?;
    let registration = Registration {
        username: settings.seed.admin_username.clone(),
        email: settings.seed.admin_email.clone(),
        password: password.expose_secret().to_string(),
    };

    match accounts.create_with_role(registration, Role::Admin).await {
        Ok(admin) => tracing::info!(user_id = %admin.id, username = %admin.username, "admin created"),
        Err(DomainError::Conflict(_)) => {
            tracing::info!(username = %settings.seed.admin_username, "admin already exists, skipping")
        }
        Err(e) => return Err(e).context("Failed to create admin"),
    }
    Ok(())
}
