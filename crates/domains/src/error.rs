//! # DomainError
//!
//! Centralized error handling for the KitchenHelper core.
//! Every failure is scoped to the operation that raised it; none is fatal.

use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::LifecycleAction;
use crate::models::Visibility;

/// The primary error type for all service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed input (e.g. rating out of range, blank title)
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting user lacks the rights for this action
    #[error("permission denied: {0}")]
    Permission(String),

    /// Lifecycle action not legal from the recipe's current state
    #[error("cannot {action} a recipe that is {from}")]
    InvalidTransition {
        from: Visibility,
        action: LifecycleAction,
    },

    /// Content edit attempted on a published, locked recipe
    #[error("recipe {0} is published and can no longer be edited")]
    ImmutableRecipe(Uuid),

    /// Rating or commenting on a recipe that is not public
    #[error("recipe {0} is not public")]
    RecipeNotPublic(Uuid),

    /// Referenced entity absent
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: String },

    /// Uniqueness violation (duplicate username or email)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Persistence failure, propagated unchanged from the store
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Failures reported by an [`AuthService`](crate::ports::AuthService).
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token was valid but its subject no longer exists
    #[error("user not found")]
    UnknownUser,

    #[error("auth backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// A specialized Result type for KitchenHelper logic.
pub type Result<T> = std::result::Result<T, DomainError>;
