//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the services.
//!
//! Compound writes (state check + mutation + derived recomputation) are single
//! port calls so that each adapter can run them as one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AuthError;
use crate::lifecycle::Transition;
use crate::models::{Comment, Notification, Rating, Recipe, User, UserPreference, Visibility};

/// A rating row after a successful write, with the recomputed aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingWrite {
    pub rating: Rating,
    pub average_rating: f64,
}

/// Outcome of an atomic rating upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingUpsert {
    /// First rating from this user on this recipe
    Inserted(RatingWrite),
    /// The user's existing rating was overwritten
    Updated(RatingWrite),
    RecipeNotPublic,
    RecipeMissing,
}

/// Persistence contract for recipes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn insert_recipe(&self, recipe: &Recipe) -> anyhow::Result<()>;
    async fn find_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn list_recipes_by_visibility(&self, visibility: Visibility) -> anyhow::Result<Vec<Recipe>>;
    async fn list_recipes_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Recipe>>;

    /// Compare-and-set on visibility: applies `transition` only while the
    /// stored state still equals `transition.from`.
    /// Returns `None` when the recipe is gone or its state moved on.
    async fn transition_recipe(
        &self,
        id: Uuid,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Recipe>>;

    /// Writes the content fields of `recipe`, but only while the stored row
    /// is not locked. Returns `false` when nothing was written.
    async fn update_recipe_content(&self, recipe: &Recipe) -> anyhow::Result<bool>;

    /// Removes the recipe together with its comments and ratings.
    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool>;
}

/// Persistence contract for ratings. Holds at most one row per (recipe, user).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Checks the recipe is public, inserts or overwrites the rating and
    /// recomputes the recipe's average, all in one transaction.
    async fn upsert_rating(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
        value: i16,
        at: DateTime<Utc>,
    ) -> anyhow::Result<RatingUpsert>;

    /// Deletes the user's rating if present and recomputes the average.
    /// Returns the new average, or `None` when the recipe does not exist.
    async fn remove_rating(&self, recipe_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<f64>>;

    async fn list_ratings(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Rating>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Fails when the referenced recipe does not exist.
    async fn insert_comment(&self, comment: &Comment) -> anyhow::Result<()>;
    /// Oldest first.
    async fn list_comments(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Comment>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns `false` if the username or email is already taken.
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool>;
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Returns the stored preferences, materializing
    /// [`UserPreference::defaults_for`] on first access.
    async fn get_or_create_preferences(&self, user_id: Uuid) -> anyhow::Result<UserPreference>;
    async fn save_preferences(&self, preferences: &UserPreference) -> anyhow::Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> anyhow::Result<()>;
    async fn find_notification(&self, id: Uuid) -> anyhow::Result<Option<Notification>>;
    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid) -> anyhow::Result<Vec<Notification>>;
    /// Returns `false` if the notification does not exist.
    async fn mark_notification_read(&self, id: Uuid) -> anyhow::Result<bool>;
}

/// Identity contract. The core only uses it to find out who is acting;
/// hashing and token formats are the adapter's business.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_credentials(&self, username: &str, password: &str) -> Result<User, AuthError>;
    async fn issue_token(&self, user: &User) -> Result<String, AuthError>;
    async fn resolve_token(&self, token: &str) -> Result<User, AuthError>;
}

/// Source of creation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
