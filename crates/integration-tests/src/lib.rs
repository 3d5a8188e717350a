//! Shared fixtures for the integration tests: real services wired to the
//! in-memory store, a fixed clock and the JWT auth adapter.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use auth_adapters::{JwtKeys, PasswordAuth};
use chrono::{Duration, TimeZone, Utc};
use domains::{Clock, FixedClock, NewRecipe, Recipe, Role, User};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::FirstName;
use fake::Fake;
use services::{
    AccountService, ModerationService, NotificationDispatcher, RatingAggregator, RecipeLifecycle,
    Registration,
};
use storage_adapters::MemoryStore;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

static NEXT_USER: AtomicU32 = AtomicU32::new(1);

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub accounts: AccountService,
    pub moderation: ModerationService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_else(Utc::now);
        let clock = Arc::new(FixedClock::new(start));
        let clock_dyn: Arc<dyn Clock> = clock.clone();

        let auth = Arc::new(PasswordAuth::new(
            store.clone(),
            JwtKeys::new(b"integration-secret", Duration::hours(1)),
            clock_dyn.clone(),
        ));
        let accounts = AccountService::new(store.clone(), auth, clock_dyn.clone());

        let dispatcher = NotificationDispatcher::new(store.clone(), store.clone(), clock_dyn.clone());
        let lifecycle = RecipeLifecycle::new(store.clone(), dispatcher.clone(), clock_dyn.clone());
        let ratings = RatingAggregator::new(
            store.clone(),
            store.clone(),
            dispatcher.clone(),
            clock_dyn.clone(),
        );
        let moderation = ModerationService::new(lifecycle, ratings, store.clone(), dispatcher, clock_dyn);

        Self {
            store,
            clock,
            accounts,
            moderation,
        }
    }

    /// Registers a fresh account with a generated name and email.
    pub async fn user(&self, role: Role) -> User {
        let n = NEXT_USER.fetch_add(1, Ordering::Relaxed);
        let first: String = FirstName().fake();
        let email: String = SafeEmail().fake();
        let username: String = first
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(16)
            .collect::<String>()
            .to_lowercase();

        self.accounts
            .create_with_role(
                Registration {
                    username: format!("{username}_{n}"),
                    email: format!("{n}.{email}"),
                    password: TEST_PASSWORD.to_string(),
                },
                role,
            )
            .await
            .expect("fixture user should register")
    }

    /// A private recipe owned by `owner`.
    pub async fn recipe(&self, owner: &User, title: &str) -> Recipe {
        self.moderation
            .create_recipe(owner, draft(title))
            .await
            .expect("fixture recipe should be created")
    }

    /// A recipe taken all the way to public by `admin`.
    pub async fn published_recipe(&self, owner: &User, admin: &User, title: &str) -> Recipe {
        let recipe = self.recipe(owner, title).await;
        self.moderation
            .submit_for_review(recipe.id, owner)
            .await
            .expect("fixture submit should succeed");
        self.moderation
            .approve(recipe.id, admin)
            .await
            .expect("fixture approval should succeed")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn draft(title: &str) -> NewRecipe {
    NewRecipe {
        title: title.to_string(),
        description: Some("A weeknight staple.".to_string()),
        ingredients: "2 eggs\n1 cup flour\n1 cup milk".to_string(),
        instructions: "Whisk everything together and cook in a hot pan.".to_string(),
        cuisine: Some("french".to_string()),
        dietary_tags: vec!["vegetarian".to_string()],
        prep_time: Some(10.0),
        cook_time: Some(15.0),
        total_time: Some(25.0),
        servings: Some(4),
    }
}
