//! # In-memory store
//!
//! All tables live behind one async mutex, so every port call is a single
//! atomic unit exactly like a database transaction would be. Ratings are
//! keyed by `(recipe_id, user_id)`, which is the uniqueness constraint.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    average_rating, Comment, CommentRepository, Notification, NotificationRepository,
    PreferenceRepository, Rating, RatingRepository, RatingUpsert, RatingWrite, Recipe,
    RecipeRepository, Transition, User, UserPreference, UserRepository, Visibility,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    preferences: HashMap<Uuid, UserPreference>,
    recipes: HashMap<Uuid, Recipe>,
    ratings: HashMap<(Uuid, Uuid), Rating>,
    comments: HashMap<Uuid, Comment>,
    notifications: HashMap<Uuid, Notification>,
}

impl Tables {
    fn recompute_average(&mut self, recipe_id: Uuid) -> f64 {
        let values: Vec<i16> = self
            .ratings
            .values()
            .filter(|r| r.recipe_id == recipe_id)
            .map(|r| r.value)
            .collect();
        let average = average_rating(&values);
        if let Some(recipe) = self.recipes.get_mut(&recipe_id) {
            recipe.average_rating = average;
        }
        average
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn insert_recipe(&self, recipe: &Recipe) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&recipe.owner_id) {
            anyhow::bail!("owner {} does not exist", recipe.owner_id);
        }
        if t.recipes.contains_key(&recipe.id) {
            anyhow::bail!("recipe {} already exists", recipe.id);
        }
        t.recipes.insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn find_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        Ok(self.tables.lock().await.recipes.get(&id).cloned())
    }

    async fn list_recipes_by_visibility(&self, visibility: Visibility) -> anyhow::Result<Vec<Recipe>> {
        let t = self.tables.lock().await;
        let mut recipes: Vec<Recipe> = t
            .recipes
            .values()
            .filter(|r| r.visibility == visibility)
            .cloned()
            .collect();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(recipes)
    }

    async fn list_recipes_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
        let t = self.tables.lock().await;
        let mut recipes: Vec<Recipe> = t
            .recipes
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(recipes)
    }

    async fn transition_recipe(
        &self,
        id: Uuid,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut t = self.tables.lock().await;
        let Some(recipe) = t.recipes.get_mut(&id) else {
            return Ok(None);
        };
        if recipe.visibility != transition.from {
            debug!(recipe_id = %id, stored = %recipe.visibility, "stale transition rejected");
            return Ok(None);
        }
        recipe.visibility = transition.to;
        recipe.is_immutable = transition.lock;
        recipe.updated_at = at;
        Ok(Some(recipe.clone()))
    }

    async fn update_recipe_content(&self, recipe: &Recipe) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let Some(stored) = t.recipes.get_mut(&recipe.id) else {
            return Ok(false);
        };
        if stored.is_immutable {
            return Ok(false);
        }
        stored.title = recipe.title.clone();
        stored.description = recipe.description.clone();
        stored.ingredients = recipe.ingredients.clone();
        stored.instructions = recipe.instructions.clone();
        stored.cuisine = recipe.cuisine.clone();
        stored.dietary_tags = recipe.dietary_tags.clone();
        stored.prep_time = recipe.prep_time;
        stored.cook_time = recipe.cook_time;
        stored.total_time = recipe.total_time;
        stored.servings = recipe.servings;
        stored.updated_at = recipe.updated_at;
        Ok(true)
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        if t.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        t.ratings.retain(|(recipe_id, _), _| *recipe_id != id);
        t.comments.retain(|_, c| c.recipe_id != id);
        Ok(true)
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn upsert_rating(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
        value: i16,
        at: DateTime<Utc>,
    ) -> anyhow::Result<RatingUpsert> {
        let mut t = self.tables.lock().await;
        match t.recipes.get(&recipe_id) {
            None => return Ok(RatingUpsert::RecipeMissing),
            Some(r) if r.visibility != Visibility::Public => return Ok(RatingUpsert::RecipeNotPublic),
            Some(_) => {}
        }

        let key = (recipe_id, user_id);
        let inserted = !t.ratings.contains_key(&key);
        let rating = t
            .ratings
            .entry(key)
            .and_modify(|r| {
                r.value = value;
                r.updated_at = at;
            })
            .or_insert_with(|| Rating {
                id: Uuid::now_v7(),
                recipe_id,
                user_id,
                value,
                created_at: at,
                updated_at: at,
            })
            .clone();

        let write = RatingWrite {
            rating,
            average_rating: t.recompute_average(recipe_id),
        };
        Ok(if inserted {
            RatingUpsert::Inserted(write)
        } else {
            RatingUpsert::Updated(write)
        })
    }

    async fn remove_rating(&self, recipe_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<f64>> {
        let mut t = self.tables.lock().await;
        if !t.recipes.contains_key(&recipe_id) {
            return Ok(None);
        }
        t.ratings.remove(&(recipe_id, user_id));
        Ok(Some(t.recompute_average(recipe_id)))
    }

    async fn list_ratings(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Rating>> {
        let t = self.tables.lock().await;
        let mut ratings: Vec<Rating> = t
            .ratings
            .values()
            .filter(|r| r.recipe_id == recipe_id)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(ratings)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert_comment(&self, comment: &Comment) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        if !t.recipes.contains_key(&comment.recipe_id) {
            anyhow::bail!("recipe {} does not exist", comment.recipe_id);
        }
        t.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn list_comments(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let t = self.tables.lock().await;
        let mut comments: Vec<Comment> = t
            .comments
            .values()
            .filter(|c| c.recipe_id == recipe_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let taken = t
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken || t.users.contains_key(&user.id) {
            return Ok(false);
        }
        t.users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl PreferenceRepository for MemoryStore {
    async fn get_or_create_preferences(&self, user_id: Uuid) -> anyhow::Result<UserPreference> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&user_id) {
            anyhow::bail!("user {user_id} does not exist");
        }
        Ok(*t
            .preferences
            .entry(user_id)
            .or_insert_with(|| UserPreference::defaults_for(user_id)))
    }

    async fn save_preferences(&self, preferences: &UserPreference) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&preferences.user_id) {
            anyhow::bail!("user {} does not exist", preferences.user_id);
        }
        t.preferences.insert(preferences.user_id, *preferences);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&notification.user_id) {
            anyhow::bail!("user {} does not exist", notification.user_id);
        }
        t.notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> anyhow::Result<Option<Notification>> {
        Ok(self.tables.lock().await.notifications.get(&id).cloned())
    }

    async fn list_notifications(&self, user_id: Uuid) -> anyhow::Result<Vec<Notification>> {
        let t = self.tables.lock().await;
        let mut notifications: Vec<Notification> = t
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        match t.notifications.get_mut(&id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{decide, LifecycleAction, NewRecipe, Role};

    async fn seeded() -> (MemoryStore, User, Recipe) {
        let store = MemoryStore::new();
        let owner = User {
            id: Uuid::now_v7(),
            username: "owner".into(),
            email: "owner@example.com".into(),
            password_hash: String::new(),
            role: Role::User,
            created_at: Utc::now(),
        };
        store.insert_user(&owner).await.unwrap();
        let draft = NewRecipe {
            title: "Ramen".into(),
            ingredients: "noodles".into(),
            instructions: "boil".into(),
            ..Default::default()
        };
        let recipe = Recipe::new(owner.id, draft, Utc::now()).unwrap();
        store.insert_recipe(&recipe).await.unwrap();
        (store, owner, recipe)
    }

    async fn publish(store: &MemoryStore, id: Uuid) {
        for action in [LifecycleAction::SubmitForReview, LifecycleAction::Approve] {
            let current = store.find_recipe(id).await.unwrap().unwrap();
            let t = decide(current.visibility, action).unwrap();
            store.transition_recipe(id, t, Utc::now()).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let (store, _, recipe) = seeded().await;
        let submit = decide(Visibility::Private, LifecycleAction::SubmitForReview).unwrap();
        assert!(store.transition_recipe(recipe.id, submit, Utc::now()).await.unwrap().is_some());
        // Same transition again: stored state is no longer `private`.
        assert!(store.transition_recipe(recipe.id, submit, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rating_upsert_keeps_one_row() {
        let (store, owner, recipe) = seeded().await;
        publish(&store, recipe.id).await;

        let first = store.upsert_rating(recipe.id, owner.id, 3, Utc::now()).await.unwrap();
        assert!(matches!(first, RatingUpsert::Inserted(_)));
        let second = store.upsert_rating(recipe.id, owner.id, 5, Utc::now()).await.unwrap();
        let RatingUpsert::Updated(write) = second else {
            panic!("expected an update, got {second:?}");
        };
        assert_eq!(write.average_rating, 5.0);
        assert_eq!(store.list_ratings(recipe.id).await.unwrap().len(), 1);
        assert_eq!(store.find_recipe(recipe.id).await.unwrap().unwrap().average_rating, 5.0);
    }

    #[tokio::test]
    async fn test_rating_private_recipe_is_refused() {
        let (store, owner, recipe) = seeded().await;
        let out = store.upsert_rating(recipe.id, owner.id, 4, Utc::now()).await.unwrap();
        assert_eq!(out, RatingUpsert::RecipeNotPublic);
        assert!(store.list_ratings(recipe.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_locked_recipe_content_is_not_written() {
        let (store, _, recipe) = seeded().await;
        publish(&store, recipe.id).await;
        let mut edited = recipe.clone();
        edited.title = "Tonkotsu Ramen".into();
        assert!(!store.update_recipe_content(&edited).await.unwrap());
        assert_eq!(store.find_recipe(recipe.id).await.unwrap().unwrap().title, "Ramen");
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_refused() {
        let (store, owner, _) = seeded().await;
        let mut clash = owner.clone();
        clash.id = Uuid::now_v7();
        clash.username = "someone-else".into();
        assert!(!store.insert_user(&clash).await.unwrap());
    }

    #[tokio::test]
    async fn test_preferences_materialize_once() {
        let (store, owner, _) = seeded().await;
        let mut prefs = store.get_or_create_preferences(owner.id).await.unwrap();
        assert_eq!(prefs, UserPreference::defaults_for(owner.id));
        prefs.notify_on_comment = false;
        store.save_preferences(&prefs).await.unwrap();
        let again = store.get_or_create_preferences(owner.id).await.unwrap();
        assert!(!again.notify_on_comment);
    }
}
