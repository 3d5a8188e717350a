//! # ModerationService
//!
//! The single entry point callers use for community actions. Lifecycle and
//! rating calls are delegated; commenting lives here because it is nothing
//! more than "store, then tell the owner".

use std::sync::Arc;

use domains::{
    Clock, Comment, CommentRepository, DomainError, NewRecipe, NotificationKind, Rating, Recipe,
    RecipeChanges, Result, User,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::lifecycle::RecipeLifecycle;
use crate::notifications::NotificationDispatcher;
use crate::ratings::{RatingAggregator, RatingReceipt};

#[derive(Clone)]
pub struct ModerationService {
    lifecycle: RecipeLifecycle,
    ratings: RatingAggregator,
    comments: Arc<dyn CommentRepository>,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl ModerationService {
    pub fn new(
        lifecycle: RecipeLifecycle,
        ratings: RatingAggregator,
        comments: Arc<dyn CommentRepository>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            ratings,
            comments,
            dispatcher,
            clock,
        }
    }

    pub fn lifecycle(&self) -> &RecipeLifecycle {
        &self.lifecycle
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Adds a comment to a public recipe and lets the owner know, unless the
    /// owner is the one commenting.
    #[instrument(skip(self, user, content), fields(user_id = %user.id))]
    pub async fn comment(&self, recipe_id: Uuid, user: &User, content: &str) -> Result<Comment> {
        let recipe = self.lifecycle.load(recipe_id).await?;
        if !recipe.is_public() {
            return Err(DomainError::RecipeNotPublic(recipe_id));
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::Validation("comment must not be blank".to_string()));
        }

        let comment = Comment {
            id: Uuid::now_v7(),
            recipe_id,
            user_id: user.id,
            content: content.to_string(),
            created_at: self.clock.now(),
        };
        self.comments.insert_comment(&comment).await?;
        info!(comment_id = %comment.id, %recipe_id, "comment added");

        if recipe.is_owned_by(user) {
            debug!("owner commented on own recipe, no notification");
        } else {
            self.dispatcher
                .notify(
                    recipe.owner_id,
                    format!("{} commented on your recipe '{}'.", user.username, recipe.title),
                    NotificationKind::Comment,
                )
                .await?;
        }
        Ok(comment)
    }

    /// Comments on a recipe the viewer is allowed to see, oldest first.
    pub async fn comments(&self, recipe_id: Uuid, viewer: Option<&User>) -> Result<Vec<Comment>> {
        self.lifecycle.get(recipe_id, viewer).await?;
        Ok(self.comments.list_comments(recipe_id).await?)
    }

    pub async fn create_recipe(&self, owner: &User, draft: NewRecipe) -> Result<Recipe> {
        self.lifecycle.create(owner, draft).await
    }

    pub async fn submit_for_review(&self, recipe_id: Uuid, requester: &User) -> Result<Recipe> {
        self.lifecycle.submit_for_review(recipe_id, requester).await
    }

    pub async fn approve(&self, recipe_id: Uuid, admin: &User) -> Result<Recipe> {
        self.lifecycle.approve(recipe_id, admin).await
    }

    pub async fn reject(&self, recipe_id: Uuid, admin: &User, reason: &str) -> Result<Recipe> {
        self.lifecycle.reject(recipe_id, admin, reason).await
    }

    pub async fn edit(&self, recipe_id: Uuid, editor: &User, changes: RecipeChanges) -> Result<Recipe> {
        self.lifecycle.edit(recipe_id, editor, changes).await
    }

    pub async fn delete(&self, recipe_id: Uuid, requester: &User) -> Result<()> {
        self.lifecycle.delete(recipe_id, requester).await
    }

    pub async fn rate(&self, recipe_id: Uuid, user: &User, value: i32) -> Result<RatingReceipt> {
        self.ratings.rate(recipe_id, user, value).await
    }

    pub async fn remove_rating(&self, recipe_id: Uuid, user: &User) -> Result<f64> {
        self.ratings.remove_rating(recipe_id, user).await
    }

    pub async fn ratings(&self, recipe_id: Uuid) -> Result<Vec<Rating>> {
        self.ratings.ratings(recipe_id).await
    }
}
