//! # RatingAggregator
//!
//! One rating per (recipe, user), upserted atomically together with the
//! recipe's average. Only brand-new ratings notify the owner, so re-rating
//! does not spam them.

use std::sync::Arc;

use domains::{
    validate_rating, Clock, DomainError, NotificationKind, Rating, RatingRepository, RatingUpsert,
    RatingWrite, RecipeRepository, Result, User,
};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::notifications::NotificationDispatcher;

/// What a successful `rate` call produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingReceipt {
    pub rating: Rating,
    pub average_rating: f64,
    /// `false` when an existing rating was overwritten
    pub created: bool,
}

#[derive(Clone)]
pub struct RatingAggregator {
    ratings: Arc<dyn RatingRepository>,
    recipes: Arc<dyn RecipeRepository>,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl RatingAggregator {
    pub fn new(
        ratings: Arc<dyn RatingRepository>,
        recipes: Arc<dyn RecipeRepository>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ratings,
            recipes,
            dispatcher,
            clock,
        }
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn rate(&self, recipe_id: Uuid, user: &User, value: i32) -> Result<RatingReceipt> {
        let value = validate_rating(value)?;

        let outcome = self
            .ratings
            .upsert_rating(recipe_id, user.id, value, self.clock.now())
            .await?;
        let (RatingWrite { rating, average_rating }, created) = match outcome {
            RatingUpsert::Inserted(write) => (write, true),
            RatingUpsert::Updated(write) => (write, false),
            RatingUpsert::RecipeNotPublic => return Err(DomainError::RecipeNotPublic(recipe_id)),
            RatingUpsert::RecipeMissing => return Err(DomainError::not_found("recipe", recipe_id)),
        };
        info!(%recipe_id, value, average_rating, created, "rating recorded");

        if !created {
            debug!(%recipe_id, "re-rating, owner not notified");
        } else if let Some(recipe) = self.recipes.find_recipe(recipe_id).await? {
            self.dispatcher
                .notify(
                    recipe.owner_id,
                    format!(
                        "{} rated your recipe '{}' {} out of 5.",
                        user.username, recipe.title, value
                    ),
                    NotificationKind::Rating,
                )
                .await?;
        } else {
            // Deleted after the rating committed; the rating itself stands.
            debug!(%recipe_id, "recipe gone before owner could be notified");
        }

        Ok(RatingReceipt {
            rating,
            average_rating,
            created,
        })
    }

    /// Drops the user's rating if there is one and returns the new average.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn remove_rating(&self, recipe_id: Uuid, user: &User) -> Result<f64> {
        let average = self
            .ratings
            .remove_rating(recipe_id, user.id)
            .await?
            .ok_or_else(|| DomainError::not_found("recipe", recipe_id))?;
        info!(%recipe_id, average_rating = average, "rating removed");
        Ok(average)
    }

    pub async fn ratings(&self, recipe_id: Uuid) -> Result<Vec<Rating>> {
        Ok(self.ratings.list_ratings(recipe_id).await?)
    }
}
