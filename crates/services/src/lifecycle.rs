//! # RecipeLifecycle
//!
//! Owns the recipe visibility state machine and the immutability lock.
//! Transition decisions come from [`domains::lifecycle::decide`]; this service
//! adds the permission checks, persists the outcome with a compare-and-set,
//! and only then tells the owner.

use std::sync::Arc;

use domains::{
    decide, Clock, DomainError, LifecycleAction, NewRecipe, NotificationKind, Recipe, RecipeChanges,
    RecipeRepository, Result, User, Visibility,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::notifications::NotificationDispatcher;

#[derive(Clone)]
pub struct RecipeLifecycle {
    recipes: Arc<dyn RecipeRepository>,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl RecipeLifecycle {
    pub fn new(
        recipes: Arc<dyn RecipeRepository>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            recipes,
            dispatcher,
            clock,
        }
    }

    /// Stores a new submission. Every recipe starts out private.
    #[instrument(skip(self, owner, draft), fields(owner_id = %owner.id))]
    pub async fn create(&self, owner: &User, draft: NewRecipe) -> Result<Recipe> {
        let recipe = Recipe::new(owner.id, draft, self.clock.now())?;
        self.recipes.insert_recipe(&recipe).await?;
        info!(recipe_id = %recipe.id, "recipe created");
        Ok(recipe)
    }

    /// Fetches a recipe as seen by `viewer`. Hidden recipes are reported as
    /// missing rather than forbidden.
    pub async fn get(&self, recipe_id: Uuid, viewer: Option<&User>) -> Result<Recipe> {
        let recipe = self.load(recipe_id).await?;
        if !recipe.is_visible_to(viewer) {
            return Err(DomainError::not_found("recipe", recipe_id));
        }
        Ok(recipe)
    }

    pub async fn list_public(&self) -> Result<Vec<Recipe>> {
        Ok(self
            .recipes
            .list_recipes_by_visibility(Visibility::Public)
            .await?)
    }

    pub async fn list_owned(&self, owner: &User) -> Result<Vec<Recipe>> {
        Ok(self.recipes.list_recipes_by_owner(owner.id).await?)
    }

    /// Recipes waiting for a decision. Staff may look, only admins decide.
    pub async fn review_queue(&self, moderator: &User) -> Result<Vec<Recipe>> {
        if !moderator.role.can_view_unpublished() {
            return Err(DomainError::Permission(
                "only staff can see the review queue".to_string(),
            ));
        }
        Ok(self
            .recipes
            .list_recipes_by_visibility(Visibility::Pending)
            .await?)
    }

    /// private → pending, requested by the owner.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id))]
    pub async fn submit_for_review(&self, recipe_id: Uuid, requester: &User) -> Result<Recipe> {
        let recipe = self.load(recipe_id).await?;
        if !recipe.is_owned_by(requester) {
            warn!("non-owner tried to submit a recipe for review");
            return Err(DomainError::Permission(
                "only the owner can submit a recipe for review".to_string(),
            ));
        }
        self.apply(recipe, LifecycleAction::SubmitForReview).await
    }

    /// pending → public and locked. The owner hears about it if they opted in.
    #[instrument(skip(self, admin), fields(admin_id = %admin.id))]
    pub async fn approve(&self, recipe_id: Uuid, admin: &User) -> Result<Recipe> {
        require_moderator(admin)?;
        let recipe = self.load(recipe_id).await?;
        let recipe = self.apply(recipe, LifecycleAction::Approve).await?;

        self.dispatcher
            .notify(
                recipe.owner_id,
                format!("Your recipe '{}' has been approved and is now public.", recipe.title),
                NotificationKind::Approval,
            )
            .await?;
        Ok(recipe)
    }

    /// pending → private. The owner is always told why.
    #[instrument(skip(self, admin, reason), fields(admin_id = %admin.id))]
    pub async fn reject(&self, recipe_id: Uuid, admin: &User, reason: &str) -> Result<Recipe> {
        require_moderator(admin)?;
        let recipe = self.load(recipe_id).await?;
        decide(recipe.visibility, LifecycleAction::Reject)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation(
                "a rejection needs a reason".to_string(),
            ));
        }
        let recipe = self.apply(recipe, LifecycleAction::Reject).await?;

        self.dispatcher
            .notify(
                recipe.owner_id,
                format!("Your recipe '{}' was not approved: {reason}", recipe.title),
                NotificationKind::Rejection,
            )
            .await?;
        Ok(recipe)
    }

    /// Applies content changes. Lifecycle fields cannot be reached from here.
    #[instrument(skip(self, editor, changes), fields(editor_id = %editor.id))]
    pub async fn edit(&self, recipe_id: Uuid, editor: &User, changes: RecipeChanges) -> Result<Recipe> {
        let mut recipe = self.load(recipe_id).await?;
        if !recipe.is_owned_by(editor) {
            warn!("non-owner tried to edit a recipe");
            return Err(DomainError::Permission(
                "only the owner can edit a recipe".to_string(),
            ));
        }
        if recipe.is_immutable {
            return Err(DomainError::ImmutableRecipe(recipe_id));
        }
        changes.validate()?;
        if changes.is_empty() {
            return Ok(recipe);
        }

        changes.apply_to(&mut recipe, self.clock.now());
        if !self.recipes.update_recipe_content(&recipe).await? {
            // Lost a race with approval or deletion.
            return match self.recipes.find_recipe(recipe_id).await? {
                Some(_) => Err(DomainError::ImmutableRecipe(recipe_id)),
                None => Err(DomainError::not_found("recipe", recipe_id)),
            };
        }
        info!(%recipe_id, "recipe edited");
        Ok(recipe)
    }

    /// Deletes a recipe with its comments and ratings. Owners and admins only.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id))]
    pub async fn delete(&self, recipe_id: Uuid, requester: &User) -> Result<()> {
        let recipe = self.load(recipe_id).await?;
        if !recipe.is_owned_by(requester) && !requester.role.can_delete_any_recipe() {
            warn!("unauthorized recipe deletion attempt");
            return Err(DomainError::Permission(
                "only the owner or an admin can delete a recipe".to_string(),
            ));
        }
        if !self.recipes.delete_recipe(recipe_id).await? {
            return Err(DomainError::not_found("recipe", recipe_id));
        }
        info!(%recipe_id, "recipe deleted");
        Ok(())
    }

    pub(crate) async fn load(&self, recipe_id: Uuid) -> Result<Recipe> {
        self.recipes
            .find_recipe(recipe_id)
            .await?
            .ok_or_else(|| DomainError::not_found("recipe", recipe_id))
    }

    async fn apply(&self, recipe: Recipe, action: LifecycleAction) -> Result<Recipe> {
        let transition = decide(recipe.visibility, action)?;
        let updated = self
            .recipes
            .transition_recipe(recipe.id, transition, self.clock.now())
            .await?;

        match updated {
            Some(updated) => {
                info!(
                    recipe_id = %updated.id,
                    from = %transition.from,
                    to = %transition.to,
                    "recipe visibility changed"
                );
                Ok(updated)
            }
            // Someone else moved the recipe first; report against its new state.
            None => match self.recipes.find_recipe(recipe.id).await? {
                Some(current) => Err(DomainError::InvalidTransition {
                    from: current.visibility,
                    action,
                }),
                None => Err(DomainError::not_found("recipe", recipe.id)),
            },
        }
    }
}

fn require_moderator(user: &User) -> Result<()> {
    if !user.role.can_moderate() {
        warn!(user_id = %user.id, role = %user.role, "moderation attempted without admin role");
        return Err(DomainError::Permission(
            "only admins can approve or reject recipes".to_string(),
        ));
    }
    Ok(())
}
