//! # Domain Models
//!
//! These structs represent the core entities of KitchenHelper.
//! We use UUID v7 for time-ordered, globally unique identification.
//! Relations are plain foreign keys: following one is always an explicit
//! repository lookup.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Result};

/// Lifecycle state of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Pending,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Pending => "pending",
            Visibility::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Visibility::Private),
            "pending" => Ok(Visibility::Pending),
            "public" => Ok(Visibility::Public),
            other => Err(DomainError::Validation(format!("unknown visibility '{other}'"))),
        }
    }
}

/// Account role. Capability checks dispatch on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Only admins may approve or reject submissions.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Admins may delete any recipe, not just their own.
    pub fn can_delete_any_recipe(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Staff and admins may look at recipes that are not yet public.
    pub fn can_view_unpublished(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Opaque credential produced by the auth service
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A community-submitted recipe.
///
/// `visibility`, `is_immutable` and `average_rating` are owned by the
/// services: edits never touch them, and `average_rating` is only ever
/// recomputed from the stored ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: String,
    pub instructions: String,
    pub cuisine: Option<String>,
    pub dietary_tags: Vec<String>,
    /// Minutes
    pub prep_time: Option<f64>,
    pub cook_time: Option<f64>,
    pub total_time: Option<f64>,
    pub servings: Option<i32>,
    pub visibility: Visibility,
    pub is_immutable: bool,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Builds a fresh private recipe from a validated draft.
    pub fn new(owner_id: Uuid, draft: NewRecipe, now: DateTime<Utc>) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id: Uuid::now_v7(),
            owner_id,
            title: draft.title.trim().to_string(),
            description: draft.description,
            ingredients: draft.ingredients,
            instructions: draft.instructions,
            cuisine: draft.cuisine,
            dietary_tags: normalize_tags(draft.dietary_tags),
            prep_time: draft.prep_time,
            cook_time: draft.cook_time,
            total_time: draft.total_time,
            servings: draft.servings,
            visibility: Visibility::Private,
            is_immutable: false,
            average_rating: 0.0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.owner_id == user.id
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Whether `viewer` may see this recipe at all.
    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        if self.is_public() {
            return true;
        }
        viewer.is_some_and(|u| self.is_owned_by(u) || u.role.can_view_unpublished())
    }
}

/// Content of a new submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: String,
    pub instructions: String,
    pub cuisine: Option<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    pub prep_time: Option<f64>,
    pub cook_time: Option<f64>,
    pub total_time: Option<f64>,
    pub servings: Option<i32>,
}

impl NewRecipe {
    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_text("ingredients", &self.ingredients)?;
        require_text("instructions", &self.instructions)?;
        check_minutes("prep_time", self.prep_time)?;
        check_minutes("cook_time", self.cook_time)?;
        check_minutes("total_time", self.total_time)?;
        check_servings(self.servings)
    }
}

/// A partial update of a recipe's content fields.
///
/// Lifecycle fields are deliberately absent: there is no way to change
/// visibility, the immutability lock or the rating through an edit.
/// `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub cuisine: Option<Option<String>>,
    pub dietary_tags: Option<Vec<String>>,
    pub prep_time: Option<Option<f64>>,
    pub cook_time: Option<Option<f64>>,
    pub total_time: Option<Option<f64>>,
    pub servings: Option<Option<i32>>,
}

impl RecipeChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.ingredients.is_none()
            && self.instructions.is_none()
            && self.cuisine.is_none()
            && self.dietary_tags.is_none()
            && self.prep_time.is_none()
            && self.cook_time.is_none()
            && self.total_time.is_none()
            && self.servings.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(ingredients) = &self.ingredients {
            require_text("ingredients", ingredients)?;
        }
        if let Some(instructions) = &self.instructions {
            require_text("instructions", instructions)?;
        }
        check_minutes("prep_time", self.prep_time.flatten())?;
        check_minutes("cook_time", self.cook_time.flatten())?;
        check_minutes("total_time", self.total_time.flatten())?;
        check_servings(self.servings.flatten())
    }

    /// Applies the changes to the content fields of `recipe`.
    pub fn apply_to(self, recipe: &mut Recipe, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            recipe.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            recipe.description = description;
        }
        if let Some(ingredients) = self.ingredients {
            recipe.ingredients = ingredients;
        }
        if let Some(instructions) = self.instructions {
            recipe.instructions = instructions;
        }
        if let Some(cuisine) = self.cuisine {
            recipe.cuisine = cuisine;
        }
        if let Some(tags) = self.dietary_tags {
            recipe.dietary_tags = normalize_tags(tags);
        }
        if let Some(prep_time) = self.prep_time {
            recipe.prep_time = prep_time;
        }
        if let Some(cook_time) = self.cook_time {
            recipe.cook_time = cook_time;
        }
        if let Some(total_time) = self.total_time {
            recipe.total_time = total_time;
        }
        if let Some(servings) = self.servings {
            recipe.servings = servings;
        }
        recipe.updated_at = now;
    }
}

/// Per-user notification switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub notify_on_comment: bool,
    pub notify_on_rating: bool,
    pub notify_on_recipe_approval: bool,
}

impl UserPreference {
    /// The preferences every user starts with: everything on.
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            notify_on_comment: true,
            notify_on_rating: true,
            notify_on_recipe_approval: true,
        }
    }

    /// Whether a notification of `kind` should be delivered.
    /// Rejections bypass preferences entirely.
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Comment => self.notify_on_comment,
            NotificationKind::Rating => self.notify_on_rating,
            NotificationKind::Approval => self.notify_on_recipe_approval,
            NotificationKind::Rejection => true,
        }
    }

    pub fn apply(&mut self, update: PreferenceUpdate) {
        if let Some(v) = update.notify_on_comment {
            self.notify_on_comment = v;
        }
        if let Some(v) = update.notify_on_rating {
            self.notify_on_rating = v;
        }
        if let Some(v) = update.notify_on_recipe_approval {
            self.notify_on_recipe_approval = v;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub notify_on_comment: Option<bool>,
    pub notify_on_rating: Option<bool>,
    pub notify_on_recipe_approval: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    /// Always within `1..=5`
    pub value: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Comment,
    Rating,
    Approval,
    Rejection,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Comment => "comment",
            NotificationKind::Rating => "rating",
            NotificationKind::Approval => "approval",
            NotificationKind::Rejection => "rejection",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "comment" => Ok(NotificationKind::Comment),
            "rating" => Ok(NotificationKind::Rating),
            "approval" => Ok(NotificationKind::Approval),
            "rejection" => Ok(NotificationKind::Rejection),
            other => Err(DomainError::Validation(format!(
                "unknown notification kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

fn check_minutes(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DomainError::Validation(format!(
            "{field} must be a non-negative number of minutes"
        ))),
        _ => Ok(()),
    }
}

fn check_servings(servings: Option<i32>) -> Result<()> {
    match servings {
        Some(n) if n < 1 => Err(DomainError::Validation(
            "servings must be a positive integer".to_string(),
        )),
        _ => Ok(()),
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
