//! # Postgres store
//!
//! Maps the relational model onto the `domains` entities. Enum columns are
//! TEXT guarded by CHECK constraints; the schema lives in `migrations/`.
//!
//! Every compound write runs inside one transaction so a concurrent reader
//! never sees a rating without its recomputed average.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    average_rating, Comment, CommentRepository, Notification, NotificationRepository,
    PreferenceRepository, Rating, RatingRepository, RatingUpsert, RatingWrite, Recipe,
    RecipeRepository, Transition, User, UserPreference, UserRepository, Visibility,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

const RECIPE_COLUMNS: &str = "id, owner_id, title, description, ingredients, instructions, cuisine, \
     dietary_tags, prep_time, cook_time, total_time, servings, visibility, is_immutable, \
     average_rating, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies any pending schema migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: Option<String>,
    ingredients: String,
    instructions: String,
    cuisine: Option<String>,
    dietary_tags: Vec<String>,
    prep_time: Option<f64>,
    cook_time: Option<f64>,
    total_time: Option<f64>,
    servings: Option<i32>,
    visibility: String,
    is_immutable: bool,
    average_rating: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = anyhow::Error;

    fn try_from(row: RecipeRow) -> anyhow::Result<Self> {
        Ok(Recipe {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            ingredients: row.ingredients,
            instructions: row.instructions,
            cuisine: row.cuisine,
            dietary_tags: row.dietary_tags,
            prep_time: row.prep_time,
            cook_time: row.cook_time,
            total_time: row.total_time,
            servings: row.servings,
            visibility: row.visibility.parse()?,
            is_immutable: row.is_immutable,
            average_rating: row.average_rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> anyhow::Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> anyhow::Result<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: Uuid,
    recipe_id: Uuid,
    user_id: Uuid,
    value: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating {
            id: row.id,
            recipe_id: row.recipe_id,
            user_id: row.user_id,
            value: row.value,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UpsertedRatingRow {
    #[sqlx(flatten)]
    rating: RatingRow,
    inserted: bool,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    recipe_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            recipe_id: row.recipe_id,
            user_id: row.user_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    user_id: Uuid,
    notify_on_comment: bool,
    notify_on_rating: bool,
    notify_on_recipe_approval: bool,
}

impl From<PreferenceRow> for UserPreference {
    fn from(row: PreferenceRow) -> Self {
        UserPreference {
            user_id: row.user_id,
            notify_on_comment: row.notify_on_comment,
            notify_on_rating: row.notify_on_rating,
            notify_on_recipe_approval: row.notify_on_recipe_approval,
        }
    }
}

/// Recomputes and stores the average for `recipe_id` inside `tx`.
async fn store_average(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    recipe_id: Uuid,
) -> anyhow::Result<f64> {
    let values: Vec<i16> = sqlx::query_scalar("SELECT value FROM ratings WHERE recipe_id = $1")
        .bind(recipe_id)
        .fetch_all(&mut **tx)
        .await?;
    let average = average_rating(&values);

    sqlx::query("UPDATE recipes SET average_rating = $2 WHERE id = $1")
        .bind(recipe_id)
        .bind(average)
        .execute(&mut **tx)
        .await?;
    Ok(average)
}

#[async_trait]
impl RecipeRepository for PgStore {
    async fn insert_recipe(&self, recipe: &Recipe) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO recipes (id, owner_id, title, description, ingredients, instructions, cuisine, \
             dietary_tags, prep_time, cook_time, total_time, servings, visibility, is_immutable, \
             average_rating, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(recipe.id)
        .bind(recipe.owner_id)
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(&recipe.ingredients)
        .bind(&recipe.instructions)
        .bind(&recipe.cuisine)
        .bind(recipe.dietary_tags.as_slice())
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.total_time)
        .bind(recipe.servings)
        .bind(recipe.visibility.as_str())
        .bind(recipe.is_immutable)
        .bind(recipe.average_rating)
        .bind(recipe.created_at)
        .bind(recipe.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Recipe::try_from).transpose()
    }

    async fn list_recipes_by_visibility(&self, visibility: Visibility) -> anyhow::Result<Vec<Recipe>> {
        sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE visibility = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(visibility.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Recipe::try_from)
        .collect()
    }

    async fn list_recipes_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
        sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Recipe::try_from)
        .collect()
    }

    async fn transition_recipe(
        &self,
        id: Uuid,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Recipe>> {
        // The WHERE clause is the compare-and-set.
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "UPDATE recipes SET visibility = $3, is_immutable = $4, updated_at = $5 \
             WHERE id = $1 AND visibility = $2 RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(transition.lock)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            debug!(recipe_id = %id, from = %transition.from, "stale transition rejected");
        }
        row.map(Recipe::try_from).transpose()
    }

    async fn update_recipe_content(&self, recipe: &Recipe) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE recipes SET title = $2, description = $3, ingredients = $4, instructions = $5, \
             cuisine = $6, dietary_tags = $7, prep_time = $8, cook_time = $9, total_time = $10, \
             servings = $11, updated_at = $12 \
             WHERE id = $1 AND NOT is_immutable",
        )
        .bind(recipe.id)
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(&recipe.ingredients)
        .bind(&recipe.instructions)
        .bind(&recipe.cuisine)
        .bind(recipe.dietary_tags.as_slice())
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.total_time)
        .bind(recipe.servings)
        .bind(recipe.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool> {
        // Comments and ratings go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl RatingRepository for PgStore {
    async fn upsert_rating(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
        value: i16,
        at: DateTime<Utc>,
    ) -> anyhow::Result<RatingUpsert> {
        let mut tx = self.pool.begin().await?;

        // Lock the recipe row: concurrent raters of the same recipe queue here.
        let visibility: Option<String> =
            sqlx::query_scalar("SELECT visibility FROM recipes WHERE id = $1 FOR UPDATE")
                .bind(recipe_id)
                .fetch_optional(&mut *tx)
                .await?;
        match visibility.as_deref() {
            None => return Ok(RatingUpsert::RecipeMissing),
            Some(v) if v != Visibility::Public.as_str() => return Ok(RatingUpsert::RecipeNotPublic),
            Some(_) => {}
        }

        let row = sqlx::query_as::<_, UpsertedRatingRow>(
            "INSERT INTO ratings (id, recipe_id, user_id, value, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             ON CONFLICT (recipe_id, user_id) \
             DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at \
             RETURNING id, recipe_id, user_id, value, created_at, updated_at, (xmax = 0) AS inserted",
        )
        .bind(Uuid::now_v7())
        .bind(recipe_id)
        .bind(user_id)
        .bind(value)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        let average = store_average(&mut tx, recipe_id).await?;
        tx.commit().await?;

        let write = RatingWrite {
            rating: row.rating.into(),
            average_rating: average,
        };
        Ok(if row.inserted {
            RatingUpsert::Inserted(write)
        } else {
            RatingUpsert::Updated(write)
        })
    }

    async fn remove_rating(&self, recipe_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<f64>> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(recipe_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM ratings WHERE recipe_id = $1 AND user_id = $2")
            .bind(recipe_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let average = store_average(&mut tx, recipe_id).await?;
        tx.commit().await?;
        Ok(Some(average))
    }

    async fn list_ratings(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingRow>(
            "SELECT id, recipe_id, user_id, value, created_at, updated_at \
             FROM ratings WHERE recipe_id = $1 ORDER BY created_at, id",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Rating::from).collect())
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert_comment(&self, comment: &Comment) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, recipe_id, user_id, content, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(comment.id)
        .bind(comment.recipe_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_comments(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, recipe_id, user_id, content, created_at \
             FROM comments WHERE recipe_id = $1 ORDER BY created_at, id",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }
}

#[async_trait]
impl PreferenceRepository for PgStore {
    async fn get_or_create_preferences(&self, user_id: Uuid) -> anyhow::Result<UserPreference> {
        let defaults = UserPreference::defaults_for(user_id);
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO user_preferences (user_id, notify_on_comment, notify_on_rating, notify_on_recipe_approval) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(defaults.notify_on_comment)
        .bind(defaults.notify_on_rating)
        .bind(defaults.notify_on_recipe_approval)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, PreferenceRow>(
            "SELECT user_id, notify_on_comment, notify_on_rating, notify_on_recipe_approval \
             FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn save_preferences(&self, preferences: &UserPreference) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, notify_on_comment, notify_on_rating, notify_on_recipe_approval) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
             notify_on_comment = EXCLUDED.notify_on_comment, \
             notify_on_rating = EXCLUDED.notify_on_rating, \
             notify_on_recipe_approval = EXCLUDED.notify_on_recipe_approval",
        )
        .bind(preferences.user_id)
        .bind(preferences.notify_on_comment)
        .bind(preferences.notify_on_rating)
        .bind(preferences.notify_on_recipe_approval)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, message, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> anyhow::Result<Option<Notification>> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, kind, message, is_read, created_at FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Notification::try_from)
        .transpose()
    }

    async fn list_notifications(&self, user_id: Uuid) -> anyhow::Result<Vec<Notification>> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, kind, message, is_read, created_at FROM notifications \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }

    async fn mark_notification_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
