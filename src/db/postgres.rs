use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use super::models::{NewGoal, NewUser, NutritionGoal, ProfileUpdate, UserProfile};
use super::{GoalStore, RegistrationStore, UserStore};

const USER_COLUMNS: &str = "id, telegram_user_id, username, first_name, last_name, age, gender, \
     height_cm, weight_kg, activity_level, is_active, is_premium, created_at, updated_at";

const GOAL_COLUMNS: &str = "id, user_id, goal_type, target_weight_kg, weekly_goal_kg, \
     target_calories, target_protein_g, target_fat_g, target_carbs_g, created_at, updated_at";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            telegram_user_id VARCHAR(255) NOT NULL UNIQUE,
            username VARCHAR(255),
            first_name VARCHAR(255),
            last_name VARCHAR(255),
            age INTEGER,
            gender VARCHAR(10),
            height_cm DOUBLE PRECISION,
            weight_kg DOUBLE PRECISION,
            activity_level VARCHAR(50),
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_premium BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_goals (
            id SERIAL PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            goal_type VARCHAR(50) NOT NULL,
            target_weight_kg DOUBLE PRECISION NOT NULL,
            weekly_goal_kg DOUBLE PRECISION,
            target_calories INTEGER NOT NULL,
            target_protein_g INTEGER NOT NULL,
            target_fat_g INTEGER NOT NULL,
            target_carbs_g INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_goals table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_goals_user_id ON user_goals (user_id)")
        .execute(pool)
        .await
        .context("Failed to create user_goals index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn parse_optional<T: FromStr>(value: Option<String>) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.map(|v| v.parse::<T>()).transpose().map_err(Into::into)
}

fn user_from_row(row: &PgRow) -> Result<UserProfile> {
    Ok(UserProfile {
        id: row.try_get("id")?,
        telegram_user_id: row.try_get("telegram_user_id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        age: row.try_get("age")?,
        gender: parse_optional(row.try_get("gender")?).context("Invalid stored gender")?,
        height_cm: row.try_get("height_cm")?,
        weight_kg: row.try_get("weight_kg")?,
        activity_level: parse_optional(row.try_get("activity_level")?)
            .context("Invalid stored activity level")?,
        is_active: row.try_get("is_active")?,
        is_premium: row.try_get("is_premium")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn goal_from_row(row: &PgRow) -> Result<NutritionGoal> {
    let goal_type: String = row.try_get("goal_type")?;
    Ok(NutritionGoal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        goal_type: goal_type.parse().context("Invalid stored goal type")?,
        target_weight_kg: row.try_get("target_weight_kg")?,
        weekly_goal_kg: row.try_get("weekly_goal_kg")?,
        target_calories: row.try_get("target_calories")?,
        target_protein_g: row.try_get("target_protein_g")?,
        target_fat_g: row.try_get("target_fat_g")?,
        target_carbs_g: row.try_get("target_carbs_g")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed profile and goal storage
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn update_user_sql() -> String {
    format!(
        "UPDATE users SET
            username = COALESCE($2, username),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            age = COALESCE($5, age),
            gender = COALESCE($6, gender),
            height_cm = COALESCE($7, height_cm),
            weight_kg = COALESCE($8, weight_kg),
            activity_level = COALESCE($9, activity_level),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    )
}

fn insert_goal_sql() -> String {
    format!(
        "INSERT INTO user_goals
            (user_id, goal_type, target_weight_kg, target_calories,
             target_protein_g, target_fat_g, target_carbs_g)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {GOAL_COLUMNS}"
    )
}

/// Apply the `Some` fields of a profile update; `None` when no row has this id
async fn update_user_row(
    conn: &mut PgConnection,
    id: i32,
    update: &ProfileUpdate,
) -> Result<Option<UserProfile>> {
    let row = sqlx::query(&update_user_sql())
        .bind(id)
        .bind(&update.username)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.age)
        .bind(update.gender.map(|g| g.as_str()))
        .bind(update.height_cm)
        .bind(update.weight_kg)
        .bind(update.activity_level.map(|a| a.as_str()))
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to update user")?;

    row.as_ref().map(user_from_row).transpose()
}

async fn insert_goal_row(
    conn: &mut PgConnection,
    user_id: i32,
    goal: &NewGoal,
) -> Result<NutritionGoal> {
    let row = sqlx::query(&insert_goal_sql())
        .bind(user_id)
        .bind(goal.goal_type.as_str())
        .bind(goal.target_weight_kg)
        .bind(goal.target_calories)
        .bind(goal.macros.protein_g)
        .bind(goal.macros.fat_g)
        .bind(goal.macros.carbs_g)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert goal")?;

    goal_from_row(&row)
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_by_telegram_id(&self, telegram_user_id: &str) -> Result<Option<UserProfile>> {
        debug!(telegram_user_id, "Looking up user by Telegram ID");

        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE telegram_user_id = $1"
        ))
        .bind(telegram_user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read user by Telegram ID")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<UserProfile>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read user by ID")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn create(&self, user: &NewUser) -> Result<UserProfile> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (telegram_user_id, username, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.telegram_user_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert new user")?;

        let profile = user_from_row(&row)?;
        info!(user_id = profile.id, "User created");
        Ok(profile)
    }

    async fn get_or_create(&self, user: &NewUser) -> Result<UserProfile> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(&format!(
            "INSERT INTO users (telegram_user_id, username, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (telegram_user_id)
             DO UPDATE SET telegram_user_id = EXCLUDED.telegram_user_id
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.telegram_user_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")?;

        let profile = user_from_row(&row)?;
        debug!(user_id = profile.id, telegram_user_id = %user.telegram_user_id, "User registered or found");
        Ok(profile)
    }

    async fn update(&self, id: i32, update: &ProfileUpdate) -> Result<Option<UserProfile>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        let profile = update_user_row(&mut *conn, id, update).await?;
        match &profile {
            Some(_) => info!(user_id = id, "User updated"),
            None => info!(user_id = id, "No user found to update"),
        }
        Ok(profile)
    }

    async fn list_active(&self, limit: i64) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active = TRUE ORDER BY id LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active users")?;

        rows.iter().map(user_from_row).collect()
    }
}

#[async_trait]
impl GoalStore for PgStore {
    async fn create_goal(&self, user_id: i32, goal: &NewGoal) -> Result<NutritionGoal> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        let goal = insert_goal_row(&mut *conn, user_id, goal).await?;
        info!(user_id, goal_id = goal.id, "Goal created");
        Ok(goal)
    }

    async fn list_goals(&self, user_id: i32) -> Result<Vec<NutritionGoal>> {
        let rows = sqlx::query(&format!(
            "SELECT {GOAL_COLUMNS} FROM user_goals WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list goals")?;

        rows.iter().map(goal_from_row).collect()
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn save_registration(
        &self,
        telegram_user_id: &str,
        update: &ProfileUpdate,
        goal: &NewGoal,
    ) -> Result<Option<(UserProfile, NutritionGoal)>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start registration transaction")?;

        let user_id: Option<i32> =
            sqlx::query_scalar("SELECT id FROM users WHERE telegram_user_id = $1 FOR UPDATE")
                .bind(telegram_user_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to lock user row")?;

        let Some(user_id) = user_id else {
            tx.rollback().await.context("Failed to roll back registration")?;
            info!(telegram_user_id, "No user found for registration");
            return Ok(None);
        };

        let profile = update_user_row(&mut *tx, user_id, update)
            .await?
            .context("Locked user row disappeared")?;
        let goal = insert_goal_row(&mut *tx, user_id, goal).await?;

        tx.commit()
            .await
            .context("Failed to commit registration")?;

        info!(user_id, goal_id = goal.id, "Registration saved");
        Ok(Some((profile, goal)))
    }
}
