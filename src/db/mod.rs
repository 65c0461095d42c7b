//! Persistence for user profiles and nutrition goals.
//!
//! The bot talks to storage through the [`UserStore`], [`GoalStore`] and
//! [`RegistrationStore`] traits:
//! - `postgres`: the production store on top of a `sqlx` connection pool
//! - `memory`: a process-local store used when no database is configured and in tests

use anyhow::Result;
use async_trait::async_trait;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::InMemoryStore;
pub use models::{NewGoal, NewUser, NutritionGoal, ProfileUpdate, UserProfile};
pub use postgres::{init_database_schema, PgStore};

/// Access to user profiles keyed by their Telegram identifier
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_telegram_id(&self, telegram_user_id: &str) -> Result<Option<UserProfile>>;

    async fn get_by_id(&self, id: i32) -> Result<Option<UserProfile>>;

    /// Insert a new user; fails if the Telegram identifier already exists
    async fn create(&self, user: &NewUser) -> Result<UserProfile>;

    /// Return the user with this Telegram identifier, inserting it if needed.
    ///
    /// A single atomic operation, so concurrent first contacts for the same
    /// identifier end up with one row.
    async fn get_or_create(&self, user: &NewUser) -> Result<UserProfile>;

    /// Apply the `Some` fields of `update`; `Ok(None)` when no such user exists
    async fn update(&self, id: i32, update: &ProfileUpdate) -> Result<Option<UserProfile>>;

    async fn list_active(&self, limit: i64) -> Result<Vec<UserProfile>>;
}

/// Append-only access to nutrition goals
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn create_goal(&self, user_id: i32, goal: &NewGoal) -> Result<NutritionGoal>;

    /// Every goal recorded for a user, oldest first
    async fn list_goals(&self, user_id: i32) -> Result<Vec<NutritionGoal>>;
}

/// Store used by the conversation layer
#[async_trait]
pub trait RegistrationStore: UserStore + GoalStore {
    /// Write the collected profile fields and the new goal in one atomic step.
    ///
    /// Returns `Ok(None)` without writing anything when the user does not exist.
    async fn save_registration(
        &self,
        telegram_user_id: &str,
        update: &ProfileUpdate,
        goal: &NewGoal,
    ) -> Result<Option<(UserProfile, NutritionGoal)>>;
}
