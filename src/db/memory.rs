use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{NewGoal, NewUser, NutritionGoal, ProfileUpdate, UserProfile};
use super::{GoalStore, RegistrationStore, UserStore};

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<UserProfile>,
    goals: Vec<NutritionGoal>,
}

impl MemoryState {
    fn insert_user(&mut self, user: &NewUser) -> UserProfile {
        let now = Utc::now();
        let profile = UserProfile {
            id: self.users.len() as i32 + 1,
            telegram_user_id: user.telegram_user_id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            age: None,
            gender: None,
            height_cm: None,
            weight_kg: None,
            activity_level: None,
            is_active: true,
            is_premium: false,
            created_at: now,
            updated_at: now,
        };
        self.users.push(profile.clone());
        profile
    }

    fn update_user(&mut self, id: i32, update: &ProfileUpdate) -> Option<UserProfile> {
        let profile = self.users.iter_mut().find(|u| u.id == id)?;
        update.apply_to(profile);
        profile.updated_at = Utc::now();
        Some(profile.clone())
    }

    fn insert_goal(&mut self, user_id: i32, goal: &NewGoal) -> NutritionGoal {
        let now = Utc::now();
        let goal = NutritionGoal {
            id: self.goals.len() as i32 + 1,
            user_id,
            goal_type: goal.goal_type,
            target_weight_kg: goal.target_weight_kg,
            weekly_goal_kg: None,
            target_calories: goal.target_calories,
            target_protein_g: goal.macros.protein_g,
            target_fat_g: goal.macros.fat_g,
            target_carbs_g: goal.macros.carbs_g,
            created_at: now,
            updated_at: now,
        };
        self.goals.push(goal.clone());
        goal
    }
}

/// Process-local store; every operation runs under one lock
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_by_telegram_id(&self, telegram_user_id: &str) -> Result<Option<UserProfile>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.telegram_user_id == telegram_user_id)
            .cloned())
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<UserProfile>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: &NewUser) -> Result<UserProfile> {
        let mut state = self.state.lock().await;
        if state
            .users
            .iter()
            .any(|u| u.telegram_user_id == user.telegram_user_id)
        {
            bail!("User {} already exists", user.telegram_user_id);
        }
        let profile = state.insert_user(user);
        info!(user_id = profile.id, "User created");
        Ok(profile)
    }

    async fn get_or_create(&self, user: &NewUser) -> Result<UserProfile> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .users
            .iter()
            .find(|u| u.telegram_user_id == user.telegram_user_id)
        {
            debug!(user_id = existing.id, "User found");
            return Ok(existing.clone());
        }
        let profile = state.insert_user(user);
        info!(user_id = profile.id, "User created");
        Ok(profile)
    }

    async fn update(&self, id: i32, update: &ProfileUpdate) -> Result<Option<UserProfile>> {
        let mut state = self.state.lock().await;
        Ok(state.update_user(id, update))
    }

    async fn list_active(&self, limit: i64) -> Result<Vec<UserProfile>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .users
            .iter()
            .filter(|u| u.is_active)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GoalStore for InMemoryStore {
    async fn create_goal(&self, user_id: i32, goal: &NewGoal) -> Result<NutritionGoal> {
        let mut state = self.state.lock().await;
        if !state.users.iter().any(|u| u.id == user_id) {
            bail!("Cannot create goal for unknown user {user_id}");
        }
        Ok(state.insert_goal(user_id, goal))
    }

    async fn list_goals(&self, user_id: i32) -> Result<Vec<NutritionGoal>> {
        let state = self.state.lock().await;
        Ok(state
            .goals
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn save_registration(
        &self,
        telegram_user_id: &str,
        update: &ProfileUpdate,
        goal: &NewGoal,
    ) -> Result<Option<(UserProfile, NutritionGoal)>> {
        let mut state = self.state.lock().await;
        let Some(user_id) = state
            .users
            .iter()
            .find(|u| u.telegram_user_id == telegram_user_id)
            .map(|u| u.id)
        else {
            return Ok(None);
        };

        let profile = state.update_user(user_id, update);
        let goal = state.insert_goal(user_id, goal);
        Ok(profile.map(|profile| (profile, goal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile_fields::{ActivityLevel, Gender, GoalType};

    #[tokio::test]
    async fn test_get_or_create_returns_same_user() -> Result<()> {
        let store = InMemoryStore::new();
        let mut new_user = NewUser::new("42");
        new_user.first_name = Some("Ann".to_string());

        let first = store.get_or_create(&new_user).await?;
        new_user.first_name = Some("Changed".to_string());
        let second = store.get_or_create(&new_user).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.first_name.as_deref(), Some("Ann"));
        assert_eq!(store.list_active(10).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_identifier() -> Result<()> {
        let store = InMemoryStore::new();
        store.create(&NewUser::new("7")).await?;
        assert!(store.create(&NewUser::new("7")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_only_touches_given_fields() -> Result<()> {
        let store = InMemoryStore::new();
        let user = store.get_or_create(&NewUser::new("1")).await?;

        store
            .update(
                user.id,
                &ProfileUpdate {
                    age: Some(30),
                    gender: Some(Gender::Female),
                    ..Default::default()
                },
            )
            .await?;
        let updated = store
            .update(
                user.id,
                &ProfileUpdate {
                    weight_kg: Some(60.0),
                    ..Default::default()
                },
            )
            .await?
            .unwrap();

        assert_eq!(updated.age, Some(30));
        assert_eq!(updated.gender, Some(Gender::Female));
        assert_eq!(updated.weight_kg, Some(60.0));
        assert!(store.update(999, &ProfileUpdate::default()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_registration_for_unknown_user_writes_nothing() -> Result<()> {
        let store = InMemoryStore::new();
        let goal = NewGoal::new(GoalType::Gain, 80.0, 3000);

        let saved = store
            .save_registration("missing", &ProfileUpdate::default(), &goal)
            .await?;

        assert!(saved.is_none());
        assert!(store.list_goals(1).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_registration_appends_goals() -> Result<()> {
        let store = InMemoryStore::new();
        let user = store.get_or_create(&NewUser::new("5")).await?;
        let update = ProfileUpdate {
            activity_level: Some(ActivityLevel::Light),
            ..Default::default()
        };

        store
            .save_registration("5", &update, &NewGoal::new(GoalType::Lose, 70.0, 1800))
            .await?;
        store
            .save_registration("5", &update, &NewGoal::new(GoalType::Maintain, 72.0, 2200))
            .await?;

        let goals = store.list_goals(user.id).await?;
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].goal_type, GoalType::Lose);
        assert_eq!(goals[1].target_calories, 2200);
        Ok(())
    }
}
