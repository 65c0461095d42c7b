use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::nutrition::MacroTargets;
use crate::profile_fields::{ActivityLevel, Gender, GoalType};

/// A Telegram user and their biometric profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub telegram_user_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub is_active: bool,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity fields captured on first contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub telegram_user_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NewUser {
    pub fn new(telegram_user_id: impl Into<String>) -> Self {
        Self {
            telegram_user_id: telegram_user_id.into(),
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

/// Partial profile update; `None` fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
}

impl ProfileUpdate {
    pub(crate) fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(username) = &self.username {
            profile.username = Some(username.clone());
        }
        if let Some(first_name) = &self.first_name {
            profile.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &self.last_name {
            profile.last_name = Some(last_name.clone());
        }
        profile.age = self.age.or(profile.age);
        profile.gender = self.gender.or(profile.gender);
        profile.height_cm = self.height_cm.or(profile.height_cm);
        profile.weight_kg = self.weight_kg.or(profile.weight_kg);
        profile.activity_level = self.activity_level.or(profile.activity_level);
    }
}

/// A nutrition goal recorded at the end of a registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionGoal {
    pub id: i32,
    pub user_id: i32,
    pub goal_type: GoalType,
    pub target_weight_kg: f64,
    pub weekly_goal_kg: Option<f64>,
    pub target_calories: i32,
    pub target_protein_g: i32,
    pub target_fat_g: i32,
    pub target_carbs_g: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NutritionGoal {
    pub fn macros(&self) -> MacroTargets {
        MacroTargets {
            protein_g: self.target_protein_g,
            fat_g: self.target_fat_g,
            carbs_g: self.target_carbs_g,
        }
    }
}

/// Goal values to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    pub goal_type: GoalType,
    pub target_weight_kg: f64,
    pub target_calories: i32,
    pub macros: MacroTargets,
}

impl NewGoal {
    /// Build a goal with macros derived from the calorie target
    pub fn new(goal_type: GoalType, target_weight_kg: f64, target_calories: i32) -> Self {
        Self {
            goal_type,
            target_weight_kg,
            target_calories,
            macros: MacroTargets::from_calories(target_calories),
        }
    }
}
