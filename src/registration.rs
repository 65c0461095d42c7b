//! Registration dialogue: the ordered questions of the onboarding wizard and
//! the answers collected so far.

use serde::{Deserialize, Serialize};

use crate::db::{NewGoal, ProfileUpdate};
use crate::profile_fields::{
    parse_age, parse_calories, parse_choice, parse_height, parse_target_weight, parse_weight,
    ActivityLevel, Choice, FieldError, Gender, GoalType,
};

/// Position in the registration dialogue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStep {
    #[default]
    AwaitingAge,
    AwaitingGender,
    AwaitingHeight,
    AwaitingWeight,
    AwaitingActivity,
    AwaitingGoalType,
    AwaitingTargetWeight,
    AwaitingCalories,
    Complete,
}

impl RegistrationStep {
    /// The step that follows this one; `Complete` is terminal
    pub fn next(self) -> Self {
        use RegistrationStep::*;
        match self {
            AwaitingAge => AwaitingGender,
            AwaitingGender => AwaitingHeight,
            AwaitingHeight => AwaitingWeight,
            AwaitingWeight => AwaitingActivity,
            AwaitingActivity => AwaitingGoalType,
            AwaitingGoalType => AwaitingTargetWeight,
            AwaitingTargetWeight => AwaitingCalories,
            AwaitingCalories | Complete => Complete,
        }
    }

    /// Localization key of the question asked at this step
    pub fn prompt_key(self) -> &'static str {
        use RegistrationStep::*;
        match self {
            AwaitingAge => "prompt-age",
            AwaitingGender => "prompt-gender",
            AwaitingHeight => "prompt-height",
            AwaitingWeight => "prompt-weight",
            AwaitingActivity => "prompt-activity",
            AwaitingGoalType => "prompt-goal",
            AwaitingTargetWeight => "prompt-target-weight",
            AwaitingCalories | Complete => "prompt-calories",
        }
    }

    /// Localization key of the out-of-range message for numeric steps
    pub fn range_error_key(self) -> &'static str {
        use RegistrationStep::*;
        match self {
            AwaitingAge => "error-age-range",
            AwaitingHeight => "error-height-range",
            AwaitingWeight => "error-weight-range",
            AwaitingTargetWeight => "error-target-weight-range",
            AwaitingCalories => "error-calories-range",
            AwaitingGender | AwaitingActivity | AwaitingGoalType | Complete => {
                "error-unknown-choice"
            }
        }
    }

    /// Button labels offered at this step, if it is a choice step
    pub fn choices(self, language_code: Option<&str>) -> Option<Vec<String>> {
        match self {
            RegistrationStep::AwaitingGender => Some(Gender::labels(language_code)),
            RegistrationStep::AwaitingActivity => Some(ActivityLevel::labels(language_code)),
            RegistrationStep::AwaitingGoalType => Some(GoalType::labels(language_code)),
            _ => None,
        }
    }
}

/// A single validated answer
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Age(i32),
    Gender(Gender),
    HeightCm(f64),
    WeightKg(f64),
    ActivityLevel(ActivityLevel),
    GoalType(GoalType),
    TargetWeightKg(f64),
    TargetCalories(i32),
}

/// Answers collected so far, one slot per question
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileAnswers {
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal_type: Option<GoalType>,
    pub target_weight_kg: Option<f64>,
    pub target_calories: Option<i32>,
}

impl ProfileAnswers {
    fn record(&mut self, value: &FieldValue) {
        match *value {
            FieldValue::Age(age) => self.age = Some(age),
            FieldValue::Gender(gender) => self.gender = Some(gender),
            FieldValue::HeightCm(height) => self.height_cm = Some(height),
            FieldValue::WeightKg(weight) => self.weight_kg = Some(weight),
            FieldValue::ActivityLevel(level) => self.activity_level = Some(level),
            FieldValue::GoalType(goal) => self.goal_type = Some(goal),
            FieldValue::TargetWeightKg(weight) => self.target_weight_kg = Some(weight),
            FieldValue::TargetCalories(calories) => self.target_calories = Some(calories),
        }
    }

    fn complete(&self) -> Result<CompletedRegistration, FieldError> {
        Ok(CompletedRegistration {
            age: self.age.ok_or(FieldError::MissingAnswer("age"))?,
            gender: self.gender.ok_or(FieldError::MissingAnswer("gender"))?,
            height_cm: self.height_cm.ok_or(FieldError::MissingAnswer("height"))?,
            weight_kg: self.weight_kg.ok_or(FieldError::MissingAnswer("weight"))?,
            activity_level: self
                .activity_level
                .ok_or(FieldError::MissingAnswer("activity level"))?,
            goal_type: self.goal_type.ok_or(FieldError::MissingAnswer("goal type"))?,
            target_weight_kg: self
                .target_weight_kg
                .ok_or(FieldError::MissingAnswer("target weight"))?,
            target_calories: self
                .target_calories
                .ok_or(FieldError::MissingAnswer("calories"))?,
        })
    }
}

/// Every answer of a finished registration
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedRegistration {
    pub age: i32,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub goal_type: GoalType,
    pub target_weight_kg: f64,
    pub target_calories: i32,
}

impl CompletedRegistration {
    /// Biometric fields to write to the user's profile
    pub fn profile_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            age: Some(self.age),
            gender: Some(self.gender),
            height_cm: Some(self.height_cm),
            weight_kg: Some(self.weight_kg),
            activity_level: Some(self.activity_level),
            ..Default::default()
        }
    }

    /// Goal with macronutrient targets derived from the calorie target
    pub fn goal(&self) -> NewGoal {
        NewGoal::new(self.goal_type, self.target_weight_kg, self.target_calories)
    }
}

/// Outcome of a successful answer
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// The answer was recorded and the dialogue moved on to `step`
    Next { step: RegistrationStep, value: FieldValue },
    /// The last answer was recorded; everything is ready to persist
    Complete(CompletedRegistration),
}

/// Per-conversation registration state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSession {
    step: RegistrationStep,
    answers: ProfileAnswers,
    language_code: Option<String>,
}

impl RegistrationSession {
    /// A fresh session waiting for the first answer
    pub fn new(language_code: Option<String>) -> Self {
        Self {
            step: RegistrationStep::default(),
            answers: ProfileAnswers::default(),
            language_code,
        }
    }

    pub fn step(&self) -> RegistrationStep {
        self.step
    }

    pub fn answers(&self) -> &ProfileAnswers {
        &self.answers
    }

    pub fn language_code(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    /// Validate `input` as the answer to the current question
    pub fn parse_input(&self, input: &str) -> Result<FieldValue, FieldError> {
        let language_code = self.language_code();
        match self.step {
            RegistrationStep::AwaitingAge => parse_age(input).map(FieldValue::Age),
            RegistrationStep::AwaitingGender => {
                parse_choice(input, language_code).map(FieldValue::Gender)
            }
            RegistrationStep::AwaitingHeight => parse_height(input).map(FieldValue::HeightCm),
            RegistrationStep::AwaitingWeight => parse_weight(input).map(FieldValue::WeightKg),
            RegistrationStep::AwaitingActivity => {
                parse_choice(input, language_code).map(FieldValue::ActivityLevel)
            }
            RegistrationStep::AwaitingGoalType => {
                parse_choice(input, language_code).map(FieldValue::GoalType)
            }
            RegistrationStep::AwaitingTargetWeight => {
                parse_target_weight(input).map(FieldValue::TargetWeightKg)
            }
            RegistrationStep::AwaitingCalories => {
                parse_calories(input).map(FieldValue::TargetCalories)
            }
            RegistrationStep::Complete => Err(FieldError::NotAwaitingInput),
        }
    }

    /// Answer the current question.
    ///
    /// On error the session is left untouched so the same question can be
    /// asked again.
    pub fn submit(&mut self, input: &str) -> Result<Transition, FieldError> {
        let value = self.parse_input(input)?;

        let mut answers = self.answers.clone();
        answers.record(&value);
        let next = self.step.next();

        let transition = if next == RegistrationStep::Complete {
            Transition::Complete(answers.complete()?)
        } else {
            Transition::Next { step: next, value }
        };

        self.answers = answers;
        self.step = next;
        Ok(transition)
    }
}
