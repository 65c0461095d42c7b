//! # Profile Fields Module
//!
//! Parsing and validation of single registration answers. Every parser takes
//! the raw message text and returns either a typed value or a [`FieldError`]
//! describing why the answer was rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::IntErrorKind;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

use crate::localization::t_lang;

pub const AGE_RANGE: RangeInclusive<i32> = 13..=120;
pub const HEIGHT_RANGE_CM: RangeInclusive<f64> = 100.0..=250.0;
pub const WEIGHT_RANGE_KG: RangeInclusive<f64> = 30.0..=200.0;
pub const CALORIES_RANGE: RangeInclusive<i32> = 1000..=5000;

/// Reasons an answer can be rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// The text is not a number of the expected kind
    #[error("input is not a number")]
    NotANumber,
    /// The number parsed but lies outside the accepted bounds
    #[error("value must be between {min} and {max}")]
    OutOfRange { min: f64, max: f64 },
    /// The text does not equal any offered option
    #[error("input does not match any offered option")]
    UnknownChoice,
    /// The session has no question waiting for an answer
    #[error("registration is not awaiting input")]
    NotAwaitingInput,
    /// The session reached the last question without an earlier answer
    #[error("missing answer for {0}")]
    MissingAnswer(&'static str),
}

/// A fixed set of options presented to the user as keyboard buttons.
///
/// Matching is exact: the answer must be byte-for-byte one of the localized
/// labels. Case variants or surrounding whitespace are rejected.
pub trait Choice: Copy + PartialEq + Sized + 'static {
    /// Every option, in display order
    const ALL: &'static [Self];

    /// Localization key of the button label
    fn label_key(self) -> &'static str;

    fn label(self, language_code: Option<&str>) -> String {
        t_lang(self.label_key(), language_code)
    }

    fn labels(language_code: Option<&str>) -> Vec<String> {
        Self::ALL.iter().map(|c| c.label(language_code)).collect()
    }
}

/// Parse an answer against the labels of a choice set
pub fn parse_choice<T: Choice>(input: &str, language_code: Option<&str>) -> Result<T, FieldError> {
    T::ALL
        .iter()
        .copied()
        .find(|choice| choice.label(language_code) == input)
        .ok_or(FieldError::UnknownChoice)
}

/// Error returned when a stored enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownValue {
    kind: &'static str,
    value: String,
}

macro_rules! stored_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $stored:literal, $label:literal),+ $(,)? }) => {
        impl $name {
            /// Value persisted in the database
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $stored),+
                }
            }
        }

        impl Choice for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn label_key(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($stored => Ok($name::$variant),)+
                    other => Err(UnknownValue {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

stored_enum!(Gender, "gender", {
    Male => "M", "gender-male",
    Female => "F", "gender-female",
    Other => "Other", "gender-other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

stored_enum!(ActivityLevel, "activity level", {
    Sedentary => "sedentary", "activity-sedentary",
    Light => "light", "activity-light",
    Moderate => "moderate", "activity-moderate",
    Active => "active", "activity-active",
    VeryActive => "very_active", "activity-very-active",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Lose,
    Maintain,
    Gain,
}

stored_enum!(GoalType, "goal type", {
    Lose => "lose", "goal-lose",
    Maintain => "maintain", "goal-maintain",
    Gain => "gain", "goal-gain",
});

fn parse_integer(input: &str, range: RangeInclusive<i32>) -> Result<i32, FieldError> {
    let out_of_range = FieldError::OutOfRange {
        min: f64::from(*range.start()),
        max: f64::from(*range.end()),
    };

    let value = match input.trim().parse::<i64>() {
        Ok(value) => value,
        Err(e) => {
            return match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Err(out_of_range),
                _ => Err(FieldError::NotANumber),
            }
        }
    };

    match i32::try_from(value) {
        Ok(value) if range.contains(&value) => Ok(value),
        _ => Err(out_of_range),
    }
}

fn parse_decimal(input: &str, range: RangeInclusive<f64>) -> Result<f64, FieldError> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| FieldError::NotANumber)?;

    // NaN and infinities fail the bounds check.
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(FieldError::OutOfRange {
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Age in whole years, 13 to 120
pub fn parse_age(input: &str) -> Result<i32, FieldError> {
    parse_integer(input, AGE_RANGE)
}

/// Height in centimetres, 100 to 250
pub fn parse_height(input: &str) -> Result<f64, FieldError> {
    parse_decimal(input, HEIGHT_RANGE_CM)
}

/// Body weight in kilograms, 30 to 200
pub fn parse_weight(input: &str) -> Result<f64, FieldError> {
    parse_decimal(input, WEIGHT_RANGE_KG)
}

/// Target body weight in kilograms, same bounds as [`parse_weight`]
pub fn parse_target_weight(input: &str) -> Result<f64, FieldError> {
    parse_decimal(input, WEIGHT_RANGE_KG)
}

/// Daily calorie target, 1000 to 5000
pub fn parse_calories(input: &str) -> Result<i32, FieldError> {
    parse_integer(input, CALORIES_RANGE)
}
