//! Macronutrient targets derived from a daily calorie goal.

use serde::{Deserialize, Serialize};

pub const PROTEIN_KCAL_PER_GRAM: i32 = 4;
pub const FAT_KCAL_PER_GRAM: i32 = 9;
pub const CARBS_KCAL_PER_GRAM: i32 = 4;

/// Daily macronutrient targets in whole grams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub protein_g: i32,
    pub fat_g: i32,
    pub carbs_g: i32,
}

impl MacroTargets {
    /// Split calories 30/25/45 between protein, fat and carbohydrates.
    ///
    /// Grams are floored. The arithmetic stays in integers so that
    /// `cal * 0.30 / 4` and friends never lose a gram to float rounding.
    pub fn from_calories(target_calories: i32) -> Self {
        let calories = i64::from(target_calories);
        Self {
            // 30% / 4 kcal = 3/40
            protein_g: floor_div(calories * 3, 40),
            // 25% / 9 kcal = 1/36
            fat_g: floor_div(calories, 36),
            // 45% / 4 kcal = 9/80
            carbs_g: floor_div(calories * 9, 80),
        }
    }

    /// Calories covered by these grams
    pub fn calories(&self) -> i32 {
        self.protein_g * PROTEIN_KCAL_PER_GRAM
            + self.fat_g * FAT_KCAL_PER_GRAM
            + self.carbs_g * CARBS_KCAL_PER_GRAM
    }
}

fn floor_div(numerator: i64, denominator: i64) -> i32 {
    // Inputs come from an i32, so the quotient always fits.
    numerator.div_euclid(denominator) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile_fields::CALORIES_RANGE;

    #[test]
    fn test_two_thousand_calories() {
        let macros = MacroTargets::from_calories(2000);
        assert_eq!(
            macros,
            MacroTargets {
                protein_g: 150,
                fat_g: 55,
                carbs_g: 225
            }
        );
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(
            MacroTargets::from_calories(1000),
            MacroTargets {
                protein_g: 75,
                fat_g: 27,
                carbs_g: 112
            }
        );
        assert_eq!(
            MacroTargets::from_calories(5000),
            MacroTargets {
                protein_g: 375,
                fat_g: 138,
                carbs_g: 562
            }
        );
    }

    #[test]
    fn test_grams_never_exceed_calorie_target() {
        for calories in CALORIES_RANGE {
            let covered = MacroTargets::from_calories(calories).calories();
            let shortfall = calories - covered;
            assert!(
                (0..17).contains(&shortfall),
                "{calories} kcal covered by {covered} kcal"
            );
        }
    }
}
