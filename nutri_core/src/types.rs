//! Core domain types for the nutrition assistant.
//!
//! This module defines the fundamental types used throughout the system:
//! - Biometric categories (sex, activity level)
//! - Biometric profiles and the calorie estimates derived from them
//! - Profile goals

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Biometric Categories
// ============================================================================

/// Sex category used by the Mifflin-St Jeor equation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Constant term added to the raw basal rate
    pub fn constant(&self) -> f64 {
        match self {
            Sex::Male => 5.0,
            Sex::Female => -161.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Habitual activity level, ordered from least to most active
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    #[default]
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// All levels in ascending order
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    /// Factor applied to the basal rate to get total daily expenditure
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" | "very-active" => Ok(ActivityLevel::VeryActive),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Profile and Estimate Types
// ============================================================================

/// Biometric inputs to the calorie estimator
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BiometricProfile {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: u32,
    pub sex: Sex,
    pub activity_level: ActivityLevel,
}

/// Daily energy figures derived from a biometric profile.
///
/// `tdee` is what the dashboard labels "Daily Calories": the basal rate
/// scaled by the activity multiplier. `bmr` is the resting figure alone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalorieEstimate {
    pub bmr: u32,
    pub tdee: u32,
}

// ============================================================================
// Goals
// ============================================================================

/// Health goal selected during onboarding
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    WeightLoss,
    MuscleBuilding,
    Other(String),
}

impl Goal {
    /// Parse a goal label leniently ("Weight Loss", "weight_loss", ...)
    pub fn parse(label: &str) -> Goal {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "weight_loss" | "lose_weight" => Goal::WeightLoss,
            "muscle_building" | "muscle_gain" | "build_muscle" => Goal::MuscleBuilding,
            _ => Goal::Other(label.trim().to_string()),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::WeightLoss => f.write_str("Weight Loss"),
            Goal::MuscleBuilding => f.write_str("Muscle Building"),
            Goal::Other(label) => f.write_str(label),
        }
    }
}
