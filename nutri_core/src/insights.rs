//! Intake summaries and personalised insights.
//!
//! Rules, in order:
//! - Daily calorie average against the profile's daily target
//! - Average protein per logged entry
//! - Goal-specific advice
//!
//! When no rule fires the user gets a single encouragement.

use crate::config::InsightsConfig;
use crate::journal::IntakeEntry;
use crate::profile::UserProfile;
use crate::Goal;
use serde::{Deserialize, Serialize};

/// Totals and per-entry averages over a period
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IntakeSummary {
    pub total_calories: f64,
    pub avg_protein_g: f64,
    pub avg_carbs_g: f64,
    pub avg_fat_g: f64,
    pub entries: usize,
    pub period_days: u32,
}

impl IntakeSummary {
    pub fn from_entries(entries: &[IntakeEntry], period_days: u32) -> Self {
        if entries.is_empty() {
            return IntakeSummary {
                period_days,
                ..IntakeSummary::default()
            };
        }

        let count = entries.len() as f64;
        let (mut calories, mut protein, mut carbs, mut fat) = (0.0, 0.0, 0.0, 0.0);
        for entry in entries {
            calories += entry.calories;
            protein += entry.protein_g;
            carbs += entry.carbs_g;
            fat += entry.fat_g;
        }

        IntakeSummary {
            total_calories: calories,
            avg_protein_g: round_tenth(protein / count),
            avg_carbs_g: round_tenth(carbs / count),
            avg_fat_g: round_tenth(fat / count),
            entries: entries.len(),
            period_days,
        }
    }

    pub fn daily_average_calories(&self) -> f64 {
        self.total_calories / f64::from(self.period_days.max(1))
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    UnderEating,
    OverEating,
    LowProtein,
    WeightLossFocus,
    MuscleBuildingFocus,
    OnTrack,
}

impl Insight {
    pub fn message(&self) -> &'static str {
        match self {
            Insight::UnderEating => "You might be under-eating. Consider adding healthy, calorie-dense foods like nuts, avocados, or olive oil.",
            Insight::OverEating => "You're consuming more calories than needed. Focus on portion control and nutrient-dense foods.",
            Insight::LowProtein => "Try to increase your protein intake! Add Greek yogurt, lean meats, or legumes to your meals.",
            Insight::WeightLossFocus => "For weight loss, focus on high-protein, high-fiber foods that keep you full longer.",
            Insight::MuscleBuildingFocus => "Great choice for muscle building! Make sure to have protein within 30 minutes after workouts.",
            Insight::OnTrack => "You're doing great! Keep focusing on balanced, nutritious meals.",
        }
    }
}

/// Generate insights for a profile from its intake summary
pub fn generate_insights(
    profile: &UserProfile,
    summary: &IntakeSummary,
    config: &InsightsConfig,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(estimate) = profile.estimate {
        if summary.total_calories > 0.0 {
            let daily = summary.daily_average_calories();
            let target = f64::from(estimate.tdee);

            if daily < target * config.under_eating_ratio {
                insights.push(Insight::UnderEating);
            } else if daily > target * config.over_eating_ratio {
                insights.push(Insight::OverEating);
            }
        }
    }

    if summary.avg_protein_g < config.protein_floor_g {
        insights.push(Insight::LowProtein);
    }

    if profile.goals.contains(&Goal::WeightLoss) {
        insights.push(Insight::WeightLossFocus);
    }
    if profile.goals.contains(&Goal::MuscleBuilding) {
        insights.push(Insight::MuscleBuildingFocus);
    }

    if insights.is_empty() {
        insights.push(Insight::OnTrack);
    }

    tracing::debug!("Generated {} insights for profile {}", insights.len(), profile.id);
    insights
}
