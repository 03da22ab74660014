//! Calorie estimator.
//!
//! Computes the basal metabolic rate with the Mifflin-St Jeor equation and
//! scales it by a fixed activity multiplier:
//!
//! ```text
//! bmr_raw = 10 * weight_kg + 6.25 * height_cm - 5 * age_years + sex_constant
//! tdee    = round(bmr_raw * multiplier)
//! ```
//!
//! The raw rate is kept at full precision and rounded once, half away from
//! zero, so `1990.5` becomes `1991`.

use crate::error::{FieldProblem, InvalidProfile, ProfileField};
use crate::{ActivityLevel, BiometricProfile, CalorieEstimate, Result, Sex};
use serde::{Deserialize, Serialize};

const WEIGHT_COEFFICIENT: f64 = 10.0;
const HEIGHT_COEFFICIENT: f64 = 6.25;
const AGE_COEFFICIENT: f64 = 5.0;

/// Smallest raw rate that still rounds to 1 kcal/day
const MIN_RAW_BMR: f64 = 0.5;

impl BiometricProfile {
    /// Check every field, reporting all problems at once
    pub fn validate(&self) -> std::result::Result<(), InvalidProfile> {
        let mut invalid = InvalidProfile::default();

        check_positive(&mut invalid, ProfileField::WeightKg, self.weight_kg);
        check_positive(&mut invalid, ProfileField::HeightCm, self.height_cm);
        if self.age_years == 0 {
            invalid.push(ProfileField::AgeYears, FieldProblem::NotPositive);
        }

        // Each field can be positive while the body as a whole is too small
        // for a positive rate; the estimate must never round down to 0 kcal.
        if invalid.is_empty() && raw_bmr(self) < MIN_RAW_BMR {
            for field in [ProfileField::WeightKg, ProfileField::HeightCm, ProfileField::AgeYears] {
                invalid.push(field, FieldProblem::Implausible);
            }
        }

        invalid.into_result()
    }
}

fn check_positive(invalid: &mut InvalidProfile, field: ProfileField, value: f64) {
    if !value.is_finite() {
        invalid.push(field, FieldProblem::NotANumber(value.to_string()));
    } else if value <= 0.0 {
        invalid.push(field, FieldProblem::NotPositive);
    }
}

/// Raw Mifflin-St Jeor basal rate in kcal/day, unrounded
pub fn basal_metabolic_rate(profile: &BiometricProfile) -> Result<f64> {
    profile.validate()?;
    Ok(raw_bmr(profile))
}

fn raw_bmr(profile: &BiometricProfile) -> f64 {
    WEIGHT_COEFFICIENT * profile.weight_kg + HEIGHT_COEFFICIENT * profile.height_cm
        - AGE_COEFFICIENT * f64::from(profile.age_years)
        + profile.sex.constant()
}

/// Estimate resting and total daily energy expenditure.
///
/// Fails with [`crate::Error::InvalidProfile`] naming every offending field;
/// nothing is computed unless the whole profile is valid.
pub fn estimate(profile: &BiometricProfile) -> Result<CalorieEstimate> {
    profile.validate()?;

    let bmr_raw = raw_bmr(profile);
    let tdee_raw = bmr_raw * profile.activity_level.multiplier();

    let estimate = CalorieEstimate {
        bmr: round_kcal(bmr_raw),
        tdee: round_kcal(tdee_raw),
    };

    tracing::debug!(
        "Estimated bmr={} tdee={} for {} / {}",
        estimate.bmr,
        estimate.tdee,
        profile.sex,
        profile.activity_level
    );

    Ok(estimate)
}

fn round_kcal(value: f64) -> u32 {
    value.round() as u32
}

// ============================================================================
// Untyped form input
// ============================================================================

/// Biometric fields as text, exactly as a form or command line supplies them
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileForm {
    pub weight_kg: Option<String>,
    pub height_cm: Option<String>,
    pub age_years: Option<String>,
    pub sex: Option<String>,
    pub activity_level: Option<String>,
}

impl ProfileForm {
    /// Parse into a typed profile, collecting every field problem
    pub fn parse(&self) -> Result<BiometricProfile> {
        let mut invalid = InvalidProfile::default();

        let weight_kg = parse_positive(&mut invalid, ProfileField::WeightKg, &self.weight_kg);
        let height_cm = parse_positive(&mut invalid, ProfileField::HeightCm, &self.height_cm);
        let age_years = parse_age(&mut invalid, &self.age_years);
        let sex = parse_category::<Sex>(&mut invalid, ProfileField::Sex, &self.sex);
        let activity_level = parse_category::<ActivityLevel>(
            &mut invalid,
            ProfileField::ActivityLevel,
            &self.activity_level,
        );

        match (weight_kg, height_cm, age_years, sex, activity_level) {
            (Some(weight_kg), Some(height_cm), Some(age_years), Some(sex), Some(activity_level))
                if invalid.is_empty() =>
            {
                Ok(BiometricProfile {
                    weight_kg,
                    height_cm,
                    age_years,
                    sex,
                    activity_level,
                })
            }
            _ => Err(invalid.into()),
        }
    }
}

/// Parse form input and estimate in one step
pub fn estimate_form(form: &ProfileForm) -> Result<CalorieEstimate> {
    estimate(&form.parse()?)
}

fn present<'a>(
    invalid: &mut InvalidProfile,
    field: ProfileField,
    raw: &'a Option<String>,
) -> Option<&'a str> {
    match raw.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            invalid.push(field, FieldProblem::Missing);
            None
        }
    }
}

fn parse_positive(
    invalid: &mut InvalidProfile,
    field: ProfileField,
    raw: &Option<String>,
) -> Option<f64> {
    let text = present(invalid, field, raw)?;
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            if value > 0.0 {
                Some(value)
            } else {
                invalid.push(field, FieldProblem::NotPositive);
                None
            }
        }
        _ => {
            invalid.push(field, FieldProblem::NotANumber(text.to_string()));
            None
        }
    }
}

fn parse_age(invalid: &mut InvalidProfile, raw: &Option<String>) -> Option<u32> {
    let field = ProfileField::AgeYears;
    let value = parse_positive(invalid, field, raw)?;
    if value.fract() != 0.0 || value > f64::from(u32::MAX) {
        invalid.push(field, FieldProblem::NotWholeNumber);
        return None;
    }
    Some(value as u32)
}

fn parse_category<T: std::str::FromStr<Err = String>>(
    invalid: &mut InvalidProfile,
    field: ProfileField,
    raw: &Option<String>,
) -> Option<T> {
    let text = present(invalid, field, raw)?;
    match text.parse::<T>() {
        Ok(value) => Some(value),
        Err(unknown) => {
            invalid.push(field, FieldProblem::UnknownCategory(unknown));
            None
        }
    }
}
