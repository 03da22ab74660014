//! Error types for the nutri_core library.

use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for nutri_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more biometric fields are missing or malformed
    #[error(transparent)]
    InvalidProfile(#[from] InvalidProfile),

    /// Intake journal entry rejected
    #[error("Invalid intake entry: {0}")]
    InvalidEntry(String),

    /// Pantry item rejected
    #[error("Invalid inventory item: {0}")]
    InvalidItem(String),

    /// Key-value store error
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// A biometric field that the estimator reads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileField {
    WeightKg,
    HeightCm,
    AgeYears,
    Sex,
    ActivityLevel,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::WeightKg => "weight_kg",
            ProfileField::HeightCm => "height_cm",
            ProfileField::AgeYears => "age_years",
            ProfileField::Sex => "sex",
            ProfileField::ActivityLevel => "activity_level",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a field was rejected
#[derive(Clone, Debug, PartialEq)]
pub enum FieldProblem {
    Missing,
    NotANumber(String),
    NotPositive,
    NotWholeNumber,
    UnknownCategory(String),
    /// Together with the other body measurements, gives no positive energy rate
    Implausible,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => write!(f, "is missing"),
            FieldProblem::NotANumber(raw) => write!(f, "'{}' is not a number", raw),
            FieldProblem::NotPositive => write!(f, "must be greater than zero"),
            FieldProblem::NotWholeNumber => write!(f, "must be a whole number"),
            FieldProblem::UnknownCategory(raw) => write!(f, "'{}' is not a recognised value", raw),
            FieldProblem::Implausible => {
                write!(f, "is implausible alongside the other measurements")
            }
        }
    }
}

/// A single rejected field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldIssue {
    pub field: ProfileField,
    pub problem: FieldProblem,
}

/// Every field problem found while validating a biometric profile.
///
/// Validation never stops at the first problem, so a caller can point the
/// user at all of the fields that need correcting in one pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvalidProfile {
    pub issues: Vec<FieldIssue>,
}

impl InvalidProfile {
    pub(crate) fn push(&mut self, field: ProfileField, problem: FieldProblem) {
        self.issues.push(FieldIssue { field, problem });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Names of the offending fields, in the order they were checked
    pub fn fields(&self) -> Vec<ProfileField> {
        self.issues.iter().map(|issue| issue.field).collect()
    }

    pub fn mentions(&self, field: ProfileField) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    pub(crate) fn into_result(self) -> std::result::Result<(), InvalidProfile> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for InvalidProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid profile: ")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", issue.field, issue.problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidProfile {}
