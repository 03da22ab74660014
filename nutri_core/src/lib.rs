#![forbid(unsafe_code)]

//! Core domain model and business logic for the nutrition assistant.
//!
//! This crate provides:
//! - Domain types (sex, activity level, biometric profile, goals)
//! - Calorie estimation (Mifflin-St Jeor basal rate and daily expenditure)
//! - Profile records behind a key-value persistence interface
//! - Intake journal, CSV rollup and history
//! - Intake summaries and insights
//! - Pantry inventory with expiry and low-stock alerts

pub mod types;
pub mod error;
pub mod estimator;
pub mod config;
pub mod logging;
pub mod store;
pub mod profile;
pub mod journal;
pub mod rollup;
pub mod history;
pub mod insights;
pub mod inventory;

// Re-export commonly used types
pub use error::{Error, FieldIssue, FieldProblem, InvalidProfile, ProfileField, Result};
pub use types::*;
pub use config::Config;
pub use estimator::{basal_metabolic_rate, estimate, estimate_form, ProfileForm};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use profile::{ProfileDraft, ProfileRepository, ProfileUpdate, UserProfile, ACTIVE_PROFILE_KEY};
pub use journal::{IntakeEntry, IntakeSink, JsonlSink, Macros};
pub use history::load_recent_intake;
pub use insights::{generate_insights, Insight, IntakeSummary};
pub use inventory::{
    inventory_alerts, AlertLevel, InventoryAlerts, InventoryItem, InventoryRepository,
    InventoryUpdate, NewInventoryItem,
};
