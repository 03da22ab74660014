//! User profile records.
//!
//! A profile is created once during onboarding and edited afterwards. The
//! calorie estimate stored alongside it is always derived: every create and
//! update recomputes it from the biometric fields.

use crate::estimator::estimate;
use crate::store::KeyValueStore;
use crate::{ActivityLevel, BiometricProfile, CalorieEstimate, Error, Goal, Result, Sex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store key of the single active profile
pub const ACTIVE_PROFILE_KEY: &str = "user_profile";

/// Persisted profile with its derived estimate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub age_years: Option<u32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<Sex>,
    #[serde(default)]
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    pub estimate: Option<CalorieEstimate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a profile
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: String,
    pub age_years: Option<u32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<Sex>,
    #[serde(default)]
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

/// Partial edit; `None` leaves a field unchanged
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age_years: Option<u32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<Sex>,
    pub activity_level: Option<ActivityLevel>,
    pub dietary_preferences: Option<Vec<String>>,
    pub health_conditions: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub goals: Option<Vec<Goal>>,
}

impl UserProfile {
    /// Build a new record and derive its estimate
    pub fn create(draft: ProfileDraft) -> Result<Self> {
        let now = Utc::now();
        let mut profile = UserProfile {
            id: Uuid::new_v4(),
            name: draft.name,
            age_years: draft.age_years,
            weight_kg: draft.weight_kg,
            height_cm: draft.height_cm,
            sex: draft.sex,
            activity_level: draft.activity_level,
            dietary_preferences: draft.dietary_preferences,
            health_conditions: draft.health_conditions,
            allergies: draft.allergies,
            goals: draft.goals,
            estimate: None,
            created_at: now,
            updated_at: now,
        };
        profile.refresh_estimate()?;
        Ok(profile)
    }

    /// Biometric inputs, or `None` while onboarding is incomplete
    pub fn biometrics(&self) -> Option<BiometricProfile> {
        Some(BiometricProfile {
            weight_kg: self.weight_kg?,
            height_cm: self.height_cm?,
            age_years: self.age_years?,
            sex: self.sex?,
            activity_level: self.activity_level,
        })
    }

    /// Recompute the derived estimate from the current fields.
    ///
    /// On invalid biometrics the record is left untouched.
    pub fn refresh_estimate(&mut self) -> Result<Option<CalorieEstimate>> {
        let next = match self.biometrics() {
            Some(biometrics) => Some(estimate(&biometrics)?),
            None => {
                tracing::debug!("Profile {} has incomplete biometrics", self.id);
                None
            }
        };
        self.estimate = next;
        Ok(next)
    }

    /// Apply an edit and recompute; all-or-nothing on invalid biometrics
    pub fn apply(&mut self, update: ProfileUpdate) -> Result<()> {
        let mut next = self.clone();

        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(age_years) = update.age_years {
            next.age_years = Some(age_years);
        }
        if let Some(weight_kg) = update.weight_kg {
            next.weight_kg = Some(weight_kg);
        }
        if let Some(height_cm) = update.height_cm {
            next.height_cm = Some(height_cm);
        }
        if let Some(sex) = update.sex {
            next.sex = Some(sex);
        }
        if let Some(activity_level) = update.activity_level {
            next.activity_level = activity_level;
        }
        if let Some(dietary_preferences) = update.dietary_preferences {
            next.dietary_preferences = dietary_preferences;
        }
        if let Some(health_conditions) = update.health_conditions {
            next.health_conditions = health_conditions;
        }
        if let Some(allergies) = update.allergies {
            next.allergies = allergies;
        }
        if let Some(goals) = update.goals {
            next.goals = goals;
        }

        next.refresh_estimate()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Daily calorie target, or `fallback` when no estimate exists
    pub fn daily_target(&self, fallback: u32) -> u32 {
        self.estimate.map(|e| e.tdee).unwrap_or(fallback)
    }
}

/// Profile CRUD over any key-value store
pub struct ProfileRepository<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ProfileRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn create(&self, key: &str, draft: ProfileDraft) -> Result<UserProfile> {
        let profile = UserProfile::create(draft)?;
        self.save(key, &profile)?;
        tracing::info!("Created profile {} under '{}'", profile.id, key);
        Ok(profile)
    }

    /// Load a profile; a record that fails to parse is an error
    pub fn get(&self, key: &str) -> Result<Option<UserProfile>> {
        self.store
            .get(key)?
            .map(|contents| parse_record(key, &contents))
            .transpose()
    }

    /// Returns `None` when no profile exists under `key`.
    ///
    /// The read, the edit and the write happen under the store's lock for
    /// `key`, so concurrent updates to different fields are all kept.
    pub fn update(&self, key: &str, update: ProfileUpdate) -> Result<Option<UserProfile>> {
        let mut updated = None;

        self.store.update(key, &mut |current| {
            let Some(contents) = current else {
                return Ok(None);
            };
            let mut profile = parse_record(key, &contents)?;
            profile.apply(update.clone())?;

            let contents = serde_json::to_string_pretty(&profile)?;
            updated = Some(profile);
            Ok(Some(contents))
        })?;

        if let Some(profile) = &updated {
            tracing::info!("Updated profile {} under '{}'", profile.id, key);
        }
        Ok(updated)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        self.store.remove(key)
    }

    fn save(&self, key: &str, profile: &UserProfile) -> Result<()> {
        let contents = serde_json::to_string_pretty(profile)?;
        self.store.put(key, &contents)
    }
}

fn parse_record(key: &str, contents: &str) -> Result<UserProfile> {
    serde_json::from_str(contents).map_err(|e| {
        tracing::warn!("Stored profile '{}' is unreadable: {}", key, e);
        Error::Store(format!("stored profile '{}' is corrupted: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfileField;
    use crate::store::{JsonFileStore, MemoryStore};

    fn complete_draft() -> ProfileDraft {
        ProfileDraft {
            name: "Sam".into(),
            age_years: Some(28),
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
            sex: Some(Sex::Male),
            goals: vec![Goal::WeightLoss],
            ..ProfileDraft::default()
        }
    }

    #[test]
    fn test_create_derives_estimate() {
        let profile = UserProfile::create(complete_draft()).unwrap();
        assert_eq!(profile.activity_level, ActivityLevel::Moderate);
        assert_eq!(
            profile.estimate,
            Some(CalorieEstimate {
                bmr: 1659,
                tdee: 2571
            })
        );
        assert_eq!(profile.daily_target(2000), 2571);
    }

    #[test]
    fn test_incomplete_profile_has_no_estimate() {
        let draft = ProfileDraft {
            sex: None,
            ..complete_draft()
        };
        let profile = UserProfile::create(draft).unwrap();
        assert!(profile.biometrics().is_none());
        assert_eq!(profile.estimate, None);
        assert_eq!(profile.daily_target(2000), 2000);
    }

    #[test]
    fn test_invalid_biometrics_rejected_on_create() {
        let draft = ProfileDraft {
            weight_kg: Some(0.0),
            ..complete_draft()
        };
        match UserProfile::create(draft) {
            Err(Error::InvalidProfile(invalid)) => {
                assert_eq!(invalid.fields(), vec![ProfileField::WeightKg])
            }
            other => panic!("Expected InvalidProfile, got {:?}", other),
        }
    }

    #[test]
    fn test_update_recomputes_estimate() {
        let mut profile = UserProfile::create(complete_draft()).unwrap();
        let created_at = profile.created_at;

        profile
            .apply(ProfileUpdate {
                activity_level: Some(ActivityLevel::Sedentary),
                ..ProfileUpdate::default()
            })
            .unwrap();

        assert_eq!(profile.estimate.unwrap().tdee, 1991);
        assert_eq!(profile.created_at, created_at);
        assert!(profile.updated_at >= created_at);
    }

    #[test]
    fn test_rejected_update_leaves_profile_untouched() {
        let mut profile = UserProfile::create(complete_draft()).unwrap();
        let before = profile.clone();

        let result = profile.apply(ProfileUpdate {
            name: Some("Changed".into()),
            age_years: Some(0),
            ..ProfileUpdate::default()
        });

        assert!(result.is_err());
        assert_eq!(profile.name, before.name);
        assert_eq!(profile.age_years, before.age_years);
        assert_eq!(profile.estimate, before.estimate);
    }

    #[test]
    fn test_repository_crud_in_memory() {
        let repo = ProfileRepository::new(MemoryStore::new());
        assert!(repo.get(ACTIVE_PROFILE_KEY).unwrap().is_none());

        let created = repo.create(ACTIVE_PROFILE_KEY, complete_draft()).unwrap();
        let loaded = repo.get(ACTIVE_PROFILE_KEY).unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.goals, vec![Goal::WeightLoss]);

        let updated = repo
            .update(
                ACTIVE_PROFILE_KEY,
                ProfileUpdate {
                    sex: Some(Sex::Female),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.estimate.unwrap().tdee, 2314);

        assert!(repo.delete(ACTIVE_PROFILE_KEY).unwrap());
        assert!(repo.get(ACTIVE_PROFILE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_profile_returns_none() {
        let repo = ProfileRepository::new(MemoryStore::new());
        let result = repo
            .update("someone_else", ProfileUpdate::default())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_repository_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = ProfileRepository::new(JsonFileStore::new(temp_dir.path()));

        let created = repo.create(ACTIVE_PROFILE_KEY, complete_draft()).unwrap();

        let reopened = ProfileRepository::new(JsonFileStore::new(temp_dir.path()));
        let loaded = reopened.get(ACTIVE_PROFILE_KEY).unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.estimate, created.estimate);
    }

    #[test]
    fn test_corrupted_record_is_an_error() {
        let store = MemoryStore::new();
        store.put(ACTIVE_PROFILE_KEY, "{ invalid json }").unwrap();
        let repo = ProfileRepository::new(store);

        match repo.get(ACTIVE_PROFILE_KEY) {
            Err(Error::Store(msg)) => assert!(msg.contains("corrupted")),
            other => panic!("Expected store error, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_updates_to_different_fields_are_all_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().to_path_buf();
        ProfileRepository::new(JsonFileStore::new(&dir))
            .create(ACTIVE_PROFILE_KEY, complete_draft())
            .unwrap();

        for round in 0..20u32 {
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
            let weight_kg = 80.0 + f64::from(round);
            let age_years = 40 + round;

            let weight_writer = {
                let (dir, barrier) = (dir.clone(), barrier.clone());
                std::thread::spawn(move || {
                    let repo = ProfileRepository::new(JsonFileStore::new(dir));
                    barrier.wait();
                    repo.update(
                        ACTIVE_PROFILE_KEY,
                        ProfileUpdate {
                            weight_kg: Some(weight_kg),
                            ..ProfileUpdate::default()
                        },
                    )
                    .unwrap();
                })
            };
            let age_writer = {
                let (dir, barrier) = (dir.clone(), barrier.clone());
                std::thread::spawn(move || {
                    let repo = ProfileRepository::new(JsonFileStore::new(dir));
                    barrier.wait();
                    repo.update(
                        ACTIVE_PROFILE_KEY,
                        ProfileUpdate {
                            age_years: Some(age_years),
                            ..ProfileUpdate::default()
                        },
                    )
                    .unwrap();
                })
            };
            weight_writer.join().unwrap();
            age_writer.join().unwrap();

            let profile = ProfileRepository::new(JsonFileStore::new(&dir))
                .get(ACTIVE_PROFILE_KEY)
                .unwrap()
                .unwrap();
            assert_eq!(profile.weight_kg, Some(weight_kg), "round {}", round);
            assert_eq!(profile.age_years, Some(age_years), "round {}", round);
            assert_eq!(
                profile.estimate,
                Some(estimate(&profile.biometrics().unwrap()).unwrap()),
                "round {}",
                round
            );
        }
    }
}
