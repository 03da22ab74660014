//! Pantry inventory and its alerts.
//!
//! All items live as one JSON array under [`INVENTORY_KEY`] in a
//! [`KeyValueStore`]. Every change goes through the store's locked
//! read-modify-write, so concurrent edits to different items are all kept.

use crate::config::InventoryConfig;
use crate::store::KeyValueStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store key holding the pantry
pub const INVENTORY_KEY: &str = "inventory";

const SECONDS_PER_DAY: i64 = 86_400;

/// One stocked product
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub expiry: DateTime<Utc>,
    pub category: String,
    pub low_stock_threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding an item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub expiry: DateTime<Utc>,
    pub category: String,
    /// Falls back to the configured default when unset
    pub low_stock_threshold: Option<f64>,
}

/// Partial edit; `None` leaves a field unchanged
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub low_stock_threshold: Option<f64>,
}

impl InventoryItem {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidItem("name must not be empty".into()));
        }
        for (label, value) in [
            ("quantity", self.quantity),
            ("low_stock_threshold", self.low_stock_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidItem(format!(
                    "{} must be a non-negative number, got {}",
                    label, value
                )));
            }
        }
        Ok(())
    }

    fn apply(&mut self, update: InventoryUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(quantity) = update.quantity {
            next.quantity = quantity;
        }
        if let Some(unit) = update.unit {
            next.unit = unit;
        }
        if let Some(expiry) = update.expiry {
            next.expiry = expiry;
        }
        if let Some(category) = update.category {
            next.category = category;
        }
        if let Some(threshold) = update.low_stock_threshold {
            next.low_stock_threshold = threshold;
        }

        next.validate()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Whole days until expiry, rounded down; negative once expired
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expiry - now).num_seconds().div_euclid(SECONDS_PER_DAY)
    }
}

/// Pantry CRUD over any key-value store
pub struct InventoryRepository<S: KeyValueStore> {
    store: S,
    default_threshold: f64,
}

impl<S: KeyValueStore> InventoryRepository<S> {
    pub fn new(store: S, config: &InventoryConfig) -> Self {
        Self {
            store,
            default_threshold: config.low_stock_threshold,
        }
    }

    /// All items, newest first
    pub fn list(&self) -> Result<Vec<InventoryItem>> {
        let mut items = match self.store.get(INVENTORY_KEY)? {
            Some(contents) => parse_items(&contents)?,
            None => Vec::new(),
        };
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    pub fn add(&self, new: NewInventoryItem) -> Result<InventoryItem> {
        let now = Utc::now();
        let item = InventoryItem {
            id: Uuid::new_v4(),
            name: new.name,
            quantity: new.quantity,
            unit: new.unit,
            expiry: new.expiry,
            category: new.category,
            low_stock_threshold: new.low_stock_threshold.unwrap_or(self.default_threshold),
            created_at: now,
            updated_at: now,
        };
        item.validate()?;

        self.edit(|items| {
            items.push(item.clone());
            Ok(true)
        })?;
        tracing::info!("Added inventory item {} ({})", item.id, item.name);
        Ok(item)
    }

    /// Returns `None` when no item has `id`
    pub fn update(&self, id: Uuid, update: InventoryUpdate) -> Result<Option<InventoryItem>> {
        let mut updated = None;
        self.edit(|items| {
            let Some(item) = items.iter_mut().find(|item| item.id == id) else {
                return Ok(false);
            };
            item.apply(update.clone())?;
            updated = Some(item.clone());
            Ok(true)
        })?;

        if updated.is_some() {
            tracing::info!("Updated inventory item {}", id);
        }
        Ok(updated)
    }

    /// Returns true if the item existed
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let mut removed = false;
        self.edit(|items| {
            let before = items.len();
            items.retain(|item| item.id != id);
            removed = items.len() < before;
            Ok(removed)
        })?;

        if removed {
            tracing::info!("Removed inventory item {}", id);
        }
        Ok(removed)
    }

    /// Locked read-modify-write of the whole pantry. `change` returns
    /// whether anything needs saving.
    fn edit<F>(&self, mut change: F) -> Result<()>
    where
        F: FnMut(&mut Vec<InventoryItem>) -> Result<bool>,
    {
        self.store.update(INVENTORY_KEY, &mut |current| {
            let mut items = match current {
                Some(contents) => parse_items(&contents)?,
                None => Vec::new(),
            };
            if change(&mut items)? {
                Ok(Some(serde_json::to_string_pretty(&items)?))
            } else {
                Ok(None)
            }
        })
    }
}

fn parse_items(contents: &str) -> Result<Vec<InventoryItem>> {
    serde_json::from_str(contents).map_err(|e| {
        tracing::warn!("Stored inventory is unreadable: {}", e);
        Error::Store(format!("stored inventory is corrupted: {}", e))
    })
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Urgent,
    Warning,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExpiryAlert {
    pub item: InventoryItem,
    pub days_until_expiry: i64,
    pub level: AlertLevel,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LowStockAlert {
    pub item: InventoryItem,
    pub current_quantity: f64,
    pub threshold: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InventoryAlerts {
    pub expiring: Vec<ExpiryAlert>,
    pub low_stock: Vec<LowStockAlert>,
}

impl InventoryAlerts {
    pub fn is_empty(&self) -> bool {
        self.expiring.is_empty() && self.low_stock.is_empty()
    }
}

/// Items expiring within the configured window, soonest first.
///
/// Already-expired items are left out.
pub fn expiring_items(
    items: &[InventoryItem],
    now: DateTime<Utc>,
    config: &InventoryConfig,
) -> Vec<ExpiryAlert> {
    let window = i64::from(config.expiry_window_days);
    let urgent = i64::from(config.urgent_within_days);

    let mut alerts: Vec<ExpiryAlert> = items
        .iter()
        .filter_map(|item| {
            let days = item.days_until_expiry(now);
            (0..=window).contains(&days).then(|| ExpiryAlert {
                item: item.clone(),
                days_until_expiry: days,
                level: if days <= urgent {
                    AlertLevel::Urgent
                } else {
                    AlertLevel::Warning
                },
            })
        })
        .collect();

    alerts.sort_by(|a, b| a.item.expiry.cmp(&b.item.expiry));
    alerts
}

/// Items at or below their own low-stock threshold
pub fn low_stock_items(items: &[InventoryItem]) -> Vec<LowStockAlert> {
    items
        .iter()
        .filter(|item| item.quantity <= item.low_stock_threshold)
        .map(|item| LowStockAlert {
            item: item.clone(),
            current_quantity: item.quantity,
            threshold: item.low_stock_threshold,
        })
        .collect()
}

pub fn inventory_alerts(
    items: &[InventoryItem],
    now: DateTime<Utc>,
    config: &InventoryConfig,
) -> InventoryAlerts {
    let alerts = InventoryAlerts {
        expiring: expiring_items(items, now, config),
        low_stock: low_stock_items(items),
    };
    tracing::debug!(
        "{} expiring and {} low-stock alerts across {} items",
        alerts.expiring.len(),
        alerts.low_stock.len(),
        items.len()
    );
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn item(name: &str, quantity: f64, expires_in: Duration) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            name: name.into(),
            quantity,
            unit: "pcs".into(),
            expiry: now() + expires_in,
            category: "dairy".into(),
            low_stock_threshold: 2.0,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn new_item(name: &str, quantity: f64) -> NewInventoryItem {
        NewInventoryItem {
            name: name.into(),
            quantity,
            unit: "pcs".into(),
            expiry: now() + Duration::days(7),
            category: "produce".into(),
            low_stock_threshold: None,
        }
    }

    #[test]
    fn test_days_until_expiry_rounds_down() {
        assert_eq!(item("a", 5.0, Duration::hours(36)).days_until_expiry(now()), 1);
        assert_eq!(item("b", 5.0, Duration::hours(23)).days_until_expiry(now()), 0);
        assert_eq!(item("c", 5.0, Duration::hours(-1)).days_until_expiry(now()), -1);
    }

    #[test]
    fn test_expiring_levels_and_window() {
        let config = InventoryConfig::default();
        let items = vec![
            item("bread", 5.0, Duration::days(5)),
            item("spinach", 5.0, Duration::days(2) + Duration::hours(1)),
            item("yogurt", 5.0, Duration::days(3) + Duration::hours(1)),
            item("salmon", 5.0, Duration::hours(30)),
            item("milk", 5.0, Duration::hours(-2)),
        ];

        let alerts = expiring_items(&items, now(), &config);
        let summary: Vec<_> = alerts
            .iter()
            .map(|a| (a.item.name.as_str(), a.days_until_expiry, a.level))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("salmon", 1, AlertLevel::Urgent),
                ("spinach", 2, AlertLevel::Warning),
                ("yogurt", 3, AlertLevel::Warning),
            ]
        );
    }

    #[test]
    fn test_low_stock_at_or_below_threshold() {
        let mut custom = item("eggs", 6.0, Duration::days(10));
        custom.low_stock_threshold = 6.0;
        let items = vec![
            item("oats", 2.0, Duration::days(30)),
            item("rice", 2.5, Duration::days(30)),
            custom,
        ];

        let names: Vec<_> = low_stock_items(&items)
            .into_iter()
            .map(|a| a.item.name)
            .collect();
        assert_eq!(names, vec!["oats", "eggs"]);
    }

    #[test]
    fn test_alerts_empty_for_healthy_pantry() {
        let items = vec![item("rice", 10.0, Duration::days(90))];
        assert!(inventory_alerts(&items, now(), &InventoryConfig::default()).is_empty());
    }

    #[test]
    fn test_repository_crud() {
        let repo = InventoryRepository::new(MemoryStore::new(), &InventoryConfig::default());
        assert!(repo.list().unwrap().is_empty());

        let apples = repo.add(new_item("Apples", 6.0)).unwrap();
        assert_eq!(apples.low_stock_threshold, 2.0);
        repo.add(new_item("Pears", 3.0)).unwrap();
        assert_eq!(repo.list().unwrap().len(), 2);

        let updated = repo
            .update(
                apples.id,
                InventoryUpdate {
                    quantity: Some(1.0),
                    ..InventoryUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 1.0);
        assert_eq!(updated.created_at, apples.created_at);

        let low: Vec<_> = low_stock_items(&repo.list().unwrap())
            .into_iter()
            .map(|a| a.item.id)
            .collect();
        assert_eq!(low, vec![apples.id]);

        assert!(repo.remove(apples.id).unwrap());
        assert!(!repo.remove(apples.id).unwrap());
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_item_update_returns_none() {
        let repo = InventoryRepository::new(MemoryStore::new(), &InventoryConfig::default());
        let result = repo.update(Uuid::new_v4(), InventoryUpdate::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_items_rejected() {
        let repo = InventoryRepository::new(MemoryStore::new(), &InventoryConfig::default());

        assert!(matches!(
            repo.add(new_item(" ", 1.0)),
            Err(Error::InvalidItem(_))
        ));
        match repo.add(new_item("Milk", -1.0)) {
            Err(Error::InvalidItem(msg)) => assert!(msg.contains("quantity")),
            other => panic!("Expected InvalidItem, got {:?}", other),
        }

        let milk = repo.add(new_item("Milk", 1.0)).unwrap();
        let result = repo.update(
            milk.id,
            InventoryUpdate {
                name: Some("Oat milk".into()),
                low_stock_threshold: Some(f64::NAN),
                ..InventoryUpdate::default()
            },
        );
        assert!(result.is_err());
        assert_eq!(repo.list().unwrap()[0].name, "Milk");
    }

    #[test]
    fn test_configured_default_threshold() {
        let config = InventoryConfig {
            low_stock_threshold: 5.0,
            ..InventoryConfig::default()
        };
        let repo = InventoryRepository::new(MemoryStore::new(), &config);
        let item = repo.add(new_item("Tea", 4.0)).unwrap();
        assert_eq!(item.low_stock_threshold, 5.0);

        let explicit = repo
            .add(NewInventoryItem {
                low_stock_threshold: Some(0.0),
                ..new_item("Coffee", 4.0)
            })
            .unwrap();
        assert_eq!(explicit.low_stock_threshold, 0.0);
    }

    #[test]
    fn test_concurrent_adds_all_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().to_path_buf();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let repo =
                        InventoryRepository::new(JsonFileStore::new(dir), &InventoryConfig::default());
                    for j in 0..5 {
                        repo.add(new_item(&format!("item_{}_{}", i, j), 3.0)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let repo = InventoryRepository::new(JsonFileStore::new(&dir), &InventoryConfig::default());
        assert_eq!(repo.list().unwrap().len(), 30);
    }

    #[test]
    fn test_corrupted_inventory_is_an_error() {
        let store = MemoryStore::new();
        store.put(INVENTORY_KEY, "not json").unwrap();
        let repo = InventoryRepository::new(store, &InventoryConfig::default());
        match repo.list() {
            Err(Error::Store(msg)) => assert!(msg.contains("corrupted")),
            other => panic!("Expected store error, got {:?}", other),
        }
    }
}
