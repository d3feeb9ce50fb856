use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::normalize_item_name;

/// A reusable catalog entry referenced by food logs. An id of 0 means the
/// item has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
}

impl FoodItem {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: 0,
            name: normalize_item_name(name.as_ref()),
        }
    }
}

/// A food log records what was eaten at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodLog {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub items: Vec<FoodItem>,
}

impl FoodLog {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            date,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<FoodItem>) -> Self {
        self.items = items;
        self
    }
}

impl fmt::Display for FoodLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Food log #{} - {}", self.id, self.date.to_rfc3339())?;
        for item in &self.items {
            writeln!(f, "  - {}", item.name)?;
        }
        Ok(())
    }
}
