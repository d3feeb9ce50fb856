use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::normalize_item_name;

/// A reusable catalog entry referenced by drink logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrinkItem {
    pub id: i64,
    pub name: String,
}

impl DrinkItem {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: 0,
            name: normalize_item_name(name.as_ref()),
        }
    }
}

/// A drink log records what was drunk at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrinkLog {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub items: Vec<DrinkItem>,
}

impl DrinkLog {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            date,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<DrinkItem>) -> Self {
        self.items = items;
        self
    }
}

impl fmt::Display for DrinkLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Drink log #{} - {}", self.id, self.date.to_rfc3339())?;
        for item in &self.items {
            writeln!(f, "  - {}", item.name)?;
        }
        Ok(())
    }
}
