use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::normalize_item_name;

/// A reusable catalog entry referenced by symptom logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: i64,
    pub name: String,
}

impl Symptom {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: 0,
            name: normalize_item_name(name.as_ref()),
        }
    }
}

/// How strongly a symptom presented in a particular log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Mild => write!(f, "mild"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mild" => Ok(Severity::Mild),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            _ => Err(format!(
                "Invalid severity '{}'. Valid options: mild, moderate, severe",
                s
            )),
        }
    }
}

/// A symptom paired with the severity it was logged at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedSymptom {
    pub symptom: Symptom,
    pub severity: Severity,
}

/// A symptom log records one or more symptoms felt at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomLog {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub symptoms: Vec<LoggedSymptom>,
}

impl SymptomLog {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            date,
            symptoms: Vec::new(),
        }
    }

    pub fn with_symptoms(mut self, symptoms: Vec<LoggedSymptom>) -> Self {
        self.symptoms = symptoms;
        self
    }
}

impl fmt::Display for SymptomLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Symptom log #{} - {}", self.id, self.date.to_rfc3339())?;
        for logged in &self.symptoms {
            writeln!(f, "  - {} ({})", logged.symptom.name, logged.severity)?;
        }
        Ok(())
    }
}
