use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 7-point ordinal stool classification, severe constipation through severe
/// diarrhea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoolType {
    SevereConstipation,
    ModerateConstipation,
    MildConstipation,
    Normal,
    MildDiarrhea,
    ModerateDiarrhea,
    SevereDiarrhea,
}

impl fmt::Display for StoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoolType::SevereConstipation => write!(f, "severe-constipation"),
            StoolType::ModerateConstipation => write!(f, "moderate-constipation"),
            StoolType::MildConstipation => write!(f, "mild-constipation"),
            StoolType::Normal => write!(f, "normal"),
            StoolType::MildDiarrhea => write!(f, "mild-diarrhea"),
            StoolType::ModerateDiarrhea => write!(f, "moderate-diarrhea"),
            StoolType::SevereDiarrhea => write!(f, "severe-diarrhea"),
        }
    }
}

impl FromStr for StoolType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "severe-constipation" => Ok(StoolType::SevereConstipation),
            "moderate-constipation" => Ok(StoolType::ModerateConstipation),
            "mild-constipation" => Ok(StoolType::MildConstipation),
            "normal" => Ok(StoolType::Normal),
            "mild-diarrhea" => Ok(StoolType::MildDiarrhea),
            "moderate-diarrhea" => Ok(StoolType::ModerateDiarrhea),
            "severe-diarrhea" => Ok(StoolType::SevereDiarrhea),
            _ => Err(format!(
                "Invalid stool type '{}'. Valid options: severe-constipation, \
                 moderate-constipation, mild-constipation, normal, mild-diarrhea, \
                 moderate-diarrhea, severe-diarrhea",
                s
            )),
        }
    }
}

/// A movement log has no item associations, just the classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementLog {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub stool_type: StoolType,
}

impl MovementLog {
    pub fn new(date: DateTime<Utc>, stool_type: StoolType) -> Self {
        Self {
            id: 0,
            date,
            stool_type,
        }
    }
}

impl fmt::Display for MovementLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Movement log #{} - {} ({})",
            self.id,
            self.date.to_rfc3339(),
            self.stool_type
        )
    }
}
