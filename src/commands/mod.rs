mod backup_cmd;
mod config_cmd;
mod drink;
mod food;
mod import_cmd;
mod movement;
mod symptom;

pub use backup_cmd::BackupCommand;
pub use config_cmd::ConfigCommand;
pub use drink::DrinkCommand;
pub use food::FoodCommand;
pub use import_cmd::ImportCommand;
pub use movement::MovementCommand;
pub use symptom::SymptomCommand;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses a `--date` argument. Accepts RFC 3339, `YYYY-MM-DD HH:MM`, or a
/// bare `YYYY-MM-DD` (taken as midnight UTC). No argument means now.
pub(crate) fn parse_date_arg(
    raw: Option<&str>,
) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    let Some(raw) = raw else {
        return Ok(Utc::now());
    };

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Ok(naive.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }

    Err(format!(
        "Invalid date '{}'. Use RFC 3339, 'YYYY-MM-DD HH:MM', or 'YYYY-MM-DD'",
        raw
    )
    .into())
}

/// Parses `--from`/`--to` list bounds. `--to` given as a bare day is pushed
/// to the end of that day so the range stays inclusive.
pub(crate) fn parse_range_arg(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), Box<dyn std::error::Error>> {
    let from = match from {
        Some(raw) => parse_date_arg(Some(raw))?,
        None => DateTime::UNIX_EPOCH,
    };
    let to = match to {
        Some(raw) => {
            if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                day.and_hms_opt(23, 59, 59).unwrap().and_utc()
            } else {
                parse_date_arg(Some(raw))?
            }
        }
        None => Utc::now(),
    };
    Ok((from, to))
}
