use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn parse_day(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DAY_FORMAT)
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

/// SQLite stores booleans as 0/1 integers.
pub fn parse_flag(value: Option<i64>, field: &str) -> Result<bool> {
    match value {
        None | Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(other) => Err(anyhow!("{field} contains non-boolean value {other}")),
    }
}
