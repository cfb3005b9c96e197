use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Row, ToSql};

use crate::{
    db::{
        connection::Database,
        helpers::{format_day, parse_day, parse_flag},
        models::{HealthRecord, MetricReading, Provenance},
    },
    health::MetricKind,
};

/// Per-metric provenance columns, appended to the metric's column prefix.
const PROVENANCE_SUFFIXES: [&str; 8] = [
    "source",
    "source_bundle",
    "source_version",
    "source_os",
    "sample_id",
    "was_user_entered",
    "metadata",
    "complete_sample",
];

fn record_columns() -> Vec<String> {
    let mut columns = vec!["day".to_string()];
    for metric in MetricKind::ALL {
        columns.push(metric.column().to_string());
        for suffix in PROVENANCE_SUFFIXES {
            columns.push(format!("{}_{suffix}", metric.column()));
        }
    }
    columns.push("updated_at".to_string());
    columns
}

fn select_sql(filter: &str) -> String {
    format!(
        "SELECT {} FROM health_records {filter} ORDER BY day ASC",
        record_columns().join(", ")
    )
}

fn insert_sql() -> String {
    let columns = record_columns();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT OR REPLACE INTO health_records ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn record_params(record: &HealthRecord, updated_at: &str) -> Vec<Box<dyn ToSql>> {
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(format_day(record.day))];

    for metric in MetricKind::ALL {
        let reading = record.reading(metric);
        values.push(Box::new(reading.map(|r| r.value)));

        let provenance = reading.and_then(|r| r.provenance.clone());
        match provenance {
            Some(p) => {
                values.push(Box::new(p.source_name));
                values.push(Box::new(p.source_bundle));
                values.push(Box::new(p.source_version));
                values.push(Box::new(p.source_os));
                values.push(Box::new(p.sample_id));
                values.push(Box::new(i64::from(p.was_user_entered)));
                values.push(Box::new(p.metadata));
                values.push(Box::new(p.complete_sample));
            }
            None => {
                for _ in PROVENANCE_SUFFIXES {
                    values.push(Box::new(Option::<String>::None));
                }
            }
        }
    }

    values.push(Box::new(updated_at.to_string()));
    values
}

fn row_to_record(row: &Row) -> Result<HealthRecord> {
    let day: String = row.get("day")?;
    let mut record = HealthRecord::new(parse_day(&day, "day")?);

    for metric in MetricKind::ALL {
        let prefix = metric.column();
        let value: Option<f64> = row.get(prefix)?;
        let Some(value) = value else {
            continue;
        };

        let source_name: Option<String> = row.get(format!("{prefix}_source").as_str())?;
        let provenance = match source_name {
            Some(source_name) => Some(Provenance {
                source_name,
                source_bundle: row.get(format!("{prefix}_source_bundle").as_str())?,
                source_version: row.get(format!("{prefix}_source_version").as_str())?,
                source_os: row.get(format!("{prefix}_source_os").as_str())?,
                sample_id: row.get(format!("{prefix}_sample_id").as_str())?,
                was_user_entered: parse_flag(
                    row.get(format!("{prefix}_was_user_entered").as_str())?,
                    "was_user_entered",
                )?,
                metadata: row.get(format!("{prefix}_metadata").as_str())?,
                complete_sample: row.get(format!("{prefix}_complete_sample").as_str())?,
            }),
            None => None,
        };

        record.set(metric, MetricReading { value, provenance });
    }

    Ok(record)
}

impl Database {
    /// Replace every stored record between `first_day` and `last_day`
    /// (inclusive) with `records`, in one transaction.
    pub async fn replace_health_records(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
        records: Vec<HealthRecord>,
    ) -> Result<()> {
        self.transaction(move |tx| {
            let updated_at = Utc::now().to_rfc3339();

            tx.execute(
                "DELETE FROM health_records WHERE day >= ?1 AND day <= ?2",
                params![format_day(first_day), format_day(last_day)],
            )
            .with_context(|| "failed to clear health records")?;

            {
                let mut stmt = tx.prepare(&insert_sql())?;
                for record in records.iter().filter(|r| !r.is_empty()) {
                    let values = record_params(record, &updated_at);
                    let refs: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
                    stmt.execute(refs.as_slice())
                        .with_context(|| format!("failed to insert record for {}", record.day))?;
                }
            }

            Ok(())
        })
        .await
    }

    /// All stored records, oldest day first.
    pub async fn list_health_records(&self) -> Result<Vec<HealthRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&select_sql(""))?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Records from `first_day` through `last_day`, oldest first.
    pub async fn list_health_records_between(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<Vec<HealthRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&select_sql("WHERE day >= ?1 AND day <= ?2"))?;
            let mut rows = stmt.query(params![format_day(first_day), format_day(last_day)])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn get_health_record(&self, day: NaiveDate) -> Result<Option<HealthRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&select_sql("WHERE day = ?1"))?;
            let mut rows = stmt.query(params![format_day(day)])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn count_health_records(&self) -> Result<i64> {
        self.execute(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM health_records", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }
}
