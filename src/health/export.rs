//! Detail JSON for one metric on one stored day.
//!
//! The captured complete-sample blob wins when present. Otherwise a flat
//! object is rebuilt from the stored value and provenance columns.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use crate::db::{
    helpers::format_day,
    models::{HealthRecord, Provenance},
};

use super::metric::{HealthMetricType, MetricKind};

pub fn detail_json(record: &HealthRecord, metric: HealthMetricType) -> Result<String> {
    if let Some(captured) = captured_sample(record, metric) {
        return Ok(captured);
    }

    let value = match rebuilt_detail(record, metric) {
        Some(object) => Value::Object(object),
        None => json!({
            "error": "No sample data available",
            "metricType": metric.display_name(),
            "date": format_day(record.day),
        }),
    };

    serde_json::to_string_pretty(&value).context("failed to serialize detail JSON")
}

fn complete_sample(record: &HealthRecord, kind: MetricKind) -> Option<&str> {
    record
        .reading(kind)?
        .provenance
        .as_ref()?
        .complete_sample
        .as_deref()
}

fn captured_sample(record: &HealthRecord, metric: HealthMetricType) -> Option<String> {
    if metric != HealthMetricType::BloodPressure {
        return complete_sample(record, metric.primary_kind()).map(str::to_string);
    }

    let systolic = complete_sample(record, MetricKind::SystolicBp)?;
    let diastolic = complete_sample(record, MetricKind::DiastolicBp)?;
    let combined = json!({
        "systolic": parse_blob(systolic),
        "diastolic": parse_blob(diastolic),
    });
    serde_json::to_string_pretty(&combined).ok()
}

/// Unparseable blobs become `null` rather than failing the whole export.
fn parse_blob(blob: &str) -> Value {
    serde_json::from_str(blob).unwrap_or(Value::Null)
}

fn rebuilt_detail(record: &HealthRecord, metric: HealthMetricType) -> Option<Map<String, Value>> {
    let mut object = Map::new();
    object.insert("date".into(), json!(format_day(record.day)));
    object.insert("metricType".into(), json!(metric.display_name()));

    // Blood pressure needs both halves.
    for kind in metric.kinds() {
        let value = record.value(*kind)?;
        object.insert(kind.json_key().into(), json!(value));
    }
    object.insert("unit".into(), json!(metric.unit_label()));

    if let Some(provenance) = record
        .reading(metric.primary_kind())
        .and_then(|reading| reading.provenance.as_ref())
    {
        insert_provenance(&mut object, provenance);
    }

    Some(object)
}

fn insert_provenance(object: &mut Map<String, Value>, provenance: &Provenance) {
    object.insert("source".into(), json!(provenance.source_name));
    let optional = [
        ("sourceBundle", &provenance.source_bundle),
        ("sourceVersion", &provenance.source_version),
        ("sourceOS", &provenance.source_os),
        ("sampleId", &provenance.sample_id),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            object.insert(key.into(), json!(value));
        }
    }
    object.insert("wasUserEntered".into(), json!(provenance.was_user_entered));
    if let Some(metadata) = &provenance.metadata {
        object.insert("metadata".into(), parse_blob(metadata));
    }
}
