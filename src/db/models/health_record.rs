//! Day-keyed health record model.
//!
//! One `HealthRecord` exists per calendar day. A metric with no reading for
//! the day is simply absent from `readings`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::health::MetricKind;

/// Where a stored value came from. Daily-sum metrics never carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub source_name: String,
    pub source_bundle: Option<String>,
    pub source_version: Option<String>,
    pub source_os: Option<String>,
    pub sample_id: Option<String>,
    pub was_user_entered: bool,
    /// Sample metadata as JSON text.
    pub metadata: Option<String>,
    /// The full sample as JSON text, captured at ingestion.
    pub complete_sample: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricReading {
    pub value: f64,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub day: NaiveDate,
    pub readings: BTreeMap<MetricKind, MetricReading>,
}

impl HealthRecord {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            readings: BTreeMap::new(),
        }
    }

    pub fn value(&self, metric: MetricKind) -> Option<f64> {
        self.readings.get(&metric).map(|reading| reading.value)
    }

    pub fn reading(&self, metric: MetricKind) -> Option<&MetricReading> {
        self.readings.get(&metric)
    }

    pub fn set(&mut self, metric: MetricKind, reading: MetricReading) {
        self.readings.insert(metric, reading);
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
