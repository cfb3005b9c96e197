use chrono::NaiveDate;
use serde::Serialize;

use crate::db::models::HealthRecord;

use super::metric::{HealthMetricType, MetricKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub day: NaiveDate,
    pub value: f64,
}

/// Chart feed for one display metric. Days without a value are skipped.
pub fn data_points(records: &[HealthRecord], metric: HealthMetricType) -> Vec<DataPoint> {
    let kind = metric.primary_kind();
    let mut points: Vec<DataPoint> = records
        .iter()
        .filter_map(|record| {
            record.value(kind).map(|value| DataPoint {
                day: record.day,
                value,
            })
        })
        .collect();
    points.sort_by_key(|point| point.day);
    points
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    pub metric: HealthMetricType,
    pub day: NaiveDate,
    pub value: f64,
    /// Diastolic half of a blood pressure reading.
    pub secondary: Option<f64>,
}

impl LatestReading {
    pub fn display_value(&self) -> String {
        match self.secondary {
            Some(secondary) => format!(
                "{}/{}",
                self.metric.format_value(self.value),
                self.metric.format_value(secondary)
            ),
            None => self.metric.format_value(self.value),
        }
    }
}

/// Most recent day carrying a value for `metric`.
pub fn latest_reading(records: &[HealthRecord], metric: HealthMetricType) -> Option<LatestReading> {
    let mut candidates: Vec<&HealthRecord> = records.iter().collect();
    candidates.sort_by_key(|record| record.day);

    candidates.into_iter().rev().find_map(|record| {
        let value = record.value(metric.primary_kind())?;
        let secondary = if metric == HealthMetricType::BloodPressure {
            Some(record.value(MetricKind::DiastolicBp)?)
        } else {
            None
        };
        Some(LatestReading {
            metric,
            day: record.day,
            value,
            secondary,
        })
    })
}

/// Latest reading for every display metric, in catalogue order.
pub fn dashboard(records: &[HealthRecord]) -> Vec<(HealthMetricType, Option<LatestReading>)> {
    HealthMetricType::ALL
        .into_iter()
        .map(|metric| (metric, latest_reading(records, metric)))
        .collect()
}
