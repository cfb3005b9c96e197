//! Health source backed by an exported JSON file.
//!
//! The file holds raw samples in whatever unit the exporting device used:
//!
//! ```json
//! { "samples": [
//!   { "id": "...", "type": "heartRate", "start": "2025-01-01T08:00:00Z",
//!     "value": 61, "unit": "count/min",
//!     "source": { "name": "Watch", "bundleIdentifier": "com.apple.health",
//!                 "osVersion": { "major": 10, "minor": 1 } },
//!     "metadata": { "HKWasUserEntered": false } }
//! ] }
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{
    metric::MetricKind,
    sample::{DeviceInfo, MetadataValue, MetricSample, SourceRevision, METADATA_KEY_WAS_USER_ENTERED},
    source::{HealthSource, SampleQuery, SourceError},
    window::{day_of, start_of_day, DayWindow},
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const KG_PER_LB: f64 = 0.453_592_37;
const MG_DL_PER_MMOL_L: f64 = 18.015_588;
const MMHG_PER_KPA: f64 = 7.500_616_83;

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    samples: Vec<RawSample>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSample {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    metric: MetricKind,
    start: DateTime<Utc>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    value: f64,
    unit: String,
    source: SourceRevision,
    #[serde(default)]
    device: Option<DeviceInfo>,
    #[serde(default)]
    metadata: BTreeMap<String, MetadataValue>,
}

/// Reads samples from an export file. Daily totals are bucketed by calendar
/// day in `tz`.
pub struct JsonFileSource<Tz: TimeZone = Local> {
    path: PathBuf,
    tz: Tz,
}

impl JsonFileSource<Local> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_timezone(path, Local)
    }
}

impl<Tz: TimeZone> JsonFileSource<Tz> {
    pub fn with_timezone(path: impl Into<PathBuf>, tz: Tz) -> Self {
        Self {
            path: path.into(),
            tz,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<RawSample>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| SourceError::Io(format!("{}: {err}", self.path.display())))?;
        let export: ExportFile = serde_json::from_str(&contents)
            .map_err(|err| SourceError::Parse(format!("{}: {err}", self.path.display())))?;
        Ok(export.samples)
    }

    /// Raw samples for one metric inside the window, oldest first.
    async fn matching(
        &self,
        metric: MetricKind,
        window: Option<&DayWindow>,
    ) -> Result<Vec<RawSample>, SourceError> {
        let mut samples: Vec<RawSample> = self
            .load()
            .await?
            .into_iter()
            .filter(|raw| raw.metric == metric)
            .filter(|raw| window.map_or(true, |w| w.contains(&raw.start)))
            .collect();
        samples.sort_by_key(|raw| raw.start);
        Ok(samples)
    }
}

#[async_trait]
impl<Tz> HealthSource for JsonFileSource<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    async fn request_authorization(&self) -> Result<(), SourceError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|err| {
            SourceError::NotAuthorized(format!("cannot read {}: {err}", self.path.display()))
        })?;
        if !metadata.is_file() {
            return Err(SourceError::NotAuthorized(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        log_info!("health export {} is readable", self.path.display());
        Ok(())
    }

    async fn fetch_samples(&self, query: SampleQuery) -> Result<Vec<MetricSample>, SourceError> {
        let raw = self.matching(query.metric, query.window.as_ref()).await?;
        let limit = query.limit.unwrap_or(usize::MAX);

        raw.into_iter()
            .take(limit)
            .map(|raw| into_sample(query.metric, raw))
            .collect()
    }

    async fn fetch_daily_sums(
        &self,
        metric: MetricKind,
        window: &DayWindow,
    ) -> Result<BTreeMap<DateTime<Utc>, f64>, SourceError> {
        let raw = self.matching(metric, Some(window)).await?;

        let mut totals = BTreeMap::new();
        for sample in raw {
            let value = to_canonical(metric, sample.value, &sample.unit)?;
            let day_start = start_of_day(day_of(&sample.start, &self.tz), &self.tz);
            *totals.entry(day_start).or_insert(0.0) += value;
        }

        if totals.is_empty() {
            log_warn!("no {metric} totals in {}", self.path.display());
        }
        Ok(totals)
    }
}

fn into_sample(metric: MetricKind, raw: RawSample) -> Result<MetricSample, SourceError> {
    let value = to_canonical(metric, raw.value, &raw.unit)?;
    let was_user_entered = raw
        .metadata
        .get(METADATA_KEY_WAS_USER_ENTERED)
        .and_then(MetadataValue::as_bool)
        .unwrap_or(false);

    Ok(MetricSample {
        id: raw.id.unwrap_or_else(|| Uuid::new_v4().to_string().to_uppercase()),
        metric,
        start: raw.start,
        end: raw.end.unwrap_or(raw.start),
        value,
        unit: metric.canonical_unit().to_string(),
        source: raw.source,
        was_user_entered,
        metadata: raw.metadata,
        device: raw.device,
    })
}

/// Convert a raw value to the metric's canonical unit.
///
/// Oxygen saturation in `%` is reported as a fraction and is scaled to 0–100.
pub fn to_canonical(metric: MetricKind, value: f64, unit: &str) -> Result<f64, SourceError> {
    use MetricKind::*;

    let converted = match (metric, unit) {
        (HeartRate | RespiratoryRate, "count/min" | "bpm" | "breaths/min") => value,
        (HeartRate | RespiratoryRate, "count/s") => value * 60.0,
        (Weight, "lb" | "lbs") => value,
        (Weight, "kg") => value / KG_PER_LB,
        (Weight, "g") => value / (KG_PER_LB * 1000.0),
        (BloodOxygen, "%" | "percent") => value * 100.0,
        (BloodGlucose, "mg/dL") => value,
        (BloodGlucose, "mmol/L") => value * MG_DL_PER_MMOL_L,
        (SystolicBp | DiastolicBp, "mmHg") => value,
        (SystolicBp | DiastolicBp, "kPa") => value * MMHG_PER_KPA,
        (Steps, "count" | "steps") => value,
        (ExerciseMinutes, "min") => value,
        (ExerciseMinutes, "s") => value / 60.0,
        (ExerciseMinutes, "h" | "hr") => value * 60.0,
        _ => {
            return Err(SourceError::UnsupportedUnit {
                metric,
                unit: unit.to_string(),
            })
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::merge::{merge_batches, MetricBatch};
    use crate::health::window::tests::DstZone;
    use chrono::{Duration, NaiveDate};
    use std::io::Write;

    const EXPORT: &str = r#"{
      "samples": [
        { "id": "HR-2", "type": "heartRate", "start": "2025-01-01T20:00:00Z",
          "value": 65, "unit": "count/min",
          "source": { "name": "Watch", "bundleIdentifier": "com.apple.health.watch",
                      "osVersion": { "major": 10, "minor": 1 } } },
        { "id": "HR-1", "type": "heartRate", "start": "2025-01-01T08:00:00Z",
          "value": 60, "unit": "count/min",
          "source": { "name": "Watch", "bundleIdentifier": "com.apple.health.watch" },
          "metadata": { "HKWasUserEntered": true } },
        { "id": "HR-old", "type": "heartRate", "start": "2024-12-01T08:00:00Z",
          "value": 90, "unit": "count/min",
          "source": { "name": "Watch", "bundleIdentifier": "com.apple.health.watch" } },
        { "type": "weight", "start": "2025-01-02T07:00:00Z", "value": 80, "unit": "kg",
          "source": { "name": "Scale", "bundleIdentifier": "com.scale" } },
        { "type": "bloodOxygen", "start": "2025-01-02T07:00:00Z", "value": 0.97, "unit": "%",
          "source": { "name": "Watch", "bundleIdentifier": "com.apple.health.watch" } },
        { "type": "bloodGlucose", "start": "2025-01-02T07:00:00Z", "value": 5, "unit": "furlongs",
          "source": { "name": "Meter", "bundleIdentifier": "com.meter" } },
        { "type": "steps", "start": "2025-01-01T09:00:00Z", "value": 1000, "unit": "count",
          "source": { "name": "Phone", "bundleIdentifier": "com.apple.health" } },
        { "type": "steps", "start": "2025-01-01T18:00:00Z", "value": 2500, "unit": "count",
          "source": { "name": "Phone", "bundleIdentifier": "com.apple.health" } },
        { "type": "steps", "start": "2025-01-02T10:00:00Z", "value": 300, "unit": "count",
          "source": { "name": "Phone", "bundleIdentifier": "com.apple.health" } },
        { "type": "exerciseMinutes", "start": "2025-01-02T10:00:00Z", "value": 900, "unit": "s",
          "source": { "name": "Watch", "bundleIdentifier": "com.apple.health.watch" } }
      ]
    }"#;

    fn export_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();
        file
    }

    fn january() -> DayWindow {
        DayWindow::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn samples_come_back_sorted_and_windowed() {
        let file = export_file();
        let source = JsonFileSource::new(file.path());

        let samples = source
            .fetch_samples(SampleQuery::within(MetricKind::HeartRate, january()))
            .await
            .unwrap();

        let ids: Vec<&str> = samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["HR-1", "HR-2"]);
        assert!(samples[0].was_user_entered);
        assert!(!samples[1].was_user_entered);
    }

    #[tokio::test]
    async fn values_are_converted_to_canonical_units() {
        let file = export_file();
        let source = JsonFileSource::new(file.path());

        let weight = source
            .fetch_samples(SampleQuery::within(MetricKind::Weight, january()))
            .await
            .unwrap();
        assert!((weight[0].value - 176.37).abs() < 0.01);
        assert_eq!(weight[0].unit, "lb");

        let oxygen = source
            .fetch_samples(SampleQuery::within(MetricKind::BloodOxygen, january()))
            .await
            .unwrap();
        assert!((oxygen[0].value - 97.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_unit_fails_only_that_metric() {
        let file = export_file();
        let source = JsonFileSource::new(file.path());

        let glucose = source
            .fetch_samples(SampleQuery::within(MetricKind::BloodGlucose, january()))
            .await;
        assert!(matches!(glucose, Err(SourceError::UnsupportedUnit { .. })));

        let heart = source
            .fetch_samples(SampleQuery::within(MetricKind::HeartRate, january()))
            .await;
        assert!(heart.is_ok());
    }

    #[tokio::test]
    async fn daily_sums_are_keyed_by_local_midnight() {
        let file = export_file();
        let source = JsonFileSource::with_timezone(file.path(), Utc);
        let window = january();

        let steps = source
            .fetch_daily_sums(MetricKind::Steps, &window)
            .await
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[&window.start], 3500.0);
        assert_eq!(steps[&(window.start + Duration::days(1))], 300.0);

        let exercise = source
            .fetch_daily_sums(MetricKind::ExerciseMinutes, &window)
            .await
            .unwrap();
        assert_eq!(exercise[&(window.start + Duration::days(1))], 15.0);
    }

    #[tokio::test]
    async fn daily_sums_stay_on_their_day_across_fall_back() {
        let tz = DstZone::new_york_2025();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"samples": [
              { "type": "steps", "start": "2025-11-02T17:00:00Z", "value": 1000, "unit": "count",
                "source": { "name": "Phone", "bundleIdentifier": "com.apple.health" } },
              { "type": "steps", "start": "2025-11-03T17:00:00Z", "value": 2000, "unit": "count",
                "source": { "name": "Phone", "bundleIdentifier": "com.apple.health" } },
              { "type": "steps", "start": "2025-11-04T04:30:00Z", "value": 50, "unit": "count",
                "source": { "name": "Phone", "bundleIdentifier": "com.apple.health" } }
            ]}"#,
        )
        .unwrap();
        let source = JsonFileSource::with_timezone(file.path(), tz);
        let day = |d: u32| NaiveDate::from_ymd_opt(2025, 11, d).unwrap();
        let window = DayWindow::new(start_of_day(day(1), &tz), start_of_day(day(5), &tz)).unwrap();

        let totals = source
            .fetch_daily_sums(MetricKind::Steps, &window)
            .await
            .unwrap();
        assert_eq!(
            totals.keys().copied().collect::<Vec<_>>(),
            vec![
                Utc.with_ymd_and_hms(2025, 11, 2, 4, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 11, 3, 5, 0, 0).unwrap(),
            ]
        );

        let records = merge_batches(tz, [MetricBatch::DailySums(MetricKind::Steps, totals)]);
        let steps: Vec<(NaiveDate, Option<f64>)> = records
            .iter()
            .map(|r| (r.day, r.value(MetricKind::Steps)))
            .collect();
        assert_eq!(
            steps,
            vec![(day(2), Some(1000.0)), (day(3), Some(2050.0))]
        );
    }

    #[tokio::test]
    async fn probe_limit_and_unbounded_window() {
        let file = export_file();
        let source = JsonFileSource::new(file.path());

        let probe = source
            .fetch_samples(SampleQuery {
                metric: MetricKind::HeartRate,
                window: None,
                limit: Some(1),
            })
            .await
            .unwrap();

        assert_eq!(probe.len(), 1);
        assert_eq!(probe[0].id, "HR-old");
    }

    #[tokio::test]
    async fn missing_file_is_not_authorized() {
        let source = JsonFileSource::new("/nonexistent/health-export.json");
        assert!(matches!(
            source.request_authorization().await,
            Err(SourceError::NotAuthorized(_))
        ));
        assert!(matches!(
            source
                .fetch_samples(SampleQuery::within(MetricKind::HeartRate, january()))
                .await,
            Err(SourceError::Io(_))
        ));
    }
}
