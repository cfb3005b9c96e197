use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::db::models::{HealthRecord, MetricReading, Provenance};

use super::{metric::MetricKind, sample::MetricSample, window::day_of};

/// Everything one metric's fetch produced.
#[derive(Debug, Clone)]
pub enum MetricBatch {
    Samples(MetricKind, Vec<MetricSample>),
    /// Totals keyed by the local midnight starting each day.
    DailySums(MetricKind, BTreeMap<DateTime<Utc>, f64>),
}

impl MetricBatch {
    pub fn metric(&self) -> MetricKind {
        match self {
            MetricBatch::Samples(metric, _) | MetricBatch::DailySums(metric, _) => *metric,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MetricBatch::Samples(_, samples) => samples.len(),
            MetricBatch::DailySums(_, totals) => totals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Folds per-metric batches into one record per calendar day.
///
/// Within a batch, a later sample for the same day overwrites an earlier one.
/// Batches for different metrics touch disjoint fields, so the order in which
/// batches arrive does not change the result.
pub struct DailyMerger<Tz: TimeZone> {
    tz: Tz,
    records: BTreeMap<NaiveDate, HealthRecord>,
}

impl<Tz: TimeZone> DailyMerger<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            records: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, batch: MetricBatch) {
        match batch {
            MetricBatch::Samples(metric, samples) => {
                for sample in &samples {
                    self.record_sample(metric, sample);
                }
            }
            MetricBatch::DailySums(metric, totals) => {
                for (interval_start, total) in totals {
                    self.record_total(metric, &interval_start, total);
                }
            }
        }
    }

    fn record_sample(&mut self, metric: MetricKind, sample: &MetricSample) {
        if !sample.value.is_finite() {
            return;
        }

        let provenance = if metric.is_daily_sum() {
            None
        } else {
            Some(Provenance {
                source_name: sample.source.name.clone(),
                source_bundle: Some(sample.source.bundle_identifier.clone()),
                source_version: sample.source.version.clone(),
                source_os: Some(sample.source.os_version.to_string()),
                sample_id: Some(sample.id.clone()),
                was_user_entered: sample.was_user_entered,
                metadata: sample.metadata_json(),
                complete_sample: sample.complete_json(),
            })
        };

        let day = day_of(&sample.start, &self.tz);
        self.entry(day).set(
            metric,
            MetricReading {
                value: sample.value,
                provenance,
            },
        );
    }

    fn record_total(&mut self, metric: MetricKind, interval_start: &DateTime<Utc>, total: f64) {
        if !total.is_finite() {
            return;
        }
        let day = day_of(interval_start, &self.tz);
        self.entry(day).set(
            metric,
            MetricReading {
                value: total,
                provenance: None,
            },
        );
    }

    fn entry(&mut self, day: NaiveDate) -> &mut HealthRecord {
        self.records
            .entry(day)
            .or_insert_with(|| HealthRecord::new(day))
    }

    /// Records in ascending day order.
    pub fn finish(self) -> Vec<HealthRecord> {
        self.records
            .into_values()
            .filter(|record| !record.is_empty())
            .collect()
    }
}

/// Merge a complete set of batches in one call.
pub fn merge_batches<Tz, I>(tz: Tz, batches: I) -> Vec<HealthRecord>
where
    Tz: TimeZone,
    I: IntoIterator<Item = MetricBatch>,
{
    let mut merger = DailyMerger::new(tz);
    for batch in batches {
        merger.apply(batch);
    }
    merger.finish()
}
