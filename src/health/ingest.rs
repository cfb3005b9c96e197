//! Refresh pipeline: fetch all nine metric streams concurrently, merge them in
//! one place, then replace the stored window.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::db::{models::HealthRecord, Database};

use super::{
    merge::{DailyMerger, MetricBatch},
    metric::MetricKind,
    source::{HealthSource, SampleQuery, SourceAccess},
    window::DayWindow,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Fetch every metric over the window and merge the results.
///
/// Each metric is fetched by its own task. A failing stream is logged and
/// contributes nothing. Only the receiving loop below writes to the merger,
/// and it returns once all nine senders have reported.
pub async fn collect_records<Tz: TimeZone>(
    source: Arc<dyn HealthSource>,
    window: DayWindow,
    tz: Tz,
) -> Vec<HealthRecord> {
    let (tx, mut rx) = mpsc::channel::<MetricBatch>(MetricKind::ALL.len());

    for metric in MetricKind::ALL {
        let source = Arc::clone(&source);
        let tx = tx.clone();
        tokio::spawn(async move {
            let batch = fetch_batch(source.as_ref(), metric, &window).await;
            if tx.send(batch).await.is_err() {
                log_error!("merge loop dropped before {metric} batch arrived");
            }
        });
    }
    drop(tx);

    let mut merger = DailyMerger::new(tz);
    let mut reported = 0usize;
    while let Some(batch) = rx.recv().await {
        reported += 1;
        merger.apply(batch);
    }

    if reported < MetricKind::ALL.len() {
        log_warn!(
            "only {reported} of {} metric streams reported",
            MetricKind::ALL.len()
        );
    }

    merger.finish()
}

async fn fetch_batch(source: &dyn HealthSource, metric: MetricKind, window: &DayWindow) -> MetricBatch {
    if metric.is_daily_sum() {
        match source.fetch_daily_sums(metric, window).await {
            Ok(totals) => MetricBatch::DailySums(metric, totals),
            Err(err) => {
                log_warn!("error fetching statistics for {metric}: {err}");
                MetricBatch::DailySums(metric, Default::default())
            }
        }
    } else {
        match source.fetch_samples(SampleQuery::within(metric, *window)).await {
            Ok(samples) => MetricBatch::Samples(metric, samples),
            Err(err) => {
                log_warn!("error fetching {metric}: {err}");
                MetricBatch::Samples(metric, Vec::new())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub records_written: usize,
    /// False when the source was unavailable or access was not granted; the
    /// store is left untouched in that case.
    pub fetched: bool,
}

/// Ties a health source to the record store.
pub struct HealthSync<Tz: TimeZone = Local> {
    access: Arc<SourceAccess>,
    db: Database,
    tz: Tz,
    in_flight: Mutex<()>,
}

impl HealthSync<Local> {
    pub fn new(access: Arc<SourceAccess>, db: Database) -> Self {
        Self::with_timezone(access, db, Local)
    }
}

impl<Tz> HealthSync<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    pub fn with_timezone(access: Arc<SourceAccess>, db: Database, tz: Tz) -> Self {
        Self {
            access,
            db,
            tz,
            in_flight: Mutex::new(()),
        }
    }

    pub fn access(&self) -> &SourceAccess {
        &self.access
    }

    /// Fetch the last `days` days and replace the stored records for them.
    pub async fn refresh(&self, days: u32, now: DateTime<Utc>) -> Result<RefreshSummary> {
        let window = DayWindow::last_days(days, now, &self.tz)?;
        self.refresh_window(window).await
    }

    pub async fn refresh_window(&self, window: DayWindow) -> Result<RefreshSummary> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| anyhow!("refresh already in progress"))?;

        let (first_day, last_day) = window.day_range(&self.tz);

        if !self.access.is_authorized() && !self.access.check_access().await.authorized {
            log_warn!("skipping refresh: health data access not granted");
            return Ok(RefreshSummary {
                first_day,
                last_day,
                records_written: 0,
                fetched: false,
            });
        }

        let records = collect_records(self.access.source(), window, self.tz.clone()).await;
        let written = records.len();

        self.db
            .replace_health_records(first_day, last_day, records)
            .await
            .context("failed to store refreshed health records")?;

        log_info!("refreshed {first_day}..={last_day}: {written} day records");

        Ok(RefreshSummary {
            first_day,
            last_day,
            records_written: written,
            fetched: true,
        })
    }
}
