//! Health source seam.
//!
//! A `HealthSource` is whatever holds the raw samples: a platform health
//! store, an exported file, a test double. Sources deliver values already
//! converted to each metric's canonical unit.

use std::{collections::BTreeMap, sync::Arc, sync::RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::{metric::MetricKind, sample::MetricSample, window::DayWindow};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Health data is not available on this device")]
    Unavailable,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Failed to read health data: {0}")]
    Io(String),

    #[error("Failed to parse health data: {0}")]
    Parse(String),

    #[error("Unsupported unit '{unit}' for {metric}")]
    UnsupportedUnit { metric: MetricKind, unit: String },
}

/// A sample query. `window: None` means no time restriction.
#[derive(Debug, Clone, Copy)]
pub struct SampleQuery {
    pub metric: MetricKind,
    pub window: Option<DayWindow>,
    pub limit: Option<usize>,
}

impl SampleQuery {
    pub fn within(metric: MetricKind, window: DayWindow) -> Self {
        Self {
            metric,
            window: Some(window),
            limit: None,
        }
    }
}

#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Whether a health store exists at all on this device.
    fn is_available(&self) -> bool {
        true
    }

    /// Ask the user (or the platform) for read access.
    async fn request_authorization(&self) -> Result<(), SourceError>;

    /// Samples ordered by ascending start time.
    async fn fetch_samples(&self, query: SampleQuery) -> Result<Vec<MetricSample>, SourceError>;

    /// Per-day totals over the window, keyed by the local midnight that
    /// starts each calendar day.
    async fn fetch_daily_sums(
        &self,
        metric: MetricKind,
        window: &DayWindow,
    ) -> Result<BTreeMap<DateTime<Utc>, f64>, SourceError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorizationStatus {
    pub authorized: bool,
    pub message: Option<String>,
}

/// Tracks whether the source currently lets us read.
///
/// Health stores do not reliably report read permission, so access is
/// inferred from a probe: a one-sample heart-rate query that succeeds means
/// access is granted. The status is advisory.
pub struct SourceAccess {
    source: Arc<dyn HealthSource>,
    status: RwLock<AuthorizationStatus>,
}

impl SourceAccess {
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        let status = if source.is_available() {
            AuthorizationStatus::default()
        } else {
            AuthorizationStatus {
                authorized: false,
                message: Some(SourceError::Unavailable.to_string()),
            }
        };

        Self {
            source,
            status: RwLock::new(status),
        }
    }

    pub fn source(&self) -> Arc<dyn HealthSource> {
        Arc::clone(&self.source)
    }

    pub fn status(&self) -> AuthorizationStatus {
        match self.status.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.status().authorized
    }

    /// Re-run the probe query and update the status.
    pub async fn check_access(&self) -> AuthorizationStatus {
        if !self.source.is_available() {
            return self.set_status(false, SourceError::Unavailable.to_string());
        }

        let probe = SampleQuery {
            metric: MetricKind::HeartRate,
            window: None,
            limit: Some(1),
        };

        match self.source.fetch_samples(probe).await {
            Ok(_) => self.set_status(true, "Health data access granted".to_string()),
            Err(err) => {
                log::debug!("access probe failed: {err}");
                self.set_status(
                    false,
                    "Please grant health data permissions to view your health data".to_string(),
                )
            }
        }
    }

    /// Ask the source for access, then confirm it with a probe.
    pub async fn request_authorization(&self) -> AuthorizationStatus {
        if !self.source.is_available() {
            return self.set_status(false, SourceError::Unavailable.to_string());
        }

        match self.source.request_authorization().await {
            Ok(()) => self.check_access().await,
            Err(err) => {
                log::warn!("health data authorization failed: {err}");
                self.set_status(false, format!("Health data authorization failed: {err}"))
            }
        }
    }

    fn set_status(&self, authorized: bool, message: String) -> AuthorizationStatus {
        let status = AuthorizationStatus {
            authorized,
            message: Some(message),
        };
        let mut guard = match self.status.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = status.clone();
        status
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::{Notify, Semaphore};

    /// Holds sample fetches until released. `entered` fires on each fetch.
    pub(crate) struct FetchGate {
        pub entered: Notify,
        pub release: Semaphore,
    }

    impl Default for FetchGate {
        fn default() -> Self {
            Self {
                entered: Notify::new(),
                release: Semaphore::new(0),
            }
        }
    }

    /// In-memory source: fixed samples and totals per metric, with optional
    /// per-metric failures.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub samples: BTreeMap<MetricKind, Vec<MetricSample>>,
        pub sums: BTreeMap<MetricKind, BTreeMap<DateTime<Utc>, f64>>,
        pub failing: HashSet<MetricKind>,
        pub denied: bool,
        pub unavailable: bool,
        pub fetches: Mutex<Vec<MetricKind>>,
        pub gate: Option<Arc<FetchGate>>,
    }

    #[async_trait]
    impl HealthSource for StubSource {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        async fn request_authorization(&self) -> Result<(), SourceError> {
            if self.denied {
                Err(SourceError::NotAuthorized("denied by user".into()))
            } else {
                Ok(())
            }
        }

        async fn fetch_samples(
            &self,
            query: SampleQuery,
        ) -> Result<Vec<MetricSample>, SourceError> {
            self.fetches.lock().unwrap().push(query.metric);
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                let _permit = gate.release.acquire().await.unwrap();
            }
            if self.denied {
                return Err(SourceError::NotAuthorized("no access".into()));
            }
            if self.failing.contains(&query.metric) {
                return Err(SourceError::Io("query failed".into()));
            }
            let mut samples = self.samples.get(&query.metric).cloned().unwrap_or_default();
            if let Some(limit) = query.limit {
                samples.truncate(limit);
            }
            Ok(samples)
        }

        async fn fetch_daily_sums(
            &self,
            metric: MetricKind,
            _window: &DayWindow,
        ) -> Result<BTreeMap<DateTime<Utc>, f64>, SourceError> {
            self.fetches.lock().unwrap().push(metric);
            if self.failing.contains(&metric) {
                return Err(SourceError::Io("statistics query failed".into()));
            }
            Ok(self.sums.get(&metric).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn probe_success_marks_access_granted() {
        let access = SourceAccess::new(Arc::new(StubSource::default()));
        assert!(!access.is_authorized());

        let status = access.check_access().await;

        assert!(status.authorized);
        assert!(access.is_authorized());
    }

    #[tokio::test]
    async fn denied_request_leaves_access_revoked() {
        let source = StubSource {
            denied: true,
            ..Default::default()
        };
        let access = SourceAccess::new(Arc::new(source));

        let status = access.request_authorization().await;

        assert!(!status.authorized);
        assert!(status.message.unwrap().contains("authorization failed"));
    }

    #[tokio::test]
    async fn unavailable_source_never_probes() {
        let source = Arc::new(StubSource {
            unavailable: true,
            ..Default::default()
        });
        let access = SourceAccess::new(source.clone());

        let status = access.check_access().await;

        assert!(!status.authorized);
        assert!(source.fetches.lock().unwrap().is_empty());
    }
}
