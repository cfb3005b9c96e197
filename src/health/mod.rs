//! Health metrics: source connectors, the daily merge and the refresh
//! pipeline that feeds the record store.

pub mod export;
pub mod file_source;
pub mod ingest;
pub mod merge;
pub mod metric;
pub mod points;
pub mod sample;
pub mod source;
pub mod window;

pub use file_source::JsonFileSource;
pub use ingest::{HealthSync, RefreshSummary};
pub use metric::{HealthMetricType, MetricKind};
pub use source::{AuthorizationStatus, HealthSource, SourceAccess, SourceError};
