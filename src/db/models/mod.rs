pub mod health_record;
pub mod user;

pub use health_record::{HealthRecord, MetricReading, Provenance};
pub use user::{AccountType, Group, UserAccount};
