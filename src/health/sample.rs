//! Samples as delivered by a health source.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::metric::MetricKind;

/// Metadata key a source uses to flag manually entered samples.
pub const METADATA_KEY_WAS_USER_ENTERED: &str = "HKWasUserEntered";

/// A single metadata value attached to a sample.
///
/// Variant order matters for deserialization: RFC 3339 strings become
/// timestamps before falling back to plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(value) => Some(*value),
            MetadataValue::Number(value) => Some(*value != 0.0),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            MetadataValue::Bool(value) => Value::Bool(*value),
            MetadataValue::Number(value) => json!(value),
            MetadataValue::Timestamp(value) => Value::String(format_timestamp(value)),
            MetadataValue::Text(value) => Value::String(value.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    #[serde(default)]
    pub patch: u32,
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// The app (and app build) that produced a sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRevision {
    pub name: String,
    pub bundle_identifier: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub os_version: OsVersion,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub hardware_version: Option<String>,
    pub firmware_version: Option<String>,
    pub software_version: Option<String>,
    pub local_identifier: Option<String>,
    pub udi_device_identifier: Option<String>,
}

/// One timestamped observation, already converted to the metric's canonical
/// unit by the source.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub id: String,
    pub metric: MetricKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    pub source: SourceRevision,
    pub was_user_entered: bool,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub device: Option<DeviceInfo>,
}

impl MetricSample {
    /// Metadata as pretty, key-sorted JSON. `None` when there is no metadata.
    pub fn metadata_json(&self) -> Option<String> {
        if self.metadata.is_empty() {
            return None;
        }
        serde_json::to_string_pretty(&Value::Object(self.metadata_map())).ok()
    }

    /// The whole sample as pretty, key-sorted JSON, captured at ingestion time
    /// so detail views can show exactly what the source reported.
    pub fn complete_json(&self) -> Option<String> {
        let source = json!({
            "name": self.source.name,
            "bundleIdentifier": self.source.bundle_identifier,
        });
        let os = self.source.os_version;

        let device = match &self.device {
            Some(device) => {
                let fields = [
                    ("name", &device.name),
                    ("manufacturer", &device.manufacturer),
                    ("model", &device.model),
                    ("hardwareVersion", &device.hardware_version),
                    ("firmwareVersion", &device.firmware_version),
                    ("softwareVersion", &device.software_version),
                    ("localIdentifier", &device.local_identifier),
                    ("udiDeviceIdentifier", &device.udi_device_identifier),
                ];
                let map: Map<String, Value> = fields
                    .into_iter()
                    .map(|(key, value)| {
                        let value = value.clone().map(Value::String).unwrap_or(Value::Null);
                        (key.to_string(), value)
                    })
                    .collect();
                Value::Object(map)
            }
            None => Value::Null,
        };

        let sample = json!({
            "uuid": self.id,
            "sampleType": self.metric.sample_type(),
            "startDate": format_timestamp(&self.start),
            "endDate": format_timestamp(&self.end),
            "quantity": {
                "value": self.value,
                "unit": self.unit,
            },
            "source": source.clone(),
            "sourceRevision": {
                "source": source,
                "version": self.source.version.clone().unwrap_or_default(),
                "productType": self.source.product_type.clone().unwrap_or_default(),
                "operatingSystemVersion": {
                    "majorVersion": os.major,
                    "minorVersion": os.minor,
                    "patchVersion": os.patch,
                    "stringValue": os.to_string(),
                },
            },
            "device": device,
            "wasUserEntered": if self.was_user_entered { 1 } else { 0 },
            "metadata": Value::Object(self.metadata_map()),
            "hasUndeterminedDuration": false,
        });

        serde_json::to_string_pretty(&sample).ok()
    }

    fn metadata_map(&self) -> Map<String, Value> {
        self.metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }
}

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample(metric: MetricKind, start: DateTime<Utc>, value: f64) -> MetricSample {
        MetricSample {
            id: format!("{metric}-{}", start.timestamp()),
            metric,
            start,
            end: start,
            value,
            unit: metric.canonical_unit().to_string(),
            source: SourceRevision {
                name: "Apple Watch".into(),
                bundle_identifier: "com.apple.health.watch".into(),
                version: Some("10.1".into()),
                product_type: Some("Watch6,1".into()),
                os_version: OsVersion {
                    major: 10,
                    minor: 1,
                    patch: 0,
                },
            },
            was_user_entered: false,
            metadata: BTreeMap::new(),
            device: None,
        }
    }

    #[test]
    fn os_version_drops_zero_patch() {
        let short = OsVersion { major: 17, minor: 1, patch: 0 };
        let long = OsVersion { major: 17, minor: 1, patch: 2 };
        assert_eq!(short.to_string(), "17.1");
        assert_eq!(long.to_string(), "17.1.2");
    }

    #[test]
    fn metadata_json_is_none_when_empty() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let sample = sample(MetricKind::HeartRate, start, 60.0);
        assert!(sample.metadata_json().is_none());
    }

    #[test]
    fn metadata_values_deserialize_into_tagged_variants() {
        let raw = r#"{"a": true, "b": 3.5, "c": "2025-01-01T08:00:00Z", "d": "wrist"}"#;
        let parsed: BTreeMap<String, MetadataValue> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed["a"], MetadataValue::Bool(true));
        assert_eq!(parsed["b"], MetadataValue::Number(3.5));
        assert!(matches!(parsed["c"], MetadataValue::Timestamp(_)));
        assert_eq!(parsed["d"], MetadataValue::Text("wrist".into()));
    }

    #[test]
    fn complete_json_has_sorted_keys_and_source_revision() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let mut sample = sample(MetricKind::HeartRate, start, 60.0);
        sample.was_user_entered = true;
        sample
            .metadata
            .insert("HKWasUserEntered".into(), MetadataValue::Bool(true));

        let blob = sample.complete_json().unwrap();
        let parsed: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(parsed["sampleType"], "HKQuantityTypeIdentifierHeartRate");
        assert_eq!(parsed["startDate"], "2025-01-01T08:00:00.000Z");
        assert_eq!(parsed["wasUserEntered"], 1);
        assert_eq!(parsed["device"], Value::Null);
        assert_eq!(
            parsed["sourceRevision"]["operatingSystemVersion"]["stringValue"],
            "10.1"
        );

        let device_pos = blob.find("\"device\"").unwrap();
        let uuid_pos = blob.find("\"uuid\"").unwrap();
        assert!(device_pos < uuid_pos);
    }
}
