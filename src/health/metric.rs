//! Metric catalogue.
//!
//! `MetricKind` is the set of nine quantities stored per day. `HealthMetricType`
//! is the set of eight metrics shown to the user, where blood pressure groups
//! the systolic and diastolic readings.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A quantity stored on a `HealthRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    HeartRate,
    Weight,
    BloodOxygen,
    BloodGlucose,
    SystolicBp,
    DiastolicBp,
    RespiratoryRate,
    Steps,
    ExerciseMinutes,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::HeartRate,
        MetricKind::Weight,
        MetricKind::BloodOxygen,
        MetricKind::BloodGlucose,
        MetricKind::SystolicBp,
        MetricKind::DiastolicBp,
        MetricKind::RespiratoryRate,
        MetricKind::Steps,
        MetricKind::ExerciseMinutes,
    ];

    /// Steps and exercise minutes come from the source as per-day totals and
    /// never carry provenance.
    pub fn is_daily_sum(self) -> bool {
        matches!(self, MetricKind::Steps | MetricKind::ExerciseMinutes)
    }

    /// The unit every value of this metric is stored in.
    pub fn canonical_unit(self) -> &'static str {
        match self {
            MetricKind::HeartRate | MetricKind::RespiratoryRate => "count/min",
            MetricKind::Weight => "lb",
            MetricKind::BloodOxygen => "%",
            MetricKind::BloodGlucose => "mg/dL",
            MetricKind::SystolicBp | MetricKind::DiastolicBp => "mmHg",
            MetricKind::Steps => "count",
            MetricKind::ExerciseMinutes => "min",
        }
    }

    /// Column prefix in the `health_records` table.
    pub fn column(self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::Weight => "weight",
            MetricKind::BloodOxygen => "blood_oxygen",
            MetricKind::BloodGlucose => "blood_glucose",
            MetricKind::SystolicBp => "systolic_bp",
            MetricKind::DiastolicBp => "diastolic_bp",
            MetricKind::RespiratoryRate => "respiratory_rate",
            MetricKind::Steps => "steps",
            MetricKind::ExerciseMinutes => "exercise_minutes",
        }
    }

    /// Key used for this metric in detail JSON exports.
    pub fn json_key(self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heartRate",
            MetricKind::Weight => "weight",
            MetricKind::BloodOxygen => "bloodOxygen",
            MetricKind::BloodGlucose => "bloodGlucose",
            MetricKind::SystolicBp => "systolicBP",
            MetricKind::DiastolicBp => "diastolicBP",
            MetricKind::RespiratoryRate => "respiratoryRate",
            MetricKind::Steps => "steps",
            MetricKind::ExerciseMinutes => "exerciseMinutes",
        }
    }

    /// Quantity type identifier recorded in complete-sample blobs.
    pub fn sample_type(self) -> &'static str {
        match self {
            MetricKind::HeartRate => "HKQuantityTypeIdentifierHeartRate",
            MetricKind::Weight => "HKQuantityTypeIdentifierBodyMass",
            MetricKind::BloodOxygen => "HKQuantityTypeIdentifierOxygenSaturation",
            MetricKind::BloodGlucose => "HKQuantityTypeIdentifierBloodGlucose",
            MetricKind::SystolicBp => "HKQuantityTypeIdentifierBloodPressureSystolic",
            MetricKind::DiastolicBp => "HKQuantityTypeIdentifierBloodPressureDiastolic",
            MetricKind::RespiratoryRate => "HKQuantityTypeIdentifierRespiratoryRate",
            MetricKind::Steps => "HKQuantityTypeIdentifierStepCount",
            MetricKind::ExerciseMinutes => "HKQuantityTypeIdentifierAppleExerciseTime",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_key())
    }
}

/// A metric as presented in tables, charts and the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthMetricType {
    HeartRate,
    Weight,
    BloodOxygen,
    BloodGlucose,
    BloodPressure,
    RespiratoryRate,
    Steps,
    ExerciseMinutes,
}

impl HealthMetricType {
    pub const ALL: [HealthMetricType; 8] = [
        HealthMetricType::HeartRate,
        HealthMetricType::Weight,
        HealthMetricType::BloodOxygen,
        HealthMetricType::BloodGlucose,
        HealthMetricType::BloodPressure,
        HealthMetricType::RespiratoryRate,
        HealthMetricType::Steps,
        HealthMetricType::ExerciseMinutes,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            HealthMetricType::HeartRate => "Heart Rate",
            HealthMetricType::Weight => "Weight",
            HealthMetricType::BloodOxygen => "Blood Oxygen",
            HealthMetricType::BloodGlucose => "Blood Glucose",
            HealthMetricType::BloodPressure => "Blood Pressure",
            HealthMetricType::RespiratoryRate => "Respiratory Rate",
            HealthMetricType::Steps => "Steps",
            HealthMetricType::ExerciseMinutes => "Exercise Minutes",
        }
    }

    pub fn unit_label(self) -> &'static str {
        match self {
            HealthMetricType::HeartRate => "bpm",
            HealthMetricType::Weight => "lbs",
            HealthMetricType::BloodOxygen => "%",
            HealthMetricType::BloodGlucose => "mg/dL",
            HealthMetricType::BloodPressure => "mmHg",
            HealthMetricType::RespiratoryRate => "breaths/min",
            HealthMetricType::Steps => "steps",
            HealthMetricType::ExerciseMinutes => "min",
        }
    }

    pub fn decimals(self) -> usize {
        match self {
            HealthMetricType::HeartRate
            | HealthMetricType::BloodOxygen
            | HealthMetricType::Steps
            | HealthMetricType::ExerciseMinutes => 0,
            HealthMetricType::Weight
            | HealthMetricType::BloodGlucose
            | HealthMetricType::BloodPressure
            | HealthMetricType::RespiratoryRate => 1,
        }
    }

    /// Stored metric charted for this display metric. Blood pressure charts
    /// the systolic reading.
    pub fn primary_kind(self) -> MetricKind {
        match self {
            HealthMetricType::HeartRate => MetricKind::HeartRate,
            HealthMetricType::Weight => MetricKind::Weight,
            HealthMetricType::BloodOxygen => MetricKind::BloodOxygen,
            HealthMetricType::BloodGlucose => MetricKind::BloodGlucose,
            HealthMetricType::BloodPressure => MetricKind::SystolicBp,
            HealthMetricType::RespiratoryRate => MetricKind::RespiratoryRate,
            HealthMetricType::Steps => MetricKind::Steps,
            HealthMetricType::ExerciseMinutes => MetricKind::ExerciseMinutes,
        }
    }

    /// All stored metrics that make up this display metric.
    pub fn kinds(self) -> &'static [MetricKind] {
        match self {
            HealthMetricType::HeartRate => &[MetricKind::HeartRate],
            HealthMetricType::Weight => &[MetricKind::Weight],
            HealthMetricType::BloodOxygen => &[MetricKind::BloodOxygen],
            HealthMetricType::BloodGlucose => &[MetricKind::BloodGlucose],
            HealthMetricType::BloodPressure => &[MetricKind::SystolicBp, MetricKind::DiastolicBp],
            HealthMetricType::RespiratoryRate => &[MetricKind::RespiratoryRate],
            HealthMetricType::Steps => &[MetricKind::Steps],
            HealthMetricType::ExerciseMinutes => &[MetricKind::ExerciseMinutes],
        }
    }

    pub fn format_value(self, value: f64) -> String {
        format!("{:.*}", self.decimals(), value)
    }

    fn slug(self) -> &'static str {
        match self {
            HealthMetricType::HeartRate => "heart-rate",
            HealthMetricType::Weight => "weight",
            HealthMetricType::BloodOxygen => "blood-oxygen",
            HealthMetricType::BloodGlucose => "blood-glucose",
            HealthMetricType::BloodPressure => "blood-pressure",
            HealthMetricType::RespiratoryRate => "respiratory-rate",
            HealthMetricType::Steps => "steps",
            HealthMetricType::ExerciseMinutes => "exercise-minutes",
        }
    }
}

impl fmt::Display for HealthMetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for HealthMetricType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        HealthMetricType::ALL
            .into_iter()
            .find(|metric| metric.slug() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = HealthMetricType::ALL.iter().map(|m| m.slug()).collect();
                format!("unknown metric '{value}' (expected one of: {})", known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_steps_and_exercise_are_daily_sums() {
        let sums: Vec<MetricKind> = MetricKind::ALL
            .into_iter()
            .filter(|kind| kind.is_daily_sum())
            .collect();
        assert_eq!(sums, vec![MetricKind::Steps, MetricKind::ExerciseMinutes]);
    }

    #[test]
    fn metric_type_parses_slugs_and_display_names() {
        assert_eq!(
            "blood-pressure".parse::<HealthMetricType>().unwrap(),
            HealthMetricType::BloodPressure
        );
        assert_eq!(
            "Heart Rate".parse::<HealthMetricType>().unwrap(),
            HealthMetricType::HeartRate
        );
        assert!("cholesterol".parse::<HealthMetricType>().is_err());
    }

    #[test]
    fn format_value_uses_metric_precision() {
        assert_eq!(HealthMetricType::HeartRate.format_value(72.6), "73");
        assert_eq!(HealthMetricType::Weight.format_value(180.26), "180.3");
    }

    #[test]
    fn blood_pressure_charts_systolic() {
        assert_eq!(HealthMetricType::BloodPressure.primary_kind(), MetricKind::SystolicBp);
        assert_eq!(HealthMetricType::BloodPressure.kinds().len(), 2);
    }
}
