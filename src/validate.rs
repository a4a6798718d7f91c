//! Parameter validation performed before any network activity.
//!
//! Each rule is exposed on its own so it can be checked in isolation;
//! [`validate`] applies them in order and returns the first violation.

use crate::error::{AnalysisError, Result};
use crate::types::AnalysisParameters;
use chrono::NaiveDate;
use serde::Serialize;

/// Shortest accepted analysis window, in days.
pub const MIN_RANGE_DAYS: i64 = 7;
/// Longest accepted analysis window, in days.
pub const MAX_RANGE_DAYS: i64 = 365;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameters that passed every validation rule.
///
/// Only [`validate`] can construct this, and it exposes no mutators, so a
/// submitted job's parameters cannot change after the check. Serializes to
/// the same wire shape as [`AnalysisParameters`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedParameters {
    params: AnalysisParameters,
    #[serde(skip)]
    start: NaiveDate,
    #[serde(skip)]
    end: NaiveDate,
}

impl ValidatedParameters {
    pub fn parameters(&self) -> &AnalysisParameters {
        &self.params
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Length of the analysis window in days.
    pub fn range_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn into_inner(self) -> AnalysisParameters {
        self.params
    }
}

/// Run every rule against `params`; the first violation wins.
pub fn validate(params: &AnalysisParameters) -> Result<ValidatedParameters> {
    validate_coordinates(params.latitude, params.longitude)?;
    let (start, end) = validate_dates(&params.start_date, &params.end_date)?;
    validate_thresholds(params.cloud_cover, params.hot_threshold, params.veg_threshold)?;
    let dataset = validate_dataset(&params.dataset)?;

    let mut params = params.clone();
    params.dataset = dataset;
    params.start_date = start.format(DATE_FORMAT).to_string();
    params.end_date = end.format(DATE_FORMAT).to_string();
    Ok(ValidatedParameters { params, start, end })
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(invalid("Latitude and longitude must be valid numbers"));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(invalid("Latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid("Longitude must be between -180 and 180"));
    }
    Ok(())
}

/// Parse both dates and check ordering and window length.
pub fn validate_dates(start_date: &str, end_date: &str) -> Result<(NaiveDate, NaiveDate)> {
    let (start_date, end_date) = (start_date.trim(), end_date.trim());
    if start_date.is_empty() || end_date.is_empty() {
        return Err(invalid("Start date and end date are required"));
    }

    let parse = |s: &str| NaiveDate::parse_from_str(s, DATE_FORMAT);
    let (start, end) = match (parse(start_date), parse(end_date)) {
        (Ok(start), Ok(end)) => (start, end),
        _ => return Err(invalid("Invalid date format. Use YYYY-MM-DD")),
    };

    if start >= end {
        return Err(invalid("Start date must be before end date"));
    }

    let days = (end - start).num_days();
    if days < MIN_RANGE_DAYS {
        return Err(invalid(format!(
            "Date range must be at least {} days",
            MIN_RANGE_DAYS
        )));
    }
    if days > MAX_RANGE_DAYS {
        return Err(invalid(format!(
            "Date range cannot exceed {} days",
            MAX_RANGE_DAYS
        )));
    }

    Ok((start, end))
}

pub fn validate_thresholds(cloud_cover: i64, hot_threshold: f64, veg_threshold: f64) -> Result<()> {
    if !(0..=100).contains(&cloud_cover) {
        return Err(invalid("Cloud cover must be between 0 and 100%"));
    }
    if !hot_threshold.is_finite() || !(0.0..=60.0).contains(&hot_threshold) {
        return Err(invalid("Hot threshold must be between 0 and 60°C"));
    }
    if !veg_threshold.is_finite() || !(0.0..=1.0).contains(&veg_threshold) {
        return Err(invalid("Vegetation threshold must be between 0 and 1"));
    }
    Ok(())
}

/// Returns the trimmed dataset id.
pub fn validate_dataset(dataset: &str) -> Result<String> {
    let trimmed = dataset.trim();
    if trimmed.is_empty() {
        return Err(invalid("Dataset is required"));
    }
    if !trimmed.contains('/') {
        return Err(invalid(
            "Dataset must be in format: COLLECTION/DATASET (e.g., LANDSAT/LC09/C02/T1_L2)",
        ));
    }
    Ok(trimmed.to_string())
}

fn invalid(reason: impl Into<String>) -> AnalysisError {
    AnalysisError::Validation(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn params() -> AnalysisParameters {
        AnalysisParameters {
            latitude: 29.52,
            longitude: 74.99,
            start_date: "2025-05-29".into(),
            end_date: "2025-08-30".into(),
            cloud_cover: 20,
            hot_threshold: 37.0,
            veg_threshold: 0.2,
            dataset: "LANDSAT/LC09/C02/T1_L2".into(),
            project_id: None,
        }
    }

    fn reason(err: AnalysisError) -> String {
        assert_eq!(err.kind(), ErrorKind::Validation);
        err.to_string()
    }

    #[test]
    fn test_valid_parameters_pass() {
        let validated = validate(&params()).unwrap();
        assert_eq!(validated.range_days(), 93);
        assert_eq!(validated.parameters().dataset, "LANDSAT/LC09/C02/T1_L2");
    }

    #[test]
    fn test_coordinates_out_of_range() {
        for (lat, lon) in [(90.1, 0.0), (-90.5, 0.0), (0.0, 180.01), (0.0, -181.0)] {
            assert!(validate_coordinates(lat, lon).is_err(), "{lat},{lon}");
        }
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_coordinates_must_be_numbers() {
        let err = validate_coordinates(f64::NAN, 10.0).unwrap_err();
        assert_eq!(reason(err), "Latitude and longitude must be valid numbers");
        assert!(validate_coordinates(10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_latitude_checked_before_longitude() {
        let err = validate_coordinates(100.0, 200.0).unwrap_err();
        assert_eq!(reason(err), "Latitude must be between -90 and 90");
    }

    #[test]
    fn test_date_range_boundaries_inclusive() {
        assert!(validate_dates("2025-01-01", "2025-01-08").is_ok()); // 7 days
        assert!(validate_dates("2025-01-01", "2026-01-01").is_ok()); // 365 days
    }

    #[test]
    fn test_date_range_too_short() {
        let err = validate_dates("2025-01-01", "2025-01-07").unwrap_err();
        assert_eq!(reason(err), "Date range must be at least 7 days");
    }

    #[test]
    fn test_date_range_too_long() {
        assert!(validate_dates("2024-01-01", "2024-12-31").is_ok()); // leap year, 365 days
        let err = validate_dates("2025-01-01", "2026-01-02").unwrap_err();
        assert_eq!(reason(err), "Date range cannot exceed 365 days");
    }

    #[test]
    fn test_start_must_precede_end() {
        let err = validate_dates("2025-08-30", "2025-05-29").unwrap_err();
        assert_eq!(reason(err), "Start date must be before end date");
        assert!(validate_dates("2025-05-29", "2025-05-29").is_err());
    }

    #[test]
    fn test_unparseable_dates() {
        let err = validate_dates("2025-13-01", "2025-12-01").unwrap_err();
        assert_eq!(reason(err), "Invalid date format. Use YYYY-MM-DD");
        assert!(validate_dates("yesterday", "2025-12-01").is_err());
        assert!(validate_dates("", "2025-12-01").is_err());
    }

    #[test]
    fn test_thresholds() {
        assert!(validate_thresholds(0, 0.0, 0.0).is_ok());
        assert!(validate_thresholds(100, 60.0, 1.0).is_ok());
        assert!(validate_thresholds(101, 37.0, 0.2).is_err());
        assert!(validate_thresholds(-1, 37.0, 0.2).is_err());
        assert!(validate_thresholds(20, 60.5, 0.2).is_err());
        assert!(validate_thresholds(20, -0.1, 0.2).is_err());
        assert!(validate_thresholds(20, 37.0, 1.01).is_err());
        assert!(validate_thresholds(20, 37.0, f64::NAN).is_err());
    }

    #[test]
    fn test_dataset_rules() {
        assert_eq!(
            validate_dataset("  LANDSAT/LC08/C02/T1_L2 ").unwrap(),
            "LANDSAT/LC08/C02/T1_L2"
        );
        assert_eq!(reason(validate_dataset("   ").unwrap_err()), "Dataset is required");
        assert!(validate_dataset("LANDSAT").is_err());
    }

    #[test]
    fn test_first_violation_wins() {
        let mut p = params();
        p.latitude = 95.0;
        p.dataset = String::new();
        let err = validate(&p).unwrap_err();
        assert_eq!(reason(err), "Latitude must be between -90 and 90");
    }

    #[test]
    fn test_validated_serializes_as_parameters() {
        let mut p = params();
        p.dataset = " LANDSAT/LC09/C02/T1_L2 ".into();
        let validated = validate(&p).unwrap();
        let value = serde_json::to_value(&validated).unwrap();
        assert_eq!(value["dataset"], "LANDSAT/LC09/C02/T1_L2");
        assert_eq!(value["latitude"], 29.52);
        assert!(value.get("start").is_none());
    }
}
