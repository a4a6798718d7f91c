use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied input for one analysis job.
///
/// This is the raw, unchecked shape. Pass it through
/// [`validate`](crate::validate::validate) to obtain the
/// [`ValidatedParameters`](crate::validate::ValidatedParameters) the submission
/// path accepts. The same shape is returned by `GET /parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParameters {
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
    /// Maximum scene cloud cover, in percent.
    pub cloud_cover: i64,
    /// Land surface temperature (°C) above which a pixel counts as hot.
    pub hot_threshold: f64,
    /// NDVI below which a pixel counts as unvegetated.
    pub veg_threshold: f64,
    /// Hierarchical collection id, e.g. `LANDSAT/LC09/C02/T1_L2`.
    pub dataset: String,
    #[serde(rename = "geeProjectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            latitude: 29.518321,
            longitude: 74.993558,
            start_date: "2025-05-29".into(),
            end_date: "2025-08-30".into(),
            cloud_cover: 20,
            hot_threshold: 37.0,
            veg_threshold: 0.2,
            dataset: "LANDSAT/LC09/C02/T1_L2".into(),
            project_id: None,
        }
    }
}

/// Opaque server-assigned session id. Scopes one progress stream and one
/// terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One progress line, stamped with the time the client observed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// Terminal success payload of an analysis job.
///
/// Every field is optional on the wire; missing fields take their default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    pub hotspots_found: u64,
    pub clusters: u32,
    pub min_temperature: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub priority_zones: Vec<PriorityZone>,
    pub analysis_period: Option<AnalysisPeriod>,
    /// Renderable map markup produced by the server.
    pub map_html: Option<String>,
    /// Server-held artifact name, usable with download/delete.
    pub map_file_name: Option<String>,
}

/// A cluster center recommended for intervention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriorityZone {
    pub id: u32,
    pub lat: f64,
    pub lon: f64,
    pub temp: Option<f64>,
    pub point_count: Option<u64>,
    pub area: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPeriod {
    pub start: String,
    pub end: String,
}

/// Outcome of polling `GET /analysis-result/{sessionId}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPoll {
    Running,
    Completed(AnalysisResult),
}

/// Response of the best-effort artifact deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameters_wire_names() {
        let params = AnalysisParameters {
            project_id: Some("my-project".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["startDate"], "2025-05-29");
        assert_eq!(value["cloudCover"], 20);
        assert_eq!(value["vegThreshold"], 0.2);
        assert_eq!(value["geeProjectId"], "my-project");
    }

    #[test]
    fn test_parameters_from_defaults_endpoint() {
        let body = json!({
            "latitude": 29.518321,
            "longitude": 74.993558,
            "startDate": "2025-05-29",
            "endDate": "2025-08-30",
            "cloudCover": 20,
            "hotThreshold": 37,
            "vegThreshold": 0.2,
            "geeProjectId": "gen-lang-client",
            "dataset": "LANDSAT/LC09/C02/T1_L2"
        });
        let params: AnalysisParameters = serde_json::from_value(body).unwrap();
        assert_eq!(params.hot_threshold, 37.0);
        assert_eq!(params.project_id.as_deref(), Some("gen-lang-client"));
    }

    #[test]
    fn test_result_tolerates_partial_payload() {
        let result: AnalysisResult =
            serde_json::from_value(json!({"hotspotsFound": 42})).unwrap();
        assert_eq!(result.hotspots_found, 42);
        assert!(result.priority_zones.is_empty());
        assert!(result.map_file_name.is_none());
    }

    #[test]
    fn test_result_full_payload() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "success": true,
            "hotspotsFound": 120,
            "clusters": 2,
            "minTemperature": 35.1,
            "maxTemperature": 48.7,
            "avgTemperature": 41.2,
            "priorityZones": [
                {"id": 1, "lat": 29.5, "lon": 74.9, "temp": 44.0, "pointCount": 60, "area": "54.0 km²"},
                {"id": 2, "lat": 29.6, "lon": 75.0, "temp": null, "pointCount": 60, "area": "54.0 km²"}
            ],
            "analysisPeriod": {"start": "2025-05-29", "end": "2025-08-30"},
            "mapFileName": "urban_heat_map_29.5_74.9.html"
        }))
        .unwrap();
        assert_eq!(result.clusters, 2);
        assert_eq!(result.priority_zones[1].temp, None);
        assert_eq!(result.analysis_period.unwrap().end, "2025-08-30");
    }
}
