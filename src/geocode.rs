//! Place names for coordinates and coordinates for place names.
//!
//! Talks to a Nominatim-compatible service. Lookups are advisory: they never
//! return an error, falling back to a placeholder (reverse) or an empty list
//! (search) and logging the cause at `warn`.

use crate::config::ClientConfig;
use crate::error::{AnalysisError, Result};
use crate::timeout::with_deadline;
use crate::transport::http::{endpoint_url, parse_base_url};
use reqwest::{header, Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const UNKNOWN_LOCATION: &str = "Unknown Location";

/// A coordinate resolved to a human-readable place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub name: String,
    pub country: String,
    pub full_name: String,
    /// Raw address components as returned by the service.
    #[serde(default)]
    pub address: BTreeMap<String, String>,
}

impl LocationInfo {
    /// Returned when a reverse lookup fails.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".into(),
            country: String::new(),
            full_name: UNKNOWN_LOCATION.into(),
            address: BTreeMap::new(),
        }
    }
}

/// One candidate of a place search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMatch {
    pub name: String,
    pub full_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Place type reported by the service, e.g. `city` or `village`.
    pub kind: Option<String>,
}

/// Geocoding client.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Client,
    base_url: Url,
    deadline: Duration,
}

impl Geocoder {
    /// Build a geocoder for `config.geocoder_url`, sending `config.user_agent`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Self::with_client(client, &config.geocoder_url, config.timeouts.geocode)
    }

    pub fn with_client(client: Client, base_url: &str, deadline: Duration) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            deadline,
        })
    }

    /// Name the place at (`latitude`, `longitude`).
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> LocationInfo {
        let query = [
            ("format", "json".to_string()),
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
        ];
        match self.get_json("reverse", &query).await {
            Ok(body) => location_from_reverse(&body),
            Err(e) => {
                tracing::warn!(latitude, longitude, error = %e, "reverse geocoding failed");
                LocationInfo::unknown()
            }
        }
    }

    /// Up to five places matching `query`.
    pub async fn search(&self, query: &str) -> Vec<LocationMatch> {
        let params = [
            ("format", "json".to_string()),
            ("q", query.to_string()),
            ("limit", "5".to_string()),
            ("addressdetails", "1".to_string()),
        ];
        match self.get_json("search", &params).await {
            Ok(body) => matches_from_search(&body),
            Err(e) => {
                tracing::warn!(query, error = %e, "location search failed");
                Vec::new()
            }
        }
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = endpoint_url(&self.base_url, [endpoint])?;
        with_deadline(self.deadline, async {
            let resp = self
                .client
                .get(url)
                .header(header::ACCEPT, "application/json")
                .query(query)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(AnalysisError::Server {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("geocoding failed").into(),
                });
            }
            Ok(resp.json::<Value>().await?)
        })
        .await
    }
}

/// Build a [`LocationInfo`] from a reverse-lookup response body.
pub fn location_from_reverse(body: &Value) -> LocationInfo {
    let address: BTreeMap<String, String> = body
        .get("address")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let name = ["city", "town", "village", "county", "state"]
        .iter()
        .find_map(|key| address.get(*key).filter(|v| !v.is_empty()))
        .cloned()
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
    let country = address.get("country").cloned().unwrap_or_default();

    LocationInfo {
        full_name: format!("{}, {}", name, country),
        name,
        country,
        address,
    }
}

/// Build search candidates from a search response body.
///
/// Entries without parseable coordinates are skipped.
pub fn matches_from_search(body: &Value) -> Vec<LocationMatch> {
    let Some(entries) = body.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let coord = |key: &str| {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .and_then(|s| s.trim().parse::<f64>().ok())
            };
            let (Some(latitude), Some(longitude)) = (coord("lat"), coord("lon")) else {
                tracing::debug!(?entry, "skipping search result without coordinates");
                return None;
            };

            let full_name = entry
                .get("display_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| full_name.split(',').next().unwrap_or_default().trim().to_string());

            Some(LocationMatch {
                name,
                full_name,
                latitude,
                longitude,
                kind: entry.get("type").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}
