//! Bottleneck trigger and the predictive-congestion collaborator.
//!
//! A route needs a prediction when any of its points lies within the
//! proximity threshold of a known bottleneck. The collaborator's answer is
//! forwarded untouched; the aggregator never reinterprets it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::clock::{HourWindow, TimeContext};
use crate::error::NavError;
use crate::geo::{nearest_within, Coordinate};
use crate::routing::{RouteId, RoutePath};
use crate::traffic::MeanSpeeds;

#[cfg(feature = "prediction-http")]
pub mod client;

// ---------------------------------------------------------------------------
// Bottlenecks
// ---------------------------------------------------------------------------

/// A fixed point historically associated with congestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub label: String,
    pub position: Coordinate,
}

impl Bottleneck {
    pub fn new(label: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            label: label.into(),
            position: Coordinate::new(lat, lon),
        }
    }
}

/// Lagos hotspots known to the prediction model.
pub fn lagos_bottlenecks() -> Vec<Bottleneck> {
    vec![
        Bottleneck::new("Third_Mainland_Bridge", 6.5000, 3.4025),
        Bottleneck::new("Carter_Bridge", 6.4669, 3.3850),
        Bottleneck::new("Eko_Bridge", 6.4641, 3.3803),
        Bottleneck::new("CMS_Junction", 6.4500, 3.4000),
        Bottleneck::new("Marina_Road", 6.4500, 3.4000),
        Bottleneck::new("Obalende", 6.4447, 3.4175),
        Bottleneck::new("Adeniji_Adele", 6.4743, 3.3904),
        Bottleneck::new("Falomo_Roundabout", 6.4444, 3.4272),
        Bottleneck::new("Awolowo_Road", 6.4419, 3.4190),
    ]
}

/// True iff some point of `path` is within `threshold_m` of a bottleneck.
pub fn needs_prediction(path: &RoutePath, bottlenecks: &[Bottleneck], threshold_m: f64) -> bool {
    triggering_bottleneck(path, bottlenecks, threshold_m).is_some()
}

/// First bottleneck passed by `path`, scanning points in travel order.
pub fn triggering_bottleneck<'a>(
    path: &RoutePath,
    bottlenecks: &'a [Bottleneck],
    threshold_m: f64,
) -> Option<&'a Bottleneck> {
    path.points
        .iter()
        .find_map(|point| nearest_within(*point, bottlenecks, threshold_m, |b| b.position))
}

// ---------------------------------------------------------------------------
// Request payload
// ---------------------------------------------------------------------------

/// Where the speeds in the prediction payload come from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeedSource {
    /// Mean of the sampled segment speeds of the triggering route.
    Live,
    /// Constant speeds, for demos without traffic data.
    Fixed {
        current_kmh: f64,
        free_flow_kmh: f64,
    },
}

impl Default for SpeedSource {
    fn default() -> Self {
        SpeedSource::Live
    }
}

impl SpeedSource {
    /// Demo values used by the original dashboard.
    pub const DEMO: SpeedSource = SpeedSource::Fixed {
        current_kmh: 10.0,
        free_flow_kmh: 40.0,
    };

    pub fn resolve(&self, live: Option<MeanSpeeds>) -> (Option<f64>, Option<f64>) {
        match self {
            SpeedSource::Live => (
                live.map(|s| s.current_speed_kmh),
                live.map(|s| s.free_flow_speed_kmh),
            ),
            SpeedSource::Fixed {
                current_kmh,
                free_flow_kmh,
            } => (Some(*current_kmh), Some(*free_flow_kmh)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    #[serde(flatten)]
    pub time: TimeContext,
    pub current_speed: Option<f64>,
    pub free_flow_speed: Option<f64>,
    pub is_lagos_hotspot: bool,
}

impl PredictionContext {
    pub fn build(
        departure: DateTime<FixedOffset>,
        rush_windows: &[HourWindow],
        speeds: (Option<f64>, Option<f64>),
    ) -> Self {
        Self {
            time: TimeContext::at(departure, rush_windows),
            current_speed: speeds.0,
            free_flow_speed: speeds.1,
            is_lagos_hotspot: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// `"lat,lon"`.
    pub start: String,
    pub end: String,
    pub route_id: RouteId,
    pub bottleneck_location: Option<String>,
    pub context: PredictionContext,
}

// ---------------------------------------------------------------------------
// Response (opaque, forwarded as-is)
// ---------------------------------------------------------------------------

/// Severity read from a response's `status` string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionStatus {
    Ok,
    Info,
    Warning,
    Alert,
    Unknown,
}

impl PredictionStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" => PredictionStatus::Ok,
            "info" => PredictionStatus::Info,
            "warning" => PredictionStatus::Warning,
            "alert" => PredictionStatus::Alert,
            _ => PredictionStatus::Unknown,
        }
    }
}

/// The collaborator's answer. Only the string fields are named; everything
/// else, numbers included, stays in `extra` exactly as received so that
/// re-serializing reproduces the original payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottleneck_location: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PredictionResult {
    pub fn status_kind(&self) -> PredictionStatus {
        self.status
            .as_deref()
            .map_or(PredictionStatus::Unknown, PredictionStatus::from_raw)
    }

    /// Seconds.
    pub fn predicted_travel_time(&self) -> Option<f64> {
        self.number("predicted_travel_time")
    }

    /// Seconds. Older backends call the field `delay`.
    pub fn delay_seconds(&self) -> Option<f64> {
        self.number("delay_seconds").or_else(|| self.number("delay"))
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(serde_json::Value::as_f64)
    }
}

#[async_trait]
pub trait PredictionProvider: Send + Sync {
    fn name(&self) -> &'static str {
        "unknown"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, NavError>;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// The HTTP prediction client, when a base URL is configured.
pub fn build_prediction_provider(
    config: &crate::config::PredictionConfig,
) -> Result<Option<Arc<dyn PredictionProvider>>, crate::config::ConfigError> {
    let Some(base_url) = config.base_url.as_deref() else {
        return Ok(None);
    };
    #[cfg(feature = "prediction-http")]
    {
        let provider =
            client::HttpPredictionProvider::new(base_url, config.timeout())
                .map_err(crate::config::ConfigError::HttpClient)?;
        Ok(Some(Arc::new(provider)))
    }
    #[cfg(not(feature = "prediction-http"))]
    {
        Err(crate::config::ConfigError::Invalid(format!(
            "prediction.base_url is {base_url:?} but the prediction-http feature is disabled"
        )))
    }
}
