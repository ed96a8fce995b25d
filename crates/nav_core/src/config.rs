//! Runtime configuration.
//!
//! Every section has serde defaults, so an empty JSON object (or no file at
//! all) is a valid configuration. Environment variables are applied on top
//! of the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{default_rush_windows, HourWindow};
use crate::geo::DEFAULT_PROXIMITY_THRESHOLD_M;
use crate::prediction::SpeedSource;
use crate::routing::RouteProviderKind;
use crate::search::PredictionScope;
use crate::traffic::{
    FlowProviderKind, DEFAULT_FLOW_ZOOM, DEFAULT_SAMPLE_COUNT, MAX_SAMPLE_COUNT,
};

pub const DEFAULT_TOMTOM_BASE_URL: &str = "https://api.tomtom.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REFRESH_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} provider is tomtom but no API key is set (TOMTOM_API_KEY)")]
    MissingApiKey(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub routing: RoutingConfig,
    pub traffic: TrafficConfig,
    pub prediction: PredictionConfig,
    pub search: SearchDefaults,
    pub refresh: RefreshConfig,
}

/// Connection settings shared by the TomTom backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomTomConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TomTomConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TOMTOM_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl TomTomConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub provider: RouteProviderKind,
    pub tomtom: TomTomConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub provider: FlowProviderKind,
    pub tomtom: TomTomConfig,
    /// Flow tile zoom level, 0..=22.
    pub zoom: u8,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            provider: FlowProviderKind::default(),
            tomtom: TomTomConfig::default(),
            zoom: DEFAULT_FLOW_ZOOM,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Prediction service root. Unset disables prediction calls.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub speed_source: SpeedSource,
    pub rush_windows: Vec<HourWindow>,
    pub proximity_threshold_m: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            speed_source: SpeedSource::Live,
            rush_windows: default_rush_windows(),
            proximity_threshold_m: DEFAULT_PROXIMITY_THRESHOLD_M,
        }
    }
}

impl PredictionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Defaults for [`SearchOptions`](crate::search::SearchOptions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub max_alternatives: u32,
    pub sample_count: usize,
    pub prediction_scope: PredictionScope,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            max_alternatives: 1,
            sample_count: DEFAULT_SAMPLE_COUNT,
            prediction_scope: PredictionScope::Primary,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_REFRESH_SECS,
        }
    }
}

impl RefreshConfig {
    /// Refresh period, or `None` when refreshing is off.
    pub fn interval(&self) -> Option<Duration> {
        (self.enabled && self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl NavConfig {
    /// Read `path` if given, apply the process environment, and validate.
    /// Read `path` (defaults when `None`), run `adjust`, apply env overrides
    /// read through `lookup`, then validate.
    pub fn load_with<A, F>(path: Option<&Path>, adjust: A, lookup: F) -> Result<Self, ConfigError>
    where
        A: FnOnce(&mut Self),
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_json(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        adjust(&mut config);
        config.apply_env_from(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("TOMTOM_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.routing.tomtom.api_key = Some(key.clone());
            self.traffic.tomtom.api_key = Some(key);
        }
        if let Some(base) = lookup("TOMTOM_BASE_URL") {
            self.routing.tomtom.base_url = base.clone();
            self.traffic.tomtom.base_url = base;
        }
        if let Some(url) = lookup("NAV_PREDICTION_URL") {
            self.prediction.base_url = (!url.trim().is_empty()).then_some(url);
        }
        if let Some(raw) = lookup("NAV_REFRESH_SECS") {
            let secs: u64 = parse_env("NAV_REFRESH_SECS", raw)?;
            self.refresh.enabled = secs > 0;
            self.refresh.interval_secs = secs;
        }
        if let Some(raw) = lookup("NAV_SAMPLE_COUNT") {
            self.search.sample_count = parse_env("NAV_SAMPLE_COUNT", raw)?;
        }
        if let Some(raw) = lookup("NAV_MAX_ALTERNATIVES") {
            self.search.max_alternatives = parse_env("NAV_MAX_ALTERNATIVES", raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        #[cfg(feature = "tomtom")]
        {
            if self.routing.provider == RouteProviderKind::TomTom
                && self.routing.tomtom.api_key.is_none()
            {
                return Err(ConfigError::MissingApiKey("routing"));
            }
            if self.traffic.provider == FlowProviderKind::TomTom
                && self.traffic.tomtom.api_key.is_none()
            {
                return Err(ConfigError::MissingApiKey("traffic"));
            }
        }
        if self.traffic.zoom > 22 {
            return Err(ConfigError::Invalid(format!(
                "traffic.zoom must be within 0..=22, got {}",
                self.traffic.zoom
            )));
        }
        if self.search.sample_count > MAX_SAMPLE_COUNT {
            return Err(ConfigError::Invalid(format!(
                "search.sample_count must be at most {MAX_SAMPLE_COUNT}, got {}",
                self.search.sample_count
            )));
        }
        if !(self.prediction.proximity_threshold_m.is_finite()
            && self.prediction.proximity_threshold_m >= 0.0)
        {
            return Err(ConfigError::Invalid(
                "prediction.proximity_threshold_m must be a non-negative number".to_string(),
            ));
        }
        if let Some(window) = self
            .prediction
            .rush_windows
            .iter()
            .find(|w| w.start_hour > 23 || w.end_hour > 24)
        {
            return Err(ConfigError::Invalid(format!(
                "rush window {}..{} is outside the day",
                window.start_hour, window.end_hour
            )));
        }
        Ok(())
    }

    /// Offline configuration: direct routes and the Lagos speed profile.
    pub fn offline() -> Self {
        let mut config = Self::default();
        config.routing.provider = RouteProviderKind::Direct;
        config.traffic.provider = FlowProviderKind::Profile;
        config
    }
}
