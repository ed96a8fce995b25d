//! Traffic sampler: probes a flow provider at evenly spaced points along a
//! route and records one [`TrafficSegment`] per probe.
//!
//! Segment probes are independent and run concurrently. A failed or empty
//! probe yields a segment with an unknown ratio; it never aborts the other
//! probes of the same route.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::NavError;
use crate::geo::Coordinate;
use crate::routing::RoutePath;

pub mod profile;
#[cfg(feature = "tomtom")]
pub mod tomtom;

/// Default number of sample positions per route (yields four segments).
pub const DEFAULT_SAMPLE_COUNT: usize = 5;

/// Upper bound accepted from configuration.
pub const MAX_SAMPLE_COUNT: usize = 100;

/// Flow tile zoom level used by the TomTom backend.
pub const DEFAULT_FLOW_ZOOM: u8 = 10;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Speeds reported by a flow provider at one point, in km/h.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowReading {
    pub current_speed_kmh: f64,
    pub free_flow_speed_kmh: f64,
}

impl FlowReading {
    pub const fn new(current_speed_kmh: f64, free_flow_speed_kmh: f64) -> Self {
        Self {
            current_speed_kmh,
            free_flow_speed_kmh,
        }
    }

    /// `current / free_flow`, only when both speeds are positive and finite.
    pub fn ratio(&self) -> Option<f64> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if usable(self.current_speed_kmh) && usable(self.free_flow_speed_kmh) {
            Some(self.current_speed_kmh / self.free_flow_speed_kmh)
        } else {
            None
        }
    }
}

/// A contiguous slice `[start_index, end_index]` of a route's points and the
/// flow observed at its probe point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficSegment {
    pub start_index: usize,
    pub end_index: usize,
    pub probe: Coordinate,
    /// `None` means unknown: the probe failed or returned no data.
    pub ratio: Option<f64>,
    pub current_speed_kmh: Option<f64>,
    pub free_flow_speed_kmh: Option<f64>,
}

impl TrafficSegment {
    pub fn new(
        start_index: usize,
        end_index: usize,
        probe: Coordinate,
        reading: Option<FlowReading>,
    ) -> Self {
        let ratio = reading.and_then(|r| r.ratio());
        // Raw speeds are kept only alongside a usable ratio.
        let reading = reading.filter(|_| ratio.is_some());
        Self {
            start_index,
            end_index,
            probe,
            ratio,
            current_speed_kmh: reading.map(|r| r.current_speed_kmh),
            free_flow_speed_kmh: reading.map(|r| r.free_flow_speed_kmh),
        }
    }

    pub fn is_known(&self) -> bool {
        self.ratio.is_some()
    }
}

/// Mean speeds over segments with known data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeanSpeeds {
    pub current_speed_kmh: f64,
    pub free_flow_speed_kmh: f64,
}

pub fn mean_speeds(segments: &[TrafficSegment]) -> Option<MeanSpeeds> {
    let known: Vec<(f64, f64)> = segments
        .iter()
        .filter_map(|s| Some((s.current_speed_kmh?, s.free_flow_speed_kmh?)))
        .collect();
    if known.is_empty() {
        return None;
    }
    let n = known.len() as f64;
    let (current, free) = known
        .iter()
        .fold((0.0, 0.0), |(c, f), (sc, sf)| (c + sc, f + sf));
    Some(MeanSpeeds {
        current_speed_kmh: current / n,
        free_flow_speed_kmh: free / n,
    })
}

/// Trait for traffic-flow backends.
#[async_trait]
pub trait FlowProvider: Send + Sync {
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Flow at `point`. `Ok(None)` means the backend had no data there.
    async fn flow_at(&self, point: Coordinate) -> Result<Option<FlowReading>, NavError>;
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// `sample_count` indices evenly spread over `0..len`, first and last
/// included, duplicates removed. `sample_count` below 2 is treated as 2 and
/// anything above `len` as `len`.
pub fn sample_indices(len: usize, sample_count: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let last = len - 1;
    let count = sample_count.max(2).min(len.max(2));
    let mut indices: Vec<usize> = (0..count)
        .map(|k| ((k * last) as f64 / (count - 1) as f64).round() as usize)
        .collect();
    indices.dedup();
    indices
}

/// Probe point of the segment `[start, end]`: its middle vertex when it has
/// an interior point, else the midpoint of its two endpoints.
pub fn probe_point(points: &[Coordinate], start: usize, end: usize) -> Coordinate {
    if end >= start + 2 {
        points[(start + end) / 2]
    } else {
        points[start].midpoint(&points[end])
    }
}

pub async fn sample_traffic(
    provider: &dyn FlowProvider,
    path: &RoutePath,
    sample_count: usize,
) -> Result<Vec<TrafficSegment>, NavError> {
    let points = &path.points;
    if points.len() < 2 {
        return Err(NavError::InsufficientPoints {
            points: points.len(),
        });
    }

    let indices = sample_indices(points.len(), sample_count);
    let bounds: Vec<(usize, usize)> = indices.windows(2).map(|w| (w[0], w[1])).collect();

    let probes = bounds.iter().map(|&(start, end)| {
        let probe = probe_point(points, start, end);
        async move { (start, end, probe, provider.flow_at(probe).await) }
    });

    let segments: Vec<TrafficSegment> = join_all(probes)
        .await
        .into_iter()
        .enumerate()
        .map(|(segment, (start, end, probe, outcome))| {
            let reading = match outcome {
                Ok(reading) => reading,
                Err(err) => {
                    warn!(
                        route_id = %path.id,
                        segment,
                        provider = provider.name(),
                        "traffic probe failed: {err}"
                    );
                    None
                }
            };
            TrafficSegment::new(start, end, probe, reading)
        })
        .collect();

    debug!(
        route_id = %path.id,
        segments = segments.len(),
        known = segments.iter().filter(|s| s.is_known()).count(),
        "sampled traffic"
    );
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Which traffic-flow backend to use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowProviderKind {
    /// Time-of-day speed profile, no network access.
    Profile,
    /// TomTom Traffic Flow API.
    #[cfg(feature = "tomtom")]
    #[serde(rename = "tomtom")]
    TomTom,
}

impl Default for FlowProviderKind {
    fn default() -> Self {
        #[cfg(feature = "tomtom")]
        {
            FlowProviderKind::TomTom
        }
        #[cfg(not(feature = "tomtom"))]
        {
            FlowProviderKind::Profile
        }
    }
}

pub fn build_flow_provider(
    config: &crate::config::TrafficConfig,
) -> Result<Arc<dyn FlowProvider>, crate::config::ConfigError> {
    match config.provider {
        FlowProviderKind::Profile => Ok(Arc::new(profile::ProfileFlowProvider::lagos())),
        #[cfg(feature = "tomtom")]
        FlowProviderKind::TomTom => {
            let api_key = config
                .tomtom
                .api_key
                .clone()
                .ok_or(crate::config::ConfigError::MissingApiKey("traffic"))?;
            let provider = tomtom::TomTomFlowProvider::new(
                &config.tomtom.base_url,
                &api_key,
                config.zoom,
                config.tomtom.timeout(),
            )
            .map_err(|err| crate::config::ConfigError::HttpClient(err.to_string()))?;
            Ok(Arc::new(provider))
        }
    }
}
