//! Route fetch adapter: trait abstraction over routing backends.
//!
//! Two implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`DirectRouteProvider`**: straight-line path sampled between the
//!   endpoints with Haversine distance. Zero dependencies, used offline.
//! - **`TomTomRouteProvider`** (feature `tomtom`): calls the TomTom
//!   `calculateRoute` endpoint and returns the main route plus alternatives.
//!
//! Backends return raw [`CandidateRoute`]s. [`fetch_routes`] owns validation,
//! filtering of degenerate candidates, and the `main` / `alternate-N` naming.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::NavError;
use crate::geo::{haversine_distance_m, Coordinate};

#[cfg(feature = "tomtom")]
pub mod tomtom;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Identifier of a route within one search: `main`, then `alternate-1`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RouteId {
    Main,
    Alternate(u32),
}

impl RouteId {
    /// Id for the route at `index` in provider order.
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => RouteId::Main,
            n => RouteId::Alternate(n as u32),
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, RouteId::Main)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteId::Main => f.write_str("main"),
            RouteId::Alternate(n) => write!(f, "alternate-{n}"),
        }
    }
}

impl From<RouteId> for String {
    fn from(id: RouteId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RouteId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl std::str::FromStr for RouteId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == "main" {
            return Ok(RouteId::Main);
        }
        raw.strip_prefix("alternate-")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(RouteId::Alternate)
            .ok_or_else(|| format!("invalid route id {raw:?}"))
    }
}

/// Trip totals reported by the routing backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Delay already folded into `duration_s`, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_delay_s: Option<f64>,
}

/// A route as returned by a backend, before filtering and naming.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateRoute {
    pub points: Vec<Coordinate>,
    pub summary: TripSummary,
}

/// One named candidate route of a search. Replaced wholesale on the next search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    pub id: RouteId,
    pub points: Vec<Coordinate>,
    pub summary: TripSummary,
}

impl RoutePath {
    /// Travel time in whole minutes, rounded.
    pub fn eta_minutes(&self) -> u64 {
        (self.summary.duration_s.max(0.0) / 60.0).round() as u64
    }

    /// Polyline color: red for the main route, purple for alternates.
    pub fn display_color(&self) -> &'static str {
        if self.id.is_main() {
            "#FF0000"
        } else {
            "#800080"
        }
    }
}

/// Trait for routing backends. Implementations must be `Send + Sync` so one
/// provider can serve concurrent searches.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Candidate routes in backend preference order. An empty list means the
    /// backend found no route; transport and API failures are errors.
    async fn calculate_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
        max_alternatives: u32,
    ) -> Result<Vec<CandidateRoute>, NavError>;
}

/// Fetch, filter, and name candidate routes between `start` and `end`.
///
/// Makes at most one provider call. Candidates with fewer than two points are
/// dropped before naming so ids stay contiguous.
pub async fn fetch_routes(
    provider: &dyn RouteProvider,
    start: Coordinate,
    end: Coordinate,
    max_alternatives: u32,
) -> Result<Vec<RoutePath>, NavError> {
    start.validate()?;
    end.validate()?;

    let candidates = provider
        .calculate_routes(start, end, max_alternatives)
        .await?;
    let returned = candidates.len();

    let routes: Vec<RoutePath> = candidates
        .into_iter()
        .filter(|candidate| candidate.points.len() >= 2)
        .take(max_alternatives as usize + 1)
        .enumerate()
        .map(|(index, candidate)| RoutePath {
            id: RouteId::for_index(index),
            points: candidate.points,
            summary: candidate.summary,
        })
        .collect();

    if routes.is_empty() {
        warn!(
            provider = provider.name(),
            returned, "no usable route between {start} and {end}"
        );
        return Err(NavError::NoRouteFound {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    debug!(
        provider = provider.name(),
        returned,
        usable = routes.len(),
        "fetched routes"
    );
    Ok(routes)
}

// ---------------------------------------------------------------------------
// Direct provider (always available)
// ---------------------------------------------------------------------------

/// Straight-line "route" with evenly spaced points between the endpoints.
/// Duration assumes the average city speed of [`DirectRouteProvider::speed_kmh`].
#[derive(Clone, Debug)]
pub struct DirectRouteProvider {
    pub points: usize,
    pub speed_kmh: f64,
}

impl Default for DirectRouteProvider {
    fn default() -> Self {
        Self {
            points: 10,
            speed_kmh: 25.0,
        }
    }
}

#[async_trait]
impl RouteProvider for DirectRouteProvider {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn calculate_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
        _max_alternatives: u32,
    ) -> Result<Vec<CandidateRoute>, NavError> {
        let steps = self.points.max(2) - 1;
        let points = (0..=steps)
            .map(|step| {
                if step == steps {
                    return end;
                }
                let t = step as f64 / steps as f64;
                Coordinate::new(
                    start.lat + (end.lat - start.lat) * t,
                    start.lon + (end.lon - start.lon) * t,
                )
            })
            .collect();
        let distance_m = haversine_distance_m(start, end);
        let duration_s = if self.speed_kmh > 0.0 {
            distance_m / (self.speed_kmh / 3.6)
        } else {
            0.0
        };
        Ok(vec![CandidateRoute {
            points,
            summary: TripSummary {
                distance_m,
                duration_s,
                traffic_delay_s: None,
            },
        }])
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Which routing backend to use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteProviderKind {
    /// Straight-line routes, no network access.
    Direct,
    /// TomTom Routing API.
    #[cfg(feature = "tomtom")]
    #[serde(rename = "tomtom")]
    TomTom,
}

impl Default for RouteProviderKind {
    fn default() -> Self {
        #[cfg(feature = "tomtom")]
        {
            RouteProviderKind::TomTom
        }
        #[cfg(not(feature = "tomtom"))]
        {
            RouteProviderKind::Direct
        }
    }
}

/// Construct a shared [`RouteProvider`] from configuration.
pub fn build_route_provider(
    config: &crate::config::RoutingConfig,
) -> Result<Arc<dyn RouteProvider>, crate::config::ConfigError> {
    match config.provider {
        RouteProviderKind::Direct => Ok(Arc::new(DirectRouteProvider::default())),
        #[cfg(feature = "tomtom")]
        RouteProviderKind::TomTom => {
            let api_key = config
                .tomtom
                .api_key
                .clone()
                .ok_or(crate::config::ConfigError::MissingApiKey("routing"))?;
            let provider = tomtom::TomTomRouteProvider::new(
                &config.tomtom.base_url,
                &api_key,
                config.tomtom.timeout(),
            )
            .map_err(|err| crate::config::ConfigError::HttpClient(err.to_string()))?;
            Ok(Arc::new(provider))
        }
    }
}
