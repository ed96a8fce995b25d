//! Aggregation orchestrator.
//!
//! One search is: fetch routes, sample traffic on every route concurrently,
//! classify congestion, and at most one prediction call when a route passes a
//! bottleneck. Only the routing call can fail the search; traffic and
//! prediction gaps become [`NavWarning`]s on the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{default_rush_windows, lagos_now, HourWindow};
use crate::config::{ConfigError, NavConfig};
use crate::congestion::{classify, CongestionLevel};
use crate::error::{NavError, NavWarning};
use crate::geo::{Coordinate, DEFAULT_PROXIMITY_THRESHOLD_M};
use crate::prediction::{
    build_prediction_provider, lagos_bottlenecks, triggering_bottleneck, Bottleneck,
    PredictionContext, PredictionProvider, PredictionRequest, PredictionResult, SpeedSource,
};
use crate::routing::{build_route_provider, fetch_routes, RouteId, RoutePath, RouteProvider};
use crate::traffic::{
    build_flow_provider, mean_speeds, sample_traffic, FlowProvider, TrafficSegment,
    DEFAULT_SAMPLE_COUNT,
};

/// Which routes are checked against the bottleneck list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionScope {
    /// Only the main route.
    #[default]
    Primary,
    /// Every route; the first one that triggers is sent.
    AllRoutes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOptions {
    pub max_alternatives: u32,
    pub sample_count: usize,
    pub prediction_scope: PredictionScope,
    /// Departure time for the prediction context. `None` means now.
    pub departure: Option<DateTime<FixedOffset>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_alternatives: 1,
            sample_count: DEFAULT_SAMPLE_COUNT,
            prediction_scope: PredictionScope::Primary,
            departure: None,
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &NavConfig) -> Self {
        Self {
            max_alternatives: config.search.max_alternatives,
            sample_count: config.search.sample_count,
            prediction_scope: config.search.prediction_scope,
            departure: None,
        }
    }
}

/// Traffic and congestion for a set of routes, as produced by one sampling pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub traffic_by_route: BTreeMap<RouteId, Vec<TrafficSegment>>,
    pub congestion_by_route: BTreeMap<RouteId, CongestionLevel>,
    pub warnings: Vec<NavWarning>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub start: Coordinate,
    pub end: Coordinate,
    pub routes: Vec<RoutePath>,
    pub traffic_by_route: BTreeMap<RouteId, Vec<TrafficSegment>>,
    pub congestion_by_route: BTreeMap<RouteId, CongestionLevel>,
    pub prediction: Option<PredictionResult>,
    pub warnings: Vec<NavWarning>,
}

impl SearchResult {
    pub fn route(&self, id: RouteId) -> Option<&RoutePath> {
        self.routes.iter().find(|route| route.id == id)
    }

    pub fn congestion(&self, id: RouteId) -> CongestionLevel {
        self.congestion_by_route
            .get(&id)
            .copied()
            .unwrap_or(CongestionLevel::Unknown)
    }

    /// Replace traffic and congestion with a newer sampling pass. Prediction
    /// and non-traffic warnings are kept.
    pub fn apply_traffic(&mut self, snapshot: TrafficSnapshot) {
        self.warnings.retain(|warning| {
            !matches!(
                warning,
                NavWarning::PartialTraffic { .. } | NavWarning::TrafficUnavailable { .. }
            )
        });
        self.warnings.extend(snapshot.warnings);
        self.traffic_by_route = snapshot.traffic_by_route;
        self.congestion_by_route = snapshot.congestion_by_route;
    }
}

/// Settings for the bottleneck trigger and the prediction payload.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionSettings {
    pub proximity_threshold_m: f64,
    pub speed_source: SpeedSource,
    pub rush_windows: Vec<HourWindow>,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            proximity_threshold_m: DEFAULT_PROXIMITY_THRESHOLD_M,
            speed_source: SpeedSource::Live,
            rush_windows: default_rush_windows(),
        }
    }
}

/// Stateless search pipeline over shared providers. Cheap to share behind an
/// `Arc`; holds no per-search state.
pub struct Aggregator {
    routes: Arc<dyn RouteProvider>,
    flow: Arc<dyn FlowProvider>,
    prediction: Option<Arc<dyn PredictionProvider>>,
    bottlenecks: Vec<Bottleneck>,
    settings: PredictionSettings,
}

impl Aggregator {
    pub fn new(routes: Arc<dyn RouteProvider>, flow: Arc<dyn FlowProvider>) -> Self {
        Self {
            routes,
            flow,
            prediction: None,
            bottlenecks: lagos_bottlenecks(),
            settings: PredictionSettings::default(),
        }
    }

    pub fn with_prediction(mut self, provider: Arc<dyn PredictionProvider>) -> Self {
        self.prediction = Some(provider);
        self
    }

    pub fn with_bottlenecks(mut self, bottlenecks: Vec<Bottleneck>) -> Self {
        self.bottlenecks = bottlenecks;
        self
    }

    pub fn with_settings(mut self, settings: PredictionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build providers from configuration.
    pub fn from_config(config: &NavConfig) -> Result<Self, ConfigError> {
        let routes = build_route_provider(&config.routing)?;
        let flow = build_flow_provider(&config.traffic)?;
        let mut aggregator = Self::new(routes, flow).with_settings(PredictionSettings {
            proximity_threshold_m: config.prediction.proximity_threshold_m,
            speed_source: config.prediction.speed_source,
            rush_windows: config.prediction.rush_windows.clone(),
        });
        if let Some(provider) = build_prediction_provider(&config.prediction)? {
            aggregator = aggregator.with_prediction(provider);
        }
        Ok(aggregator)
    }

    pub fn bottlenecks(&self) -> &[Bottleneck] {
        &self.bottlenecks
    }

    pub fn has_prediction(&self) -> bool {
        self.prediction.is_some()
    }

    pub async fn search(
        &self,
        start: Coordinate,
        end: Coordinate,
        options: &SearchOptions,
    ) -> Result<SearchResult, NavError> {
        let routes = fetch_routes(self.routes.as_ref(), start, end, options.max_alternatives).await?;
        let snapshot = self.refresh_traffic(&routes, options.sample_count).await;
        let mut warnings = snapshot.warnings;

        let prediction = self
            .predict(start, end, &routes, &snapshot.traffic_by_route, options, &mut warnings)
            .await;

        info!(
            %start,
            %end,
            routes = routes.len(),
            warnings = warnings.len(),
            predicted = prediction.is_some(),
            "search complete"
        );

        Ok(SearchResult {
            start,
            end,
            routes,
            traffic_by_route: snapshot.traffic_by_route,
            congestion_by_route: snapshot.congestion_by_route,
            prediction,
            warnings,
        })
    }

    /// Re-sample and re-classify already fetched routes. Never fails; every
    /// gap is reported as a warning.
    pub async fn refresh_traffic(&self, routes: &[RoutePath], sample_count: usize) -> TrafficSnapshot {
        let flow = self.flow.as_ref();
        let sampled = join_all(routes.iter().map(|route| async move {
            (route.id, sample_traffic(flow, route, sample_count).await)
        }))
        .await;

        let mut snapshot = TrafficSnapshot::default();
        for (route_id, outcome) in sampled {
            let segments = match outcome {
                Ok(segments) => segments,
                Err(err) => {
                    warn!(%route_id, "traffic sampling failed: {err}");
                    snapshot.warnings.push(NavWarning::TrafficUnavailable {
                        route_id,
                        reason: err.to_string(),
                    });
                    snapshot
                        .congestion_by_route
                        .insert(route_id, CongestionLevel::Unknown);
                    snapshot.traffic_by_route.insert(route_id, Vec::new());
                    continue;
                }
            };

            let total = segments.len();
            let missing = segments.iter().filter(|s| !s.is_known()).count();
            if total > 0 && missing == total {
                snapshot.warnings.push(NavWarning::TrafficUnavailable {
                    route_id,
                    reason: "no segment returned flow data".to_string(),
                });
            } else if missing > 0 {
                snapshot.warnings.push(NavWarning::PartialTraffic {
                    route_id,
                    missing,
                    total,
                });
            }
            snapshot
                .congestion_by_route
                .insert(route_id, classify(&segments));
            snapshot.traffic_by_route.insert(route_id, segments);
        }
        snapshot
    }

    async fn predict(
        &self,
        start: Coordinate,
        end: Coordinate,
        routes: &[RoutePath],
        traffic: &BTreeMap<RouteId, Vec<TrafficSegment>>,
        options: &SearchOptions,
        warnings: &mut Vec<NavWarning>,
    ) -> Option<PredictionResult> {
        let candidates = match options.prediction_scope {
            PredictionScope::Primary => &routes[..routes.len().min(1)],
            PredictionScope::AllRoutes => routes,
        };
        let threshold = self.settings.proximity_threshold_m;
        let (route, bottleneck) = candidates.iter().find_map(|route| {
            triggering_bottleneck(route, &self.bottlenecks, threshold).map(|b| (route, b))
        })?;
        debug!(route_id = %route.id, bottleneck = %bottleneck.label, "route passes bottleneck");

        let Some(provider) = self.prediction.as_ref() else {
            warnings.push(NavWarning::PredictionDisabled { route_id: route.id });
            return None;
        };

        let live = traffic.get(&route.id).and_then(|segments| mean_speeds(segments));
        let request = PredictionRequest {
            start: start.to_string(),
            end: end.to_string(),
            route_id: route.id,
            bottleneck_location: Some(bottleneck.label.clone()),
            context: PredictionContext::build(
                options.departure.unwrap_or_else(lagos_now),
                &self.settings.rush_windows,
                self.settings.speed_source.resolve(live),
            ),
        };

        match provider.predict(&request).await {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(route_id = %route.id, provider = provider.name(), "prediction failed: {err}");
                warnings.push(NavWarning::PredictionUnavailable {
                    reason: err.to_string(),
                });
                None
            }
        }
    }
}
