//! Error taxonomy for the aggregator.
//!
//! [`NavError`] aborts an operation. [`NavWarning`] is attached to a
//! [`SearchResult`](crate::search::SearchResult) when some data could not be
//! gathered but the search still produced something worth showing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::RouteId;

/// External collaborator that produced an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Routing,
    TrafficFlow,
    Prediction,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Upstream::Routing => "routing",
            Upstream::TrafficFlow => "traffic flow",
            Upstream::Prediction => "prediction",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    #[error("invalid coordinate ({lat}, {lon}): {reason}")]
    InvalidCoordinate { lat: f64, lon: f64, reason: String },

    #[error("no route found between {start} and {end}")]
    NoRouteFound { start: String, end: String },

    #[error("{service} provider unavailable: {reason}")]
    UpstreamUnavailable { service: Upstream, reason: String },

    #[error("route has {points} point(s); at least 2 are required")]
    InsufficientPoints { points: usize },

    #[error("unknown route id {0}")]
    UnknownRoute(RouteId),
}

impl NavError {
    pub fn upstream(service: Upstream, reason: impl Into<String>) -> Self {
        NavError::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, NavError::UpstreamUnavailable { .. })
    }
}

/// Non-fatal data gaps. The search proceeds with reduced fidelity.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavWarning {
    #[error("route {route_id}: {missing} of {total} traffic samples unavailable")]
    PartialTraffic {
        route_id: RouteId,
        missing: usize,
        total: usize,
    },

    #[error("route {route_id}: traffic unavailable ({reason})")]
    TrafficUnavailable { route_id: RouteId, reason: String },

    #[error("congestion prediction unavailable: {reason}")]
    PredictionUnavailable { reason: String },

    #[error("route {route_id} passes a bottleneck but no prediction service is configured")]
    PredictionDisabled { route_id: RouteId },
}
