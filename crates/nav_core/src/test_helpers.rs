//! Stub providers and fixtures shared by unit tests, integration tests, and
//! benchmarks.
//!
//! Every stub counts its calls so tests can assert how often a collaborator
//! was reached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{NavError, Upstream};
use crate::geo::{Coordinate, EARTH_RADIUS_M};
use crate::prediction::{PredictionProvider, PredictionRequest, PredictionResult};
use crate::routing::{CandidateRoute, RouteProvider, TripSummary};
use crate::search::Aggregator;
use crate::traffic::{FlowProvider, FlowReading};

/// Victoria Island.
pub const LAGOS_START: Coordinate = Coordinate::new(6.4541, 3.3947);
/// Banana Island.
pub const LAGOS_END: Coordinate = Coordinate::new(6.4678, 3.4498);
/// CMS junction bottleneck.
pub const CMS_JUNCTION: Coordinate = Coordinate::new(6.4500, 3.4000);

/// `count` evenly spaced points from `start` to `end`, both included.
pub fn interpolate(start: Coordinate, end: Coordinate, count: usize) -> Vec<Coordinate> {
    let steps = count.max(2) - 1;
    (0..=steps)
        .map(|step| {
            let t = step as f64 / steps as f64;
            Coordinate::new(
                start.lat + (end.lat - start.lat) * t,
                start.lon + (end.lon - start.lon) * t,
            )
        })
        .collect()
}

/// `origin` moved `meters` due north.
pub fn offset_north(origin: Coordinate, meters: f64) -> Coordinate {
    Coordinate::new(origin.lat + (meters / EARTH_RADIUS_M).to_degrees(), origin.lon)
}

pub fn candidate(points: Vec<Coordinate>, duration_s: f64) -> CandidateRoute {
    CandidateRoute {
        points,
        summary: TripSummary {
            distance_m: 6_200.0,
            duration_s,
            traffic_delay_s: None,
        },
    }
}

/// Five-point Victoria Island to Banana Island path, clear of every bottleneck.
pub fn clear_path() -> Vec<Coordinate> {
    interpolate(LAGOS_START, LAGOS_END, 5)
}

/// Five-point path whose third point is 50 m north of CMS junction.
pub fn cms_path() -> Vec<Coordinate> {
    vec![
        LAGOS_START,
        Coordinate::new(6.4520, 3.3975),
        offset_north(CMS_JUNCTION, 50.0),
        Coordinate::new(6.4600, 3.4300),
        LAGOS_END,
    ]
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

enum RouteReply {
    Routes(Vec<CandidateRoute>),
    Fail(NavError),
}

/// Returns a fixed reply, optionally after a per-destination delay.
pub struct StubRouteProvider {
    reply: RouteReply,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl StubRouteProvider {
    pub fn with_routes(routes: Vec<CandidateRoute>) -> Self {
        Self {
            reply: RouteReply::Routes(routes),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_paths(paths: Vec<Vec<Coordinate>>) -> Self {
        Self::with_routes(
            paths
                .into_iter()
                .enumerate()
                .map(|(i, points)| candidate(points, 900.0 + 120.0 * i as f64))
                .collect(),
        )
    }

    pub fn failing(error: NavError) -> Self {
        Self {
            reply: RouteReply::Fail(error),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay replies for searches ending at `end`.
    pub fn delay_for(mut self, end: Coordinate, delay: Duration) -> Self {
        self.delays.insert(end.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for StubRouteProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn calculate_routes(
        &self,
        _start: Coordinate,
        end: Coordinate,
        _max_alternatives: u32,
    ) -> Result<Vec<CandidateRoute>, NavError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&end.to_string()) {
            tokio::time::sleep(*delay).await;
        }
        match &self.reply {
            RouteReply::Routes(routes) => Ok(routes.clone()),
            RouteReply::Fail(error) => Err(error.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Traffic flow
// ---------------------------------------------------------------------------

enum FlowReply {
    Reading(Option<FlowReading>),
    Fail,
    /// Fail every n-th call (1-based), answer the rest with the reading.
    FailEvery(usize, FlowReading),
}

pub struct StubFlowProvider {
    reply: FlowReply,
    calls: AtomicUsize,
    probes: Mutex<Vec<Coordinate>>,
}

impl StubFlowProvider {
    fn with_reply(reply: FlowReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn constant(current_kmh: f64, free_flow_kmh: f64) -> Self {
        Self::with_reply(FlowReply::Reading(Some(FlowReading::new(
            current_kmh,
            free_flow_kmh,
        ))))
    }

    pub fn empty() -> Self {
        Self::with_reply(FlowReply::Reading(None))
    }

    pub fn failing() -> Self {
        Self::with_reply(FlowReply::Fail)
    }

    pub fn failing_every(n: usize, reading: FlowReading) -> Self {
        Self::with_reply(FlowReply::FailEvery(n.max(1), reading))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> Vec<Coordinate> {
        self.probes
            .lock()
            .map(|probes| probes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FlowProvider for StubFlowProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn flow_at(&self, point: Coordinate) -> Result<Option<FlowReading>, NavError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut probes) = self.probes.lock() {
            probes.push(point);
        }
        match &self.reply {
            FlowReply::Reading(reading) => Ok(*reading),
            FlowReply::Fail => Err(NavError::upstream(Upstream::TrafficFlow, "stub failure")),
            FlowReply::FailEvery(n, reading) => {
                if call % n == 0 {
                    Err(NavError::upstream(Upstream::TrafficFlow, "stub failure"))
                } else {
                    Ok(Some(*reading))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

pub struct StubPredictionProvider {
    reply: Result<PredictionResult, NavError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<PredictionRequest>>,
}

impl StubPredictionProvider {
    pub fn answering(result: PredictionResult) -> Self {
        Self {
            reply: Ok(result),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err(NavError::upstream(Upstream::Prediction, "model not loaded")),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PredictionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

/// A typical warning-level answer naming a bottleneck.
pub fn warning_prediction(bottleneck: &str) -> PredictionResult {
    PredictionResult {
        status: Some("warning".to_string()),
        message: Some(format!("Route passes near bottleneck: {bottleneck}")),
        bottleneck_location: Some(bottleneck.to_string()),
        extra: [
            ("predicted_travel_time".to_string(), serde_json::json!(1_800.0)),
            ("delay_seconds".to_string(), serde_json::json!(600.0)),
        ]
        .into_iter()
        .collect(),
    }
}

#[async_trait]
impl PredictionProvider for StubPredictionProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, NavError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.reply.clone()
    }
}

/// Aggregator over the given stubs, with the Lagos bottleneck list.
pub fn stub_aggregator(
    routes: Arc<StubRouteProvider>,
    flow: Arc<StubFlowProvider>,
    prediction: Option<Arc<StubPredictionProvider>>,
) -> Aggregator {
    let aggregator = Aggregator::new(routes, flow);
    match prediction {
        Some(provider) => aggregator.with_prediction(provider),
        None => aggregator,
    }
}
