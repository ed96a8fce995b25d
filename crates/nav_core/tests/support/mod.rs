#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use nav_core::search::Aggregator;
use nav_core::session::SearchSession;
use nav_core::test_helpers::{
    stub_aggregator, StubFlowProvider, StubPredictionProvider, StubRouteProvider,
};

/// Stubs behind an aggregator, kept around so tests can inspect call counts.
pub struct Harness {
    pub routes: Arc<StubRouteProvider>,
    pub flow: Arc<StubFlowProvider>,
    pub prediction: Option<Arc<StubPredictionProvider>>,
}

impl Harness {
    pub fn new(routes: StubRouteProvider, flow: StubFlowProvider) -> Self {
        Self {
            routes: Arc::new(routes),
            flow: Arc::new(flow),
            prediction: None,
        }
    }

    pub fn with_prediction(mut self, prediction: StubPredictionProvider) -> Self {
        self.prediction = Some(Arc::new(prediction));
        self
    }

    pub fn aggregator(&self) -> Aggregator {
        stub_aggregator(
            Arc::clone(&self.routes),
            Arc::clone(&self.flow),
            self.prediction.clone(),
        )
    }

    pub fn session(&self, refresh: Option<Duration>) -> SearchSession {
        SearchSession::new(Arc::new(self.aggregator()), refresh)
    }

    pub fn prediction_calls(&self) -> usize {
        self.prediction.as_ref().map_or(0, |p| p.calls())
    }
}
