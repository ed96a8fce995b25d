//! Route and congestion aggregation for the Lagos navigator.
//!
//! A search fetches candidate routes from a routing provider, samples
//! traffic flow along each of them, classifies congestion, and asks a
//! prediction service for an advisory when a route passes a known
//! bottleneck. Providers sit behind async traits so the HTTP backends can be
//! swapped for stubs.

pub mod clock;
pub mod config;
pub mod congestion;
pub mod error;
pub mod geo;
pub mod places;
pub mod prediction;
pub mod routing;
pub mod search;
pub mod session;
pub mod traffic;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use config::{ConfigError, NavConfig};
pub use congestion::{classify, CongestionLevel};
pub use error::{NavError, NavWarning};
pub use geo::{haversine_distance_m, is_near_any, Coordinate};
pub use prediction::{needs_prediction, Bottleneck, PredictionProvider, PredictionResult};
pub use routing::{fetch_routes, RouteId, RoutePath, RouteProvider, TripSummary};
pub use search::{Aggregator, PredictionScope, SearchOptions, SearchResult};
pub use session::{SearchOutcome, SearchSession};
pub use traffic::{sample_traffic, FlowProvider, FlowReading, TrafficSegment};
