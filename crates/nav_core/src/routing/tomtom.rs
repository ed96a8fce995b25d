//! TomTom Routing API backend.
//!
//! Wraps an async HTTP client and hides the response shape behind
//! [`CandidateRoute`]. One request per call, no retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::{CandidateRoute, RouteProvider};
use crate::error::{NavError, Upstream};
use crate::geo::Coordinate;

mod parser;
mod response;

use parser::{parse_error_payload, parse_route_response, ErrorPayload};
use response::TomTomRouteResponse;

#[derive(Debug, Clone)]
pub struct TomTomRouteProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TomTomRouteProvider {
    /// Create a provider for `base_url` (e.g. `https://api.tomtom.com`).
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn route_url(
        &self,
        start: Coordinate,
        end: Coordinate,
        max_alternatives: u32,
    ) -> Result<Url, NavError> {
        let base = format!(
            "{}/routing/1/calculateRoute/{}:{}/json",
            self.base_url, start, end
        );
        let mut url = Url::parse(&base).map_err(|err| {
            NavError::upstream(Upstream::Routing, format!("failed to build URL: {err}"))
        })?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("maxAlternatives", &max_alternatives.to_string())
            .append_pair("routeType", "fastest")
            .append_pair("travelMode", "car")
            .append_pair("traffic", "true");
        Ok(url)
    }
}

#[async_trait]
impl RouteProvider for TomTomRouteProvider {
    fn name(&self) -> &'static str {
        "tomtom"
    }

    async fn calculate_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
        max_alternatives: u32,
    ) -> Result<Vec<CandidateRoute>, NavError> {
        let url = self.route_url(start, end, max_alternatives)?;
        debug!(%start, %end, max_alternatives, "requesting tomtom routes");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| NavError::upstream(Upstream::Routing, err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| NavError::upstream(Upstream::Routing, err.to_string()))?;

        if !status.is_success() {
            return match parse_error_payload(&body) {
                ErrorPayload::NoRoute => Ok(Vec::new()),
                ErrorPayload::Message(message) => Err(NavError::upstream(
                    Upstream::Routing,
                    format!("status {status}: {message}"),
                )),
                ErrorPayload::Unrecognized => {
                    Err(NavError::upstream(Upstream::Routing, format!("status {status}")))
                }
            };
        }

        let parsed: TomTomRouteResponse = serde_json::from_str(&body).map_err(|err| {
            NavError::upstream(Upstream::Routing, format!("malformed response: {err}"))
        })?;
        parse_route_response(parsed)
    }
}
