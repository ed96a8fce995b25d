//! TomTom Traffic Flow API backend (`flowSegmentData`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{FlowProvider, FlowReading};
use crate::error::{NavError, Upstream};
use crate::geo::Coordinate;

#[derive(Debug, Clone)]
pub struct TomTomFlowProvider {
    client: Client,
    base_url: String,
    api_key: String,
    zoom: u8,
}

impl TomTomFlowProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        zoom: u8,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            zoom,
        })
    }

    fn flow_url(&self, point: Coordinate) -> Result<Url, NavError> {
        let base = format!(
            "{}/traffic/services/4/flowSegmentData/absolute/{}/json",
            self.base_url, self.zoom
        );
        let mut url = Url::parse(&base).map_err(|err| {
            NavError::upstream(Upstream::TrafficFlow, format!("failed to build URL: {err}"))
        })?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("point", &point.to_string())
            .append_pair("unit", "KMPH");
        Ok(url)
    }
}

#[derive(Deserialize)]
struct FlowResponse {
    #[serde(rename = "flowSegmentData")]
    flow_segment_data: Option<FlowSegmentData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegmentData {
    current_speed: Option<f64>,
    free_flow_speed: Option<f64>,
    #[serde(default)]
    road_closure: bool,
}

fn parse_flow_response(resp: FlowResponse) -> Option<FlowReading> {
    let data = resp.flow_segment_data?;
    if data.road_closure {
        return None;
    }
    Some(FlowReading::new(data.current_speed?, data.free_flow_speed?))
}

#[async_trait]
impl FlowProvider for TomTomFlowProvider {
    fn name(&self) -> &'static str {
        "tomtom"
    }

    async fn flow_at(&self, point: Coordinate) -> Result<Option<FlowReading>, NavError> {
        let url = self.flow_url(point)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| NavError::upstream(Upstream::TrafficFlow, err.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT => return Ok(None),
            status if !status.is_success() => {
                return Err(NavError::upstream(
                    Upstream::TrafficFlow,
                    format!("status {status}"),
                ))
            }
            _ => {}
        }

        let parsed: FlowResponse = response
            .json()
            .await
            .map_err(|err| NavError::upstream(Upstream::TrafficFlow, err.to_string()))?;
        Ok(parse_flow_response(parsed))
    }
}
