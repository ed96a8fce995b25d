use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct TomTomRouteResponse {
    #[serde(default)]
    pub(super) routes: Vec<TomTomRoute>,
    pub(super) error: Option<TomTomError>,
    #[serde(rename = "detailedError")]
    pub(super) detailed_error: Option<TomTomDetailedError>,
}

#[derive(Deserialize)]
pub(super) struct TomTomRoute {
    pub(super) summary: TomTomSummary,
    #[serde(default)]
    pub(super) legs: Vec<TomTomLeg>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TomTomSummary {
    pub(super) length_in_meters: f64,
    pub(super) travel_time_in_seconds: f64,
    pub(super) traffic_delay_in_seconds: Option<f64>,
}

#[derive(Deserialize)]
pub(super) struct TomTomLeg {
    #[serde(default)]
    pub(super) points: Vec<TomTomPoint>,
}

#[derive(Deserialize)]
pub(super) struct TomTomPoint {
    pub(super) latitude: f64,
    pub(super) longitude: f64,
}

#[derive(Deserialize)]
pub(super) struct TomTomError {
    pub(super) description: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct TomTomDetailedError {
    pub(super) code: Option<String>,
    pub(super) message: Option<String>,
}
