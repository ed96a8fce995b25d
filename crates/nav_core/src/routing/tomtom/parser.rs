use tracing::warn;

use super::response::{TomTomRouteResponse, TomTomDetailedError, TomTomError};
use crate::error::{NavError, Upstream};
use crate::geo::Coordinate;
use crate::routing::{CandidateRoute, TripSummary};

const NO_ROUTE_CODES: [&str; 2] = ["NO_ROUTE_FOUND", "MAP_MATCHING_FAILURE"];

pub(super) enum ErrorPayload {
    /// The backend answered but could not connect the endpoints.
    NoRoute,
    Message(String),
    Unrecognized,
}

pub(super) fn parse_error_payload(body: &str) -> ErrorPayload {
    match serde_json::from_str::<TomTomRouteResponse>(body) {
        Ok(parsed) => classify_error(parsed.error.as_ref(), parsed.detailed_error.as_ref())
            .unwrap_or(ErrorPayload::Unrecognized),
        Err(_) => ErrorPayload::Unrecognized,
    }
}

fn classify_error(
    error: Option<&TomTomError>,
    detailed: Option<&TomTomDetailedError>,
) -> Option<ErrorPayload> {
    if let Some(detailed) = detailed {
        let code = detailed.code.as_deref().unwrap_or_default();
        if NO_ROUTE_CODES.contains(&code) {
            return Some(ErrorPayload::NoRoute);
        }
        let message = detailed
            .message
            .clone()
            .unwrap_or_else(|| code.to_string());
        return Some(ErrorPayload::Message(message));
    }
    error
        .and_then(|error| error.description.clone())
        .map(ErrorPayload::Message)
}

pub(super) fn parse_route_response(
    resp: TomTomRouteResponse,
) -> Result<Vec<CandidateRoute>, NavError> {
    if let Some(payload) = classify_error(resp.error.as_ref(), resp.detailed_error.as_ref()) {
        return match payload {
            ErrorPayload::NoRoute => Ok(Vec::new()),
            ErrorPayload::Message(message) => Err(NavError::upstream(Upstream::Routing, message)),
            ErrorPayload::Unrecognized => Err(NavError::upstream(
                Upstream::Routing,
                "error-shaped response".to_string(),
            )),
        };
    }

    Ok(resp
        .routes
        .into_iter()
        .enumerate()
        .map(|(index, route)| {
            let mut skipped = 0usize;
            let points: Vec<Coordinate> = route
                .legs
                .iter()
                .flat_map(|leg| leg.points.iter())
                .filter_map(|point| {
                    let coordinate = Coordinate::new(point.latitude, point.longitude);
                    if coordinate.is_valid() {
                        Some(coordinate)
                    } else {
                        skipped += 1;
                        None
                    }
                })
                .collect();
            if skipped > 0 {
                warn!(route_index = index, skipped, "dropped invalid route points");
            }
            CandidateRoute {
                points,
                summary: TripSummary {
                    distance_m: route.summary.length_in_meters,
                    duration_s: route.summary.travel_time_in_seconds,
                    traffic_delay_s: route.summary.traffic_delay_in_seconds,
                },
            }
        })
        .collect())
}
