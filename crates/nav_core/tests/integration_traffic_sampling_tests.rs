use nav_core::congestion::{classify, CongestionLevel};
use nav_core::error::NavError;
use nav_core::geo::Coordinate;
use nav_core::routing::{RouteId, RoutePath, TripSummary};
use nav_core::test_helpers::{clear_path, interpolate, StubFlowProvider, LAGOS_END, LAGOS_START};
use nav_core::traffic::profile::ProfileFlowProvider;
use nav_core::traffic::{sample_traffic, FlowProvider, FlowReading};

fn route(points: Vec<Coordinate>) -> RoutePath {
    RoutePath {
        id: RouteId::Main,
        points,
        summary: TripSummary::default(),
    }
}

#[tokio::test]
async fn default_sampling_yields_four_segments() {
    let flow = StubFlowProvider::constant(30.0, 50.0);
    let path = route(interpolate(LAGOS_START, LAGOS_END, 9));

    let segments = sample_traffic(&flow, &path, 5).await.expect("segments");

    assert_eq!(segments.len(), 4);
    assert_eq!(flow.calls(), 4);
    let bounds: Vec<(usize, usize)> = segments
        .iter()
        .map(|s| (s.start_index, s.end_index))
        .collect();
    assert_eq!(bounds, vec![(0, 2), (2, 4), (4, 6), (6, 8)]);
    // Probes are the middle vertex of each segment.
    assert_eq!(flow.probes().len(), 4);
    assert!(flow.probes().contains(&path.points[3]));
}

#[tokio::test]
async fn ten_of_forty_is_very_heavy() {
    let flow = StubFlowProvider::constant(10.0, 40.0);
    let segments = sample_traffic(&flow, &route(clear_path()), 5)
        .await
        .expect("segments");

    assert!(segments.iter().all(|s| s.ratio == Some(0.25)));
    assert_eq!(classify(&segments), CongestionLevel::VeryHeavy);
}

#[tokio::test]
async fn every_probe_failing_is_unknown_not_error() {
    let flow = StubFlowProvider::failing();
    let segments = sample_traffic(&flow, &route(clear_path()), 5)
        .await
        .expect("sampling tolerates probe failures");

    assert_eq!(segments.len(), 4);
    assert!(segments.iter().all(|s| !s.is_known()));
    assert_eq!(classify(&segments), CongestionLevel::Unknown);
}

#[tokio::test]
async fn one_failed_probe_leaves_the_rest() {
    let flow = StubFlowProvider::failing_every(2, FlowReading::new(20.0, 50.0));
    let segments = sample_traffic(&flow, &route(clear_path()), 5)
        .await
        .expect("segments");

    let known = segments.iter().filter(|s| s.is_known()).count();
    assert_eq!(known, 2);
    assert_eq!(classify(&segments), CongestionLevel::Heavy);
}

#[tokio::test]
async fn empty_reading_is_unknown() {
    let flow = StubFlowProvider::empty();
    let segments = sample_traffic(&flow, &route(clear_path()), 3)
        .await
        .expect("segments");
    assert_eq!(segments.len(), 2);
    assert_eq!(classify(&segments), CongestionLevel::Unknown);
}

#[tokio::test]
async fn two_point_route_probes_its_midpoint() {
    let flow = StubFlowProvider::constant(45.0, 50.0);
    let path = route(vec![LAGOS_START, LAGOS_END]);
    let segments = sample_traffic(&flow, &path, 5).await.expect("segments");

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].probe, LAGOS_START.midpoint(&LAGOS_END));
    assert_eq!(classify(&segments), CongestionLevel::Clear);
}

#[tokio::test]
async fn single_point_route_is_rejected() {
    let flow = StubFlowProvider::constant(45.0, 50.0);
    let err = sample_traffic(&flow, &route(vec![LAGOS_START]), 5)
        .await
        .expect_err("too short");
    assert_eq!(err, NavError::InsufficientPoints { points: 1 });
    assert_eq!(flow.calls(), 0);
}

#[tokio::test]
async fn profile_provider_reads_every_probe() {
    let flow = ProfileFlowProvider::lagos();
    assert_eq!(flow.name(), "profile");
    let segments = sample_traffic(&flow, &route(clear_path()), 5)
        .await
        .expect("segments");
    assert!(segments.iter().all(|s| s.is_known()));
    assert!(classify(&segments).is_known());
}
