mod support;

use chrono::TimeZone;
use nav_core::clock::lagos_offset;
use nav_core::config::NavConfig;
use nav_core::congestion::CongestionLevel;
use nav_core::error::{NavError, NavWarning, Upstream};
use nav_core::prediction::{Bottleneck, PredictionStatus};
use nav_core::routing::RouteId;
use nav_core::search::{Aggregator, PredictionScope, SearchOptions};
use nav_core::test_helpers::{
    clear_path, cms_path, warning_prediction, StubFlowProvider, StubPredictionProvider,
    StubRouteProvider, LAGOS_END, LAGOS_START,
};
use support::Harness;

fn monday_8am() -> SearchOptions {
    SearchOptions {
        departure: lagos_offset()
            .with_ymd_and_hms(2026, 10, 12, 8, 0, 0)
            .single(),
        ..SearchOptions::default()
    }
}

#[tokio::test]
async fn clear_route_makes_no_prediction_call() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![clear_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction("x")));

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(harness.prediction_calls(), 0);
    assert!(result.prediction.is_none());
    assert!(result.warnings.is_empty());
    assert_eq!(result.congestion(RouteId::Main), CongestionLevel::Moderate);
}

#[tokio::test]
async fn route_near_bottleneck_makes_exactly_one_call() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![cms_path()]),
        StubFlowProvider::constant(10.0, 40.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction(
        "CMS_Junction",
    )));

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &monday_8am())
        .await
        .expect("search");

    assert_eq!(harness.prediction_calls(), 1);
    let prediction = result.prediction.as_ref().expect("prediction attached");
    assert_eq!(*prediction, warning_prediction("CMS_Junction"));
    assert_eq!(prediction.status_kind(), PredictionStatus::Warning);
    assert_eq!(prediction.predicted_travel_time(), Some(1_800.0));
    assert_eq!(result.congestion(RouteId::Main), CongestionLevel::VeryHeavy);
}

#[tokio::test]
async fn prediction_request_carries_context() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![cms_path()]),
        StubFlowProvider::constant(10.0, 40.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction(
        "CMS_Junction",
    )));

    harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &monday_8am())
        .await
        .expect("search");

    let requests = harness
        .prediction
        .as_ref()
        .expect("stub")
        .requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.start, "6.4541,3.3947");
    assert_eq!(request.end, "6.4678,3.4498");
    assert_eq!(request.route_id, RouteId::Main);
    assert_eq!(request.bottleneck_location.as_deref(), Some("CMS_Junction"));
    assert_eq!(request.context.time.hour, 8);
    assert_eq!(request.context.time.day_of_week, 0);
    assert!(request.context.time.is_rush_hour);
    assert!(!request.context.time.is_weekend);
    assert_eq!(request.context.current_speed, Some(10.0));
    assert_eq!(request.context.free_flow_speed, Some(40.0));
}

#[tokio::test]
async fn alternates_only_trigger_with_all_routes_scope() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![clear_path(), cms_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction(
        "CMS_Junction",
    )));
    let aggregator = harness.aggregator();

    let primary = aggregator
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");
    assert!(primary.prediction.is_none());
    assert_eq!(harness.prediction_calls(), 0);

    let options = SearchOptions {
        prediction_scope: PredictionScope::AllRoutes,
        ..SearchOptions::default()
    };
    let all = aggregator
        .search(LAGOS_START, LAGOS_END, &options)
        .await
        .expect("search");
    assert!(all.prediction.is_some());
    assert_eq!(harness.prediction_calls(), 1);
    let requests = harness.prediction.as_ref().expect("stub").requests();
    assert_eq!(requests[0].route_id, RouteId::Alternate(1));
}

#[tokio::test]
async fn several_triggering_routes_still_make_one_call() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![cms_path(), cms_path(), cms_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction(
        "CMS_Junction",
    )));
    let options = SearchOptions {
        max_alternatives: 2,
        prediction_scope: PredictionScope::AllRoutes,
        ..SearchOptions::default()
    };

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &options)
        .await
        .expect("search");

    assert_eq!(result.routes.len(), 3);
    assert_eq!(harness.prediction_calls(), 1);
}

#[tokio::test]
async fn prediction_failure_is_a_warning() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![cms_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    )
    .with_prediction(StubPredictionProvider::failing());

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search survives prediction failure");

    assert!(result.prediction.is_none());
    assert!(matches!(
        result.warnings.as_slice(),
        [NavWarning::PredictionUnavailable { .. }]
    ));
}

#[tokio::test]
async fn missing_prediction_provider_is_reported() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![cms_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    );

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(
        result.warnings,
        vec![NavWarning::PredictionDisabled {
            route_id: RouteId::Main
        }]
    );
}

#[tokio::test]
async fn failed_traffic_leaves_routes_unknown() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![clear_path(), clear_path()]),
        StubFlowProvider::failing(),
    );

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search survives traffic failure");

    assert_eq!(result.routes.len(), 2);
    assert_eq!(result.congestion(RouteId::Main), CongestionLevel::Unknown);
    assert_eq!(result.congestion(RouteId::Alternate(1)), CongestionLevel::Unknown);
    assert_eq!(
        result
            .warnings
            .iter()
            .filter(|w| matches!(w, NavWarning::TrafficUnavailable { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn partial_traffic_is_reported_per_route() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![clear_path()]),
        StubFlowProvider::failing_every(4, nav_core::traffic::FlowReading::new(20.0, 40.0)),
    );

    let result = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(
        result.warnings,
        vec![NavWarning::PartialTraffic {
            route_id: RouteId::Main,
            missing: 1,
            total: 4
        }]
    );
    assert_eq!(result.congestion(RouteId::Main), CongestionLevel::Moderate);
}

#[tokio::test]
async fn routing_failure_fails_the_search() {
    let harness = Harness::new(
        StubRouteProvider::failing(NavError::upstream(Upstream::Routing, "timeout")),
        StubFlowProvider::constant(30.0, 50.0),
    );

    let err = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect_err("routing is mandatory");

    assert!(err.is_upstream());
    assert_eq!(harness.flow.calls(), 0);
}

#[tokio::test]
async fn only_single_point_candidates_fail_the_search() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![vec![LAGOS_START], vec![LAGOS_END]]),
        StubFlowProvider::constant(30.0, 50.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction("x")));

    let err = harness
        .aggregator()
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect_err("no usable route");

    assert!(matches!(err, NavError::NoRouteFound { .. }));
    assert_eq!(harness.flow.calls(), 0);
    assert_eq!(harness.prediction_calls(), 0);
}

#[tokio::test]
async fn custom_bottlenecks_replace_the_lagos_list() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![clear_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    )
    .with_prediction(StubPredictionProvider::answering(warning_prediction("Start")));
    let aggregator = harness
        .aggregator()
        .with_bottlenecks(vec![Bottleneck::new("Start", 6.4541, 3.3947)]);

    let result = aggregator
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");

    assert!(result.prediction.is_some());
    assert_eq!(harness.prediction_calls(), 1);
}

#[tokio::test]
async fn offline_config_searches_end_to_end() {
    let aggregator = Aggregator::from_config(&NavConfig::offline()).expect("offline providers");
    assert!(!aggregator.has_prediction());

    let result = aggregator
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(result.routes.len(), 1);
    assert!(result.congestion(RouteId::Main).is_known());
    assert_eq!(result.traffic_by_route[&RouteId::Main].len(), 4);
}

#[tokio::test]
async fn refresh_resamples_without_refetching() {
    let harness = Harness::new(
        StubRouteProvider::with_paths(vec![clear_path(), clear_path()]),
        StubFlowProvider::constant(30.0, 50.0),
    );
    let aggregator = harness.aggregator();
    let result = aggregator
        .search(LAGOS_START, LAGOS_END, &SearchOptions::default())
        .await
        .expect("search");
    assert_eq!(harness.flow.calls(), 8);

    let snapshot = aggregator.refresh_traffic(&result.routes, 3).await;

    assert_eq!(harness.routes.calls(), 1);
    assert_eq!(harness.flow.calls(), 12);
    assert_eq!(snapshot.traffic_by_route[&RouteId::Main].len(), 2);
    assert_eq!(
        snapshot.congestion_by_route[&RouteId::Alternate(1)],
        CongestionLevel::Moderate
    );
}
