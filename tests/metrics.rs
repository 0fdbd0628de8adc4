//! Request metrics cover responses produced outside the handlers.

use json_validation_service::ServiceConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::StatusCode;

mod common;

use common::start_service;

#[tokio::test]
async fn rejected_and_unmatched_requests_are_counted() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("only test in this binary to install a recorder");

    let mut config = ServiceConfig::default();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst_size = 1;
    let svc = start_service(config).await;

    let res = svc.client.get(svc.url("/no/such/route")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = svc.client.get(svc.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let rendered = handle.render();
    let requests: Vec<&str> = rendered
        .lines()
        .filter(|l| l.starts_with("jvs_http_requests_total{"))
        .collect();
    assert!(
        requests.iter().any(|l| l.contains(r#"route="unmatched""#) && l.contains(r#"status="404""#)),
        "{rendered}"
    );
    assert!(
        requests.iter().any(|l| l.contains(r#"route="/health""#) && l.contains(r#"status="429""#)),
        "{rendered}"
    );
    assert!(rendered.contains("jvs_rate_limited_total 1"), "{rendered}");

    svc.stop().await;
}
