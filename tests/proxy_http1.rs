//! HTTP/1.1 pass-through behavior.

use std::time::Duration;

use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn http1_pass_through_with_routing_event() {
    let proxy_port = 18080;
    let upstream_port = 18081;

    let proxy = common::start_proxy(proxy_port, 1024).await;
    let mut events = proxy.requests().unwrap();
    let upstream = common::start_upstream(upstream_port).await;

    let client = common::http1_client();
    let response = common::proxy_get(
        &client,
        proxy_port,
        "/pass",
        &common::routing_headers(upstream_port),
    )
    .send()
    .await
    .expect("proxy unreachable");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Hello, World!");
    assert_eq!(upstream.hits(), 1);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no routing event published")
        .unwrap();
    assert_eq!(event.host, format!("localhost:{upstream_port}"));
    assert_eq!(event.path, "/pass");

    // Exactly one event for one request.
    assert!(events.try_recv().is_err());

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn upstream_500_passes_through_without_retry() {
    let proxy_port = 18082;
    let upstream_port = 18083;

    let proxy = common::start_proxy(proxy_port, 1024).await;
    let mut events = proxy.requests().unwrap();
    let upstream = common::start_upstream(upstream_port).await;

    let client = common::http1_client();
    let response = common::proxy_get(
        &client,
        proxy_port,
        "/fail",
        &common::routing_headers(upstream_port),
    )
    .send()
    .await
    .expect("proxy unreachable");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "Internal Server Error");

    // 500 is not a retry trigger: exactly one round-trip.
    assert_eq!(upstream.hits(), 1);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no routing event published")
        .unwrap();
    assert_eq!(event.path, "/fail");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_target_host_yields_503_and_no_event() {
    let proxy_port = 18084;
    let upstream_port = 18085;

    let proxy = common::start_proxy(proxy_port, 1024).await;
    let mut events = proxy.requests().unwrap();
    let upstream = common::start_upstream(upstream_port).await;

    // Routing headers without the required target host.
    let headers: Vec<(&'static str, String)> = common::routing_headers(upstream_port)
        .into_iter()
        .filter(|(name, _)| *name != "X-Gozero-Target-Host")
        .collect();

    let client = common::http1_client();
    let response = common::proxy_get(&client, proxy_port, "/pass", &headers)
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.text().await.unwrap(),
        "Service unavailable or starting up"
    );

    // No event, no upstream round-trip.
    assert!(events.try_recv().is_err());
    assert_eq!(upstream.hits(), 0);

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn forwarding_headers_reach_the_upstream() {
    let proxy_port = 18086;
    let echo_port = 18087;

    let proxy = common::start_proxy(proxy_port, 64).await;
    let _events = proxy.requests().unwrap();

    // Upstream that records the headers it was sent.
    let headers_seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen = headers_seen.clone();
    let app = axum::Router::new().fallback(move |req: axum::http::Request<axum::body::Body>| {
        let seen = seen.clone();
        async move {
            *seen.lock().unwrap() = Some(req.headers().clone());
            "ok"
        }
    });
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", echo_port))
        .await
        .unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = common::http1_client();
    let response = common::proxy_get(
        &client,
        proxy_port,
        "/pass",
        &common::routing_headers(echo_port),
    )
    .send()
    .await
    .expect("proxy unreachable");
    assert_eq!(response.status(), StatusCode::OK);

    let headers = headers_seen.lock().unwrap().clone().unwrap();
    assert_eq!(
        headers.get("x-forwarded-host").unwrap().to_str().unwrap(),
        format!("127.0.0.1:{proxy_port}")
    );
    assert_eq!(headers.get("x-forwarded-proto").unwrap(), "https");
    assert!(headers.get("x-forwarded-for").is_some());
    // Routing headers travel with the request.
    assert_eq!(headers.get("x-gozero-target-host").unwrap(), "localhost");

    proxy.shutdown().await.unwrap();
}
