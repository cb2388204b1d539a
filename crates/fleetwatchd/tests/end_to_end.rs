//! End-to-end tests.
//!
//! Runs the collection loop and the API server against stub instances and
//! a stub scheduler, then observes the result over HTTP and WebSocket.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use futures_util::StreamExt;
use http_body_util::BodyExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use fleetwatch_api::{ApiState, InferenceForwarder, build_router};
use fleetwatch_collector::{CollectionLoop, CollectorConfig, HttpFetcher};
use fleetwatch_state::*;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

async fn start_instance(metrics: &'static str) -> String {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(move || async move { metrics }));
    format!("http://{}", serve(app).await)
}

async fn start_scheduler(instances: &[(&str, &str, &str)]) -> String {
    let entries: Vec<String> = instances
        .iter()
        .map(|(name, url, variant)| {
            format!(r#"{{"name":"{name}","url":"{url}","variant":"{variant}"}}"#)
        })
        .collect();
    let listing = format!(r#"{{"instances":[{}]}}"#, entries.join(","));

    let app = Router::new()
        .route(
            "/api/v1/instances",
            get(move || {
                let listing = listing.clone();
                async move { listing }
            }),
        )
        .route(
            "/metrics",
            get(|| async { "llmd_routing_decisions_total 40\nllmd_cache_aware_routes_total 25\n" }),
        );
    format!("http://{}", serve(app).await)
}

struct Daemon {
    addr: SocketAddr,
    registry: Registry,
    shutdown: watch::Sender<bool>,
    collector: JoinHandle<()>,
}

async fn start_daemon(scheduler_url: &str) -> Daemon {
    let config = CollectorConfig::new(scheduler_url)
        .with_interval(Duration::from_millis(50))
        .with_fetch_timeout(Duration::from_millis(500));
    config.validate().unwrap();

    let registry = Registry::new();
    let engine = CollectionLoop::new(&config, registry.clone());
    let (shutdown, shutdown_rx) = watch::channel(false);
    let collector = tokio::spawn(async move { engine.run(shutdown_rx).await });

    let forwarder = InferenceForwarder::new(
        HttpFetcher::new(),
        scheduler_url,
        Duration::from_secs(2),
        registry.clone(),
    );
    let addr = serve(build_router(ApiState::new(registry.clone(), forwarder))).await;

    Daemon {
        addr,
        registry,
        shutdown,
        collector,
    }
}

async fn fleet() -> Daemon {
    let prefill = start_instance(
        "vllm:num_requests_running 2\nvllm:cache_hit_rate 0.25\nvllm:avg_tokens_per_sec 100\n",
    )
    .await;
    let decode = start_instance(
        "vllm:num_requests_running 3\nvllm:cache_hit_rate 0.75\nvllm:avg_tokens_per_sec 300\n",
    )
    .await;
    let scheduler = start_scheduler(&[
        ("prefill-0", prefill.as_str(), "prefill"),
        ("decode-0", decode.as_str(), "decode"),
    ])
    .await;
    start_daemon(&scheduler).await
}

async fn wait_for_instances(registry: &Registry, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.instance_count().await < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn stream_delivers_fleet_snapshots() {
    let daemon = fleet().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/metrics", daemon.addr))
        .await
        .unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws.next().await.unwrap().unwrap();
            if let Message::Text(text) = msg {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                if value["summary"]["healthy_instances"] == 2 {
                    break value;
                }
            }
        }
    })
    .await
    .unwrap();

    for key in ["timestamp", "instances", "scheduler_metrics", "recent_requests", "summary"] {
        assert!(snapshot.get(key).is_some(), "missing {key}");
    }
    let summary = &snapshot["summary"];
    assert_eq!(summary["total_instances"], 2);
    assert_eq!(summary["total_active_requests"], 5);
    assert_eq!(summary["avg_cache_hit_rate"], 0.5);
    assert_eq!(summary["total_tokens_per_second"], 400.0);
    assert_eq!(snapshot["scheduler_metrics"]["routing_decisions"], 40);
    assert_eq!(snapshot["instances"][0]["name"], "decode-0");

    // Shutdown closes the stream and stops the loop.
    daemon.shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), daemon.collector)
        .await
        .unwrap()
        .unwrap();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(daemon.registry.subscribers().is_empty().await);
}

#[tokio::test]
async fn http_endpoints_reflect_collected_state() {
    let daemon = fleet().await;
    wait_for_instances(&daemon.registry, 2).await;

    let fetcher = HttpFetcher::new();
    let base = format!("http://{}", daemon.addr);

    let resp = fetcher
        .get(&format!("{base}/api/v1/metrics/instances"), Duration::from_secs(2))
        .await
        .unwrap();
    assert!(resp.is_success());
    let json: serde_json::Value = resp.json().unwrap();
    let names: Vec<_> = json["data"]["instances"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["decode-0", "prefill-0"]);

    let resp = fetcher
        .get(&format!("{base}/metrics"), Duration::from_secs(2))
        .await
        .unwrap();
    let samples: Vec<_> = fleetwatch_metrics::parse(resp.text().unwrap()).collect();
    assert_eq!(fleetwatch_metrics::latest(&samples, "fleetwatch_instances", None), Some(2.0));
    assert_eq!(
        fleetwatch_metrics::latest(
            &samples,
            "fleetwatch_instance_active_requests",
            Some(("instance", "prefill-0"))
        ),
        Some(2.0)
    );

    let _ = daemon.shutdown.send(true);
}

#[tokio::test]
async fn unreachable_scheduler_leaves_empty_fleet() {
    let daemon = start_daemon("http://127.0.0.1:1").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(daemon.registry.instance_count().await, 0);
    assert_eq!(daemon.registry.scheduler().await, SchedulerSnapshot::default());

    let router = build_router(ApiState::new(
        daemon.registry.clone(),
        InferenceForwarder::new(
            HttpFetcher::new(),
            "http://127.0.0.1:1",
            Duration::from_millis(200),
            daemon.registry.clone(),
        ),
    ));
    let resp = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/metrics/requests")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["requests"].as_array().unwrap().len(), 0);

    let _ = daemon.shutdown.send(true);
}
