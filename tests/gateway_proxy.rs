//! Gateway proxying against real echo instances and an in-process registry

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{
    client, closed_port, registry_with_ttl, spawn_discovery_gateway, spawn_echo, spawn_gateway,
    spawn_registry, Spawned,
};
use futures::future::join_all;
use serde_json::Value;
use signpost::gateway::{DiscoveryClient, InstanceSource};
use signpost::server::echo::EchoReply;
use signpost::SignpostError;

async fn echo_fleet(service: &str, count: usize) -> Vec<Spawned> {
    let mut fleet = Vec::with_capacity(count);
    for _ in 0..count {
        fleet.push(spawn_echo(service).await);
    }
    fleet
}

async fn get_reply(url: &str) -> EchoReply {
    let response = client().get(url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_round_robin_across_instances() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    let fleet = echo_fleet("users", 3).await;
    for echo in &fleet {
        registry.register("users", "127.0.0.1", echo.addr.port());
    }
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;

    let mut served = Vec::new();
    for _ in 0..6 {
        let reply = get_reply(&format!("{}/users/profile", gateway.url())).await;
        served.push(reply.instance);
    }

    let expected: Vec<String> = fleet
        .iter()
        .chain(fleet.iter())
        .map(|echo| echo.addr.to_string())
        .collect();
    assert_eq!(served, expected);
}

#[tokio::test]
async fn test_concurrent_requests_spread_evenly() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    let fleet = echo_fleet("users", 3).await;
    for echo in &fleet {
        registry.register("users", "127.0.0.1", echo.addr.port());
    }
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;

    let url = format!("{}/users/list", gateway.url());
    let replies = join_all((0..30).map(|_| get_reply(&url))).await;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for reply in replies {
        *counts.entry(reply.instance).or_default() += 1;
    }
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&n| n == 10));
}

#[tokio::test]
async fn test_membership_change_restarts_rotation() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    let fleet = echo_fleet("users", 3).await;
    for echo in &fleet[..2] {
        registry.register("users", "127.0.0.1", echo.addr.port());
    }
    let gateway = spawn_gateway(registry.clone(), Duration::from_secs(5)).await;
    let url = format!("{}/users", gateway.url());

    assert_eq!(get_reply(&url).await.instance, fleet[0].addr.to_string());

    registry.register("users", "127.0.0.1", fleet[2].addr.port());
    assert_eq!(get_reply(&url).await.instance, fleet[0].addr.to_string());
    assert_eq!(get_reply(&url).await.instance, fleet[1].addr.to_string());
    assert_eq!(get_reply(&url).await.instance, fleet[2].addr.to_string());
}

#[tokio::test]
async fn test_request_forwarded_verbatim_except_host() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    let echo = spawn_echo("orders").await;
    registry.register("orders", "127.0.0.1", echo.addr.port());
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;

    let response = client()
        .post(format!("{}/orders/user/7?page=2&sort=asc", gateway.url()))
        .header("x-request-id", "abc-123")
        .header("content-type", "application/json")
        .body(r#"{"item":"book"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let reply: EchoReply = response.json().await.unwrap();

    assert_eq!(reply.method, "POST");
    assert_eq!(reply.path, "/orders/user/7");
    assert_eq!(reply.query.as_deref(), Some("page=2&sort=asc"));
    assert_eq!(reply.body, r#"{"item":"book"}"#);
    assert_eq!(reply.headers["x-request-id"], "abc-123");
    assert_eq!(reply.headers["content-type"], "application/json");
    assert_eq!(reply.headers["host"], echo.addr.to_string());
    assert_ne!(reply.headers["host"], gateway.addr.to_string());
}

#[tokio::test]
async fn test_service_segment_forwarded_as_received() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    let echo = spawn_echo("orders:v1").await;
    registry.register("orders:v1", "127.0.0.1", echo.addr.port());
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;

    let reply = get_reply(&format!("{}/orders:v1/x", gateway.url())).await;
    assert_eq!(reply.path, "/orders:v1/x");
}

#[tokio::test]
async fn test_downstream_status_relayed() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    // The echo instance only answers under its own prefix, so a mismatched
    // registration yields a downstream 404 that must pass through untouched.
    let echo = spawn_echo("billing").await;
    registry.register("orders", "127.0.0.1", echo.addr.port());
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;

    let response = client()
        .get(format!("{}/orders/1", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_unresolvable_services_share_one_response() {
    let registry = registry_with_ttl(Duration::from_millis(100));
    registry.register("orders", "127.0.0.1", closed_port().await);
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let http = client();
    let unknown = http
        .get(format!("{}/ghost/x", gateway.url()))
        .send()
        .await
        .unwrap();
    let stale = http
        .get(format!("{}/orders/x", gateway.url()))
        .send()
        .await
        .unwrap();

    assert_eq!(unknown.status(), 503);
    assert_eq!(stale.status(), 503);
    let unknown: Value = unknown.json().await.unwrap();
    let stale: Value = stale.json().await.unwrap();
    assert_eq!(unknown["error"], "service_unavailable");
    assert_eq!(stale["error"], "service_unavailable");
}

#[tokio::test]
async fn test_dead_downstream_is_bad_gateway() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    registry.register("orders", "127.0.0.1", closed_port().await);
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;

    let response = client()
        .get(format!("{}/orders/1", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_gateway");
}

#[tokio::test]
async fn test_hung_downstream_times_out_as_unavailable() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let registry = registry_with_ttl(Duration::from_secs(15));
    registry.register("slow", "127.0.0.1", port);
    let gateway = spawn_gateway(registry, Duration::from_millis(200)).await;

    let response = client()
        .get(format!("{}/slow/work", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_gateway_health_and_method_filter() {
    let registry = registry_with_ttl(Duration::from_secs(15));
    let gateway = spawn_gateway(registry, Duration::from_secs(5)).await;
    let http = client();

    let health: Value = http
        .get(format!("{}/_gateway/health", gateway.url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["healthy"], true);

    let options = http
        .request(reqwest::Method::OPTIONS, format!("{}/users/1", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(options.status(), 405);
}

#[tokio::test]
async fn test_discovery_client_maps_registry_answers() {
    let registry = registry_with_ttl(Duration::from_millis(300));
    registry.register("users", "10.0.0.1", 9001);
    registry.register("users", "10.0.0.2", 9002);
    registry.register("orders", "10.0.0.3", 9003);
    let server = spawn_registry(registry.clone()).await;
    let discovery = DiscoveryClient::new(&server.url(), Duration::from_secs(2)).unwrap();

    let alive = discovery.list_alive("users").await.unwrap();
    assert_eq!(alive, registry.list_alive("users").unwrap());
    assert_eq!(alive[0].port, 9001);
    assert_eq!(alive[1].port, 9002);

    let unknown = discovery.list_alive("ghost").await.unwrap_err();
    assert!(matches!(unknown, SignpostError::UnknownService(_)));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let stale = discovery.list_alive("orders").await.unwrap_err();
    assert!(matches!(stale, SignpostError::NoAliveInstances(_)));
}

#[tokio::test]
async fn test_gateway_over_http_discovery() {
    let registry = registry_with_ttl(Duration::from_millis(500));
    let fleet = echo_fleet("users", 2).await;
    for echo in &fleet {
        registry.register("users", "127.0.0.1", echo.addr.port());
    }
    let stale_echo = spawn_echo("orders").await;
    registry.register("orders", "127.0.0.1", stale_echo.addr.port());

    let server = spawn_registry(registry.clone()).await;
    let gateway = spawn_discovery_gateway(&server.url(), Duration::from_secs(5)).await;
    let url = format!("{}/users/profile", gateway.url());

    let mut served = Vec::new();
    for _ in 0..4 {
        served.push(get_reply(&url).await.instance);
        // keep the rotating service alive while "orders" ages out
        registry.heartbeat("users", "127.0.0.1", fleet[0].addr.port()).unwrap();
        registry.heartbeat("users", "127.0.0.1", fleet[1].addr.port()).unwrap();
    }
    let first = fleet[0].addr.to_string();
    let second = fleet[1].addr.to_string();
    assert_eq!(served, vec![first.clone(), second.clone(), first, second]);

    let http = client();
    let unknown = http
        .get(format!("{}/ghost/x", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 503);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let stale = http
        .get(format!("{}/orders/x", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), 503);
    let body: Value = stale.json().await.unwrap();
    assert_eq!(body["error"], "service_unavailable");
}
