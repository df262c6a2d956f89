//! End-to-end coverage of the registry facade, driving it the way a real
//! Terraform/OpenTofu CLI would: HTTP over a real socket, against a
//! wiremock stand-in for the upstream registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use registry_core::Coordinator;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

async fn spawn_facade(port: u16, token: &str) -> (Arc<Coordinator>, CancellationToken, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let coordinator = Arc::new(Coordinator::new());
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let base = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    let server = registry_server::build(coordinator.clone(), base, addr, token.to_string());

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { server.run(run_cancel).await });

    // give the listener a moment to bind before the test issues requests.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (coordinator, cancel, handle)
}

async fn shutdown(cancel: CancellationToken, handle: tokio::task::JoinHandle<anyhow::Result<()>>) {
    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn discovery_is_public_and_names_the_providers_prefix() {
    let (_coordinator, cancel, handle) = spawn_facade(18181, TOKEN).await;

    let resp = reqwest::get("http://127.0.0.1:18181/.well-known/terraform.json")
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["providers.v1"], "/v1/providers/");

    shutdown(cancel, handle).await;
}

#[tokio::test]
async fn versions_rejects_a_bad_bearer_token() {
    let (_coordinator, cancel, handle) = spawn_facade(18182, TOKEN).await;

    let client = reqwest::Client::new();
    let resp = client
        .get("http://127.0.0.1:18182/v1/providers/registry.example/hashicorp/aws/versions")
        .header("Authorization", "Bearer x-api-key:wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    shutdown(cancel, handle).await;
}

#[tokio::test]
async fn single_plugin_single_client_downloads_through_the_proxy() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/providers/hashicorp/aws/1.0.0/download/linux/amd64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "download_url": format!("{}/aws_1.0.0.zip", upstream.uri()),
            "shasums_url": null,
        })))
        .mount(&upstream)
        .await;

    let (coordinator, cancel, handle) = spawn_facade(18183, TOKEN).await;
    let upstream_host = upstream.uri().trim_start_matches("http://").to_string();

    let client = reqwest::Client::new();
    let url = format!(
        "http://127.0.0.1:18183/v1/providers/{upstream_host}/hashicorp/aws/1.0.0/download/linux/amd64"
    );
    let resp = client.get(&url).header("Authorization", format!("Bearer x-api-key:{TOKEN}")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["download_url"].as_str().unwrap().starts_with("http://127.0.0.1:18183/downloads/"));

    // the lock was converted into a record with harvested links, not left
    // behind as a bare in-flight lock.
    assert!(!coordinator.locked_plugins().await.is_empty());

    shutdown(cancel, handle).await;
}

#[tokio::test]
async fn two_drivers_contend_for_the_same_plugin() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/providers/hashicorp/aws/1.0.0/download/linux/amd64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "download_url": null })))
        .mount(&upstream)
        .await;

    let (_coordinator, cancel, handle) = spawn_facade(18184, TOKEN).await;
    let upstream_host = upstream.uri().trim_start_matches("http://").to_string();
    let url = format!(
        "http://127.0.0.1:18184/v1/providers/{upstream_host}/hashicorp/aws/1.0.0/download/linux/amd64"
    );

    let client = reqwest::Client::new();
    let (first, second) = tokio::join!(
        client.get(&url).header("Authorization", format!("Bearer x-api-key:{TOKEN}")).send(),
        client.get(&url).header("Authorization", format!("Bearer x-api-key:{TOKEN}")).send(),
    );
    let statuses: Vec<u16> = vec![first.unwrap().status().as_u16(), second.unwrap().status().as_u16()];
    assert!(statuses.contains(&200), "one of the two concurrent requests should win the lock");
    assert!(statuses.contains(&423), "the other should observe contention");

    shutdown(cancel, handle).await;
}

#[tokio::test]
async fn two_drivers_with_disjoint_plugins_both_proceed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/providers/hashicorp/aws/1.0.0/download/linux/amd64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "download_url": null })))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/providers/hashicorp/azurerm/2.0.0/download/linux/amd64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "download_url": null })))
        .mount(&upstream)
        .await;

    let (_coordinator, cancel, handle) = spawn_facade(18185, TOKEN).await;
    let upstream_host = upstream.uri().trim_start_matches("http://").to_string();
    let aws_url = format!(
        "http://127.0.0.1:18185/v1/providers/{upstream_host}/hashicorp/aws/1.0.0/download/linux/amd64"
    );
    let azurerm_url = format!(
        "http://127.0.0.1:18185/v1/providers/{upstream_host}/hashicorp/azurerm/2.0.0/download/linux/amd64"
    );

    let client = reqwest::Client::new();
    let (aws, azurerm) = tokio::join!(
        client.get(&aws_url).header("Authorization", format!("Bearer x-api-key:{TOKEN}")).send(),
        client.get(&azurerm_url).header("Authorization", format!("Bearer x-api-key:{TOKEN}")).send(),
    );
    assert_eq!(aws.unwrap().status(), 200);
    assert_eq!(azurerm.unwrap().status(), 200);

    shutdown(cancel, handle).await;
}

#[tokio::test]
async fn upstream_failure_on_find_package_releases_the_lock() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/providers/hashicorp/aws/1.0.0/download/linux/amd64"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let (coordinator, cancel, handle) = spawn_facade(18186, TOKEN).await;
    let upstream_host = upstream.uri().trim_start_matches("http://").to_string();
    let url = format!(
        "http://127.0.0.1:18186/v1/providers/{upstream_host}/hashicorp/aws/1.0.0/download/linux/amd64"
    );

    let client = reqwest::Client::new();
    let resp = client.get(&url).header("Authorization", format!("Bearer x-api-key:{TOKEN}")).send().await.unwrap();
    assert_eq!(resp.status(), 500, "upstream's own status must be proxied through unchanged");

    // the record created by Lock must have been torn down, not left
    // dangling as a permanent false lock on this plugin.
    assert!(coordinator.locked_plugins().await.is_empty());

    shutdown(cancel, handle).await;
}

#[tokio::test]
async fn wait_release_observes_cancellation_instead_of_hanging_forever() {
    let coordinator = Arc::new(Coordinator::new());
    let identity = registry_core::PluginIdentity::new("registry.example", "hashicorp", "aws", "1.0.0", "linux", "amd64");
    assert!(coordinator.lock(identity.clone()).await);

    let cancel = CancellationToken::new();
    let waiter_cancel = cancel.clone();
    let waiter_coordinator = coordinator.clone();
    let waiter_identity = identity.clone();
    let waiter = tokio::spawn(async move {
        waiter_coordinator.wait_release(&waiter_identity, &waiter_cancel).await;
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait_release must return promptly once cancelled")
        .unwrap();
}
