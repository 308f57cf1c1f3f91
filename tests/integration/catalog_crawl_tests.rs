//! End-to-end crawl cycles over HTTP
//!
//! Each test starts a mock node, points the crawler at it and checks what
//! ends up in the catalog cache.

use fedcat::cache::{CatalogCache, CatalogQueryService, InMemoryCatalogCache, QuerySpec};
use fedcat::config::{Config, TransportConfig};
use fedcat::crawler::{build_execution_manager, ActionRegistry};
use fedcat::directory::{InMemoryTargetDirectory, TargetDirectory};
use fedcat::fetch::{CatalogRequestAction, HttpTransport, JsonCatalogDecoder, PagingCatalogFetcher};
use fedcat::model::{Catalog, DataService, Dataset, Target};
use fedcat::storage::SqliteStorage;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROTOCOL: &str = "dsp";

/// Creates a test configuration with instant retries
fn create_test_config(batch_size: usize) -> Config {
    let mut config = Config::default();
    config.crawler.max_retries = 1;
    config.crawler.retry_delay_base_seconds = 0;
    config.crawler.retry_delay_jitter_seconds = 0;
    config.fetch.batch_size = batch_size;
    config
}

fn create_registry(config: &Config, transport: &TransportConfig) -> Arc<ActionRegistry> {
    let transport = Arc::new(HttpTransport::new(transport).expect("Failed to build transport"));
    let fetcher = PagingCatalogFetcher::new(transport, Arc::new(JsonCatalogDecoder));
    let registry = Arc::new(ActionRegistry::new());
    registry
        .register(
            PROTOCOL,
            Arc::new(CatalogRequestAction::new(fetcher, config.fetch.batch_size)),
        )
        .expect("Failed to register action");
    registry
}

fn target(id: &str, url: String) -> Target {
    Target::new(id, url, vec![PROTOCOL.to_string()])
}

fn page(id: &str, prefix: &str, count: usize) -> Catalog {
    (0..count).fold(Catalog::new(id), |catalog, i| {
        catalog.with_dataset(Dataset::new(format!("{}-{}", prefix, i)))
    })
}

/// Mounts a catalog page served for requests starting at `offset`
async fn mount_page(server: &MockServer, base_path: &str, offset: usize, catalog: &Catalog) {
    Mock::given(method("POST"))
        .and(path(format!("{}/catalog/request", base_path)))
        .and(body_partial_json(json!({"querySpec": {"offset": offset}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_paginated_catalog_is_assembled() {
    let server = MockServer::start().await;
    mount_page(&server, "/node", 0, &page("cat", "a", 2)).await;
    mount_page(&server, "/node", 2, &page("cat", "b", 2)).await;
    mount_page(&server, "/node", 4, &page("cat", "c", 1)).await;

    let config = create_test_config(2);
    let node_url = format!("{}/node", server.uri());
    let directory = Arc::new(InMemoryTargetDirectory::with_targets(vec![target(
        "node-1",
        node_url.clone(),
    )]));
    let cache = Arc::new(InMemoryCatalogCache::new());
    let manager = build_execution_manager(
        &config,
        directory,
        create_registry(&config, &TransportConfig::default()),
        cache.clone(),
    )
    .expect("Failed to build manager");

    let report = manager.run_cycle().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);

    let cached = cache.query(&QuerySpec::all()).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].datasets.len(), 5);
    assert_eq!(cached[0].originator().as_deref(), Some(node_url.as_str()));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["@type"], "CatalogRequestMessage");
    assert_eq!(first["counterPartyId"], "node-1");
    assert_eq!(first["querySpec"]["limit"], 2);
}

#[tokio::test]
async fn test_nested_catalogs_are_expanded_and_flattened() {
    let server = MockServer::start().await;
    let sub_url = format!("{}/sub", server.uri());

    let root = page("root", "r", 1).with_sub_catalog(
        Catalog::new("sub-stub")
            .with_data_service(DataService::new("sub-svc", Some(sub_url.clone()))),
    );
    mount_page(&server, "/root", 0, &root).await;
    mount_page(&server, "/sub", 0, &page("sub", "s", 3)).await;

    let config = create_test_config(10);
    let directory = Arc::new(InMemoryTargetDirectory::with_targets(vec![target(
        "root-node",
        format!("{}/root", server.uri()),
    )]));
    let cache: Arc<dyn CatalogCache> = Arc::new(InMemoryCatalogCache::new());
    let manager = build_execution_manager(
        &config,
        directory,
        create_registry(&config, &TransportConfig::default()),
        cache.clone(),
    )
    .unwrap();

    manager.run_cycle().await;

    let service = CatalogQueryService::new(cache);
    let nested = service.get_catalogs(&QuerySpec::all(), false).unwrap();
    assert_eq!(nested.len(), 1);
    let ids: Vec<_> = nested[0].datasets.iter().map(|d| d.id().to_string()).collect();
    assert_eq!(ids, vec!["r-0", "sub"]);

    let flat = service.get_catalogs(&QuerySpec::all(), true).unwrap();
    assert_eq!(flat[0].datasets.len(), 4);
    assert_eq!(flat[0].sub_catalogs().count(), 0);
}

#[tokio::test]
async fn test_failing_node_is_retried_then_swept() {
    let server = MockServer::start().await;
    mount_page(&server, "/up", 0, &page("up", "u", 1)).await;
    Mock::given(method("POST"))
        .and(path("/down/catalog/request"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = create_test_config(10);
    let up_url = format!("{}/up", server.uri());
    let down_url = format!("{}/down", server.uri());

    let cache = Arc::new(InMemoryCatalogCache::new());
    // a catalog from an earlier cycle that will not be refreshed
    cache
        .save(Catalog::new("stale").with_property("originator", down_url.clone()))
        .unwrap();

    let directory = Arc::new(InMemoryTargetDirectory::with_targets(vec![
        target("up", up_url.clone()),
        target("down", down_url),
    ]));
    let manager = build_execution_manager(
        &config,
        directory,
        create_registry(&config, &TransportConfig::default()),
        cache.clone(),
    )
    .unwrap();

    let report = manager.run_cycle().await;

    assert_eq!(report.targets, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let cached = cache.query(&QuerySpec::all()).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].originator().as_deref(), Some(up_url.as_str()));
}

#[tokio::test]
async fn test_own_node_and_unknown_protocol_are_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/other", 0, &page("other", "o", 1)).await;

    let mut config = create_test_config(10);
    config.node.self_id = Some("me".to_string());

    let directory = Arc::new(InMemoryTargetDirectory::with_targets(vec![
        target("me", format!("{}/me", server.uri())),
        Target::new(
            "legacy",
            format!("{}/legacy", server.uri()),
            vec!["ids-multipart".to_string()],
        ),
        target("other", format!("{}/other", server.uri())),
    ]));
    let cache = Arc::new(InMemoryCatalogCache::new());
    let manager = build_execution_manager(
        &config,
        directory,
        create_registry(&config, &TransportConfig::default()),
        cache.clone(),
    )
    .unwrap();

    let report = manager.run_cycle().await;

    assert_eq!(report.skipped, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_auth_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/secure/catalog/request"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("secure", "x", 1)))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(10);
    let transport = TransportConfig {
        auth_token: Some("s3cret".to_string()),
        ..TransportConfig::default()
    };
    let directory = Arc::new(InMemoryTargetDirectory::with_targets(vec![target(
        "secure",
        format!("{}/secure", server.uri()),
    )]));
    let cache = Arc::new(InMemoryCatalogCache::new());
    let manager =
        build_execution_manager(&config, directory, create_registry(&config, &transport), cache.clone())
            .unwrap();

    let report = manager.run_cycle().await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(cache.len().unwrap(), 1);
}

#[tokio::test]
async fn test_sqlite_backend_survives_restart() {
    let server = MockServer::start().await;
    mount_page(&server, "/node", 0, &page("cat", "d", 2)).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("fedcat.db");
    let node_url = format!("{}/node", server.uri());
    let config = create_test_config(10);

    {
        let storage = Arc::new(SqliteStorage::new(&db_path).expect("Failed to open storage"));
        storage.insert(target("node", node_url.clone())).unwrap();

        let manager = build_execution_manager(
            &config,
            storage.clone(),
            create_registry(&config, &TransportConfig::default()),
            storage.clone(),
        )
        .unwrap();
        let report = manager.run_cycle().await;
        assert_eq!(report.succeeded, 1);
    }

    let reopened = SqliteStorage::new(&db_path).expect("Failed to reopen storage");
    let cached = reopened.query(&QuerySpec::all()).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].datasets.len(), 2);
    assert_eq!(cached[0].originator().as_deref(), Some(node_url.as_str()));
    assert_eq!(reopened.get_all().unwrap().len(), 1);
}
