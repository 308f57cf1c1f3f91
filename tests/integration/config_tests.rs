//! Loading a configuration file and wiring a manager from it

use fedcat::cache::InMemoryCatalogCache;
use fedcat::config::{load_config_with_hash, CacheBackend};
use fedcat::crawler::{build_execution_manager, ActionRegistry};
use fedcat::directory::{InMemoryTargetDirectory, TargetDirectory};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[crawler]
num-crawlers = 3
period-seconds = 120
initial-delay-seconds = 1
max-retries = 2

[fetch]
batch-size = 25
protocol = "dsp"

[cache]
backend = "sqlite"
database-path = "./fedcat.db"

[node]
self-id = "me"

[[target]]
id = "provider-a"
url = "https://provider-a.example/api/dsp"
protocols = ["dsp"]

[[target]]
id = "me"
url = "https://me.example/api/dsp"
protocols = ["dsp"]
"#;

#[tokio::test]
async fn test_config_file_drives_the_manager() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(CONFIG.as_bytes()).unwrap();

    let (config, hash) = load_config_with_hash(file.path()).expect("Config should load");

    assert_eq!(hash.len(), 64);
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert_eq!(config.fetch.batch_size, 25);

    let directory = Arc::new(InMemoryTargetDirectory::with_targets(
        config.targets.iter().map(|entry| entry.to_target()),
    ));
    assert_eq!(directory.get_all().unwrap().len(), 2);

    let registry = Arc::new(ActionRegistry::new());
    let manager = build_execution_manager(
        &config,
        directory,
        registry,
        Arc::new(InMemoryCatalogCache::new()),
    )
    .expect("Failed to build manager");
    assert_eq!(manager.num_crawlers(), 3);

    // no action is registered for "dsp", and "me" is our own node
    let report = manager.run_cycle().await;
    assert_eq!(report.targets, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.succeeded + report.failed, 0);
}
