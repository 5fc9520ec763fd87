use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use hydro_backend::config::{Config, StoreBackend, StoreConfig, WorkerConfig};
use hydro_backend::routes::build_router;
use hydro_backend::state::AppState;
use hydro_backend::store::{KeyValueStore, MemoryStore, SledStore};

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: Option<TempDir>,
}

fn test_config(backend: StoreBackend, sled_path: String) -> Config {
    // Built directly instead of via env vars so parallel tests cannot race.
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        store: StoreConfig {
            backend,
            sled_path,
            key_prefix: "hydro-test:".to_string(),
        },
        cors_origin: "*".to_string(),
        worker: WorkerConfig {
            is_leader: false,
            expiry_sweep_cron: "0 */10 * * * *".to_string(),
        },
    }
}

fn assemble(config: Config, store: Arc<dyn KeyValueStore>, temp_dir: Option<TempDir>) -> TestApp {
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    let config = test_config(StoreBackend::Memory, String::new());
    let store = Arc::new(MemoryStore::new(&config.store.key_prefix));
    assemble(config, store, None)
}

pub async fn spawn_sled_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("hydro-test.sled");
    let config = test_config(StoreBackend::Sled, sled_path.to_string_lossy().to_string());
    let store = Arc::new(
        SledStore::open(&config.store.sled_path, &config.store.key_prefix).expect("open sled"),
    );
    assemble(config, store, Some(temp_dir))
}
