use std::sync::Arc;

mod api;
mod bridge;
mod config;
mod failure;
mod handler;
mod http;
mod logger;
mod routing;
mod server;
mod store;

use bridge::BlockingBridge;
use handler::Router;
use store::MemoryStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional first argument: config file path (extension optional)
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Connections are served on a LocalSet driven by this thread; blocking threads run store calls
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    if let Some(blocking_threads) = cfg.server.blocking_threads {
        runtime_builder.max_blocking_threads(blocking_threads);
    }
    logger::log_runtime(cfg.server.workers, cfg.server.blocking_threads);

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let bridge = BlockingBridge::current();

    // The store is opened exactly once, off the async workers
    let store_cfg = cfg.store.clone();
    let store = bridge.offload(move || MemoryStore::open(&store_cfg)).await?;
    logger::log_store_ready(cfg.store.seed_file.as_deref(), store.author_count());

    let mut router =
        Router::new(Arc::new(store), bridge).with_max_body_size(cfg.http.max_body_size);
    api::register_routes(&mut router, &cfg.routes)?;

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(config::AppState::new(cfg, router));

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            server::shutdown_signal(),
        ))
        .await
}
