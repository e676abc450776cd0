use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courtslot::api::{create_router, AppState};
use courtslot::clock::SystemClock;
use courtslot::config::Config;
use courtslot::engine::{Collaborators, Engine};
use courtslot::notify::NotifyHub;
use courtslot::pricing::PriceTable;
use courtslot::scheduler::{Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    courtslot::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let prices = Arc::new(PriceTable::new());
    if let Some(path) = &config.prices_file {
        match prices.load_json(path) {
            Ok(n) => info!("loaded {n} price entries from {}", path.display()),
            Err(e) => tracing::warn!("could not load prices from {}: {e}", path.display()),
        }
    }
    let hub = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(
        config.journal_path(),
        config.policy.clone(),
        Collaborators {
            notifier: hub.clone(),
            pricing: prices.clone(),
            clock: Arc::new(SystemClock),
        },
    )?);

    let mut scheduler = Scheduler::new(engine.clone(), SchedulerConfig::from_config(&config));
    scheduler.start();

    let app = create_router(AppState {
        engine: engine.clone(),
        hub,
        prices,
        prices_file: config.prices_file.clone(),
    });

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("courtslot listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  utc_offset: {}", config.policy.utc_offset);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, let in-flight requests finish
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received, draining requests");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    scheduler.stop().await;
    if let Err(e) = engine.compact_journal().await {
        tracing::warn!("final journal compaction failed: {e}");
    }
    info!("courtslot stopped");
    Ok(())
}
