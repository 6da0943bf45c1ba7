use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use anime_sales_jw::{AppState, Config, router};
use chart_db::SalesDb;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load();
    info!(
        "using chart data at {} (mode: {:?}, strict: {})",
        config.data_dir.display(),
        config.load.mode,
        config.load.strict
    );

    let start = Instant::now();
    let mut db = SalesDb::new();
    db.load_dir(&config.data_dir, config.load)
        .with_context(|| format!("loading charts from {}", config.data_dir.display()))?;
    info!(
        "loaded {} series ({} records) in {} ms",
        db.series_count(),
        db.record_count(),
        start.elapsed().as_millis()
    );

    if let Some(prefix) = &config.export_prefix {
        db.save(prefix)
            .with_context(|| format!("exporting to {}", prefix.display()))?;
    }
    if !config.serve {
        return Ok(());
    }

    let state = AppState {
        db: Arc::new(db),
        max_find_results: config.max_find_results,
    };
    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    info!("binding to {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

/// `RUST_LOG` overrides the `info` default. Every matched title rule is logged
/// under the `title_rules` target; `RUST_LOG=info,title_rules=off` silences it.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
