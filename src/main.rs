use std::sync::Arc;

use spa_host::build_info::CompiledBuildInfo;
use spa_host::config::Config;
use spa_host::handler::UiHandler;
use spa_host::{assets, logger, server};

/// Config file used when no path is given, resolved without extension
const DEFAULT_CONFIG: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let handler = UiHandler::with_landing_path(
        &cfg.ui.url,
        &cfg.ui.landing_path,
        assets::bundled(),
        Arc::new(CompiledBuildInfo),
    )?;
    server::run(&cfg, handler).await
}
