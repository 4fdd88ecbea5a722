use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, Level};

use hookgate::cli::{Cli, Command};
use hookgate::config::GatewayConfig;
use hookgate::hooks::{
    Encryptor, HookService, HookStore, InProcessMetrics, LogEmitter, LogIndexSink,
    MemoryKeyProvider,
};
use hookgate::logging::{init_logging, LogConfig, LogFormat};
use hookgate::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = match cli.command {
        // No subcommand and explicit `serve` both launch the gateway.
        None => None,
        Some(Command::Serve { config }) => config,
    };

    let config = GatewayConfig::load(config_path.as_deref())?;

    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    init_logging(LogConfig {
        format: LogFormat::parse_format(&config.log_format),
        default_level: level,
    })?;
    debug!(target: "gateway", ?config, "effective configuration");

    let store = HookStore::new(
        &config.hooks_dir,
        Duration::from_secs(config.refresh_interval_secs),
    );
    store.start();

    let metrics = Arc::new(InProcessMetrics::new());
    let encryptor = Encryptor::new(Arc::new(MemoryKeyProvider::new()));
    let service = HookService::new(
        Arc::clone(&store),
        encryptor,
        Arc::clone(&metrics) as _,
        config.server_id.clone(),
    )
    .with_index_sink(Arc::new(LogIndexSink))
    .with_default_max_bytes(config.max_body_bytes);

    let state = AppState {
        service: Arc::new(service),
        emitter: Arc::new(LogEmitter),
        metrics,
        server_id: config.server_id.clone(),
    };

    server::serve(&config.listen_addr, state, &config.url_context).await?;

    info!(target: "gateway", "shutting down");
    store.close();
    Ok(())
}
