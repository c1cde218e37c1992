use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use credo_node::{
    build_engine,
    cli::{Cli, Commands},
    config::Config,
    logging::{init_tracing, install_panic_hook},
    run_demo,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let data_dir = Path::new(&config.data_dir);
    std::fs::create_dir_all(data_dir)?;
    install_panic_hook(data_dir);
    let _guard = init_tracing(data_dir, &config.log_filter)?;

    info!("--- STARTING CREDO NODE ---");
    info!("Config: {}", cli.config.display());

    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to build engine: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Demo => {
            let report = run_demo(&engine).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Reconcile { interval_ms } => {
            let every = Duration::from_millis(interval_ms.unwrap_or(config.reconcile_interval_ms).max(1));
            let reconciler = Arc::clone(&engine.reconciler);
            let handle = tokio::spawn(Arc::clone(&reconciler).run_periodic(every));

            tokio::signal::ctrl_c().await?;
            info!("🛑 Ctrl+C received, stopping after the current conflict");
            reconciler.request_stop();
            handle.await?;

            println!("{}", serde_json::to_string_pretty(&reconciler.metrics().await)?);
        }
        Commands::Metrics => {
            println!("{}", serde_json::to_string_pretty(&engine.snapshot().await)?);
        }
        Commands::Clear => {
            engine.clear().await;
            info!("🧹 All components cleared");
        }
    }

    Ok(())
}
