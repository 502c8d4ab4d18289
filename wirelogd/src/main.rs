// WireGuard peer activity logging daemon

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io;
use std::path::Path;
use std::time::Duration;
use wirelogd::{
    cli::{Args, Commands},
    config::{resolve_config, DEFAULT_CONFIG_PATH},
    logging::{self, LogSink},
    monitor::ActivityMonitor,
    scheduler,
    snapshot::WgSource,
    types::{Config, SourceBackend},
};

/// Write the roff manual page to stdout
fn write_manpage() -> Result<()> {
    let man = clap_mangen::Man::new(Args::command());
    man.render(&mut io::stdout())
        .context("Failed to render manpage")
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if let Some(Commands::Man) = args.command {
        return write_manpage();
    }

    // Load configuration (defaults < file < environment < flags)
    let config = resolve_config(&args, Path::new(DEFAULT_CONFIG_PATH))?;

    // Initialize logging
    let sink = logging::init(&config)?;

    // A single polling loop and the signal listener share one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .thread_name("wirelogd")
        .enable_time()
        .enable_io()
        .build()
        .context("Failed to build Tokio runtime")?;

    if let Err(e) = runtime.block_on(async_main(config, sink)) {
        log::error!("{:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn async_main(config: Config, mut sink: LogSink) -> Result<()> {
    if log::log_enabled!(log::Level::Debug) {
        let dump = serde_json::to_string(&config).context("Failed to serialize config")?;
        log::debug!(config = dump.as_str(); "resolved configuration");
    }

    if config.source.sudo && config.source.backend != SourceBackend::WgDump {
        log::warn!("sudo only applies to the wg-dump backend, ignoring it");
    }

    let source = WgSource::from_config(&config.source);
    let mut monitor = ActivityMonitor::new(config.general.timeout);

    log::info!(
        backend = source.backend().as_str(),
        refresh = config.general.refresh,
        timeout = monitor.timeout().as_secs();
        "start wirelogd"
    );

    // Install handlers before the first poll so no signal is missed
    let shutdown = scheduler::shutdown_signal()?;

    scheduler::run(
        &source,
        &mut monitor,
        &mut sink,
        Duration::from_secs(config.general.refresh),
        shutdown,
    )
    .await?;

    log::info!("stop wirelogd");
    Ok(())
}
