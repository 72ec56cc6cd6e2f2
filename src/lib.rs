pub mod config;          // Configuration management
pub mod datalog_writer;  // JSON-lines live data log
pub mod live;            // Human-readable view of the last frame
pub mod options;         // Command line options parsing
pub mod prelude;         // Common imports and types
pub mod publisher;       // Decides when live data goes out
pub mod serial_link;     // TCP / capture file byte feed
pub mod source;          // Non-blocking byte sources
pub mod vedirect;        // VE.Direct text protocol decoder

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::publisher::Publisher;
use crate::serial_link::SerialLink;
use std::io::Write;
use std::time::{Duration, Instant};

/// How often the main loop looks for buffered input.
const POLL_TICK_MS: u64 = 50;

/// Environment variable that overrides `loglevel` from the config file.
const LOG_ENV: &str = "RUST_LOG";

/// Level used until the config file has been read.
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// Installs the logger before the config is read. Without `RUST_LOG` the
/// logger itself passes everything and the global max level filters, so
/// [`apply_log_level`] can tighten or widen it later.
fn init_logging() {
    let from_env = std::env::var_os(LOG_ENV).is_some();
    let result = env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV, "trace"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();

    match result {
        Ok(()) if !from_env => log::set_max_level(DEFAULT_LOG_LEVEL),
        Ok(()) => {}
        Err(e) => eprintln!("Failed to initialise logging: {}", e),
    }
}

/// Switches to the configured level unless `RUST_LOG` is set.
fn apply_log_level(config: &Config) -> Result<()> {
    if std::env::var_os(LOG_ENV).is_none() {
        log::set_max_level(config.log_level()?);
    }
    Ok(())
}

/// Resolves on Ctrl+C, or after `runtime` seconds when one is given.
async fn shutdown_signal(runtime: Option<u64>) {
    let limit = async {
        match runtime {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => futures::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown signal received");
        }
        _ = limit => info!("Runtime limit reached"),
    }
}

/// Main application entry point
///
/// Reads the configuration, starts the serial link task and then drives the
/// frame handler and publisher from a single loop until shutdown.
pub async fn app(options: Options) -> Result<()> {
    init_logging();

    let config = Config::new(options.config_file.clone())?;
    apply_log_level(&config)?;

    info!("vedirect-bridge {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);
    config.log_summary();

    let (tx, mut source) = source::channel(config.vedirect.buffer_size());

    let mut handler = FrameHandler::new().with_hex_handler(config.vedirect.hex_handler());
    handler.set_poll_interval(config.vedirect.poll_interval());

    let link_handle = if config.vedirect.enabled() {
        let mut link = SerialLink::new(config.vedirect.clone(), tx);
        Some(tokio::spawn(async move {
            if let Err(e) = link.start().await {
                error!("serial link task failed: {}", e);
            }
        }))
    } else {
        info!("VE.Direct input disabled, nothing to decode");
        drop(tx);
        None
    };

    let mut publisher = Publisher::new(&config.publish)?;
    let mut ticker = tokio::time::interval(Duration::from_millis(POLL_TICK_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = shutdown_signal(options.runtime);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                handler.poll(&mut source);

                let now = Instant::now();
                if publisher.due(now, handler.last_update()) {
                    if let Err(e) = publisher.publish(&handler, now) {
                        error!("Failed to publish live data: {}", e);
                    }
                }
            }
        }
    }

    info!("Stopping...");
    drop(source);
    if let Some(handle) = link_handle {
        handle.abort();
        let _ = handle.await;
    }

    let stats = handler.stats();
    info!(
        "Frames: {} valid, {} invalid, {} hex; {} bytes received; {} publishes",
        stats.frames_valid,
        stats.frames_invalid,
        stats.hex_frames,
        stats.bytes_received,
        publisher.published()
    );
    info!("Shutdown complete");

    Ok(())
}
