//! Media Sorter - watch a folder and file new photos by capture date
//!
//! Long-running daemon: watches the source folder, moves every new image
//! into a date-bucketed archive and skips content already archived.

use anyhow::{Context, Result};
use clap::Parser;
use media_sorter::cache::normalize_folder;
use media_sorter::os::ShutdownSignal;
use media_sorter::{Cli, Config, Organizer, Pipeline, SourceWatcher, scan};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    // Before any thread exists, so all of them inherit the signal mask
    let shutdown = ShutdownSignal::install().context("Failed to install shutdown handler")?;

    let _guard = setup_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Media Sorter starting"
    );

    let config = load_config(&cli)?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    validate_config(&config)?;

    if config.dry_run {
        warn!("Dry run: no folders will be created and no files moved");
    }

    let organizer = Organizer::new(config.clone());
    let pipeline = Pipeline::start(organizer, config.queue_capacity)?;

    let watcher = match SourceWatcher::start(&config, pipeline.handle()) {
        Ok(watcher) => watcher,
        Err(e) => {
            pipeline.shutdown();
            return Err(e).context("Failed to watch source folder");
        }
    };

    let sweep = if config.scan_on_start {
        match scan::spawn_sweep(config.clone(), pipeline.handle()) {
            Ok(sweep) => Some(sweep),
            Err(e) => {
                error!(error = %e, "Failed to start startup scan");
                None
            }
        }
    } else {
        None
    };

    match shutdown.wait() {
        Ok(signal) => info!(signal, "Shutdown requested"),
        Err(e) => error!(error = %e, "Failed waiting for shutdown signal"),
    }

    // Stop new notifications first, then drain what was already accepted
    drop(watcher);
    let stats = pipeline.shutdown();
    if let Some(sweep) = sweep
        && sweep.join().is_err()
    {
        error!("Startup scan terminated abnormally");
    }

    info!(processed = stats.total(), "Media Sorter stopped");

    Ok(())
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Resolve config path - supports shorthand syntax
///
/// `-C nas` finds `nas`, `nas.toml`, or `<exe dir>/Config/nas.toml`.
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(&get_executable_dir()?, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    if config.source_dir.as_os_str().is_empty() {
        anyhow::bail!("No source folder given");
    }
    if config.destination_dir.as_os_str().is_empty() {
        anyhow::bail!("No destination folder given");
    }

    Ok(config)
}

/// Setup logging: console always, plus daily-rotated files with --log-dir
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    let Some(ref log_dir) = cli.log_dir else {
        subscriber.init();
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let prefix = cli
        .config_name()
        .unwrap_or_else(|| "media-sorter".to_string());
    let appender = tracing_appender::rolling::daily(log_dir, format!("{}.log", prefix));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}

/// Validate configuration before the pipeline starts
fn validate_config(config: &Config) -> Result<()> {
    if !config.source_dir.is_dir() {
        anyhow::bail!(
            "Source folder does not exist: {}",
            config.source_dir.display()
        );
    }

    let source = std::fs::canonicalize(&config.source_dir)
        .with_context(|| format!("Failed to resolve {}", config.source_dir.display()))?;
    let destination = std::fs::canonicalize(&config.destination_dir)
        .unwrap_or_else(|_| normalize_folder(&config.destination_dir));

    if destination.starts_with(&source) {
        anyhow::bail!(
            "Destination folder {} is inside source folder {}",
            destination.display(),
            source.display()
        );
    }

    Ok(())
}
