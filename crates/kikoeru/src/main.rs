use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use kikoeru_archive::{ExtractOptions, NativeExtractor};
use kikoeru_core::{
    Classifier, Config, FanoutReporter, JsonLinesReporter, Monitor, Overrides, RecursiveExtractor,
    TracingReporter,
};
use tracing::info;

use crate::cli::{App, Commands, ConfigArg, MonitorArg, ProcessArg};

mod cli;
mod logging;

const MONITOR_LOG_NAME: &str = "monitor.log";
const PROCESS_LOG_NAME: &str = "helper.log";

fn main() -> ExitCode {
    let app = App::parse();
    let result = match app.cmd {
        Commands::Monitor(arg) => monitor(arg),
        Commands::Process(arg) => process(arg),
        Commands::Config(arg) => print_config(arg),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("kikoeru: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn monitor(arg: MonitorArg) -> Result<ExitCode> {
    let work_dir = canonical(&arg.dir)?;
    if !work_dir.is_dir() {
        bail!("{} is not a directory", work_dir.display());
    }
    let config = Config::load(&work_dir, arg.config.as_deref(), &arg.overrides())?;
    let log_dir = config.log_dir();
    logging::init(&log_dir, MONITOR_LOG_NAME)?;

    let reporter = FanoutReporter::new()
        .with(JsonLinesReporter::in_dir(&log_dir))
        .with(TracingReporter);
    let monitor = Monitor::new(
        &config.work_dir,
        config.poll_interval(),
        config.stability_policy(),
        pipeline(&config),
        Arc::new(reporter),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    runtime.block_on(monitor.run(shutdown_signal()))?;
    Ok(ExitCode::SUCCESS)
}

fn process(arg: ProcessArg) -> Result<ExitCode> {
    let archive = canonical(&arg.file)?;
    let work_dir = archive
        .parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("{} has no parent directory", archive.display()))?;
    let overrides = Overrides {
        log_dir: arg.log_dir,
        ..Overrides::default()
    };
    let config = Config::load(&work_dir, arg.config.as_deref(), &overrides)?;
    let log_dir = config.log_dir();
    logging::init(&log_dir, PROCESS_LOG_NAME)?;

    let reporter = FanoutReporter::new()
        .with(JsonLinesReporter::in_dir(&log_dir))
        .with(TracingReporter);
    let outcome = pipeline(&config).run_reported(&archive, &reporter);
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_config(arg: ConfigArg) -> Result<ExitCode> {
    let work_dir = canonical(&arg.dir)?;
    let config = Config::load(&work_dir, arg.config.as_deref(), &Overrides::default())?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

fn pipeline(config: &Config) -> RecursiveExtractor<NativeExtractor> {
    let options = ExtractOptions::default().unrar_program(&config.unrar_program);
    RecursiveExtractor::new(
        NativeExtractor::new(options),
        Classifier::new(config.marker_prefix.clone()),
    )
    .max_depth(config.max_depth)
}

/// Results are placed next to the archive, so relative paths must be resolved first.
fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("cannot resolve {}", path.display()))
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut sigterm), Ok(mut sigint)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) else {
        tracing::warn!("signal handlers unavailable, stop with a kill");
        return std::future::pending().await;
    };
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received Ctrl-C");
    } else {
        std::future::pending::<()>().await;
    }
}
