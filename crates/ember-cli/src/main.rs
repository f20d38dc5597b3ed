//! Ember CLI - serve a model file from the command line

mod cli;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context};
use clap::Parser;
use futures::{stream, StreamExt};
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use ember::config::resolve_relative;
use ember::engine::{ReloadCoordinator, ReloadScheduler};
use ember::serve::{lines, Presenter, RequestLoop, SessionReport};
use ember::{Evaluator, JsonModelLoader, ModelWatcher, ServeConfig};
use cli::Cli;

type Session = RequestLoop<JsonModelLoader, Box<dyn Presenter>>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read must not hold the process open
    runtime.shutdown_background();
    result
}

/// Logs go to stderr so stdout only carries results.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ServeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let batch = match &cli.batch {
        Some(path) => {
            let resolved = resolve_relative(path);
            if !resolved.is_file() {
                bail!("batch file {} does not exist", path.display());
            }
            Some(resolved)
        }
        None => None,
    };

    let model_path = config.resolved_model_path();
    let coordinator = ReloadCoordinator::load(JsonModelLoader, model_path.clone())
        .await
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    let coordinator = Arc::new(coordinator);

    let mut session: Session = RequestLoop::new(coordinator.clone(), config.output.presenter(io::stdout()))
        .with_exit_sentinel(&config.exit_sentinel);
    session
        .presenter_mut()
        .notice(&format!("Model loaded from: {}", coordinator.current().describe()))?;

    let mut report = SessionReport::default();
    if let Some(line) = cli.sample_line() {
        report.merge(session.run_batch(stream::iter([Ok(line)])).await?);
    }
    match &batch {
        Some(path) => report.merge(run_batch_file(&mut session, path).await?),
        None if cli.features.is_empty() => {
            let line = config.default_sample.clone();
            report.merge(session.run_batch(stream::iter([Ok(line)])).await?);
        }
        None => {}
    }

    if config.watch {
        report.merge(serve_interactive(&mut session, coordinator, config.debounce(), &config.exit_sentinel).await?);
    } else {
        session.close()?;
    }

    info!(
        predictions = report.predictions,
        input_errors = report.input_errors,
        evaluation_failures = report.evaluation_failures,
        "session finished"
    );
    Ok(())
}

async fn run_batch_file(session: &mut Session, path: &Path) -> anyhow::Result<SessionReport> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open batch file {}", path.display()))?;
    let report = session
        .run_batch(lines(BufReader::new(file)))
        .await
        .with_context(|| format!("failed to process batch file {}", path.display()))?;
    Ok(report)
}

/// Reads samples from stdin until the sentinel, end of input or Ctrl-C,
/// reloading the model whenever its file changes.
async fn serve_interactive(
    session: &mut Session,
    coordinator: Arc<ReloadCoordinator<JsonModelLoader>>,
    debounce: Duration,
    exit_sentinel: &str,
) -> anyhow::Result<SessionReport> {
    let scheduler = ReloadScheduler::spawn(coordinator.clone(), debounce);
    let watcher = match ModelWatcher::spawn(coordinator.path(), scheduler.signal()) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            error!(error = %err, "could not watch model file, hot reload disabled");
            None
        }
    };

    session.presenter_mut().notice(&format!(
        "Watching {} for changes. Enter samples one per line, '{}' to quit.",
        coordinator.path().display(),
        exit_sentinel
    ))?;

    let stdin = lines(BufReader::new(tokio::io::stdin())).take_until(interrupted());
    let result = session.run_interactive(stdin).await;

    if let Some(watcher) = watcher {
        watcher.stop().await;
    }
    scheduler.stop().await;

    Ok(result?)
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, closing session"),
        Err(err) => {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
