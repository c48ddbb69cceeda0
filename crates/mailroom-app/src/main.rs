//! Mailroom application binary - composition root.
//!
//! 1. Load configuration from TOML and install tracing. A missing or broken
//!    config file falls back to defaults; the warning is held back until
//!    tracing is installed, since the log level itself comes from the file.
//! 2. Load and validate the intent rule set (abort on any error)
//! 3. Open SQLite storage and pick the action executor
//! 4. Start the intake worker and the axum API server
//! 5. On Ctrl-C stop accepting, drain queued messages, exit

mod cli;

use std::sync::Arc;

use clap::Parser;

use mailroom_api::routes;
use mailroom_api::state::AppState;
use mailroom_core::boundary::ActionExecutor;
use mailroom_core::config::{ExecutorKind, MailroomConfig};
use mailroom_pipeline::{intake, Orchestrator, RuleSet};
use mailroom_storage::{Database, LoggingActionExecutor, SqliteActionExecutor, SqliteFailureStore};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing exists so the log level can come from it.
    let config_file = args.resolve_config_path();
    let loaded = MailroomConfig::load(&config_file);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => MailroomConfig::default(),
    };

    // Tracing. RUST_LOG wins over --log-level and the config file.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Mailroom v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Configuration not loaded, using defaults"
        ),
    }

    // Rules.
    let rules_path = args.resolve_rules_path(&config.pipeline.rules_path);
    let rules = match RuleSet::load(&rules_path) {
        Ok(rules) => Arc::new(rules),
        Err(e) => {
            tracing::error!(path = %rules_path.display(), "Refusing to start: {}", e);
            return Err(e.into());
        }
    };

    // Storage.
    let db_path = args.resolve_database_path(&config.storage.database_path);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let executor: Arc<dyn ActionExecutor> = match config.storage.executor {
        ExecutorKind::Sqlite => Arc::new(SqliteActionExecutor::new(Arc::clone(&db))),
        ExecutorKind::Log => Arc::new(LoggingActionExecutor),
    };
    tracing::info!(executor = ?config.storage.executor, "Action executor ready");
    let failures = Arc::new(SqliteFailureStore::new(Arc::clone(&db)));

    // Pipeline.
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&rules),
        executor,
        failures.clone(),
    ));
    let (intake, worker) = intake::channel(
        orchestrator,
        config.pipeline.queue_capacity,
        config.pipeline.max_concurrent_runs,
    );
    let worker_shutdown = worker.shutdown_handle();
    let worker_task = tokio::spawn(worker.run());

    // API server.
    let mut general = config.general.clone();
    general.port = args.resolve_port(config.general.port);
    let state = AppState::new(intake, rules, failures);

    let served = routes::start_server(&general, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
    })
    .await;

    worker_shutdown.shutdown();
    if let Err(e) = worker_task.await {
        tracing::error!(error = %e, "Intake worker terminated abnormally");
    }

    if let Err(e) = served {
        tracing::error!(
            addr = %format!("{}:{}", general.bind_address, general.port),
            "{}",
            e
        );
        tracing::error!("Try: MAILROOM_PORT={} mailroom", general.port.saturating_add(1));
        return Err(e.into());
    }

    tracing::info!("Mailroom stopped");
    Ok(())
}
