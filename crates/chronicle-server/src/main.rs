//! Chronicle Server - Main entry point

use anyhow::Result;
use chronicle_common::logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use chronicle_server::{
    api::{self, AppState},
    audit::{self, AuditProfile, Auditor, PgAuditStore, PgTableRepository, RetentionScheduler},
    config::Config,
    db,
};

#[derive(Parser)]
#[command(name = "chronicle-server")]
#[command(about = "Audit trail recorder for mutable entities", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and serve the HTTP API (default)
    Serve,

    /// Delete audit entries past the retention window
    Prune {
        /// Override `audit.pruning.keep_for_days` (0 to 36500)
        #[arg(long)]
        keep_days: Option<i64>,
    },

    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .log_file_prefix("chronicle-server".to_string())
        .filter_directives("chronicle_server=debug,tower_http=debug,sqlx=info".to_string())
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pool = db::create_pool(&config.database).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, pool).await,
        Commands::Prune { keep_days } => prune(&config, pool, keep_days).await,
        Commands::Migrate => Ok(db::run_migrations(&pool).await?),
    }
}

async fn serve(config: Config, pool: PgPool) -> Result<()> {
    info!("Starting Chronicle Server");

    db::run_migrations(&pool).await?;

    let auditor = Arc::new(build_auditor(&config, pool.clone())?);

    let shutdown = CancellationToken::new();
    let scheduler = if config.audit.pruning.enabled {
        let handle = RetentionScheduler::new(
            auditor.store(),
            config.audit.pruning.keep_for_days,
            Duration::from_secs(config.audit.pruning.interval_secs),
        )
        .spawn(shutdown.clone());
        Some(handle)
    } else {
        info!("Audit pruning is disabled");
        None
    };

    let state = AppState {
        db: Some(pool),
        auditor,
    };

    let timeout_secs = config.server.shutdown_timeout_secs;
    let token = shutdown.clone();
    api::serve(&config, state, async move {
        shutdown_signal(timeout_secs).await;
        token.cancel();
    })
    .await?;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        handle.await?;
    }

    Ok(())
}

async fn prune(config: &Config, pool: PgPool, keep_days: Option<i64>) -> Result<()> {
    let keep_days = keep_days.unwrap_or(config.audit.pruning.keep_for_days);
    let store = PgAuditStore::new(pool, &config.audit.table)?;
    let removed = audit::prune(&store, chrono::Utc::now(), keep_days).await?;

    info!(removed, keep_days, "Prune finished");
    Ok(())
}

/// Auditor over the Postgres store with every configured subject registered.
fn build_auditor(config: &Config, pool: PgPool) -> Result<Auditor> {
    let store = PgAuditStore::new(pool.clone(), &config.audit.table)?;
    let mut auditor = Auditor::new(Arc::new(config.audit.clone()), Arc::new(store));

    for subject in &config.audit.subjects {
        let repository = PgTableRepository::from_config(pool.clone(), subject)?;
        let profile = AuditProfile::default()
            .hidden(subject.hidden.iter().cloned())
            .soft_deletes(subject.soft_deletes)
            .updated_at_column(subject.updated_at_column.as_deref())
            .key_type(subject.key_type);

        auditor = auditor.register_subject(&subject.subject_type, profile, Some(Arc::new(repository)));
        info!(subject_type = %subject.subject_type, table = %subject.table, "Registered audit subject");
    }

    Ok(auditor)
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
