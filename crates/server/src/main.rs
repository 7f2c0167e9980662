//! runq-server: HTTP front end for the run task queue.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use runq_core::Config;
use runq_queue::{
    InMemoryQueue, InMemoryRunRegistry, PgQueue, RetryPolicy, RunScheduler, TransitionPolicy,
    WorkerQueue,
};
use runq_server::{build_router, db, AppState};

// ── CLI ─────────────────────────────────────────────────────────────

/// Run task queue server.
#[derive(Parser, Debug)]
#[command(name = "runq-server", version, about)]
struct Cli {
    /// Config profile (overrides RUNQ_PROFILE); keys are read as
    /// `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long)]
    profile: Option<String>,

    /// Bind host (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Backing queue: "memory" or "postgres" (overrides QUEUE_BACKEND).
    #[arg(long)]
    backend: Option<String>,
}

fn load_config(cli: &Cli) -> Config {
    runq_core::config::load_dotenv();
    let mut config = match &cli.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(backend) = &cli.backend {
        config.queue.backend = backend.to_lowercase();
    }
    config
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);
    config.log_summary();

    let retry = RetryPolicy::from_config(&config.queue);
    let mut memory = None;
    let queue: Arc<dyn WorkerQueue> = if config.queue.uses_postgres() {
        let pool = db::init_pg_pool(&config.postgres).await?;
        Arc::new(PgQueue::from_pool(pool, retry))
    } else {
        if config.queue.backend != "memory" {
            warn!(backend = %config.queue.backend, "Unknown queue backend, using in-memory queue");
        }
        let queue = Arc::new(InMemoryQueue::new(retry));
        memory = Some(Arc::clone(&queue));
        queue
    };

    let policy = TransitionPolicy::from_strict_flag(config.queue.strict_transitions);
    let registry = Arc::new(InMemoryRunRegistry::new());
    let scheduler = RunScheduler::new(queue, registry).with_policy(policy);
    info!(policy = ?scheduler.policy(), "Run scheduler ready");

    let addr = config.server.bind_addr();
    let state = Arc::new(AppState { scheduler, config });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(queue) = memory {
        queue.shutdown();
    }
    info!("runq-server exited cleanly");
    Ok(())
}
