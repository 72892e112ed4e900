use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::Context;
use axum_server::{Handle, Server};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use solace_core::db::{Database, PoolSettings};
use solace_core::tasks::spawn_typing_expiry_task;
use solace_server::{build_router, AppState, Repositories};

#[derive(Parser, Debug, Clone)]
#[command(name = "solace")]
#[command(author, version, about = "Solace - real-time sessions and messaging for peer support")]
struct Args {
    /// Address to which the server will bind
    #[arg(long, env = "SOLACE_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://solace@localhost:5432/solace")]
    database_url: String,

    #[arg(long, env = "SOLACE_DB_MAX_CONNECTIONS", default_value_t = 10)]
    db_max_connections: u32,

    /// Seconds to wait for a free pooled connection.
    #[arg(long, env = "SOLACE_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    db_acquire_timeout_secs: u64,

    /// How long a typing indicator survives without a refresh.
    #[arg(long, env = "SOLACE_TYPING_TTL_SECS", default_value_t = 8)]
    typing_ttl_secs: u64,

    /// How often stale typing indicators are swept.
    #[arg(long, env = "SOLACE_TYPING_SWEEP_MS", default_value_t = 1000)]
    typing_sweep_ms: u64,

    /// Skip applying migrations at startup
    #[arg(long, env = "SOLACE_SKIP_MIGRATIONS", default_value = "false")]
    skip_migrations: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("solace=info,solace_core=info,solace_server=info,tower_http=info"));
    let sub = fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(sub).is_err() {
        eprintln!("A global tracing subscriber was already installed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments pass the environment directly.
    let _ = dotenv::dotenv();
    init_tracing();
    let args = Args::parse();
    info!(
        "Solace starting. bind={}, typing_ttl={}s, sweep={}ms",
        args.bind_addr, args.typing_ttl_secs, args.typing_sweep_ms
    );

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let pool_settings = PoolSettings {
        max_connections: args.db_max_connections,
        acquire_timeout: Duration::from_secs(args.db_acquire_timeout_secs),
    };
    let db = Database::connect(&args.database_url, &pool_settings)
        .await
        .context("connecting to Postgres")?;
    if args.skip_migrations {
        warn!("Skipping migrations (--skip-migrations)");
    } else {
        db.migrate().await.context("applying migrations")?;
    }

    let state = AppState::new(
        Repositories::postgres(&db),
        Duration::from_secs(args.typing_ttl_secs),
    );
    let sweeper = spawn_typing_expiry_task(
        state.presence.clone(),
        Duration::from_millis(args.typing_sweep_ms),
    );

    let app = build_router(state);

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received; shutting down."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    info!("Listening on http://{}", args.bind_addr);
    Server::bind(args.bind_addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("serving HTTP")?;

    sweeper.abort();
    info!("Server shut down.");
    Ok(())
}
