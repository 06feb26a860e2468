use std::time::Duration;

use clap::Parser;
use deletion_worker::{
    AppState, build_app,
    config::{self, WorkerConfig},
    jobs, observability,
    services::Orchestrator,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// CLI arguments for the deletion worker
#[derive(Parser, Debug)]
#[command(version, about = "Deletes files marked for deletion", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to a built-in config that reads
    /// SUPABASE_URL, SUPABASE_KEY, BALANCER_URL and PORT from the environment)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server and the optional schedule (default)
    Serve,
    /// Perform a single deletion run, print the report as JSON and exit
    ///
    /// Exits with status 1 if the files eligible for deletion could not be
    /// fetched. Individual file failures are reported, not treated as errors.
    Run,
    /// Load and validate the configuration, then exit
    Check,
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Warning: failed to load .env file: {e}");
    }

    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(args.config.as_deref()).await,
        Command::Run => run_once(args.config.as_deref()).await,
        Command::Check => run_check(args.config.as_deref()),
    }
}

/// Load the config file, or the built-in default when no path is given.
///
/// Exits the process on failure.
fn load_config(path: Option<&str>) -> WorkerConfig {
    let result = match path {
        Some(path) => WorkerConfig::from_file(path),
        None => WorkerConfig::from_str(config::default_config_toml()),
    };

    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Failed to load config from {}: {}",
                path.unwrap_or("environment"),
                e
            );
            std::process::exit(1);
        }
    }
}

fn init_tracing_or_exit(config: &WorkerConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = load_config(config_path);
    init_tracing_or_exit(&config);

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    tracing::info!(
        config_file = config_path.unwrap_or("<built-in>"),
        eligibility = %config.eligibility.rpc_url(),
        executor = %config.executor.delete_url(),
        concurrency = config.executor.concurrency,
        "Starting deletion worker"
    );

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    };

    state.task_tracker.spawn(jobs::start_deletion_worker(
        state.orchestrator.clone(),
        config.schedule.clone(),
        state.shutdown.clone(),
    ));

    let task_tracker = state.task_tracker.clone();
    let shutdown = state.shutdown.clone();
    let app = build_app(&config, state);

    let bind_addr = config.server.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_addr, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    // Graceful shutdown: wait for SIGINT/SIGTERM, then wait for all background tasks
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(task_tracker, shutdown))
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn run_once(config_path: Option<&str>) {
    let config = load_config(config_path);
    init_tracing_or_exit(&config);

    let http_client = match config.server.http_client.build_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let orchestrator = Orchestrator::from_config(&config, http_client);

    // Ctrl+C stops dispatching; the partial report is still printed
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight deletions");
            on_signal.cancel();
        }
    });

    match orchestrator.run_until_cancelled(cancel).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run_check(config_path: Option<&str>) {
    let config = load_config(config_path);

    println!("Configuration OK");
    println!("  listen:       {}", config.server.bind_addr());
    println!("  eligibility:  {}", config.eligibility.rpc_url());
    println!("  executor:     {}", config.executor.delete_url());
    println!("  concurrency:  {}", config.executor.concurrency);
    match config.executor.run_timeout() {
        Some(timeout) => println!("  run timeout:  {}s", timeout.as_secs()),
        None => println!("  run timeout:  none"),
    }
    if config.schedule.enabled {
        println!("  schedule:     every {}s", config.schedule.interval_secs);
    } else {
        println!("  schedule:     disabled");
    }
    if config.observability.metrics.enabled {
        println!("  metrics:      {}", config.observability.metrics.path);
    }
}

async fn shutdown_signal(task_tracker: TaskTracker, shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, waiting for background tasks to complete...");

    // Stop new dispatches in any running deletion pass
    shutdown.cancel();
    task_tracker.close();

    let wait_result = tokio::time::timeout(Duration::from_secs(30), task_tracker.wait()).await;

    match wait_result {
        Ok(()) => tracing::info!("All background tasks completed"),
        Err(_) => {
            tracing::warn!("Timeout waiting for background tasks, some may not have completed")
        }
    }

    tracing::info!("Shutdown complete");
}
