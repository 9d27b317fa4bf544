//! NERDm Record Editor REST API Server
//!
//! Serves editable copies of NERDm records staged from the metadata service.

use anyhow::Context;
use clap::Parser;
use ned_api::{create_router, ApiConfig, ApiState, DEFAULT_BASE_PATH, DEFAULT_MAX_BODY_BYTES};
use ned_editor::{AccessGuard, AllowAll, EditorConfig, TokenGuard};
use ned_source::{HttpSourceFetcher, SourceFetcher};
use ned_storage::memory::InMemoryRecordStore;
use ned_storage::RecordStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// NERDm Record Editor REST API Server
#[derive(Parser, Debug)]
#[command(
    name = "ned-server",
    about = "REST API server for editing staged NERDm records",
    long_about = "An HTTP server that fetches NERDm records from the metadata service on first access,\n\
                  stages an editable copy, and applies JSON merge patches to it.",
    version
)]
struct Args {
    /// Server host address
    #[arg(
        short = 'H',
        long,
        default_value = "0.0.0.0",
        env = "NED_HOST",
        help = "Host address to bind the server to"
    )]
    host: String,

    /// Server port
    #[arg(
        short,
        long,
        default_value = "3000",
        env = "NED_PORT",
        help = "Port number to bind the server to"
    )]
    port: u16,

    /// Logging level
    #[arg(
        short,
        long,
        default_value = "info",
        env = "RUST_LOG",
        help = "Logging level (trace, debug, info, warn, error)"
    )]
    log_level: String,

    /// Enable JSON formatted logs
    #[arg(
        long,
        default_value = "false",
        env = "NED_JSON_LOGS",
        help = "Output logs in JSON format"
    )]
    json_logs: bool,

    #[arg(
        long,
        default_value = DEFAULT_BASE_PATH,
        env = "NED_BASE_PATH",
        help = "Path prefix for the record endpoints"
    )]
    base_path: String,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_BODY_BYTES,
        env = "NED_MAX_BODY_BYTES",
        help = "Largest accepted request body, in bytes"
    )]
    max_body_bytes: usize,

    #[arg(
        long,
        env = "NED_METADATA_URL",
        help = "Base URL of the metadata service; records are read from <url>/<ediid>"
    )]
    metadata_url: String,

    #[arg(
        long,
        env = "NED_METADATA_TOKEN",
        hide_env_values = true,
        help = "Bearer token sent to the metadata service"
    )]
    metadata_token: Option<String>,

    #[arg(
        long,
        default_value = "30",
        env = "NED_FETCH_TIMEOUT_SECS",
        help = "Timeout for metadata service requests, in seconds"
    )]
    fetch_timeout_secs: u64,

    #[arg(
        long,
        env = "NED_DB_PATH",
        help = "SQLite file for staged records; staged records are kept in memory when omitted"
    )]
    db_path: Option<PathBuf>,

    #[arg(
        long,
        env = "NED_AUTH_TOKENS",
        value_delimiter = ',',
        hide_env_values = true,
        help = "Bearer tokens allowed to read and edit; all requests are allowed when no token is set"
    )]
    auth_tokens: Vec<String>,

    #[arg(
        long,
        env = "NED_READ_ONLY_TOKENS",
        value_delimiter = ',',
        hide_env_values = true,
        help = "Bearer tokens allowed to read only"
    )]
    read_only_tokens: Vec<String>,

    #[arg(
        long,
        env = "NED_PROTECTED_FIELDS",
        value_delimiter = ',',
        default_value = "@id,ediid",
        help = "Top-level record fields that patches may not change"
    )]
    protected_fields: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    init_tracing(&args);

    // Build socket address
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid host or port: {}:{}", args.host, args.port))?;

    let store = open_store(&args)?;
    let source = build_source(&args)?;
    let guard = build_guard(&args);

    let editor_config = EditorConfig::new().with_protected_fields(args.protected_fields.iter().cloned());
    let api_config = ApiConfig::default()
        .with_base_path(&args.base_path)
        .with_max_body_bytes(args.max_body_bytes);

    let state = ApiState::new(store, source, guard, editor_config);
    let app = create_router(state, &api_config);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    // Print startup information
    print_banner(&addr, &api_config);

    // Start the server
    info!("Server starting on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Initialize tracing subscriber with appropriate configuration
fn init_tracing(args: &Args) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        // JSON formatted logs for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        // Human-readable logs for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[cfg(feature = "sqlite")]
fn open_store(args: &Args) -> anyhow::Result<Arc<dyn RecordStore>> {
    match &args.db_path {
        Some(path) => {
            let store = ned_storage::sqlite::SqliteRecordStore::open(path)
                .with_context(|| format!("Failed to open staging database {}", path.display()))?;
            info!(path = %path.display(), "using SQLite staging store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no database path set; staged records will be lost on restart");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
    }
}

#[cfg(not(feature = "sqlite"))]
fn open_store(args: &Args) -> anyhow::Result<Arc<dyn RecordStore>> {
    if args.db_path.is_some() {
        anyhow::bail!("--db-path requires the `sqlite` feature");
    }
    warn!("no database path set; staged records will be lost on restart");
    Ok(Arc::new(InMemoryRecordStore::new()))
}

fn build_source(args: &Args) -> anyhow::Result<Arc<dyn SourceFetcher>> {
    let timeout = Duration::from_secs(args.fetch_timeout_secs);
    let mut fetcher = HttpSourceFetcher::with_timeout(&args.metadata_url, timeout)
        .context("Failed to create metadata service client")?;
    if let Some(token) = &args.metadata_token {
        fetcher = fetcher.with_bearer_token(token.clone());
    }
    info!(url = %fetcher.base_url(), timeout_secs = args.fetch_timeout_secs, "metadata service configured");
    Ok(Arc::new(fetcher))
}

fn build_guard(args: &Args) -> Arc<dyn AccessGuard> {
    let guard = TokenGuard::from_tokens(args.auth_tokens.clone(), args.read_only_tokens.clone());
    if guard.is_empty() {
        warn!("no auth tokens configured; every request is allowed");
        Arc::new(AllowAll)
    } else {
        Arc::new(guard)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Print startup banner with server information
fn print_banner(addr: &SocketAddr, config: &ApiConfig) {
    let base = &config.base_path;

    println!();
    println!("  NERDm Record Editor - REST API Server");
    println!();
    println!("  Server Address:    http://{}", addr);
    println!("  Health Check:      http://{}/health", addr);
    println!();
    println!("  Record Operations:");
    println!("     GET    {base}/{{ediid}}   - Get editable record");
    println!("     PATCH  {base}/{{ediid}}   - Merge changes into record");
    println!("     DELETE {base}/{{ediid}}   - Discard changes");
    println!();
    println!("  System Operations:");
    println!("     GET    /health            - Health check");
    println!("     GET    /system/stats      - System statistics (token required when auth is on)");
    println!();
}
