//! EmberDB Server Binary
//!
//! Opens one table and serves it over TCP.

use std::sync::atomic::Ordering;

use clap::Parser;
use emberdb::db::TableDef;
use emberdb::network::Server;
use emberdb::{Config, Database};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberDB Server
#[derive(Parser, Debug)]
#[command(name = "emberdb-server")]
#[command(about = "Single-table B-tree database server")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./emberdb_data")]
    data_dir: String,

    /// Table name
    #[arg(short, long, default_value = "main")]
    table: String,

    /// Schema for a new table, e.g. "(ID INT, NAME BYTE) PRIMARY(ID) UNIQUE(NAME)"
    #[arg(short, long)]
    schema: Option<String>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:3030")]
    listen: String,

    /// Page size in bytes
    #[arg(short, long, default_value = "4096")]
    page_size: usize,

    /// Minimum node fill as a fraction of the page
    #[arg(long, default_value = "0.5")]
    min_fill: f32,

    /// Maximum node fill as a fraction of the page
    #[arg(long, default_value = "0.95")]
    max_fill: f32,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,emberdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("EmberDB Server v{}", emberdb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = match Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .page_size(args.page_size)
        .min_fill_percent(args.min_fill)
        .max_fill_percent(args.max_fill)
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let def = match args.schema.as_deref().map(TableDef::parse).transpose() {
        Ok(def) => def,
        Err(e) => {
            tracing::error!("Invalid schema: {}", e);
            std::process::exit(1);
        }
    };

    let db = match Database::open(&config.data_dir, &args.table, def, config.store) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open table {}: {}", args.table, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Table {} ready", db.name());

    let mut server = match Server::bind(&config, db) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    let mut db = server.into_database();
    if let Err(e) = db.close() {
        tracing::error!("Failed to close table {}: {}", db.name(), e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
