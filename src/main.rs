use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod api;
mod config;
mod error;
mod ingest;
mod shutdown;
mod sink;
mod worker;

use crate::api::{
    catalog::catalog_config,
    health::health_config,
    ingest::{ingest_config, IngestService},
    validation,
};
use crate::ingest::ledger::new_job_id;
use crate::ingest::{DirLineSource, IngestMode, IngestOptions, IngestOrchestrator, JobLedger, JobStatus};
use crate::shutdown::ShutdownCoordinator;
use crate::sink::{DiscountRegistry, LocalSink, ProductCatalog};
use crate::worker::JobPool;

#[derive(Parser)]
#[command(name = "catalog-ingest", version, about = "Catalog and discount NDJSON ingestion service")]
struct Cli {
    /// Directory holding products.ndjson and discounts.ndjson (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one ingestion job in the foreground and print its final status as JSON
    Ingest {
        /// products, discounts or all
        #[arg(long, default_value = "all")]
        mode: String,
        #[arg(long, default_value_t = ingest::options::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(
            long,
            default_value_t = ingest::options::DEFAULT_RETRIES,
            value_parser = clap::value_parser!(u32).range(0..=ingest::options::MAX_RETRIES as i64)
        )]
        retries: u32,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        fail_fast: bool,
    },
}

fn file_layer<S>(log_dir: &str, file_name: &str, level: LevelFilter) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer::<S>()
        .with_writer(tracing_appender::rolling::daily(log_dir, file_name))
        .with_ansi(false)
        .with_filter(level)
}

/// Console output plus daily rotating files per level
/// (logs/info.log.2024-12-22, logs/error.log.2024-12-22, ...)
fn init_tracing(log_dir: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    // stdout is reserved for the JSON printed by `ingest`
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer(log_dir, "info.log", LevelFilter::INFO))
        .with(file_layer(log_dir, "warn.log", LevelFilter::WARN))
        .with(file_layer(log_dir, "error.log", LevelFilter::ERROR))
        .with(file_layer(log_dir, "debug.log", LevelFilter::DEBUG))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = config::Config::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    if let Err(e) = init_tracing(&config.log_dir) {
        eprintln!("Failed to initialise logging in {}: {}", config.log_dir, e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await.map(|_| ExitCode::SUCCESS)
        }
        Command::Ingest {
            mode,
            chunk_size,
            retries,
            dry_run,
            fail_fast,
        } => {
            let options = IngestOptions {
                mode: IngestMode::parse(Some(mode.as_str())),
                chunk_size: chunk_size.max(1),
                retries,
                dry_run,
                fail_fast,
            };
            ingest_once(&config, options).await
        }
    };

    result.unwrap_or_else(|e| {
        error!("Fatal error: {}", e);
        ExitCode::FAILURE
    })
}

async fn serve(config: config::Config) -> std::io::Result<()> {
    info!("Starting catalog-ingest service");
    info!("Configuration loaded successfully:");
    info!("  - Data directory: {}", config.data_dir);
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Max concurrent jobs: {}", config.max_concurrent_jobs);
    info!("  - Error sample cap: {}", config.error_sample_cap);

    let catalog = Arc::new(ProductCatalog::new());
    let discounts = Arc::new(DiscountRegistry::new());
    let sink = LocalSink::new(catalog.clone(), discounts.clone());
    let orchestrator = IngestOrchestrator::new(
        Arc::new(DirLineSource::new(&config.data_dir)),
        Arc::new(sink),
    );

    let pool = Arc::new(JobPool::new(config.max_concurrent_jobs));
    let ingest_service = web::Data::new(IngestService::new(
        Arc::new(JobLedger::new(config.error_sample_cap)),
        Arc::new(orchestrator),
        pool.clone(),
    ));
    let catalog = web::Data::from(catalog);
    let discounts = web::Data::from(discounts);
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(ingest_service.clone())
            .app_data(catalog.clone())
            .app_data(discounts.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .configure(health_config)
            .configure(ingest_config)
            .configure(catalog_config)
    });

    info!("Server starting on http://{}:{}", config.bind_addr, config.port);

    let server = server.bind((config.bind_addr.as_str(), config.port))?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    ShutdownCoordinator::new(server_handle, server_task, pool)
        .wait_for_shutdown()
        .await
}

/// Run a single job against fresh in-process stores
async fn ingest_once(config: &config::Config, options: IngestOptions) -> std::io::Result<ExitCode> {
    let ledger = JobLedger::new(config.error_sample_cap);
    let sink = LocalSink::default();
    let orchestrator = IngestOrchestrator::new(
        Arc::new(DirLineSource::new(&config.data_dir)),
        Arc::new(sink.clone()),
    );

    let job_id = new_job_id();
    let job = ledger
        .register(&job_id, &options.mode.kinds())
        .ok_or_else(|| std::io::Error::other(format!("job id collision: {}", job_id)))?;
    job.start();

    let status = orchestrator.run(job.clone(), options).await;
    info!(
        "Stores after ingestion: {} product(s), {} discount(s)",
        sink.catalog.len(),
        sink.discounts.len()
    );

    let view = serde_json::to_string_pretty(&job.snapshot()).map_err(std::io::Error::other)?;
    println!("{}", view);

    Ok(if status == JobStatus::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
