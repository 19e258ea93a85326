//! idfill CLI: operator interface to the vector id backfill.

use clap::{Parser, Subcommand};
use idfill::config::Config;
use idfill::engine::{Backfill, RunReport};
use idfill::identifier::{digest_hex, identifier_of};
use idfill::store::memory::DEFAULT_KEY_ATTR;
use idfill::store::{MemoryStore, PgStore, Store};
use idfill::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "idfill", about = "Backfill key-derived vector ids onto store records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Backfill the identifier field on every record that lacks it
    Run {
        /// Operate on a JSON array of records instead of Postgres
        #[arg(long)]
        file: Option<PathBuf>,
        /// Attribute holding the record key in --file records
        #[arg(long, default_value = DEFAULT_KEY_ATTR)]
        key_attr: String,
        /// Batches processed at the same time [env: IDFILL_CONCURRENCY]
        #[arg(long)]
        concurrency: Option<usize>,
        /// Records per batch [env: IDFILL_BATCH_SIZE]
        #[arg(long)]
        batch_size: Option<usize>,
        /// Field to populate [env: IDFILL_FIELD]
        #[arg(long)]
        field: Option<String>,
        /// Enumerate and report what would change, without writing
        #[arg(long)]
        dry_run: bool,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the vector id for one or more keys
    Id {
        /// Record keys
        #[arg(required = true)]
        keys: Vec<String>,
        /// Also print the SHA-1 digest
        #[arg(long)]
        digest: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            file,
            key_attr,
            concurrency,
            batch_size,
            field,
            dry_run,
            json,
        } => {
            let mut config = Config::from_env()?;
            if let Some(n) = concurrency {
                config.run.concurrency = n;
            }
            if let Some(n) = batch_size {
                config.run.batch_size = n;
            }
            if let Some(f) = field {
                config.run.identifier_field = f;
            }
            config.run.validate()?;

            let _guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "idfill".to_string(),
                log_level: config.log_level.clone(),
            })?;

            match file {
                Some(path) => cmd_run_file(&config, path, &key_attr, dry_run, json).await,
                None => cmd_run_postgres(&config, dry_run, json).await,
            }
        }
        Command::Id { keys, digest } => {
            cmd_id(&keys, digest);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn cmd_run_file(
    config: &Config,
    path: PathBuf,
    key_attr: &str,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let store = Arc::new(MemoryStore::load_json(&path, key_attr)?);
    let code = run(config, Arc::clone(&store) as Arc<dyn Store>, dry_run, json).await?;
    if !dry_run {
        store.save_json(&path)?;
        tracing::info!(path = %path.display(), "records written back");
    }
    Ok(code)
}

async fn cmd_run_postgres(config: &Config, dry_run: bool, json: bool) -> anyhow::Result<ExitCode> {
    let url = config.require_database_url()?;
    let max_connections = u32::try_from(config.run.concurrency).unwrap_or(u32::MAX);
    let store = PgStore::connect(url.expose_secret(), max_connections).await?;
    store.migrate().await?;
    run(config, Arc::new(store), dry_run, json).await
}

async fn run(
    config: &Config,
    store: Arc<dyn Store>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let backfill = Backfill::new(store, config.run.clone())?;

    if dry_run {
        let (_, survey) = backfill.survey().await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&survey)?);
        } else {
            println!("{survey}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight batches");
            on_interrupt.cancel();
        }
    });

    let report = backfill.run_until(cancel).await?;
    print_report(&report, json)?;

    Ok(if report.summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Run:        {}", report.run_id);
    println!("Field:      {}", report.identifier_field);
    println!("Started:    {}", report.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Finished:   {}", report.finished_at.format("%Y-%m-%d %H:%M:%S"));
    println!("---");
    println!("{}", report.survey);
    if report.survey.pending == 0 {
        println!("All records already have an identifier. Nothing to do.");
    }
    println!("---");
    println!("{}", report.summary);
    Ok(())
}

fn cmd_id(keys: &[String], digest: bool) {
    for key in keys {
        if digest {
            println!("{}\t{}\t{key}", identifier_of(key), digest_hex(key));
        } else {
            println!("{}\t{key}", identifier_of(key));
        }
    }
}
