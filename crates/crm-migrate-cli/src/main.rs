//! crm-migrate CLI - Zendesk Sell to HubSpot record migration.

mod wizard;

use clap::{Parser, Subcommand};
use crm_migrate::{Config, MigrateError, MigrationResult, ObjectType, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crm-migrate")]
#[command(about = "Migrate CRM records from Zendesk Sell to HubSpot")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every page of an object type into the local cache
    Extract {
        /// Object type (contacts, companies, leads, deals, notes, tasks, calls)
        #[arg(short, long)]
        object: ObjectType,

        /// Clear the cache before extracting
        #[arg(long)]
        reset: bool,
    },

    /// Print the number of cached records
    Count {
        /// Object type (contacts, companies, leads, deals, notes, tasks, calls)
        #[arg(short, long)]
        object: ObjectType,
    },

    /// Migrate a range of cached records
    Run {
        /// Object type (contacts, companies, leads, deals, notes, tasks, calls)
        #[arg(short, long)]
        object: ObjectType,

        /// First cached record to migrate
        #[arg(long, default_value = "0")]
        start: usize,

        /// Exclusive end of the range [default: all cached records]
        #[arg(long)]
        end: Option<usize>,

        /// Records per batch, at most 100 [default: migration.batch_size]
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show cached, checkpointed and diverted counts
    Status {
        /// Object type (contacts, companies, leads, deals, notes, tasks, calls)
        #[arg(short, long)]
        object: ObjectType,
    },

    /// Pick the object, range and batch size through prompts
    Interactive,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let default_batch_size = config.migration.batch_size;
    let orchestrator = Orchestrator::new(config)?;

    match cli.command {
        Commands::Extract { object, reset } => {
            let report = orchestrator.extract(object, reset).await?;
            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\nExtraction completed!");
                println!("  Pages: {}", report.pages);
                println!("  Records: {}", report.records);
                println!("  Cached {}: {}", object.plural(), report.cached_total);
                if !report.failed_pages.is_empty() {
                    println!("  Failed pages: {:?}", report.failed_pages);
                }
            }
        }

        Commands::Count { object } => {
            let count = orchestrator.count(object).await?;
            if cli.output_json {
                println!("{}", serde_json::json!({ "object_type": object, "cached": count }));
            } else {
                println!("In total we have {} {} to migrate", count, object.plural());
            }
        }

        Commands::Run {
            object,
            start,
            end,
            batch_size,
        } => {
            let result = orchestrator
                .migrate(object, start, end, batch_size.unwrap_or(default_batch_size))
                .await?;
            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_result(&result);
            }
        }

        Commands::Status { object } => {
            let status = orchestrator.status(object).await?;
            if cli.output_json {
                println!("{}", status.to_json()?);
            } else {
                println!("{}", status);
            }
        }

        Commands::Interactive => {
            wizard::run_interactive(&orchestrator, default_batch_size)
                .await
                .map_err(|e| match e {
                    wizard::WizardError::Migrate(inner) => inner,
                    other => MigrateError::Config(other.to_string()),
                })?;
        }
    }

    Ok(())
}

pub(crate) fn print_result(result: &MigrationResult) {
    let status_msg = if result.batches_failed == 0 {
        "Migration completed!"
    } else {
        "Migration completed with errors!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Batches: {}/{}",
        result.batches_total - result.batches_failed,
        result.batches_total
    );
    println!(
        "  {}: {} created, {} updated, {} without core object, {} skipped",
        result.object_type.plural(),
        result.created,
        result.updated,
        result.diverted,
        result.skipped
    );
    for batch in result.batches.iter().filter(|b| !b.is_success()) {
        println!("  Failed: {}", batch.detail);
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        other => return Err(format!("unknown verbosity: {}", other)),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format: {}", other)),
    }

    Ok(())
}
