//! Interactive prompt flow for picking what to migrate.

use crm_migrate::config::clamp_batch_size;
use crm_migrate::{MigrateError, ObjectType, Orchestrator};
use dialoguer::{Confirm, Input, Select};

use crate::print_result;

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during the prompt flow.
#[derive(Debug)]
pub enum WizardError {
    /// Terminal interaction failed.
    Prompt(String),
    /// Extraction or migration failed.
    Migrate(MigrateError),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prompt(msg) => write!(f, "Prompt error: {}", msg),
            Self::Migrate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Prompt(e.to_string())
    }
}

impl From<MigrateError> for WizardError {
    fn from(e: MigrateError) -> Self {
        Self::Migrate(e)
    }
}

/// Where the records come from before a run.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DataSource {
    Remote,
    Cached,
}

/// Ask for an object type, optionally refresh its cache, then run
/// migrations over operator-chosen ranges until told to stop.
pub async fn run_interactive(orchestrator: &Orchestrator, default_batch_size: usize) -> WizardResult<()> {
    println!();
    println!("Zendesk Sell to HubSpot Migration");
    println!("=================================");
    println!();

    let object_type = prompt_object_type()?;
    let total = match prompt_data_source()? {
        DataSource::Remote => {
            let reset = Confirm::new()
                .with_prompt(format!("Replace the cached {} with a fresh copy?", object_type.plural()))
                .default(true)
                .interact()?;
            orchestrator.extract(object_type, reset).await?.cached_total
        }
        DataSource::Cached => orchestrator.count(object_type).await?,
    };
    println!("In total we have {} {} to migrate", total, object_type.plural());

    loop {
        let start = clamp_start(total, prompt_number(&format!(
            "From which one do you want to start (minimum 0, maximum {})",
            total.saturating_sub(2)
        ), 0)?);
        let end = clamp_end(total, prompt_number(&format!(
            "At which one do you want to end (minimum 1, maximum {})",
            total
        ), total)?);
        let batch_size = clamp_batch_size(prompt_number(
            "Size of the batches to migrate (maximum 100)",
            default_batch_size,
        )?);

        println!(
            "\nMigrating {} [{}, {}) in batches of {}",
            object_type.plural(),
            start,
            end,
            batch_size
        );
        let result = orchestrator.migrate(object_type, start, Some(end), batch_size).await?;
        print_result(&result);

        let again = Confirm::new()
            .with_prompt("Do you want to run another migration?")
            .default(false)
            .interact()?;
        if !again {
            break;
        }
    }

    println!("Thank you");
    Ok(())
}

fn prompt_object_type() -> WizardResult<ObjectType> {
    let labels: Vec<&str> = ObjectType::ALL.iter().map(|t| t.plural()).collect();
    let selection = Select::new()
        .with_prompt("Which object do you want to migrate?")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(ObjectType::ALL[selection])
}

fn prompt_data_source() -> WizardResult<DataSource> {
    let options = &["Fetch from the source CRM", "Use the local cache"];
    let selection = Select::new()
        .with_prompt("Where should the records come from?")
        .items(options)
        .default(1)
        .interact()?;
    Ok(if selection == 0 {
        DataSource::Remote
    } else {
        DataSource::Cached
    })
}

fn prompt_number(prompt: &str, default: usize) -> WizardResult<usize> {
    Ok(Input::new()
        .with_prompt(prompt)
        .default(default)
        .interact_text()?)
}

/// Out-of-range starts fall back to the beginning of the cache.
fn clamp_start(total: usize, start: usize) -> usize {
    if start > total.saturating_sub(2) {
        0
    } else {
        start
    }
}

/// Zero or past-the-end falls back to the whole cache.
fn clamp_end(total: usize, end: usize) -> usize {
    if end == 0 || end > total {
        total
    } else {
        end
    }
}
