use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc, Weekday};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use adcrew::cli::{Cli, Command, DayArg};
use adcrew::config::AdcrewConfig;
use adcrew::dispatcher::EmployeeRunner;
use adcrew::parser::parse_task_configuration;
use adcrew::provider::{FileTaskProvider, TaskDataProvider};
use adcrew::scheduler::BatchScheduler;
use adcrew::sequencer::{ExecutionPlan, plan};
use adcrew::services::Services;
use adcrew::sqlite_store::{SqliteImageStore, is_database_path};
use adcrew::store::{ImageStore, MemoryImageStore};
use adcrew::ui::{self, BatchProgress, PlanSummary};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    match cli.command {
        Command::Run {
            file,
            store,
            concurrency,
        } => {
            let config = AdcrewConfig::load(cli.config.as_deref())?;
            run(&config, &file, store.as_deref(), concurrency, cli.json).await
        }
        Command::Plan { file, day } => show_plans(&file, day, cli.json).await,
        Command::Roles => {
            ui::print_roles(cli.json);
            Ok(())
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(
    config: &AdcrewConfig,
    file: &Path,
    store_path: Option<&Path>,
    concurrency: Option<usize>,
    json: bool,
) -> Result<()> {
    let services = Services::from_config(config)?;
    let database = match store_path {
        Some(path) if is_database_path(path) => Some(path.to_path_buf()),
        Some(_) => None,
        None => config.storage.database.clone(),
    };
    // The JSON snapshot is only kept when no database is in use.
    let (store, snapshot): (Arc<dyn ImageStore>, Option<Arc<MemoryImageStore>>) = match &database {
        Some(path) => {
            info!(database = %path.display(), "Using SQLite image store");
            let sqlite = SqliteImageStore::open(path)
                .with_context(|| format!("failed to open image database {}", path.display()))?;
            (Arc::new(sqlite), None)
        }
        None => {
            let memory = match store_path {
                Some(path) => MemoryImageStore::load(path)
                    .await
                    .with_context(|| format!("failed to load store snapshot {}", path.display()))?,
                None => MemoryImageStore::new(),
            };
            let memory = Arc::new(memory);
            (memory.clone(), Some(memory))
        }
    };

    let users = FileTaskProvider::new(file).fetch().await?;
    let max_concurrent = concurrency.unwrap_or(config.max_concurrent_users);
    info!(file = %file.display(), users = users.len(), "Loaded task data");

    let mut scheduler = BatchScheduler::new(
        Arc::new(EmployeeRunner::new(services)),
        Some(store),
        max_concurrent,
    );
    let progress = (!json).then(|| Arc::new(BatchProgress::start(users.len())));
    if let Some(progress) = &progress {
        let progress = progress.clone();
        scheduler = scheduler.on_user_finished(Arc::new(move |user_id: &str| {
            progress.user_finished(user_id);
        }));
    }

    let report = scheduler.run_batch(users, Utc::now()).await;
    if let Some(progress) = &progress {
        progress.finish();
    }
    ui::print_report(&report, json);

    if let (Some(memory), Some(path)) = (&snapshot, store_path) {
        memory
            .save(path)
            .await
            .with_context(|| format!("failed to save store snapshot {}", path.display()))?;
    }
    Ok(())
}

async fn show_plans(file: &Path, day: Option<DayArg>, json: bool) -> Result<()> {
    let today = day
        .map(Weekday::from)
        .unwrap_or_else(|| Utc::now().weekday());
    let users = FileTaskProvider::new(file).fetch().await?;

    let mut plans: Vec<(String, ExecutionPlan)> = Vec::with_capacity(users.len());
    let mut failures = Vec::new();
    for user in users {
        match parse_task_configuration(&user.data, today) {
            Ok(tasks) => plans.push((user.user_id, plan(tasks))),
            Err(err) => failures.push((user.user_id, err.to_string())),
        }
    }

    let summaries: Vec<PlanSummary<'_>> = plans
        .iter()
        .map(|(user_id, plan)| PlanSummary::new(user_id, plan))
        .collect();
    ui::print_plans(&summaries, &failures, json);
    Ok(())
}
