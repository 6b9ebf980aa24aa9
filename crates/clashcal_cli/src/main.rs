//! `clashcal` command-line entry point.
//!
//! # Responsibility
//! - Drive one sync or resolve cycle against a JSON event file and an
//!   on-disk resolution store.
//! - Keep output plain and deterministic for scripting.

use clap::{Parser, Subcommand};
use clashcal_core::db::open_db;
use clashcal_core::{
    init_logging, ClashGroup, EngineConfig, EventKey, GroupKey, JsonFileEventSource,
    SqliteResolutionRepository, SyncOrchestrator, SyncReport,
};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "clashcal", version, about = "Calendar clash detection and resolution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct StoreArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Resolution database, overrides `db_path` from the config
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core linkage info
    Ping,
    /// Sync a user's events and report clashes
    Sync {
        #[arg(long)]
        user: String,
        /// JSON file with the user's provider events
        #[arg(long)]
        events: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Resolve one clash group by keeping a single event
    Resolve {
        #[arg(long)]
        user: String,
        #[arg(long)]
        events: PathBuf,
        /// Group key printed by `sync`
        #[arg(long)]
        group: String,
        /// Id of the event to keep
        #[arg(long)]
        keep: String,
        /// Account of the kept event; needed when the id appears in several
        #[arg(long)]
        account: Option<String>,
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Ping => {
            println!("clashcal_core ping={}", clashcal_core::ping());
            println!("clashcal_core version={}", clashcal_core::core_version());
            Ok(())
        }
        Commands::Sync {
            user,
            events,
            store,
        } => run_sync(&user, &events, &store),
        Commands::Resolve {
            user,
            events,
            group,
            keep,
            account,
            store,
        } => run_resolve(&user, &events, &group, &keep, account.as_deref(), &store),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(store: &StoreArgs) -> Result<EngineConfig, Box<dyn Error>> {
    let mut config = match &store.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(db) = &store.db {
        config.db_path = db.clone();
    }
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }
    Ok(config)
}

fn run_sync(user: &str, events: &Path, store: &StoreArgs) -> CliResult {
    let config = load_config(store)?;
    let conn = open_db(&config.db_path)?;
    let orchestrator = SyncOrchestrator::new(
        JsonFileEventSource::new(events),
        SqliteResolutionRepository::new(&conn),
    );

    let report = orchestrator.sync(user)?;
    print_report(&report);
    Ok(())
}

fn run_resolve(
    user: &str,
    events: &Path,
    group: &str,
    keep: &str,
    account: Option<&str>,
    store: &StoreArgs,
) -> CliResult {
    let group_key =
        GroupKey::parse(group).ok_or_else(|| format!("`{group}` is not a valid group key"))?;
    let config = load_config(store)?;
    let conn = open_db(&config.db_path)?;
    let orchestrator = SyncOrchestrator::new(
        JsonFileEventSource::new(events),
        SqliteResolutionRepository::new(&conn),
    );

    // Resolve requests target the latest sync, so run one first.
    orchestrator.sync(user)?;
    let kept = match account {
        Some(account) => EventKey::new(account.trim(), keep.trim()),
        None => orchestrator
            .latest_groups(user)
            .iter()
            .find(|candidate| candidate.group_key == group_key)
            .and_then(|candidate| candidate.member_key(keep.trim()))
            .ok_or_else(|| {
                format!("event `{keep}` is not a unique member of group `{group}`; pass --account")
            })?,
    };
    let resolution = orchestrator.resolve(user, &group_key, &kept)?;
    info!(
        "event=cli_resolve module=cli status=ok group_key={} discarded={}",
        resolution.group_key,
        resolution.discarded.len()
    );

    println!("resolved group={}", resolution.group_key);
    println!("kept={}", resolution.kept);
    let discarded: Vec<String> = resolution
        .discarded
        .iter()
        .map(EventKey::to_string)
        .collect();
    println!("discarded={}", discarded.join(","));
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "events={} visible={} clashes={} resolved={} skipped={}",
        report.events.len(),
        report.visible_events.len(),
        report.clashes.len(),
        report.resolved_group_count,
        report.skipped_count()
    );
    println!("{}", report.summary_message());
    for group in &report.clashes {
        println!("group={} members={}", group.group_key, member_list(group));
    }
    for skipped in &report.skipped {
        println!(
            "skipped index={} id={} reason={}",
            skipped.index,
            skipped.event_id.as_deref().unwrap_or("-"),
            skipped.reason.code()
        );
    }
}

fn member_list(group: &ClashGroup) -> String {
    group
        .members
        .iter()
        .map(|event| event.key().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
