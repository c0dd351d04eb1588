use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use dochub_bridge::{BridgeClient, EnsureStructureRequest};
use dochub_core::{RunStatus, join_root_path, resolve};
use dochub_drive::DriveClient;
use dochubd::config::DaemonConfig;
use dochubd::project::{ProjectConfig, Provider};
use dochubd::store::{RunFilter, RunStore};
use dochubd::sync::engine::{SyncEngine, new_run_id};
use dochubd::tracker::RunTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Run { project_file: PathBuf },
    Plan { project_file: PathBuf },
    Bootstrap { project_file: PathBuf },
    History {
        project_id: String,
        only_errors: bool,
        only_with_created: bool,
        days: u32,
    },
    Prune { project_id: String, days: u32 },
    CheckBridge,
    Help,
}

fn parse_cli<I>(args: I) -> anyhow::Result<CliCommand>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliCommand::Help);
    };
    let parsed = match command.as_str() {
        "run" | "plan" | "bootstrap" => {
            let file = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("{command} needs a project file"))?;
            let project_file = PathBuf::from(file);
            match command.as_str() {
                "run" => CliCommand::Run { project_file },
                "plan" => CliCommand::Plan { project_file },
                _ => CliCommand::Bootstrap { project_file },
            }
        }
        "history" => {
            let project_id = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("history needs a project id"))?;
            let mut only_errors = false;
            let mut only_with_created = false;
            let mut days = 30u32;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--errors" => only_errors = true,
                    "--with-created" => only_with_created = true,
                    "--days" => days = parse_days(args.next())?,
                    other => anyhow::bail!("unknown argument: {other}"),
                }
            }
            return Ok(CliCommand::History {
                project_id,
                only_errors,
                only_with_created,
                days,
            });
        }
        "prune" => {
            let project_id = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("prune needs a project id"))?;
            let days = parse_days(args.next())?;
            CliCommand::Prune { project_id, days }
        }
        "check-bridge" => CliCommand::CheckBridge,
        "--help" | "-h" | "help" => CliCommand::Help,
        other => anyhow::bail!("unknown command: {other}"),
    };
    if let Some(extra) = args.next() {
        anyhow::bail!("unknown argument: {extra}");
    }
    Ok(parsed)
}

fn parse_days(value: Option<String>) -> anyhow::Result<u32> {
    let value = value.ok_or_else(|| anyhow::anyhow!("a number of days is required"))?;
    value
        .parse::<u32>()
        .map_err(|_| anyhow::anyhow!("expected a number of days, got '{value}'"))
}

fn print_usage() {
    println!("Usage: dochubd <command> [options]");
    println!();
    println!("Commands:");
    println!("  run <project.json>        Resolve the hierarchy and sync the folders");
    println!("  plan <project.json>       Print the folders a run would ensure, changing nothing");
    println!("  bootstrap <project.json>  One-shot batch create through the local bridge");
    println!("  history <project-id>      Show finished runs (--errors, --with-created, --days N)");
    println!("  prune <project-id> <days> Delete runs older than the given number of days");
    println!("  check-bridge              Probe the local bridge and report its health");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = DaemonConfig::from_env();
    match parse_cli(std::env::args())? {
        CliCommand::Run { project_file } => run_project(&config, &project_file).await,
        CliCommand::Plan { project_file } => plan_project(&project_file),
        CliCommand::Bootstrap { project_file } => bootstrap_project(&config, &project_file).await,
        CliCommand::History {
            project_id,
            only_errors,
            only_with_created,
            days,
        } => show_history(&config, &project_id, only_errors, only_with_created, days).await,
        CliCommand::Prune { project_id, days } => prune_history(&config, &project_id, days).await,
        CliCommand::CheckBridge => check_bridge(&config).await,
        CliCommand::Help => {
            print_usage();
            Ok(())
        }
    }
}

async fn open_store(config: &DaemonConfig) -> anyhow::Result<RunStore> {
    match &config.db_path {
        Some(path) => RunStore::new_at(path.clone())
            .await
            .with_context(|| format!("failed to open run store at {}", path.display())),
        None => RunStore::new_default()
            .await
            .context("failed to open run store"),
    }
}

fn load_project(project_file: &Path) -> anyhow::Result<ProjectConfig> {
    ProjectConfig::load(project_file)
        .with_context(|| format!("failed to load project file {}", project_file.display()))
}

async fn run_project(config: &DaemonConfig, project_file: &Path) -> anyhow::Result<()> {
    let project = load_project(project_file)?;
    let store = open_store(config).await?;
    let tracker = RunTracker::new();
    let bridge = BridgeClient::with_base_url(&config.bridge_url)?;
    let mut engine = SyncEngine::new(store, tracker.clone(), bridge)
        .with_probe_timeout(config.bridge_probe_timeout)
        .with_poll_interval(config.poll_interval)
        .with_poll_timeout(config.poll_timeout);
    if project.provider == Provider::Drive {
        let api_base = config
            .api_base
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DOCHUB_API_BASE is not set"))?;
        let api_token = config
            .api_token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DOCHUB_API_TOKEN is not set"))?;
        engine = engine.with_drive(DriveClient::new(api_base, api_token)?);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("[dochubd] cancellation requested, finishing up");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let run_id = new_run_id();
    eprintln!(
        "[dochubd] starting run {run_id} for project {}",
        project.project_id
    );
    let progress = {
        let tracker = tracker.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move {
            let mut last_step: Option<String> = None;
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let Some(snapshot) = tracker.snapshot(&run_id).await else {
                    continue;
                };
                if snapshot.step != last_step {
                    if let Some(step) = &snapshot.step {
                        eprintln!("[dochubd] {step} ({}%)", snapshot.progress_percent);
                    }
                    last_step = snapshot.step.clone();
                }
                if snapshot.is_finished() {
                    break;
                }
            }
        })
    };

    let outcome = engine.run(&run_id, &project, &cancel).await;
    progress.abort();
    let record = outcome?;
    tracker.remove(&run_id).await;

    for line in &record.logs {
        println!("{line}");
    }
    match record.status {
        RunStatus::Success => {
            eprintln!("[dochubd] run {run_id} finished");
            Ok(())
        }
        _ => {
            let reason = record
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            anyhow::bail!("run {run_id} failed: {reason}")
        }
    }
}

fn plan_project(project_file: &Path) -> anyhow::Result<()> {
    let project = load_project(project_file)?;
    let resolution = resolve(&project.hierarchy, &project.categories, &project.suppliers);
    for warning in &resolution.warnings {
        eprintln!("[dochubd] {warning}");
    }
    for path in &resolution.paths {
        let mark = if path.duplicate { "  (duplicate)" } else { "" };
        println!("{}{mark}", join_root_path(&project.root, &path.segments));
    }
    eprintln!(
        "[dochubd] {} folder(s) would be ensured",
        resolution.paths.len()
    );
    Ok(())
}

async fn bootstrap_project(config: &DaemonConfig, project_file: &Path) -> anyhow::Result<()> {
    let project = load_project(project_file)?;
    if project.provider != Provider::Bridge {
        anyhow::bail!(
            "bootstrap works through the local bridge; project '{}' uses the drive api",
            project.project_id
        );
    }
    let resolution = resolve(&project.hierarchy, &project.categories, &project.suppliers);
    for warning in &resolution.warnings {
        eprintln!("[dochubd] {warning}");
    }
    let bridge = BridgeClient::with_base_url(&config.bridge_url)?;
    if !bridge.is_running(config.bridge_probe_timeout).await {
        anyhow::bail!("bridge is not reachable at {}", config.bridge_url);
    }
    let summary = bridge
        .ensure_structure(&EnsureStructureRequest {
            root_path: &project.root,
            paths: &resolution.paths,
            categories: &project.categories,
            suppliers: &project.suppliers,
        })
        .await?;
    for line in &summary.logs {
        println!("{line}");
    }
    eprintln!(
        "[dochubd] bootstrap finished: {} created, {} reused",
        summary.created_count, summary.reused_count
    );
    if !summary.success {
        anyhow::bail!("bootstrap reported failures");
    }
    Ok(())
}

async fn show_history(
    config: &DaemonConfig,
    project_id: &str,
    only_errors: bool,
    only_with_created: bool,
    days: u32,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let filter = RunFilter {
        only_errors,
        only_with_created,
        since_days: Some(days),
    };
    let runs = store.list_runs(project_id, &filter).await?;
    if runs.is_empty() {
        eprintln!("[dochubd] no matching runs in the last {days} day(s)");
        return Ok(());
    }
    for run in &runs {
        let created = run.created_count();
        match &run.error {
            Some(error) => println!(
                "{}  {}  ✔ {}  {}",
                run.started_at,
                run.status.as_str(),
                created,
                error
            ),
            None => println!("{}  {}  ✔ {}", run.started_at, run.status.as_str(), created),
        }
    }
    Ok(())
}

async fn prune_history(config: &DaemonConfig, project_id: &str, days: u32) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let removed = store.prune_runs(project_id, days).await?;
    eprintln!("[dochubd] removed {removed} run(s) older than {days} day(s)");
    Ok(())
}

async fn check_bridge(config: &DaemonConfig) -> anyhow::Result<()> {
    let bridge = BridgeClient::with_base_url(&config.bridge_url)?;
    match bridge.health(config.bridge_probe_timeout).await {
        Ok(health) => {
            match &health.version {
                Some(version) => eprintln!(
                    "[dochubd] bridge is {} at {} (version {version})",
                    health.status, config.bridge_url
                ),
                None => eprintln!(
                    "[dochubd] bridge is {} at {}",
                    health.status, config.bridge_url
                ),
            }
            Ok(())
        }
        Err(error) if error.is_unreachable() => {
            anyhow::bail!("bridge is not running at {}", config.bridge_url)
        }
        Err(error) => Err(error.into()),
    }
}
