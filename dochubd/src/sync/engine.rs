use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dochub_bridge::BridgeClient;
use dochub_core::{
    ActionKind, ConfigWarning, LOG_CREATED_PREFIX, LOG_DUPLICATE_PREFIX, LOG_FAILED_PREFIX,
    LOG_REUSED_PREFIX, Resolution, RunRecord, RunStatus, SyncAction, join_root_path, resolve,
    summary_line,
};
use dochub_drive::{DriveClient, DriveError, DriveErrorClass, JobSnapshot};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::time::Instant;

use super::backoff::Backoff;
use crate::project::{ProjectConfig, Provider};
use crate::store::{ProjectRoot, RunStore, StoreError};
use crate::tracker::RunTracker;

/// Consecutive poll failures tolerated before a remote run is abandoned.
const MAX_POLL_FAILURES: u32 = 5;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("another run is already active for project {0}")]
    RunAlreadyActive(String),
    #[error("drive api is not configured; set DOCHUB_API_BASE and DOCHUB_API_TOKEN")]
    DriveNotConfigured,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("time format error: {0}")]
    Timestamp(#[from] time::error::Format),
}

pub fn new_run_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Drives one sync run at a time per project: resolves the hierarchy into
/// folder paths, walks the bridge or hands the batch to the drive API, and
/// keeps the tracker and run history in step.
///
/// Run-level failures (unreachable bridge, rejected job, poll timeout) end
/// up inside the returned record; `Err` is reserved for claim conflicts and
/// for infrastructure around the run itself.
pub struct SyncEngine {
    store: RunStore,
    tracker: RunTracker,
    bridge: BridgeClient,
    drive: Option<DriveClient>,
    probe_timeout: Duration,
    poll_interval: Duration,
    poll_timeout: Duration,
    poll_backoff: Backoff,
}

impl SyncEngine {
    pub fn new(store: RunStore, tracker: RunTracker, bridge: BridgeClient) -> Self {
        Self {
            store,
            tracker,
            bridge,
            drive: None,
            probe_timeout: Duration::from_millis(1500),
            poll_interval: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(600),
            poll_backoff: Backoff::poll_retry(),
        }
    }

    pub fn with_drive(mut self, drive: DriveClient) -> Self {
        self.drive = Some(drive);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_poll_backoff(mut self, backoff: Backoff) -> Self {
        self.poll_backoff = backoff;
        self
    }

    /// Executes one run to completion and returns the terminal record.
    ///
    /// The run slot for the project is claimed up front and released on
    /// every exit path; a second concurrent run for the same project gets
    /// [`EngineError::RunAlreadyActive`] without touching any folder.
    pub async fn run(
        &self,
        run_id: &str,
        project: &ProjectConfig,
        cancel: &Arc<AtomicBool>,
    ) -> Result<RunRecord, EngineError> {
        if project.provider == Provider::Drive && self.drive.is_none() {
            return Err(EngineError::DriveNotConfigured);
        }
        let started_at = now_rfc3339()?;
        if !self
            .store
            .begin_run(&project.project_id, run_id, &started_at)
            .await?
        {
            return Err(EngineError::RunAlreadyActive(project.project_id.clone()));
        }

        let outcome = self.run_claimed(run_id, project, cancel, &started_at).await;
        let released = self.store.end_run(&project.project_id).await;
        let record = outcome?;
        released?;
        self.store.insert_run(&record).await?;
        Ok(record)
    }

    async fn run_claimed(
        &self,
        run_id: &str,
        project: &ProjectConfig,
        cancel: &Arc<AtomicBool>,
        started_at: &str,
    ) -> Result<RunRecord, EngineError> {
        let resolution = resolve(&project.hierarchy, &project.categories, &project.suppliers);
        let mut record = RunRecord::started(run_id, &project.project_id, started_at);
        self.tracker.begin(record.clone()).await;

        if resolution.paths.is_empty() {
            for warning in &resolution.warnings {
                record.log(warning.to_string());
            }
            record.log("Nothing to do: the hierarchy resolved to zero folders");
            record.set_progress(0, 0);
            record.finish(None, &now_rfc3339()?);
            self.tracker.publish(&record).await;
            return Ok(record);
        }

        match project.provider {
            Provider::Bridge => {
                self.run_local(&mut record, project, &resolution, cancel)
                    .await?
            }
            Provider::Drive => {
                self.run_remote(&mut record, project, &resolution, cancel)
                    .await?
            }
        }
        Ok(record)
    }

    /// Local walk through the bridge: one existence check and at most one
    /// create per resolved path, parents before children.
    async fn run_local(
        &self,
        record: &mut RunRecord,
        project: &ProjectConfig,
        resolution: &Resolution,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        record.set_step("Checking bridge");
        self.tracker.publish(record).await;
        if let Err(error) = self.bridge.health(self.probe_timeout).await {
            record.log(format!("{LOG_FAILED_PREFIX}bridge is not reachable: {error}"));
            record.finish(Some(format!("bridge unreachable: {error}")), &now_rfc3339()?);
            self.tracker.publish(record).await;
            return Ok(());
        }

        for warning in &resolution.warnings {
            if matches!(warning, ConfigWarning::OrphanSupplierPlaceholder { .. }) {
                record.log(warning.to_string());
            }
        }

        let total = resolution.paths.len() as u32;
        record.set_step("Creating folders");
        record.set_progress(0, total);
        self.tracker.publish(record).await;

        let mut actions: Vec<SyncAction> = Vec::with_capacity(resolution.paths.len());
        let mut seen_paths: HashSet<String> = HashSet::new();
        let mut cancelled = false;

        for path in &resolution.paths {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                // no folder is touched past this point
                for rest in resolution.paths.iter().skip(actions.len()) {
                    actions.push(SyncAction::new(rest, ActionKind::Skipped));
                }
                break;
            }

            let joined = path.joined();
            let first_of_group = seen_paths.insert(joined.clone());
            let full_path = join_root_path(&project.root, &path.segments);
            match self.bridge.folder_exists(&full_path).await {
                Ok(check) if check.exists => {
                    let kind = if path.duplicate && !first_of_group {
                        ActionKind::Duplicate
                    } else {
                        ActionKind::Reused
                    };
                    actions.push(SyncAction::new(path, kind));
                    record.log(format!("{LOG_REUSED_PREFIX}{joined}"));
                }
                Ok(_) => match self.bridge.create_folder(&full_path).await {
                    Ok(_) => {
                        actions.push(SyncAction::new(path, ActionKind::Created));
                        record.log(format!("{LOG_CREATED_PREFIX}{joined}"));
                    }
                    Err(error) => {
                        record.log(format!("{LOG_FAILED_PREFIX}{joined}: {error}"));
                        actions.push(SyncAction::failed(path, error.to_string()));
                    }
                },
                Err(error) => {
                    // an unanswered existence check counts like a failed
                    // create: record it and keep walking
                    record.log(format!("{LOG_FAILED_PREFIX}{joined}: {error}"));
                    actions.push(SyncAction::failed(path, error.to_string()));
                }
            }
            if path.duplicate && first_of_group {
                record.log(format!("{LOG_DUPLICATE_PREFIX}{joined}"));
            }
            record.set_progress(actions.len() as u32, total);
            self.tracker.publish(record).await;
        }

        let created = actions
            .iter()
            .filter(|action| action.kind == ActionKind::Created)
            .count();
        let reused = actions
            .iter()
            .filter(|action| matches!(action.kind, ActionKind::Reused | ActionKind::Duplicate))
            .count();
        let failed = actions
            .iter()
            .filter(|action| action.kind == ActionKind::Error)
            .count();

        record.set_step("Finished");
        let error = if cancelled {
            let skipped = actions
                .iter()
                .filter(|action| action.kind == ActionKind::Skipped)
                .count();
            record.log(format!("Run cancelled; {skipped} folder(s) left untouched"));
            Some("run cancelled".to_string())
        } else if failed > 0 {
            record.log(summary_line(created, reused));
            Some(format!("{failed} folder action(s) failed"))
        } else {
            record.log(summary_line(created, reused));
            None
        };
        record.finish(error, &now_rfc3339()?);
        self.tracker.publish(record).await;
        Ok(())
    }

    /// Remote flow: resolve (or recall) the drive root, submit the whole
    /// batch as one job and mirror the server's progress until it ends.
    async fn run_remote(
        &self,
        record: &mut RunRecord,
        project: &ProjectConfig,
        resolution: &Resolution,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        let drive = self.drive.as_ref().ok_or(EngineError::DriveNotConfigured)?;

        // the server owns the walk, so every resolver warning goes up front
        for warning in &resolution.warnings {
            record.log(warning.to_string());
        }
        record.set_progress(0, resolution.paths.len() as u32);

        let root_id = match self.store.get_project_root(&project.project_id).await? {
            Some(root) => {
                record.log(format!("Using drive root '{}'", root.root_name));
                root.root_id
            }
            None => {
                record.set_step("Resolving drive root");
                self.tracker.publish(record).await;
                match drive.resolve_root(&project.project_id, &project.root).await {
                    Ok(resolved) => {
                        let root = ProjectRoot {
                            root_id: resolved.root_id.clone(),
                            root_name: resolved.root_name.clone(),
                            root_web_url: resolved.root_web_url.clone(),
                            resolved_at: now_rfc3339()?,
                        };
                        self.store.set_project_root(&project.project_id, &root).await?;
                        record.log(format!("Resolved drive root '{}'", resolved.root_name));
                        resolved.root_id
                    }
                    Err(error) => {
                        let message = describe_drive_error("root resolution", &error);
                        record.log(format!("{LOG_FAILED_PREFIX}{message}"));
                        record.finish(Some(message), &now_rfc3339()?);
                        self.tracker.publish(record).await;
                        return Ok(());
                    }
                }
            }
        };

        record.set_step("Submitting job");
        self.tracker.publish(record).await;
        let job = match drive
            .start_job(&project.project_id, &record.id, &root_id, &resolution.paths)
            .await
        {
            Ok(job) => job,
            Err(error) => {
                let message = describe_drive_error("job submission", &error);
                record.log(format!("{LOG_FAILED_PREFIX}{message}"));
                record.finish(Some(message), &now_rfc3339()?);
                self.tracker.publish(record).await;
                return Ok(());
            }
        };
        record.log(format!("Submitted drive job {}", job.job_id));
        record.set_step("Waiting for drive job");
        self.tracker.publish(record).await;

        self.poll_job(record, drive, &job.job_id, cancel).await
    }

    async fn poll_job(
        &self,
        record: &mut RunRecord,
        drive: &DriveClient,
        job_id: &str,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        let deadline = Instant::now() + self.poll_timeout;
        let mut failures = 0u32;
        loop {
            if cancel.load(Ordering::Relaxed) {
                // the job keeps running server-side; only polling stops
                record.log("Polling cancelled; the drive job continues on the server");
                record.finish(Some("polling cancelled".to_string()), &now_rfc3339()?);
                break;
            }
            if Instant::now() >= deadline {
                record.log(format!("{LOG_FAILED_PREFIX}drive job did not finish in time"));
                record.finish(
                    Some("timed out waiting for the drive job".to_string()),
                    &now_rfc3339()?,
                );
                break;
            }
            tokio::time::sleep(self.poll_interval).await;

            match drive.poll_job(job_id).await {
                Ok(snapshot) => {
                    failures = 0;
                    mirror_snapshot(record, &snapshot);
                    if snapshot.is_terminal() {
                        let finished_at = match &snapshot.finished_at {
                            Some(finished_at) => finished_at.clone(),
                            None => now_rfc3339()?,
                        };
                        let error = if snapshot.status == RunStatus::Error {
                            Some(
                                snapshot
                                    .error
                                    .clone()
                                    .unwrap_or_else(|| "drive job failed".to_string()),
                            )
                        } else {
                            None
                        };
                        record.finish(error, &finished_at);
                        break;
                    }
                    self.tracker.publish(record).await;
                }
                Err(error) => {
                    failures += 1;
                    if !error.is_retryable() || failures >= MAX_POLL_FAILURES {
                        record.log(format!("{LOG_FAILED_PREFIX}polling failed: {error}"));
                        record.finish(Some(format!("polling failed: {error}")), &now_rfc3339()?);
                        break;
                    }
                    tokio::time::sleep(self.poll_backoff.delay(failures)).await;
                }
            }
        }
        self.tracker.publish(record).await;
        Ok(())
    }
}

/// Copies the server's job state into the local record. The server log is
/// authoritative for remote runs: once it reports any lines they replace
/// the local preamble wholesale.
fn mirror_snapshot(record: &mut RunRecord, snapshot: &JobSnapshot) {
    if let Some(step) = &snapshot.step {
        record.step = Some(step.clone());
    }
    record.progress_percent = snapshot.progress_percent.min(100);
    record.completed_actions = snapshot.completed_actions;
    if snapshot.total_actions.is_some() {
        record.total_actions = snapshot.total_actions;
    }
    if !snapshot.logs.is_empty() {
        record.logs = snapshot.logs.clone();
    }
    if let Some(error) = &snapshot.error {
        record.error = Some(error.clone());
    }
}

fn describe_drive_error(stage: &str, error: &DriveError) -> String {
    match error.classification() {
        Some(DriveErrorClass::Auth) => format!("{stage} rejected: unauthorized"),
        Some(DriveErrorClass::NotFound) => format!("{stage} failed: root folder not found"),
        _ => format!("{stage} failed: {error}"),
    }
}

fn now_rfc3339() -> Result<String, EngineError> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
