use serde::{Deserialize, Serialize};

use crate::resolve::ResolvedPath;

/// Prefix of log lines announcing a freshly created folder.
pub const LOG_CREATED_PREFIX: &str = "✔ ";
/// Prefix of log lines announcing an already existing folder.
pub const LOG_REUSED_PREFIX: &str = "↻ ";
/// Prefix of log lines flagging a sibling name collision.
pub const LOG_DUPLICATE_PREFIX: &str = "⚠️ Duplicate folders: ";
/// Prefix of log lines recording a failed folder action.
pub const LOG_FAILED_PREFIX: &str = "✖ ";

/// Final summary line of a completed walk.
pub fn summary_line(created: usize, reused: usize) -> String {
    format!("✅ Done. ✔ {created} · ↻ {reused}")
}

/// Lifecycle of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Error)
    }
}

/// What happened to one resolved path during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Created,
    Reused,
    Duplicate,
    Skipped,
    Error,
}

/// Per-path outcome, one per resolved path per run. Duplicates are
/// flagged, never suppressed; they do not block the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAction {
    pub path: ResolvedPath,
    pub kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SyncAction {
    pub fn new(path: &ResolvedPath, kind: ActionKind) -> Self {
        Self {
            path: path.clone(),
            kind,
            detail: None,
        }
    }

    pub fn failed(path: &ResolvedPath, detail: String) -> Self {
        Self {
            path: path.clone(),
            kind: ActionKind::Error,
            detail: Some(detail),
        }
    }
}

/// Live and historical state of one sync run.
///
/// Mutated only by the engine that owns the run and frozen once
/// `finished_at` is set; history stores records verbatim after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub project_id: String,
    pub status: RunStatus,
    pub step: Option<String>,
    pub progress_percent: u8,
    pub completed_actions: u32,
    pub total_actions: Option<u32>,
    pub logs: Vec<String>,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl RunRecord {
    /// Fresh record in the `running` state.
    pub fn started(id: &str, project_id: &str, started_at: &str) -> Self {
        Self {
            id: id.to_string(),
            project_id: project_id.to_string(),
            status: RunStatus::Running,
            step: None,
            progress_percent: 0,
            completed_actions: 0,
            total_actions: None,
            logs: Vec::new(),
            error: None,
            started_at: started_at.to_string(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    pub fn set_step(&mut self, step: &str) {
        self.step = Some(step.to_string());
    }

    /// Recomputes the percentage from completed vs. total actions.
    pub fn set_progress(&mut self, completed: u32, total: u32) {
        self.completed_actions = completed;
        self.total_actions = Some(total);
        self.progress_percent = if total == 0 {
            100
        } else {
            ((u64::from(completed) * 100) / u64::from(total)) as u8
        };
    }

    /// Marks the run terminal; an error message means the `error` status.
    pub fn finish(&mut self, error: Option<String>, finished_at: &str) {
        self.status = match error {
            Some(_) => RunStatus::Error,
            None => RunStatus::Success,
        };
        if self.status == RunStatus::Success {
            self.progress_percent = 100;
        }
        self.error = error;
        self.finished_at = Some(finished_at.to_string());
    }

    /// Created-folder tally as history filters compute it: the count of
    /// `✔ `-prefixed log lines.
    pub fn created_count(&self) -> usize {
        self.logs
            .iter()
            .filter(|line| line.starts_with(LOG_CREATED_PREFIX))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let mut record = RunRecord::started("r1", "p1", "2026-08-20T10:00:00Z");
        record.set_step("Creating folders");
        record.set_progress(1, 4);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"projectId\":\"p1\""));
        assert!(json.contains("\"progressPercent\":25"));
        assert!(json.contains("\"completedActions\":1"));
        assert!(json.contains("\"totalActions\":4"));
        assert!(json.contains("\"startedAt\":\"2026-08-20T10:00:00Z\""));
        let back: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn progress_rounds_down_and_empty_totals_complete() {
        let mut record = RunRecord::started("r1", "p1", "2026-08-20T10:00:00Z");
        record.set_progress(1, 3);
        assert_eq!(record.progress_percent, 33);
        record.set_progress(0, 0);
        assert_eq!(record.progress_percent, 100);
    }

    #[test]
    fn finishing_freezes_status_and_timestamp() {
        let mut record = RunRecord::started("r1", "p1", "2026-08-20T10:00:00Z");
        record.set_progress(2, 4);
        record.finish(None, "2026-08-20T10:00:07Z");
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.progress_percent, 100);
        assert!(record.is_finished());

        let mut failed = RunRecord::started("r2", "p1", "2026-08-20T10:00:00Z");
        failed.set_progress(2, 4);
        failed.finish(Some("disk full".to_string()), "2026-08-20T10:00:07Z");
        assert_eq!(failed.status, RunStatus::Error);
        assert_eq!(failed.progress_percent, 50);
        assert_eq!(failed.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn created_count_scans_log_prefixes() {
        let mut record = RunRecord::started("r1", "p1", "2026-08-20T10:00:00Z");
        record.log(format!("{LOG_CREATED_PREFIX}01_PD"));
        record.log(format!("{LOG_REUSED_PREFIX}02_Zmeny_PD"));
        record.log(format!("{LOG_CREATED_PREFIX}03_Vyberova_rizeni"));
        record.log(summary_line(2, 1));
        assert_eq!(record.created_count(), 2);
    }

    #[test]
    fn status_string_mapping_round_trips() {
        for status in [RunStatus::Running, RunStatus::Success, RunStatus::Error] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("queued"), None);
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Error.is_terminal());
    }
}
