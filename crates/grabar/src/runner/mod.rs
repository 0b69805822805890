//! Execution orchestrator.
//!
//! Runs generated tests as child processes, streams their output line by
//! line, records every run in an append-only history, and feeds locator
//! failures back into the locator library. Cancellation is cooperative
//! through a watch channel and always leaves a terminal run record behind.

pub mod artifacts;
pub mod layout;
pub mod remote;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{OutputStream, RunEvent};
use crate::library::{LocatorLibrary, MaintenanceService};
use crate::result::{GrabarError, GrabarResult};

use self::remote::{RemoteCredentials, RemoteTarget};

/// Pattern recovering failing locator keys from child output
const FAILING_KEY_PATTERN: &str = r"locator\(key=([0-9a-f]{16}),";

/// Capacity of the run event channel
pub const RUN_EVENT_CAPACITY: usize = 256;

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet started
    Pending,
    /// Child process is executing
    Running,
    /// Child exited successfully
    Passed,
    /// Child exited with a failure
    Failed,
    /// Run never started (spec missing or filtered out)
    Skipped,
    /// Run was cancelled while executing
    Cancelled,
}

impl RunStatus {
    /// Whether this status ends the lifecycle
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }
}

/// Where a run executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSource {
    /// Local browser installation
    #[default]
    Local,
    /// Remote device grid
    Remote,
}

/// One run of one test, as persisted in the run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run id
    pub run_id: Uuid,
    /// Test that was run
    pub test_name: String,
    /// Spec file that resolved, relative to the workspace root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_rel_path: Option<PathBuf>,
    /// Current status
    pub status: RunStatus,
    /// Where the run executed
    #[serde(default)]
    pub source: RunSource,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the run reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Child exit code, when it exited at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Locator keys recovered from failure output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failing_keys: Vec<String>,
    /// Artifact files collected for this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace_paths: Vec<PathBuf>,
    /// Directory holding failure artifacts for this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
}

impl RunRecord {
    /// Create a pending record
    #[must_use]
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            test_name: test_name.into(),
            spec_rel_path: None,
            status: RunStatus::Pending,
            source: RunSource::Local,
            created_at: Utc::now(),
            finished_at: None,
            exit_code: None,
            failing_keys: Vec::new(),
            trace_paths: Vec::new(),
            artifact_dir: None,
        }
    }

    /// Move to the next lifecycle status.
    ///
    /// Exactly one terminal transition is allowed per record; anything after
    /// a terminal status, and any jump that skips Running (except straight to
    /// Skipped), is rejected.
    pub fn transition(&mut self, next: RunStatus) -> GrabarResult<()> {
        let allowed = match (self.status, next) {
            (RunStatus::Pending, RunStatus::Running | RunStatus::Skipped) => true,
            (
                RunStatus::Running,
                RunStatus::Passed | RunStatus::Failed | RunStatus::Cancelled,
            ) => true,
            _ => false,
        };
        if !allowed {
            return Err(GrabarError::InvalidState {
                message: format!(
                    "run {} cannot move from {:?} to {next:?}",
                    self.run_id, self.status
                ),
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Append-only JSONL history of runs
#[derive(Debug)]
pub struct RunStore {
    path: PathBuf,
}

impl RunStore {
    /// File name of the run history
    pub const FILE_NAME: &'static str = "runs.jsonl";

    /// Open (or create on first append) the history under a directory
    #[must_use]
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
        }
    }

    /// Append one terminal record
    pub fn append(&self, record: &RunRecord) -> GrabarResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Load the full history, oldest first
    pub fn load_all(&self) -> GrabarResult<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

/// Where the test process executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Spawn the runner on this machine
    Local,
    /// Spawn locally but drive a remote grid session
    Remote(RemoteTarget),
}

/// Run directories kept on disk before housekeeping prunes the oldest
pub const DEFAULT_KEEP_ARTIFACTS: usize = 16;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Workspace containing the generated tests
    pub workspace_root: PathBuf,
    /// Root directory for per-run artifacts and history
    pub artifact_root: PathBuf,
    /// Program spawned to execute a spec
    pub program: String,
    /// Arguments for the program; `{spec}` expands to the located spec path
    /// and `{stem}` to its file stem
    pub args: Vec<String>,
    /// Local or remote execution
    pub mode: ExecutionMode,
    /// How many run directories to keep before pruning the oldest
    pub keep_artifacts: usize,
}

impl RunnerConfig {
    /// Configuration running specs through `cargo test`.
    ///
    /// `--test` takes a cargo target name, so the default expands the spec's
    /// file stem rather than its path; workspaces keeping generated specs
    /// outside auto-discovered `tests/` declare them as `[[test]] path`
    /// targets.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>, artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            artifact_root: artifact_root.into(),
            program: "cargo".to_string(),
            args: vec!["test".to_string(), "--test".to_string(), "{stem}".to_string()],
            mode: ExecutionMode::Local,
            keep_artifacts: DEFAULT_KEEP_ARTIFACTS,
        }
    }

    /// Override the spawned command
    #[must_use]
    pub fn with_command(
        mut self,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    /// Run against a remote grid target
    #[must_use]
    pub fn with_remote(mut self, target: RemoteTarget) -> Self {
        self.mode = ExecutionMode::Remote(target);
        self
    }

    /// Override how many run directories survive housekeeping
    #[must_use]
    pub const fn with_keep_artifacts(mut self, keep: usize) -> Self {
        self.keep_artifacts = keep;
        self
    }
}

/// Expand command arguments against the located spec path
fn expand_args(args: &[String], spec: &Path) -> Vec<std::ffi::OsString> {
    args.iter()
        .map(|arg| match arg.as_str() {
            "{spec}" => spec.as_os_str().to_os_string(),
            "{stem}" => spec
                .file_stem()
                .unwrap_or(spec.as_os_str())
                .to_os_string(),
            _ => std::ffi::OsString::from(arg),
        })
        .collect()
}

/// Runs generated tests and owns their lifecycle records
pub struct ExecutionOrchestrator {
    config: RunnerConfig,
    store: RunStore,
    events: broadcast::Sender<RunEvent>,
    failing_key: Regex,
    library: Option<LocatorLibrary>,
}

impl std::fmt::Debug for ExecutionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExecutionOrchestrator {
    /// Create an orchestrator over a configuration
    pub fn new(config: RunnerConfig) -> GrabarResult<Self> {
        let failing_key =
            Regex::new(FAILING_KEY_PATTERN).map_err(|e| GrabarError::ConfigError {
                message: format!("failing-key pattern: {e}"),
            })?;
        let store = RunStore::open(&config.artifact_root);
        let (events, _) = broadcast::channel(RUN_EVENT_CAPACITY);
        Ok(Self {
            config,
            store,
            events,
            failing_key,
            library: None,
        })
    }

    /// Attach a locator library to receive failure feedback
    #[must_use]
    pub fn with_library(mut self, library: LocatorLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Subscribe to run events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Run history store
    #[must_use]
    pub const fn store(&self) -> &RunStore {
        &self.store
    }

    /// Execute one test to a terminal status.
    ///
    /// A missing spec records a Skipped run and surfaces the lookup error;
    /// every other path returns the terminal record.
    pub async fn run(
        &self,
        test_name: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> GrabarResult<RunRecord> {
        artifacts::ensure_config(&self.config.workspace_root)?;
        let mut record = RunRecord::new(test_name);
        record.source = match self.config.mode {
            ExecutionMode::Local => RunSource::Local,
            ExecutionMode::Remote(_) => RunSource::Remote,
        };

        let spec = match layout::locate_spec(&self.config.workspace_root, test_name) {
            Ok(spec) => spec,
            Err(e) => {
                record.transition(RunStatus::Skipped)?;
                self.store.append(&record)?;
                warn!(test_name, "spec not found, run skipped");
                return Err(e);
            }
        };
        record.spec_rel_path = Some(
            spec.strip_prefix(&self.config.workspace_root)
                .map_or_else(|_| spec.clone(), Path::to_path_buf),
        );

        let credentials = match &self.config.mode {
            ExecutionMode::Local => None,
            ExecutionMode::Remote(_) => Some(RemoteCredentials::from_env()?),
        };

        let mut command = tokio::process::Command::new(&self.config.program);
        command.args(expand_args(&self.config.args, &spec));
        command
            .current_dir(&self.config.workspace_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let (ExecutionMode::Remote(target), Some(credentials)) =
            (&self.config.mode, &credentials)
        {
            let run_dir = self.config.artifact_root.join(record.run_id.to_string());
            std::fs::create_dir_all(&run_dir)?;
            let capabilities_path = run_dir.join("capabilities.json");
            std::fs::write(
                &capabilities_path,
                serde_json::to_vec_pretty(&target.capabilities(test_name))?,
            )?;
            record.trace_paths.push(capabilities_path);
            command.envs(credentials.child_env());
        }

        record.transition(RunStatus::Running)?;
        let _ = self.events.send(RunEvent::Started {
            run_id: record.run_id,
            test_name: test_name.to_string(),
        });
        info!(test_name, run_id = %record.run_id, "run started");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                record.transition(RunStatus::Failed)?;
                self.store.append(&record)?;
                let _ = self.events.send(RunEvent::Finished {
                    run_id: record.run_id,
                    status: record.status,
                });
                return Err(GrabarError::SpawnFailed {
                    message: format!("{}: {e}", self.config.program),
                });
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = tokio::spawn(stream_lines(
            stdout,
            OutputStream::Stdout,
            self.events.clone(),
        ));
        let err_task = tokio::spawn(stream_lines(
            stderr,
            OutputStream::Stderr,
            self.events.clone(),
        ));

        let exit = tokio::select! {
            status = child.wait() => Some(status?),
            () = cancelled(&mut cancel) => {
                debug!(run_id = %record.run_id, "cancellation requested, killing child");
                child.kill().await.ok();
                child.wait().await.ok();
                None
            }
        };

        let (stdout_lines, stderr_lines) = futures::future::join(out_task, err_task).await;
        let stdout_lines = stdout_lines.unwrap_or_default();
        let stderr_lines = stderr_lines.unwrap_or_default();

        match exit {
            None => {
                record.transition(RunStatus::Cancelled)?;
            }
            Some(status) => {
                record.exit_code = status.code();
                if status.success() {
                    record.transition(RunStatus::Passed)?;
                } else {
                    record.transition(RunStatus::Failed)?;
                    self.handle_failure(&mut record, &stdout_lines, &stderr_lines)?;
                }
            }
        }

        self.store.append(&record)?;
        let _ = self.events.send(RunEvent::Finished {
            run_id: record.run_id,
            status: record.status,
        });
        info!(test_name, run_id = %record.run_id, status = ?record.status, "run finished");
        self.prune_stale_artifacts().await;
        Ok(record)
    }

    /// Remove run directories beyond the newest `keep_artifacts` records.
    ///
    /// Deletion retries with bounded backoff for transient file locks;
    /// exhausted retries leave the directory behind with a warning, never a
    /// failed run.
    async fn prune_stale_artifacts(&self) {
        let Ok(history) = self.store.load_all() else {
            return;
        };
        if history.len() <= self.config.keep_artifacts {
            return;
        }
        let stale = history.len() - self.config.keep_artifacts;
        for record in &history[..stale] {
            let dir = self.config.artifact_root.join(record.run_id.to_string());
            if !dir.exists() {
                continue;
            }
            if let Err(e) = artifacts::remove_dir_with_retry(&dir, 4).await {
                warn!(run_id = %record.run_id, error = %e, "stale run directory left behind");
            } else {
                debug!(run_id = %record.run_id, "stale run directory pruned");
            }
        }
    }

    fn handle_failure(
        &self,
        record: &mut RunRecord,
        stdout_lines: &[String],
        stderr_lines: &[String],
    ) -> GrabarResult<()> {
        let mut output = String::new();
        for line in stdout_lines.iter().chain(stderr_lines) {
            output.push_str(line);
            output.push('\n');
        }

        record.failing_keys = self.extract_failing_keys(&output);
        if let Some(library) = &self.library {
            let maintenance = MaintenanceService::new(library);
            for key in &record.failing_keys {
                if !maintenance.report_failure(key)? {
                    debug!(key, "failing key not present in locator library");
                }
            }
        }

        let message = output
            .lines()
            .find(|line| self.failing_key.is_match(line) || line.contains("Assertion failed"))
            .unwrap_or("test process exited with failure")
            .to_string();
        let mut environment = BTreeMap::new();
        environment.insert("retries".to_string(), "0".to_string());
        match &self.config.mode {
            ExecutionMode::Local => {
                environment.insert("mode".to_string(), "local".to_string());
            }
            ExecutionMode::Remote(target) => {
                environment.insert("mode".to_string(), "remote".to_string());
                environment.insert("host".to_string(), target.host.clone());
                environment.insert(
                    "browser".to_string(),
                    target.browser.capability_name().to_string(),
                );
                environment.insert("platform".to_string(), target.platform.clone());
            }
        }
        let artifact = artifacts::FailureArtifact {
            run_id: record.run_id,
            test_name: record.test_name.clone(),
            message,
            failing_keys: record.failing_keys.clone(),
            screenshot: None,
            captured_at: Utc::now(),
            environment,
        };
        let dir = artifact.persist(&self.config.artifact_root, &output)?;
        record.trace_paths.push(dir.join("failure.json"));
        record.trace_paths.push(dir.join("output.log"));
        let screenshot = dir.join("screenshot.png");
        if screenshot.is_file() {
            record.trace_paths.push(screenshot);
        }
        record.artifact_dir = Some(dir);
        Ok(())
    }

    /// Locator keys mentioned in failure output, first occurrence order
    #[must_use]
    pub fn extract_failing_keys(&self, output: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for capture in self.failing_key.captures_iter(output) {
            let key = capture[1].to_string();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

async fn stream_lines(
    source: Option<impl tokio::io::AsyncRead + Unpin>,
    stream: OutputStream,
    events: broadcast::Sender<RunEvent>,
) -> Vec<String> {
    let Some(source) = source else {
        return Vec::new();
    };
    let mut lines = AsyncBufReader::new(source).lines();
    let mut captured = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let _ = events.send(RunEvent::Output {
            stream,
            line: line.clone(),
        });
        captured.push(line);
    }
    captured
}

/// Resolves when the watch flag turns true; pends forever if it never does
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace_with_spec(name: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("tests/generated")).unwrap();
        fs::write(
            root.path().join(format!("tests/generated/{name}.rs")),
            "// generated\n",
        )
        .unwrap();
        root
    }

    fn no_cancel() -> watch::Receiver<bool> {
        // Dropping the sender closes the channel; cancelled() then pends
        // forever, which is exactly "never cancelled".
        let (_tx, rx) = watch::channel(false);
        rx
    }

    mod record_tests {
        use super::*;

        #[test]
        fn test_lifecycle_transitions() {
            let mut record = RunRecord::new("t");
            assert_eq!(record.status, RunStatus::Pending);
            record.transition(RunStatus::Running).unwrap();
            record.transition(RunStatus::Passed).unwrap();
            assert!(record.finished_at.is_some());
            // Terminal records accept no further transitions.
            assert!(record.transition(RunStatus::Failed).is_err());
        }

        #[test]
        fn test_pending_cannot_jump_to_passed() {
            let mut record = RunRecord::new("t");
            assert!(record.transition(RunStatus::Passed).is_err());
        }

        #[test]
        fn test_pending_to_skipped_is_terminal() {
            let mut record = RunRecord::new("t");
            record.transition(RunStatus::Skipped).unwrap();
            assert!(record.status.is_terminal());
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn test_append_and_load() {
            let dir = TempDir::new().unwrap();
            let store = RunStore::open(dir.path());
            let mut record = RunRecord::new("create_customer");
            record.transition(RunStatus::Skipped).unwrap();
            store.append(&record).unwrap();
            store.append(&record).unwrap();

            let loaded = store.load_all().unwrap();
            assert_eq!(loaded.len(), 2);
            assert_eq!(loaded[0], record);
        }

        #[test]
        fn test_empty_history() {
            let dir = TempDir::new().unwrap();
            assert!(RunStore::open(dir.path()).load_all().unwrap().is_empty());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_passing_run() {
            let workspace = workspace_with_spec("ok_spec");
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("true", vec![]);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();

            let record = orchestrator.run("ok_spec", no_cancel()).await.unwrap();
            assert_eq!(record.status, RunStatus::Passed);
            assert_eq!(record.exit_code, Some(0));
            assert_eq!(record.source, RunSource::Local);
            assert_eq!(
                record.spec_rel_path.as_deref(),
                Some(std::path::Path::new("tests/generated/ok_spec.rs"))
            );
            assert!(record.failing_keys.is_empty());
            assert!(record.trace_paths.is_empty());
            assert_eq!(orchestrator.store().load_all().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_failing_run_writes_artifacts_and_extracts_keys() {
            let workspace = workspace_with_spec("bad_spec");
            let artifacts = TempDir::new().unwrap();
            let script = "echo 'locator(key=a1b2c3d4e5f60718, strategy=label, value=Customer account) not found'; exit 1";
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("sh", vec!["-c".to_string(), script.to_string()]);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();

            let record = orchestrator.run("bad_spec", no_cancel()).await.unwrap();
            assert_eq!(record.status, RunStatus::Failed);
            assert_eq!(record.exit_code, Some(1));
            assert_eq!(record.failing_keys, vec!["a1b2c3d4e5f60718".to_string()]);

            let dir = record.artifact_dir.unwrap();
            assert!(dir.join("failure.json").is_file());
            assert!(record.trace_paths.contains(&dir.join("failure.json")));
            assert!(record.trace_paths.contains(&dir.join("output.log")));
            assert!(fs::read_to_string(dir.join("output.log"))
                .unwrap()
                .contains("a1b2c3d4e5f60718"));
        }

        #[tokio::test]
        async fn test_output_events_stream_in_order() {
            let workspace = workspace_with_spec("noisy_spec");
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path()).with_command(
                "sh",
                vec!["-c".to_string(), "echo one; echo two".to_string()],
            );
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();
            let mut events = orchestrator.subscribe();

            orchestrator.run("noisy_spec", no_cancel()).await.unwrap();

            let mut lines = Vec::new();
            while let Ok(event) = events.try_recv() {
                if let RunEvent::Output { line, .. } = event {
                    lines.push(line);
                }
            }
            assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
        }

        #[tokio::test]
        async fn test_cancellation() {
            let workspace = workspace_with_spec("slow_spec");
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("sleep", vec!["30".to_string()]);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();

            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                let _ = tx.send(true);
            });

            let record = orchestrator.run("slow_spec", rx).await.unwrap();
            assert_eq!(record.status, RunStatus::Cancelled);
            assert!(record.exit_code.is_none());
        }

        #[tokio::test]
        async fn test_spawn_failure_is_terminal_failed() {
            let workspace = workspace_with_spec("ghost_spec");
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("definitely-not-a-real-binary-9f3a", vec![]);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();

            let err = orchestrator.run("ghost_spec", no_cancel()).await.unwrap_err();
            assert!(matches!(err, GrabarError::SpawnFailed { .. }));
            let history = orchestrator.store().load_all().unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].status, RunStatus::Failed);
        }

        #[tokio::test]
        async fn test_missing_spec_records_skipped() {
            let workspace = TempDir::new().unwrap();
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("true", vec![]);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();

            let err = orchestrator.run("nowhere", no_cancel()).await.unwrap_err();
            assert!(matches!(err, GrabarError::SpecNotFound { .. }));
            let history = orchestrator.store().load_all().unwrap();
            assert_eq!(history[0].status, RunStatus::Skipped);
        }

        #[tokio::test]
        async fn test_failure_feedback_marks_library_entry_failing() {
            use crate::library::{HealthStatus, LocatorLibraryEntry};
            use crate::locator::{LocatorDefinition, LocatorMetadata, Strategy};

            let workspace = workspace_with_spec("feedback_spec");
            let artifacts = TempDir::new().unwrap();
            let library =
                crate::library::LocatorLibrary::open(artifacts.path().join("locators.jsonl"))
                    .unwrap();
            let locator = LocatorDefinition::new(
                Strategy::Attribute,
                "CustomerAccount",
                LocatorMetadata {
                    attribute_name: Some("data-dyn-controlname".to_string()),
                    confidence: 1.0,
                    ..LocatorMetadata::default()
                },
                "control:CustomerAccount",
            );
            let key = locator.locator_key.clone();
            library
                .upsert(LocatorLibraryEntry::from_locator(&locator))
                .unwrap();

            let script = format!(
                "echo 'locator(key={key}, strategy=attribute, value=CustomerAccount) not found'; exit 1"
            );
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("sh", vec!["-c".to_string(), script]);
            let orchestrator = ExecutionOrchestrator::new(config)
                .unwrap()
                .with_library(library);

            let record = orchestrator.run("feedback_spec", no_cancel()).await.unwrap();
            assert_eq!(record.status, RunStatus::Failed);
            assert_eq!(record.failing_keys, vec![key.clone()]);

            let reloaded =
                crate::library::LocatorLibrary::open(artifacts.path().join("locators.jsonl"))
                    .unwrap();
            assert_eq!(reloaded.lookup(&key).unwrap().status, HealthStatus::Failing);
        }

        #[test]
        fn test_default_command_targets_the_spec_stem() {
            let config = RunnerConfig::new(".", ".grabar");
            assert_eq!(config.program, "cargo");
            let args = expand_args(
                &config.args,
                std::path::Path::new("tests/generated/create_customer.rs"),
            );
            // --test takes a target name, never a file path.
            assert_eq!(args, vec!["test", "--test", "create_customer"]);
        }

        #[tokio::test]
        async fn test_stale_run_directories_pruned() {
            let workspace = workspace_with_spec("stale_spec");
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("sh", vec!["-c".to_string(), "exit 1".to_string()])
                .with_keep_artifacts(1);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();

            let first = orchestrator.run("stale_spec", no_cancel()).await.unwrap();
            let second = orchestrator.run("stale_spec", no_cancel()).await.unwrap();

            assert!(!first.artifact_dir.unwrap().exists());
            assert!(second.artifact_dir.unwrap().exists());
            // History keeps every record even after its directory is pruned.
            assert_eq!(orchestrator.store().load_all().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_run_creates_runner_config() {
            let workspace = workspace_with_spec("cfg_spec");
            let artifacts = TempDir::new().unwrap();
            let config = RunnerConfig::new(workspace.path(), artifacts.path())
                .with_command("true", vec![]);
            let orchestrator = ExecutionOrchestrator::new(config).unwrap();
            orchestrator.run("cfg_spec", no_cancel()).await.unwrap();
            assert!(workspace.path().join(artifacts::CONFIG_FILE_NAME).is_file());
        }
    }
}
