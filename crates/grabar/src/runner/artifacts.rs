//! Failure artifacts and on-disk runner housekeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::result::GrabarResult;

/// File name of the runner configuration inside a workspace
pub const CONFIG_FILE_NAME: &str = "grabar.toml";

const DEFAULT_CONFIG: &str = "\
[runner]
settle_timeout_ms = 5000
headless = true
";

/// Ensure a runner configuration exists in the workspace root.
///
/// Two runners may race to create the file; losing the race is benign, the
/// winner's file is used as-is.
pub fn ensure_config(root: &Path) -> GrabarResult<PathBuf> {
    let path = root.join(CONFIG_FILE_NAME);
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            file.write_all(DEFAULT_CONFIG.as_bytes())?;
            Ok(path)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(path),
        Err(e) => Err(e.into()),
    }
}

/// Diagnostic record written when a run fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureArtifact {
    /// Run that failed
    pub run_id: Uuid,
    /// Test that was executing
    pub test_name: String,
    /// Failure message captured from child output
    pub message: String,
    /// Locator keys extracted from the failure output
    pub failing_keys: Vec<String>,
    /// Screenshot left behind by the driver, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    /// When the artifact was written
    pub captured_at: DateTime<Utc>,
    /// Execution environment descriptor (browser, platform, mode, retries)
    pub environment: BTreeMap<String, String>,
}

impl FailureArtifact {
    /// Write this artifact plus the raw output log under the run's directory.
    /// A `screenshot.png` already dropped there by the driver is referenced.
    pub fn persist(&self, artifact_root: &Path, output: &str) -> GrabarResult<PathBuf> {
        let dir = artifact_root.join(self.run_id.to_string());
        fs::create_dir_all(&dir)?;
        let mut artifact = self.clone();
        if artifact.screenshot.is_none() {
            let candidate = dir.join("screenshot.png");
            if candidate.is_file() {
                artifact.screenshot = Some(candidate);
            }
        }
        fs::write(dir.join("failure.json"), serde_json::to_vec_pretty(&artifact)?)?;
        fs::write(dir.join("output.log"), output)?;
        Ok(dir)
    }
}

/// Delete a directory with bounded backoff.
///
/// The OS can hold artifact files open briefly after a child exits; retry a
/// few times with growing pauses before giving up.
pub async fn remove_dir_with_retry(path: &Path, attempts: u32) -> GrabarResult<()> {
    let mut last_error = None;
    for attempt in 0..attempts.max(1) {
        if !path.exists() {
            return Ok(());
        }
        match fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt + 1))).await;
    }
    match last_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod config_tests {
        use super::*;

        #[test]
        fn test_creates_default_config_once() {
            let root = TempDir::new().unwrap();
            let path = ensure_config(root.path()).unwrap();
            let content = fs::read_to_string(&path).unwrap();
            assert!(content.contains("settle_timeout_ms"));

            fs::write(&path, "[runner]\nheadless = false\n").unwrap();
            let again = ensure_config(root.path()).unwrap();
            assert_eq!(again, path);
            // A pre-existing file is never overwritten.
            assert!(fs::read_to_string(&path).unwrap().contains("false"));
        }
    }

    mod artifact_tests {
        use super::*;

        #[test]
        fn test_persist_writes_json_and_log() {
            let root = TempDir::new().unwrap();
            let artifact = FailureArtifact {
                run_id: Uuid::new_v4(),
                test_name: "create_customer".to_string(),
                message: "locator(key=a1b2c3d4e5f60718, strategy=label, value=Customer account) not found".to_string(),
                failing_keys: vec!["a1b2c3d4e5f60718".to_string()],
                screenshot: None,
                captured_at: Utc::now(),
                environment: BTreeMap::from([("mode".to_string(), "local".to_string())]),
            };
            let dir = artifact.persist(root.path(), "line one\nline two\n").unwrap();

            let loaded: FailureArtifact = serde_json::from_slice(
                &fs::read(dir.join("failure.json")).unwrap(),
            )
            .unwrap();
            assert_eq!(loaded, artifact);
            assert_eq!(
                fs::read_to_string(dir.join("output.log")).unwrap(),
                "line one\nline two\n"
            );
        }

        #[test]
        fn test_persist_references_existing_screenshot() {
            let root = TempDir::new().unwrap();
            let run_id = Uuid::new_v4();
            let dir = root.path().join(run_id.to_string());
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("screenshot.png"), [0x89, 0x50]).unwrap();

            let artifact = FailureArtifact {
                run_id,
                test_name: "t".to_string(),
                message: "m".to_string(),
                failing_keys: vec![],
                screenshot: None,
                captured_at: Utc::now(),
                environment: BTreeMap::new(),
            };
            artifact.persist(root.path(), "").unwrap();
            let loaded: FailureArtifact =
                serde_json::from_slice(&fs::read(dir.join("failure.json")).unwrap()).unwrap();
            assert_eq!(loaded.screenshot, Some(dir.join("screenshot.png")));
        }

        #[tokio::test]
        async fn test_remove_dir_with_retry() {
            let root = TempDir::new().unwrap();
            let dir = root.path().join("run");
            fs::create_dir_all(&dir).unwrap();
            remove_dir_with_retry(&dir, 3).await.unwrap();
            assert!(!dir.exists());
            // Removing an absent directory is not an error.
            remove_dir_with_retry(&dir, 3).await.unwrap();
        }
    }
}
