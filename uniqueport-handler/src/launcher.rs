//! Child process launcher
//!
//! Runs the bundled executable with the JSON event as its final argument.
//! The child shares the parent's stdin, stdout and stderr, so its output
//! shows up as the invocation's own output.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use uniqueport_core::InvocationError;

/// Executable launched when nothing else is configured
pub const DEFAULT_PROGRAM: &str = "./uniqueport";

/// Environment variable carrying the X-Ray trace header
const TRACE_ID_ENV: &str = "_X_AMZN_TRACE_ID";

/// Launcher configuration
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Program to run
    pub program: PathBuf,
    /// Arguments placed before the event argument
    pub args: Vec<String>,
    /// Working directory for the child (parent's when unset)
    pub working_dir: Option<PathBuf>,
    /// Kill the child and fail once this elapses (no limit when unset)
    pub timeout: Option<Duration>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }
}

/// Spawns one child per invocation and waits for it
#[derive(Debug, Clone, Default)]
pub struct Launcher {
    config: LauncherConfig,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Program path as it will be executed.
    ///
    /// A relative path with a directory part (`./uniqueport`) is resolved
    /// against the configured working directory; how `current_dir` interacts
    /// with relative programs is otherwise platform specific. Bare names are
    /// left for `PATH` lookup.
    pub fn program(&self) -> PathBuf {
        let program = &self.config.program;
        match &self.config.working_dir {
            Some(dir) if program.is_relative() && has_dir_part(program) => dir.join(program),
            _ => program.clone(),
        }
    }

    fn command(&self, event_json: &str, trace_id: Option<&str>) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(&self.config.args)
            .arg(event_json)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(trace_id) = trace_id {
            cmd.env(TRACE_ID_ENV, trace_id);
        }

        cmd
    }

    /// Run the child to completion and map its exit status
    pub async fn run(&self, event_json: &str, trace_id: Option<&str>) -> Result<(), InvocationError> {
        let program = self.program();
        let mut child = self
            .command(event_json, trace_id)
            .spawn()
            .map_err(|source| InvocationError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        debug!(pid = ?child.id(), program = %program.display(), "Launched child process");

        let status = match self.config.timeout {
            None => child.wait().await.map_err(InvocationError::Wait)?,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.map_err(InvocationError::Wait)?,
                Err(_) => {
                    warn!(
                        pid = ?child.id(),
                        timeout = ?limit,
                        "Child process timed out, killing it"
                    );
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill timed out child");
                    }
                    return Err(InvocationError::Timeout(limit));
                }
            },
        };

        debug!(status = %status, "Child process exited");
        exit_outcome(status)
    }
}

fn has_dir_part(path: &Path) -> bool {
    path.components().count() > 1
}

/// Map an exit status to the invocation outcome
pub fn exit_outcome(status: ExitStatus) -> Result<(), InvocationError> {
    if status.success() {
        return Ok(());
    }

    match status.code() {
        Some(code) => Err(InvocationError::NonZeroExit(code)),
        None => Err(InvocationError::Signaled(signal_of(status))),
    }
}

#[cfg(unix)]
fn signal_of(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> LauncherConfig {
        LauncherConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string(), "uniqueport".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_program_resolution() {
        let launcher = Launcher::new(LauncherConfig {
            working_dir: Some(PathBuf::from("/var/task")),
            ..Default::default()
        });
        assert_eq!(launcher.program(), PathBuf::from("/var/task/./uniqueport"));

        let launcher = Launcher::new(LauncherConfig {
            program: PathBuf::from("sh"),
            working_dir: Some(PathBuf::from("/var/task")),
            ..Default::default()
        });
        assert_eq!(launcher.program(), PathBuf::from("sh"));

        assert_eq!(Launcher::default().program(), PathBuf::from("./uniqueport"));
    }

    #[tokio::test]
    async fn test_exit_zero() {
        let launcher = Launcher::new(sh("exit 0"));
        assert!(launcher.run("{}", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_exit_non_zero() {
        let launcher = Launcher::new(sh("exit 2"));
        let err = launcher.run("{}", None).await.unwrap_err();

        assert_eq!(err.to_string(), "Process exited with non-zero status code: 2");
    }

    #[tokio::test]
    async fn test_killed_by_signal() {
        let launcher = Launcher::new(sh("kill -9 $$"));
        let err = launcher.run("{}", None).await.unwrap_err();

        assert!(matches!(err, InvocationError::Signaled(Some(9))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let launcher = Launcher::new(LauncherConfig {
            program: PathBuf::from("./definitely-not-uniqueport"),
            ..Default::default()
        });
        let err = launcher.run("{}", None).await.unwrap_err();

        match err {
            InvocationError::Spawn { program, source } => {
                assert_eq!(program, "./definitely-not-uniqueport");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let launcher = Launcher::new(LauncherConfig {
            timeout: Some(Duration::from_millis(100)),
            ..sh("sleep 10")
        });

        let started = Instant::now();
        let err = launcher.run("{}", None).await.unwrap_err();

        assert!(matches!(err, InvocationError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_trace_id_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(LauncherConfig {
            working_dir: Some(dir.path().to_path_buf()),
            ..sh(r#"printf '%s' "$_X_AMZN_TRACE_ID" > trace.txt"#)
        });

        launcher
            .run("{}", Some("Root=1-5759e988-bd862e3fe1be46a994272793"))
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("trace.txt")).unwrap();
        assert_eq!(written, "Root=1-5759e988-bd862e3fe1be46a994272793");
    }
}
