//! Runs the layout-verification tool (KLayout in batch mode) as a subprocess.
//!
//! The invocation is an argument vector, never a shell string:
//!
//! ```text
//! klayout -b -r <deck> -rd input=<gds> -rd top=<cell> -rd report=<report>
//!         [-rd schematic=<netlist> -rd target=<extracted>] [-rd key=value ...]
//! ```

use crate::domain::model::{JobExtras, JobOutcome, VerificationJob};
use crate::domain::ports::JobRunner;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_EXECUTABLE: &str = "klayout";
pub const EXECUTABLE_ENV: &str = "KLAYOUT";

/// `$KLAYOUT` if set, else `klayout` from `PATH`.
pub fn default_executable() -> PathBuf {
    std::env::var_os(EXECUTABLE_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE))
}

#[derive(Debug, Clone)]
pub struct KlayoutRunner {
    executable: PathBuf,
    deck: PathBuf,
    params: Vec<(String, String)>,
    timeout: Option<Duration>,
    abort: Arc<AtomicBool>,
}

impl KlayoutRunner {
    pub fn new(executable: impl Into<PathBuf>, deck: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            deck: deck.into(),
            params: Vec::new(),
            timeout: None,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Extra `-rd key=value` parameters, appended after the standard ones.
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn command_args(&self, job: &VerificationJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-b".into(), "-r".into(), self.deck.clone().into()];

        let mut define = |key: &str, value: &Path| {
            let mut pair = OsString::from(format!("{}=", key));
            pair.push(value.as_os_str());
            args.push("-rd".into());
            args.push(pair);
        };

        define("input", &job.layout);
        define("top", Path::new(&job.cell));
        if let JobExtras::Lvs { schematic, .. } = &job.extras {
            define("schematic", schematic);
        }
        define("report", &job.report);
        if let JobExtras::Lvs { target, .. } = &job.extras {
            define("target", target);
        }
        for (key, value) in &self.params {
            define(key, Path::new(value));
        }

        args
    }
}

fn log_path(report: &Path) -> PathBuf {
    let mut name = report.as_os_str().to_owned();
    name.push(".log");
    PathBuf::from(name)
}

fn log_sink(report: &Path) -> std::io::Result<(Stdio, Stdio)> {
    let out = File::create(log_path(report))?;
    let err = out.try_clone()?;
    Ok((Stdio::from(out), Stdio::from(err)))
}

fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[async_trait::async_trait]
impl JobRunner for KlayoutRunner {
    async fn run(&self, job: &VerificationJob) -> JobOutcome {
        if self.abort.load(Ordering::SeqCst) {
            return JobOutcome::Aborted;
        }

        if let Err(e) = remove_stale(&job.report) {
            tracing::warn!(
                "[{}] Could not remove stale report {}: {}",
                job.cell,
                job.report.display(),
                e
            );
        }

        let mut command = Command::new(&self.executable);
        command
            .args(self.command_args(job))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        match log_sink(&job.report) {
            Ok((out, err)) => {
                command.stdout(out).stderr(err);
            }
            Err(e) => {
                tracing::warn!("[{}] Tool output will be discarded: {}", job.cell, e);
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        tracing::debug!("[{}] Launching {:?}", job.cell, command.as_std());
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    "[{}] Failed to start {}: {}",
                    job.cell,
                    self.executable.display(),
                    e
                );
                return JobOutcome::LaunchFailed {
                    message: e.to_string(),
                };
            }
        };

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!("[{}] Timed out after {:?}, killing tool", job.cell, limit);
                    if let Err(e) = child.kill().await {
                        tracing::warn!("[{}] Failed to kill tool: {}", job.cell, e);
                    }
                    return JobOutcome::TimedOut;
                }
            },
            None => child.wait().await,
        };

        match status {
            Ok(status) => {
                tracing::debug!("[{}] Tool exited with {}", job.cell, status);
                if !status.success() {
                    tracing::warn!("[{}] Tool exited with {}", job.cell, status);
                }
                JobOutcome::Exited {
                    code: status.code(),
                }
            }
            Err(e) => {
                tracing::warn!("[{}] Lost track of tool process: {}", job.cell, e);
                JobOutcome::Exited { code: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvs_job() -> VerificationJob {
        VerificationJob {
            cell: "NAND2_X1".to_string(),
            layout: PathBuf::from("/work/stdcells.gds"),
            report: PathBuf::from("/work/lvs_results/NAND2_X1-lvslvs.lvsdb"),
            extras: JobExtras::Lvs {
                schematic: PathBuf::from("/work/stdcells.cdl"),
                target: PathBuf::from("/work/extraction_results/NAND2_X1-rcx.sp"),
            },
        }
    }

    #[test]
    fn test_lvs_command_args() {
        let runner = KlayoutRunner::new("klayout", "/decks/lvs.lylvs")
            .with_params(vec![("corner".to_string(), "tt".to_string())]);

        let args: Vec<String> = runner
            .command_args(&lvs_job())
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-b",
                "-r",
                "/decks/lvs.lylvs",
                "-rd",
                "input=/work/stdcells.gds",
                "-rd",
                "top=NAND2_X1",
                "-rd",
                "schematic=/work/stdcells.cdl",
                "-rd",
                "report=/work/lvs_results/NAND2_X1-lvslvs.lvsdb",
                "-rd",
                "target=/work/extraction_results/NAND2_X1-rcx.sp",
                "-rd",
                "corner=tt",
            ]
        );
    }

    #[test]
    fn test_cell_names_are_not_shell_split() {
        let runner = KlayoutRunner::new("klayout", "cell.lydrc");
        let job = VerificationJob {
            cell: "odd cell; rm -rf".to_string(),
            layout: PathBuf::from("in.gds"),
            report: PathBuf::from("out.lyrdb"),
            extras: JobExtras::Drc,
        };

        let args = runner.command_args(&job);
        assert_eq!(args.len(), 9);
        assert_eq!(args[6], OsString::from("top=odd cell; rm -rf"));
    }

    #[test]
    fn test_log_path_sits_next_to_report() {
        assert_eq!(
            log_path(Path::new("/out/INV_X1_drc.lyrdb")),
            PathBuf::from("/out/INV_X1_drc.lyrdb.log")
        );
    }

    #[tokio::test]
    async fn test_abort_flag_prevents_launch() {
        let abort = Arc::new(AtomicBool::new(true));
        let runner = KlayoutRunner::new("/definitely/not/a/tool", "deck").with_abort_flag(abort);

        let outcome = runner.run(&lvs_job()).await;
        assert_eq!(outcome, JobOutcome::Aborted);
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let job = VerificationJob {
            cell: "INV_X1".to_string(),
            layout: dir.path().join("in.gds"),
            report: dir.path().join("INV_X1_drc.lyrdb"),
            extras: JobExtras::Drc,
        };
        let runner = KlayoutRunner::new(dir.path().join("no-such-tool"), "deck");

        let outcome = runner.run(&job).await;
        assert!(matches!(outcome, JobOutcome::LaunchFailed { .. }));
    }
}
