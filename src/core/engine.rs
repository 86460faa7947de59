use crate::config::BatchConfig;
use crate::core::cells::enumerate_cells;
use crate::core::classify::classify;
use crate::core::summary::render_cell;
use crate::domain::model::{BatchResult, CellDisposition, ErrorReason, JobExtras, JobOutcome};
use crate::domain::ports::{CellSource, JobRunner};
use crate::parsers::parse_report;
use crate::utils::error::{CheckError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Drives cell enumeration, tool runs, parsing and classification for one
/// batch, and folds the per-cell dispositions into a [`BatchResult`].
pub struct BatchEngine<R: JobRunner> {
    config: Arc<BatchConfig>,
    runner: Arc<R>,
    abort: Arc<AtomicBool>,
    echo: bool,
}

impl<R: JobRunner + 'static> BatchEngine<R> {
    pub fn new(config: BatchConfig, runner: R) -> Self {
        Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
            abort: Arc::new(AtomicBool::new(false)),
            echo: true,
        }
    }

    /// Shares an abort flag with the caller (and usually the runner).
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    /// Print each cell's outcome to stdout as it completes.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn prepare_output_dirs(&self) -> Result<()> {
        for dir in self.config.output_dirs() {
            std::fs::create_dir_all(dir).map_err(|source| CheckError::OutputDirError {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    pub async fn run(&self, source: &dyn CellSource) -> Result<BatchResult> {
        let mode = self.config.mode;
        let cells = enumerate_cells(source, &self.config.skip_cells)?;
        tracing::info!(
            "Found {} cells: {}",
            cells.len(),
            cells.join(", ")
        );
        if self.echo {
            println!("Found {} cells: {}", cells.len(), cells.join(", "));
        }

        self.prepare_output_dirs()?;

        let jobs = self.config.jobs.clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(jobs));
        let mut workers = JoinSet::new();
        let mut task_cells = HashMap::new();
        let mut outcomes: Vec<(usize, CellDisposition)> = Vec::with_capacity(cells.len());

        tracing::debug!("Dispatching {} {} job(s), {} at a time", cells.len(), mode, jobs);

        for (index, cell) in cells.iter().enumerate() {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| CheckError::SchedulerError {
                    message: e.to_string(),
                })?;

            if self.abort.load(Ordering::SeqCst) {
                drop(permit);
                let disposition = CellDisposition::Errored(ErrorReason::Aborted);
                self.echo_cell(cell, &disposition);
                outcomes.push((index, disposition));
                continue;
            }

            let config = Arc::clone(&self.config);
            let runner = Arc::clone(&self.runner);
            let cell_name = cell.clone();
            let echo = self.echo;
            let handle = workers.spawn(async move {
                let _permit = permit;
                let disposition = process_cell(&config, runner.as_ref(), &cell_name).await;
                if echo {
                    println!("{}", render_cell(config.mode, &cell_name, &disposition));
                }
                (index, disposition)
            });
            task_cells.insert(handle.id(), index);
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(done) => outcomes.push(done),
                Err(e) => {
                    let Some(&index) = task_cells.get(&e.id()) else {
                        return Err(CheckError::SchedulerError {
                            message: e.to_string(),
                        });
                    };
                    tracing::error!("[{}] Worker failed: {}", cells[index], e);
                    let disposition = CellDisposition::Errored(ErrorReason::Internal(e.to_string()));
                    self.echo_cell(&cells[index], &disposition);
                    outcomes.push((index, disposition));
                }
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let mut result = BatchResult::new(mode);
        for (index, disposition) in outcomes {
            result.record(cells[index].clone(), disposition);
        }

        tracing::info!(
            "{} finished: {} clean, {} failed, {} errored",
            mode,
            result.clean.len(),
            result.failed.len(),
            result.errored.len()
        );
        Ok(result)
    }

    fn echo_cell(&self, cell: &str, disposition: &CellDisposition) {
        if self.echo {
            println!("{}", render_cell(self.config.mode, cell, disposition));
        }
    }
}

/// One cell, start to finish: prerequisite check, tool run, parse, classify.
async fn process_cell<R: JobRunner + ?Sized>(
    config: &BatchConfig,
    runner: &R,
    cell: &str,
) -> CellDisposition {
    let job = config.job_for(cell);

    if let JobExtras::Lvs { schematic, .. } = &job.extras {
        if !schematic.is_file() {
            tracing::warn!("[{}] No schematic found: {}", cell, schematic.display());
            return CellDisposition::Errored(ErrorReason::NoSchematic);
        }
    }

    tracing::info!("[{}] Running {}", cell, config.mode);
    let outcome = runner.run(&job).await;

    let report = match outcome {
        JobOutcome::Exited { .. } => {
            let mode = config.mode;
            let path = job.report.clone();
            match tokio::task::spawn_blocking(move || parse_report(mode, &path)).await {
                Ok(report) => report,
                Err(e) => {
                    return CellDisposition::Errored(ErrorReason::Internal(e.to_string()));
                }
            }
        }
        _ => Ok(None),
    };

    let disposition = classify(&outcome, report);
    match &disposition {
        CellDisposition::Clean => tracing::info!("[{}] Clean", cell),
        CellDisposition::Failed(detail) => {
            tracing::info!("[{}] Failed with {} issue(s)", cell, detail.issue_count())
        }
        CellDisposition::Errored(reason) => tracing::warn!("[{}] Errored: {}", cell, reason),
    }
    disposition
}
