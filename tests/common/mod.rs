#![allow(dead_code)]

use async_trait::async_trait;
use cellcheck::domain::model::{JobOutcome, VerificationJob};
use cellcheck::domain::ports::JobRunner;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INV_X1_DRC: &str = include_str!("../fixtures/inv_x1_drc.lyrdb");
pub const NAND2_X1_DRC: &str = include_str!("../fixtures/nand2_x1_drc.lyrdb");
pub const INV_X1_LVS: &str = include_str!("../fixtures/inv_x1.lvsdb");
pub const NAND2_X1_LVS: &str = include_str!("../fixtures/nand2_x1.lvsdb");

#[derive(Debug, Clone)]
pub enum Script {
    /// Write this text to the job's report path.
    Report(&'static str),
    /// Exit without writing anything.
    Silent,
    TimedOut,
}

/// Stand-in for the verification tool: writes canned reports per cell and
/// remembers which cells it was asked to run.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, cell: &str, script: Script) -> Self {
        self.scripts.insert(cell.to_string(), script);
        self
    }

    pub fn delay(mut self, cell: &str, delay: Duration) -> Self {
        self.delays.insert(cell.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(&self, job: &VerificationJob) -> JobOutcome {
        self.calls.lock().unwrap().push(job.cell.clone());

        if let Some(delay) = self.delays.get(&job.cell) {
            tokio::time::sleep(*delay).await;
        }

        match self.scripts.get(&job.cell).cloned().unwrap_or(Script::Silent) {
            Script::Report(body) => {
                std::fs::write(&job.report, body).unwrap();
                JobOutcome::Exited { code: Some(0) }
            }
            Script::Silent => JobOutcome::Exited { code: Some(1) },
            Script::TimedOut => JobOutcome::TimedOut,
        }
    }
}
