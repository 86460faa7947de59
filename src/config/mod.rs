#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::FileConfig;

use crate::adapters::klayout::{default_executable, KlayoutRunner};
use crate::domain::model::{JobExtras, Mode, VerificationJob};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_existing_file, validate_max_number, validate_non_empty_string, validate_param_key,
    validate_path, validate_positive_number, validate_required_field, Validate,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for concurrent tool processes.
pub const MAX_JOBS: usize = 1024;

pub const DEFAULT_SKIP_CELLS: [&str; 1] = ["FILL"];

pub const DRC_DEFAULT_DECK: &str = "scripts/drc/batch/cell.lydrc";
pub const DRC_DEFAULT_OUTPUT_DIR: &str = "drc-results";
pub const LVS_DEFAULT_DECK: &str = "scripts/lvs/batch-process/batch-cell-lvs.lylvs";
pub const LVS_DEFAULT_OUTPUT_DIR: &str = "lvs_results";
pub const LVS_DEFAULT_EXTRACTION_DIR: &str = "extraction_results";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Verification tool executable; a bare name is looked up on `PATH`.
    pub executable: PathBuf,
    /// Extra script parameters, passed after the standard ones.
    pub params: Vec<(String, String)>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            params: Vec::new(),
        }
    }
}

/// Everything a batch run needs. Built once (CLI, TOML file, or code) and
/// handed to [`crate::BatchEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub mode: Mode,
    /// Multi-cell layout file.
    pub input: PathBuf,
    /// Rule deck / verification script run by the tool.
    pub deck: PathBuf,
    pub output_dir: PathBuf,
    /// Reference netlist, LVS only.
    pub schematic: Option<PathBuf>,
    /// Extracted netlists, LVS only.
    pub extraction_dir: PathBuf,
    pub skip_cells: Vec<String>,
    /// Explicit cell list. Empty means every cell of `input`.
    pub cells: Vec<String>,
    /// Maximum number of tool processes running at once.
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub tool: ToolConfig,
    /// Let errored cells pass the run; only failed cells block it.
    pub allow_errored: bool,
}

impl BatchConfig {
    pub fn new(mode: Mode, input: impl Into<PathBuf>) -> Self {
        let (deck, output_dir) = match mode {
            Mode::Drc => (DRC_DEFAULT_DECK, DRC_DEFAULT_OUTPUT_DIR),
            Mode::Lvs => (LVS_DEFAULT_DECK, LVS_DEFAULT_OUTPUT_DIR),
        };

        Self {
            mode,
            input: input.into(),
            deck: PathBuf::from(deck),
            output_dir: PathBuf::from(output_dir),
            schematic: None,
            extraction_dir: PathBuf::from(LVS_DEFAULT_EXTRACTION_DIR),
            skip_cells: DEFAULT_SKIP_CELLS.iter().map(|c| c.to_string()).collect(),
            cells: Vec::new(),
            jobs: 1,
            timeout: None,
            tool: ToolConfig::default(),
            allow_errored: false,
        }
    }

    pub fn drc(input: impl Into<PathBuf>) -> Self {
        Self::new(Mode::Drc, input)
    }

    pub fn lvs(input: impl Into<PathBuf>, schematic: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(Mode::Lvs, input);
        config.schematic = Some(schematic.into());
        config
    }

    pub fn report_path(&self, cell: &str) -> PathBuf {
        match self.mode {
            Mode::Drc => self.output_dir.join(format!("{}_drc.lyrdb", cell)),
            Mode::Lvs => self.output_dir.join(format!("{}-lvslvs.lvsdb", cell)),
        }
    }

    pub fn target_path(&self, cell: &str) -> PathBuf {
        self.extraction_dir.join(format!("{}-rcx.sp", cell))
    }

    pub fn job_for(&self, cell: &str) -> VerificationJob {
        let extras = match self.mode {
            Mode::Drc => JobExtras::Drc,
            Mode::Lvs => JobExtras::Lvs {
                schematic: self.schematic.clone().unwrap_or_default(),
                target: self.target_path(cell),
            },
        };

        VerificationJob {
            cell: cell.to_string(),
            layout: self.input.clone(),
            report: self.report_path(cell),
            extras,
        }
    }

    /// Directories that must exist before the first cell runs.
    pub fn output_dirs(&self) -> Vec<&Path> {
        match self.mode {
            Mode::Drc => vec![self.output_dir.as_path()],
            Mode::Lvs => vec![self.output_dir.as_path(), self.extraction_dir.as_path()],
        }
    }

    /// Resolves every path against the current directory, so the tool sees
    /// the same files whatever directory it runs in.
    pub fn into_absolute(mut self) -> Result<Self> {
        self.input = std::path::absolute(&self.input)?;
        self.deck = std::path::absolute(&self.deck)?;
        self.output_dir = std::path::absolute(&self.output_dir)?;
        self.extraction_dir = std::path::absolute(&self.extraction_dir)?;
        self.schematic = self.schematic.map(std::path::absolute).transpose()?;
        Ok(self)
    }

    pub fn klayout_runner(&self, abort: Arc<AtomicBool>) -> KlayoutRunner {
        KlayoutRunner::new(self.tool.executable.clone(), self.deck.clone())
            .with_params(self.tool.params.clone())
            .with_timeout(self.timeout)
            .with_abort_flag(abort)
    }
}

impl Validate for BatchConfig {
    fn validate(&self) -> Result<()> {
        validate_existing_file("input", &self.input)?;
        validate_existing_file("deck", &self.deck)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_positive_number("jobs", self.jobs, 1)?;
        validate_max_number("jobs", self.jobs, MAX_JOBS)?;
        validate_path("tool.executable", &self.tool.executable)?;

        if let Some(timeout) = self.timeout {
            validate_positive_number("timeout_seconds", timeout.as_secs() as usize, 1)?;
        }

        for cell in self.skip_cells.iter().chain(&self.cells) {
            validate_non_empty_string("cell", cell)?;
        }

        for (key, _) in &self.tool.params {
            validate_param_key("tool.params", key)?;
        }

        if self.mode == Mode::Lvs {
            // Existence is checked per cell so a missing netlist shows up in
            // the summary instead of aborting the run.
            let schematic = validate_required_field("schematic", &self.schematic)?;
            validate_path("schematic", schematic)?;
            validate_path("extraction_dir", &self.extraction_dir)?;
        }

        Ok(())
    }
}
