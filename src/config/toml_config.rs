use crate::config::BatchConfig;
use crate::domain::model::Mode;
use crate::utils::error::{CheckError, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Optional settings file layered between the built-in defaults and the
/// command line.
///
/// ```toml
/// [tool]
/// executable = "${KLAYOUT_HOME}/klayout"
/// params = { corner = "tt" }
///
/// [batch]
/// skip_cells = ["FILL", "TAPCELL"]
/// jobs = 4
/// timeout_seconds = 900
///
/// [lvs]
/// schematic = "netlists/stdcells.cdl"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub tool: Option<ToolSection>,
    pub batch: Option<BatchSection>,
    pub drc: Option<DrcSection>,
    pub lvs: Option<LvsSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSection {
    pub executable: Option<PathBuf>,
    pub params: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchSection {
    pub skip_cells: Option<Vec<String>>,
    pub cells: Option<Vec<String>>,
    pub jobs: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub allow_errored: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrcSection {
    pub deck: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LvsSection {
    pub deck: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub extraction_dir: Option<PathBuf>,
    pub schematic: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| CheckError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CheckError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left
    /// as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// Overwrites the fields of `config` that this file sets.
    pub fn apply_to(&self, config: &mut BatchConfig) {
        if let Some(tool) = &self.tool {
            if let Some(executable) = &tool.executable {
                config.tool.executable = executable.clone();
            }
            if let Some(params) = &tool.params {
                config.tool.params = params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
            }
        }

        if let Some(batch) = &self.batch {
            if let Some(skip) = &batch.skip_cells {
                config.skip_cells = skip.clone();
            }
            if let Some(cells) = &batch.cells {
                config.cells = cells.clone();
            }
            if let Some(jobs) = batch.jobs {
                config.jobs = jobs;
            }
            if let Some(secs) = batch.timeout_seconds {
                config.timeout = Some(Duration::from_secs(secs));
            }
            if let Some(allow) = batch.allow_errored {
                config.allow_errored = allow;
            }
        }

        match config.mode {
            Mode::Drc => {
                if let Some(drc) = &self.drc {
                    if let Some(deck) = &drc.deck {
                        config.deck = deck.clone();
                    }
                    if let Some(dir) = &drc.output_dir {
                        config.output_dir = dir.clone();
                    }
                }
            }
            Mode::Lvs => {
                if let Some(lvs) = &self.lvs {
                    if let Some(deck) = &lvs.deck {
                        config.deck = deck.clone();
                    }
                    if let Some(dir) = &lvs.output_dir {
                        config.output_dir = dir.clone();
                    }
                    if let Some(dir) = &lvs.extraction_dir {
                        config.extraction_dir = dir.clone();
                    }
                    if let Some(schematic) = &lvs.schematic {
                        config.schematic = Some(schematic.clone());
                    }
                }
            }
        }
    }
}
