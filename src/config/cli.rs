use crate::config::{BatchConfig, FileConfig};
use crate::domain::model::Mode;
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "cellcheck", version)]
#[command(about = "Run DRC or LVS on every cell of a layout and summarize the results")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Design-rule check every cell.
    Drc(CommonArgs),
    /// Layout-versus-schematic check every cell.
    Lvs(LvsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Multi-cell layout file (GDSII).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Verification script passed to the tool with -r.
    #[arg(short, long)]
    pub deck: Option<PathBuf>,

    /// Directory for per-cell reports.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// TOML settings file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Cell to leave out; repeat for more. Replaces the default skip set.
    #[arg(long = "skip", value_name = "CELL")]
    pub skip: Vec<String>,

    /// Check every cell, including the default skip set.
    #[arg(long, conflicts_with = "skip")]
    pub no_skip: bool,

    /// Only check this cell; repeat for more. The layout is not scanned.
    #[arg(long = "cell", value_name = "CELL")]
    pub cells: Vec<String>,

    /// Number of tool processes to run at once.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Kill a tool run after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Verification tool executable (defaults to $KLAYOUT, then `klayout`).
    #[arg(long)]
    pub tool: Option<PathBuf>,

    /// Extra script parameter passed as -rd KEY=VALUE; repeat for more.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Also write the summary as JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Do not fail the run for cells that errored (no report, timeout, ...).
    #[arg(long)]
    pub allow_errored: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LvsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Reference netlist the layout is compared against.
    #[arg(short, long)]
    pub schematic: Option<PathBuf>,

    /// Directory for extracted netlists.
    #[arg(long)]
    pub extraction_dir: Option<PathBuf>,
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))
}

impl CliConfig {
    pub fn common(&self) -> &CommonArgs {
        match &self.command {
            Command::Drc(common) => common,
            Command::Lvs(lvs) => &lvs.common,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.command {
            Command::Drc(_) => Mode::Drc,
            Command::Lvs(_) => Mode::Lvs,
        }
    }

    /// Defaults, then the TOML file, then command-line flags.
    pub fn batch_config(&self) -> Result<BatchConfig> {
        let common = self.common();
        let mut config = BatchConfig::new(self.mode(), &common.input);

        if let Some(path) = &common.config {
            tracing::debug!("Loading settings from {}", path.display());
            FileConfig::from_file(path)?.apply_to(&mut config);
        }

        if let Some(deck) = &common.deck {
            config.deck = deck.clone();
        }
        if let Some(dir) = &common.output_dir {
            config.output_dir = dir.clone();
        }
        if !common.skip.is_empty() {
            config.skip_cells = common.skip.clone();
        }
        if common.no_skip {
            config.skip_cells.clear();
        }
        if !common.cells.is_empty() {
            config.cells = common.cells.clone();
        }
        if let Some(jobs) = common.jobs {
            config.jobs = jobs;
        }
        if let Some(secs) = common.timeout {
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(tool) = &common.tool {
            config.tool.executable = tool.clone();
        }
        config.tool.params.extend(common.params.iter().cloned());
        if common.allow_errored {
            config.allow_errored = true;
        }

        if let Command::Lvs(lvs) = &self.command {
            if let Some(schematic) = &lvs.schematic {
                config.schematic = Some(schematic.clone());
            }
            if let Some(dir) = &lvs.extraction_dir {
                config.extraction_dir = dir.clone();
            }
        }

        config.into_absolute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drc_flags_override_defaults() {
        let cli = CliConfig::parse_from([
            "cellcheck", "drc", "--input", "stdcells.gds", "--skip", "TAP", "--skip", "FILL",
            "--jobs", "8", "--timeout", "60", "--param", "corner=ss", "--allow-errored",
        ]);
        let config = cli.batch_config().unwrap();

        assert_eq!(config.mode, Mode::Drc);
        assert_eq!(config.skip_cells, vec!["TAP", "FILL"]);
        assert_eq!(config.jobs, 8);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(
            config.tool.params,
            vec![("corner".to_string(), "ss".to_string())]
        );
        assert!(config.allow_errored);
        assert!(config.input.is_absolute());
        assert!(config.output_dir.ends_with("drc-results"));
    }

    #[test]
    fn test_lvs_flags() {
        let cli = CliConfig::parse_from([
            "cellcheck", "lvs", "-i", "stdcells.gds", "-s", "stdcells.cdl", "--no-skip",
            "--cell", "INV_X1",
        ]);
        let config = cli.batch_config().unwrap();

        assert_eq!(config.mode, Mode::Lvs);
        assert!(config.skip_cells.is_empty());
        assert_eq!(config.cells, vec!["INV_X1"]);
        assert!(config.schematic.unwrap().ends_with("stdcells.cdl"));
        assert!(config.output_dir.ends_with("lvs_results"));
    }

    #[test]
    fn test_cli_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("cellcheck.toml");
        std::fs::write(&settings, "[batch]\njobs = 2\nskip_cells = [\"TAP\"]\n").unwrap();

        let cli = CliConfig::parse_from([
            "cellcheck".to_string(),
            "drc".to_string(),
            "-i".to_string(),
            "stdcells.gds".to_string(),
            "-c".to_string(),
            settings.display().to_string(),
            "-j".to_string(),
            "6".to_string(),
        ]);
        let config = cli.batch_config().unwrap();
        assert_eq!(config.jobs, 6);
        assert_eq!(config.skip_cells, vec!["TAP"]);
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("corner=tt").unwrap(),
            ("corner".to_string(), "tt".to_string())
        );
        assert_eq!(parse_param("expr=a=b").unwrap().1, "a=b");
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }
}
