pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod parsers;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::BatchConfig;

pub use adapters::{GdsCellSource, KlayoutRunner, ListCellSource};
pub use core::engine::BatchEngine;
pub use domain::model::{BatchResult, CellDisposition, Mode};
pub use utils::error::{CheckError, Result};
