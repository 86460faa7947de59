pub mod cells;
pub mod classify;
pub mod engine;
pub mod summary;

pub use crate::domain::model::{BatchResult, CellDisposition, ParsedReport};
pub use crate::domain::ports::{CellSource, JobRunner};
pub use crate::utils::error::Result;
