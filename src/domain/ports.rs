use crate::domain::model::{JobOutcome, VerificationJob};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Lists the cells of a layout, in the layout's own order.
pub trait CellSource: Send + Sync {
    fn cells(&self) -> Result<Vec<String>>;
}

/// Runs the external verification tool for one job and waits for it.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &VerificationJob) -> JobOutcome;
}
