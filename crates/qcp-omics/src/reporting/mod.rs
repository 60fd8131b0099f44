//! Run reports.
//!
//! A [`RunReport`] is the hand-off to whatever renders the final document:
//! the run metadata, the executor's final state and the ordered report log.
//! [`ReportWriter`] persists it as `<name>_report.json`.

mod writer;

pub use writer::ReportWriter;

use crate::dataset::{DataSnapshot, Dataset};
use crate::error::Result;
use crate::input::RunMetadata;
use crate::pipeline::ExecutorState;
use crate::types::ReportEntry;
use chrono::Local;
use serde::Serialize;
use std::time::Duration;

/// Everything a renderer needs about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Local time the report was assembled
    pub generated_at: String,
    pub metadata: RunMetadata,
    pub duration_ms: u64,
    pub state: ExecutorState,
    /// Entries in execution order
    pub steps: Vec<ReportEntry>,
    /// Plan entries with no registry definition
    pub skipped_steps: Vec<String>,
    /// Working table after the last step
    pub final_data: DataSnapshot,
    /// Test partition, when the plan split the data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_out: Option<DataSnapshot>,
}

impl RunReport {
    /// Assemble the report, taking ownership of the dataset's log.
    pub fn new(
        metadata: RunMetadata,
        dataset: Dataset,
        state: ExecutorState,
        skipped_steps: Vec<String>,
        elapsed: Duration,
    ) -> Result<Self> {
        let final_data = dataset.snapshot()?;
        let held_out = dataset.held_out().map(|h| h.snapshot()).transpose()?;
        Ok(Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            metadata,
            duration_ms: elapsed.as_millis() as u64,
            state,
            steps: dataset.into_report(),
            skipped_steps,
            final_data,
            held_out,
        })
    }

    pub fn step(&self, name: &str) -> Option<&ReportEntry> {
        self.steps.iter().find(|e| e.step == name)
    }
}
