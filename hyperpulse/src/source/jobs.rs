use std::sync::Arc;

use async_trait::async_trait;

use super::{Source, SourceReport};
use crate::Result;
use crate::jobs::JobBoard;

/// Reads the in-process job board.
pub struct JobBoardSource {
    board: Arc<JobBoard>,
}

impl JobBoardSource {
    pub fn new(board: Arc<JobBoard>) -> Self {
        Self { board }
    }
}

#[async_trait]
impl Source for JobBoardSource {
    fn name(&self) -> &str {
        "jobs"
    }

    async fn fetch(&self) -> Result<SourceReport> {
        Ok(SourceReport {
            jobs: self.board.counts(),
            jobs_by_provider: self.board.jobs_by_provider(),
            recent_jobs: self.board.recent_jobs(),
            ..Default::default()
        })
    }
}
