//! Transfer transports.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;

use super::tracker::Board;
use crate::config::UploadsConfig;
use crate::discount::MaterialType;

/// What a transport needs to move one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub file_id: String,
    pub name: String,
    pub size_bytes: u64,
    pub material_type: MaterialType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All bytes delivered; the file becomes completed
    Delivered,
    /// The file record disappeared (cancelled) mid-transfer
    Abandoned,
}

/// Moves one file and reports its progress.
///
/// Returning `Err` marks the file as errored; it can then be retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn transfer(&self, job: &TransferJob, progress: &ProgressHandle) -> Result<TransferOutcome>;
}

/// Progress channel for a single file. Every call re-checks that the file
/// still exists, so a transfer outliving a cancel has nothing to write to.
#[derive(Clone)]
pub struct ProgressHandle {
    board: Board,
    file_id: String,
}

impl ProgressHandle {
    pub(crate) fn new(board: Board, file_id: String) -> Self {
        Self { board, file_id }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Current progress, or `None` once the file has been removed
    pub fn current(&self) -> Option<f64> {
        self.board.progress(&self.file_id)
    }

    /// Store new progress (clamped to 0–100); false if the file is gone
    pub fn report(&self, value: f64) -> bool {
        self.board.set_progress(&self.file_id, value)
    }
}

/// Stand-in for a real upload: advances progress by a random amount on a
/// fixed tick, more slowly for large files.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    tick: Duration,
    large_file_bytes: u64,
}

impl SimulatedTransport {
    pub fn new(tick: Duration, large_file_bytes: u64) -> Self {
        Self {
            tick,
            large_file_bytes,
        }
    }

    pub fn from_config(config: &UploadsConfig) -> Self {
        Self::new(
            Duration::from_millis(config.tick_ms),
            config.large_file_bytes,
        )
    }

    fn increment(&self, size_bytes: u64) -> f64 {
        let mut rng = rand::thread_rng();
        if size_bytes > self.large_file_bytes {
            rng.gen_range(1.0..4.0)
        } else {
            rng.gen_range(4.0..12.0)
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn transfer(&self, job: &TransferJob, progress: &ProgressHandle) -> Result<TransferOutcome> {
        let mut ticker = tokio::time::interval(self.tick);
        // The first tick of an interval fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let current = match progress.current() {
                Some(current) => current,
                None => return Ok(TransferOutcome::Abandoned),
            };
            if current >= 100.0 {
                return Ok(TransferOutcome::Delivered);
            }
            let next = (current + self.increment(job.size_bytes)).min(100.0);
            if !progress.report(next) {
                return Ok(TransferOutcome::Abandoned);
            }
        }
    }
}
