//! Supplementary material uploads.
//!
//! Each file runs its own transfer task; the tracker aggregates their
//! terminal states and recomputes the supplementary discount once every file
//! has finished.

mod tracker;
mod transport;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discount::MaterialType;

pub use tracker::{UploadState, UploadTracker};
pub use transport::{ProgressHandle, SimulatedTransport, TransferJob, TransferOutcome, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Uploading,
    Completed,
    Error,
}

impl TransferState {
    /// Completed and Error end a transfer
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Pending => "pending",
            TransferState::Uploading => "uploading",
            TransferState::Completed => "completed",
            TransferState::Error => "error",
        }
    }
}

/// A supplementary file queued for upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementaryFile {
    pub id: String,
    pub material_type: MaterialType,
    pub name: String,
    pub size_bytes: u64,
    pub transfer_state: TransferState,
    /// Transfer progress, 0–100
    pub progress: f64,
}

impl SupplementaryFile {
    pub fn new(name: impl Into<String>, size_bytes: u64, material_type: MaterialType) -> Self {
        Self {
            id: format!("sup-{}", Uuid::new_v4().simple()),
            material_type,
            name: name.into(),
            size_bytes,
            transfer_state: TransferState::Pending,
            progress: 0.0,
        }
    }
}

/// Name and size of a file handed to `enqueue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size_bytes: u64,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }
}
