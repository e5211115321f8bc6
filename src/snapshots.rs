//! Bounded undo history of workflow snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credits::CreditAccount;
use crate::session::model::{AnalysisResult, DetectionResult, ProjectInfo};
use crate::templates::Template;

/// Maximum number of snapshots retained
pub const SNAPSHOT_LIMIT: usize = 10;

/// Point-in-time copy of the session. Uploaded images are counted but not
/// stored; a restore clears them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub step: u32,
    pub step_name: String,
    pub timestamp: DateTime<Utc>,
    pub image_count: usize,
    pub template_name: String,
    pub analysis_result: Option<AnalysisResult>,
    pub selected_template: Option<Template>,
    pub detection_results: Vec<DetectionResult>,
    pub project_info: ProjectInfo,
    pub credits: CreditAccount,
}

/// Most-recent-first snapshot list
#[derive(Debug, Clone, Default)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots(mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.truncate(SNAPSHOT_LIMIT);
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// Prepend, evicting the oldest beyond [`SNAPSHOT_LIMIT`]
    pub fn push(&mut self, snapshot: Snapshot) -> &Snapshot {
        self.snapshots.insert(0, snapshot);
        if self.snapshots.len() > SNAPSHOT_LIMIT {
            let evicted = self.snapshots.len() - SNAPSHOT_LIMIT;
            self.snapshots.truncate(SNAPSHOT_LIMIT);
            tracing::debug!(evicted, "Oldest snapshots evicted");
        }
        &self.snapshots[0]
    }

    /// Remove and return a snapshot
    pub fn take(&mut self, id: Uuid) -> Option<Snapshot> {
        let pos = self.snapshots.iter().position(|s| s.id == id)?;
        Some(self.snapshots.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(step: u32) -> Snapshot {
        Snapshot {
            id: Uuid::now_v7(),
            step,
            step_name: format!("Step {}", step),
            timestamp: Utc::now(),
            image_count: 0,
            template_name: "None".to_string(),
            analysis_result: None,
            selected_template: None,
            detection_results: Vec::new(),
            project_info: ProjectInfo::default(),
            credits: CreditAccount::new(100),
        }
    }

    #[test]
    fn test_eleventh_snapshot_evicts_oldest() {
        let mut manager = SnapshotManager::new();
        let first = manager.push(snapshot(1)).id;
        for step in 2..=11 {
            manager.push(snapshot(step));
        }
        assert_eq!(manager.len(), SNAPSHOT_LIMIT);
        assert_eq!(manager.snapshots()[0].step, 11);
        assert!(manager.get(first).is_none());
    }

    #[test]
    fn test_take_removes_snapshot() {
        let mut manager = SnapshotManager::new();
        let id = manager.push(snapshot(3)).id;
        manager.push(snapshot(4));

        let taken = manager.take(id).unwrap();
        assert_eq!(taken.step, 3);
        assert_eq!(manager.len(), 1);
        assert!(manager.take(id).is_none());
    }
}
