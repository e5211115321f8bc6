//! Advanced processing pipeline: stage enumeration and progress tracking.
//!
//! Progress is supplied by the orchestration layer through the setters; the
//! tracker does not enforce stage ordering. Callers advance stages in
//! [`ProcessingStage::PIPELINE`] order and consult the skip set derived from
//! supplementary uploads to omit covered stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::templates::TemplateId;

/// One phase of the advanced processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Idle,
    AerialTriangulation,
    DenseMatching,
    DemGeneration,
    OrthoGeneration,
    #[serde(rename = "3d_reconstruction")]
    Model3dReconstruction,
    TextureMapping,
    Completed,
}

impl ProcessingStage {
    /// Progress-tracked stages in canonical order (sentinels excluded).
    pub const PIPELINE: [ProcessingStage; 6] = [
        ProcessingStage::AerialTriangulation,
        ProcessingStage::DenseMatching,
        ProcessingStage::DemGeneration,
        ProcessingStage::OrthoGeneration,
        ProcessingStage::Model3dReconstruction,
        ProcessingStage::TextureMapping,
    ];

    /// Wire identifier, as used in persisted state and status payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Idle => "idle",
            ProcessingStage::AerialTriangulation => "aerial_triangulation",
            ProcessingStage::DenseMatching => "dense_matching",
            ProcessingStage::DemGeneration => "dem_generation",
            ProcessingStage::OrthoGeneration => "ortho_generation",
            ProcessingStage::Model3dReconstruction => "3d_reconstruction",
            ProcessingStage::TextureMapping => "texture_mapping",
            ProcessingStage::Completed => "completed",
        }
    }

    /// Human-readable stage name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProcessingStage::Idle => "Idle",
            ProcessingStage::AerialTriangulation => "Aerial triangulation",
            ProcessingStage::DenseMatching => "Dense matching",
            ProcessingStage::DemGeneration => "DEM generation",
            ProcessingStage::OrthoGeneration => "Orthophoto generation",
            ProcessingStage::Model3dReconstruction => "3D model reconstruction",
            ProcessingStage::TextureMapping => "Texture mapping",
            ProcessingStage::Completed => "Completed",
        }
    }

    /// Idle and Completed carry no progress of their own
    pub fn is_sentinel(&self) -> bool {
        matches!(self, ProcessingStage::Idle | ProcessingStage::Completed)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(ProcessingStage::Idle),
            "aerial_triangulation" => Some(ProcessingStage::AerialTriangulation),
            "dense_matching" => Some(ProcessingStage::DenseMatching),
            "dem_generation" => Some(ProcessingStage::DemGeneration),
            "ortho_generation" => Some(ProcessingStage::OrthoGeneration),
            "3d_reconstruction" => Some(ProcessingStage::Model3dReconstruction),
            "texture_mapping" => Some(ProcessingStage::TextureMapping),
            "completed" => Some(ProcessingStage::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated processing window, in hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoursRange {
    pub min: u32,
    pub max: u32,
}

/// Estimated processing time for a template's advanced report.
/// The basic template has no advanced processing.
pub fn estimated_hours(template: TemplateId) -> Option<HoursRange> {
    match template {
        TemplateId::Basic => None,
        TemplateId::Ortho => Some(HoursRange { min: 2, max: 4 }),
        TemplateId::ThreeD => Some(HoursRange { min: 4, max: 8 }),
        TemplateId::Full => Some(HoursRange { min: 6, max: 10 }),
    }
}

/// Stages a template requires, in canonical order, minus those covered by
/// supplementary data.
pub fn planned_stages(
    template: TemplateId,
    skipped: &BTreeSet<ProcessingStage>,
) -> Vec<ProcessingStage> {
    use ProcessingStage::*;
    let required: &[ProcessingStage] = match template {
        TemplateId::Basic => &[],
        TemplateId::Ortho => &[
            AerialTriangulation,
            DenseMatching,
            DemGeneration,
            OrthoGeneration,
        ],
        TemplateId::ThreeD => &[
            AerialTriangulation,
            DenseMatching,
            Model3dReconstruction,
            TextureMapping,
        ],
        TemplateId::Full => &ProcessingStage::PIPELINE,
    };
    required
        .iter()
        .copied()
        .filter(|stage| !skipped.contains(stage))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub active_stage: ProcessingStage,
    pub progress_by_stage: BTreeMap<ProcessingStage, f64>,
    pub task_id: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            active_stage: ProcessingStage::Idle,
            progress_by_stage: ProcessingStage::PIPELINE
                .iter()
                .map(|stage| (*stage, 0.0))
                .collect(),
            task_id: None,
            estimated_completion: None,
        }
    }
}

/// Owns the pipeline state for the in-flight advanced report
#[derive(Debug, Clone, Default)]
pub struct ProcessingTracker {
    state: ProcessingState,
}

impl ProcessingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ProcessingState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn active_stage(&self) -> ProcessingStage {
        self.state.active_stage
    }

    pub fn set_stage(&mut self, stage: ProcessingStage) {
        tracing::debug!(stage = %stage, "Processing stage changed");
        self.state.active_stage = stage;
    }

    /// Record progress for a stage, clamped to `[0, 100]`.
    /// NaN is treated as no progress. Sentinel stages are not tracked.
    pub fn set_progress(&mut self, stage: ProcessingStage, value: f64) {
        if stage.is_sentinel() {
            tracing::debug!(stage = %stage, value, "Progress for sentinel stage ignored");
            return;
        }
        let clamped = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        };
        if clamped != value {
            tracing::debug!(stage = %stage, value, clamped, "Stage progress clamped");
        }
        self.state.progress_by_stage.insert(stage, clamped);
    }

    pub fn progress(&self, stage: ProcessingStage) -> f64 {
        self.state
            .progress_by_stage
            .get(&stage)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn current_stage_progress(&self) -> f64 {
        if self.state.active_stage.is_sentinel() {
            return 100.0;
        }
        self.progress(self.state.active_stage)
    }

    pub fn set_task_id(&mut self, task_id: Option<String>) {
        self.state.task_id = task_id;
    }

    pub fn set_estimated_completion(&mut self, at: Option<DateTime<Utc>>) {
        self.state.estimated_completion = at;
    }

    pub fn reset_progress(&mut self) {
        self.state = ProcessingState::default();
    }
}
