use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::credits::CreditAccount;
use crate::processing::ProcessingState;
use crate::session::model::{
    AdvancedData, AnalysisResult, DataLoadedFlags, DetectionResult, ImageRef, ProjectInfo,
};
use crate::snapshots::Snapshot;
use crate::templates::Template;
use crate::uploads::UploadState;

/// Key of the persisted session document
pub const SESSION_KEY: &str = "inspection-project";

/// Everything a session persists between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub uploaded_images: Vec<ImageRef>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub analysis_result: Option<AnalysisResult>,
    #[serde(default)]
    pub selected_template: Option<Template>,
    #[serde(default)]
    pub detection_results: Vec<DetectionResult>,
    #[serde(default)]
    pub advanced_data: Option<AdvancedData>,
    #[serde(default)]
    pub project_info: ProjectInfo,
    pub current_step: u32,
    #[serde(default)]
    pub is_project_completed: bool,
    #[serde(default)]
    pub data_loaded_flags: DataLoadedFlags,
    pub credits: CreditAccount,
    #[serde(default)]
    pub is_advanced_processed: bool,
    #[serde(default)]
    pub paid_template_credits: u64,
    #[serde(default)]
    pub processing: ProcessingState,
    #[serde(default)]
    pub uploads: UploadState,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

/// JSON file store for the session document
#[derive(Debug, Clone)]
pub struct SessionStore {
    state_path: PathBuf,
}

impl SessionStore {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.state_path())
    }

    /// Path of the session document
    pub fn file_path(&self) -> PathBuf {
        self.state_path.join(format!("{}.json", SESSION_KEY))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// `None` when nothing has been saved yet
    pub fn load(&self) -> Result<Option<PersistedSession>> {
        let file = self.file_path();
        if !file.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&file).context("Failed to read session file")?;
        let session: PersistedSession =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &PersistedSession) -> Result<()> {
        fs::create_dir_all(&self.state_path).context("Failed to create state directory")?;
        let contents =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        fs::write(self.file_path(), contents).context("Failed to write session file")?;
        tracing::debug!(path = %self.file_path().display(), "Session saved");
        Ok(())
    }

    /// Delete the session document if present
    pub fn clear(&self) -> Result<()> {
        let file = self.file_path();
        if file.exists() {
            fs::remove_file(&file).context("Failed to remove session file")?;
        }
        Ok(())
    }
}
