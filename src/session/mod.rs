//! The workflow session: one in-progress inspection project.
//!
//! `WorkflowSession` owns the credit ledger, the upload tracker, the
//! processing tracker and the snapshot history, plus the project fields the
//! six workflow steps fill in. It is constructed explicitly and handed to
//! callers by reference; nothing here is global.

pub mod error;
pub mod model;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::credits::{
    self, AdminFlag, CreditAccount, CreditLedger, EnvAdminFlag, HttpLedgerRecorder,
    LedgerRecorder, NextLevel, UserLevel,
};
use crate::discount::MaterialType;
use crate::processing::{self, HoursRange, ProcessingStage, ProcessingTracker};
use crate::snapshots::{Snapshot, SnapshotManager};
use crate::state::PersistedSession;
use crate::templates::{self, prices, SwitchDecision, Template, TemplateId};
use crate::uploads::{SimulatedTransport, Transport, UploadTracker};

pub use error::SessionError;
pub use model::{
    AdvancedData, AnalysisResult, DataKey, DataLoadedFlags, DetectionResult, ImageRef,
    ProjectInfo, ProjectInfoPatch, Statistics,
};

/// Collaborators injected into a session
pub struct SessionDeps {
    pub admin: Arc<dyn AdminFlag>,
    pub recorder: Option<Arc<dyn LedgerRecorder>>,
    pub transport: Arc<dyn Transport>,
}

impl SessionDeps {
    /// Environment admin flag, HTTP recorder when enabled, simulated transport
    pub fn from_config(config: &Config) -> Self {
        let recorder: Option<Arc<dyn LedgerRecorder>> = if config.recorder.enabled {
            Some(Arc::new(HttpLedgerRecorder::from_config(&config.recorder)))
        } else {
            None
        };
        Self {
            admin: Arc::new(EnvAdminFlag::new(config.credits.admin_env.clone())),
            recorder,
            transport: Arc::new(SimulatedTransport::from_config(&config.uploads)),
        }
    }
}

pub struct WorkflowSession {
    uploaded_images: Vec<ImageRef>,
    project_id: Option<String>,
    analysis_result: Option<AnalysisResult>,
    selected_template: Option<Template>,
    detection_results: Vec<DetectionResult>,
    advanced_data: Option<AdvancedData>,
    project_info: ProjectInfo,
    current_step: u32,
    is_project_completed: bool,
    data_loaded: DataLoadedFlags,
    is_advanced_processed: bool,
    /// Template credits already paid for this project
    paid_template_credits: u64,
    ledger: CreditLedger,
    uploads: UploadTracker,
    processing: ProcessingTracker,
    snapshots: SnapshotManager,
}

impl WorkflowSession {
    /// A fresh project with the configured starting balance
    pub fn new(config: &Config, deps: SessionDeps) -> Self {
        let ledger = CreditLedger::new(
            CreditAccount::new(config.credits.initial_balance),
            config.credits.user_id,
            config.credits.low_balance_threshold,
            deps.admin,
            deps.recorder,
        );
        Self {
            uploaded_images: Vec::new(),
            project_id: None,
            analysis_result: None,
            selected_template: None,
            detection_results: Vec::new(),
            advanced_data: None,
            project_info: ProjectInfo::default(),
            current_step: 1,
            is_project_completed: false,
            data_loaded: DataLoadedFlags::default(),
            is_advanced_processed: false,
            paid_template_credits: 0,
            ledger,
            uploads: UploadTracker::new(deps.transport, Duration::from_millis(config.uploads.stagger_ms)),
            processing: ProcessingTracker::new(),
            snapshots: SnapshotManager::new(),
        }
    }

    /// Rehydrate a session from its persisted document
    pub fn restore(config: &Config, deps: SessionDeps, persisted: PersistedSession) -> Self {
        let ledger = CreditLedger::new(
            persisted.credits,
            config.credits.user_id,
            config.credits.low_balance_threshold,
            deps.admin,
            deps.recorder,
        );
        Self {
            uploaded_images: persisted.uploaded_images,
            project_id: persisted.project_id,
            analysis_result: persisted.analysis_result,
            selected_template: persisted.selected_template,
            detection_results: persisted.detection_results,
            advanced_data: persisted.advanced_data,
            project_info: persisted.project_info,
            current_step: persisted.current_step,
            is_project_completed: persisted.is_project_completed,
            data_loaded: persisted.data_loaded_flags,
            is_advanced_processed: persisted.is_advanced_processed,
            paid_template_credits: persisted.paid_template_credits,
            ledger,
            uploads: UploadTracker::from_state(
                persisted.uploads,
                deps.transport,
                Duration::from_millis(config.uploads.stagger_ms),
            ),
            processing: ProcessingTracker::from_state(persisted.processing),
            snapshots: SnapshotManager::from_snapshots(persisted.snapshots),
        }
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            uploaded_images: self.uploaded_images.clone(),
            project_id: self.project_id.clone(),
            analysis_result: self.analysis_result.clone(),
            selected_template: self.selected_template.clone(),
            detection_results: self.detection_results.clone(),
            advanced_data: self.advanced_data.clone(),
            project_info: self.project_info.clone(),
            current_step: self.current_step,
            is_project_completed: self.is_project_completed,
            data_loaded_flags: self.data_loaded,
            credits: self.ledger.account().clone(),
            is_advanced_processed: self.is_advanced_processed,
            paid_template_credits: self.paid_template_credits,
            processing: self.processing.state().clone(),
            uploads: self.uploads.state(),
            snapshots: self.snapshots.snapshots().to_vec(),
        }
    }

    // Accessors

    pub fn uploaded_images(&self) -> &[ImageRef] {
        &self.uploaded_images
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn analysis_result(&self) -> Option<&AnalysisResult> {
        self.analysis_result.as_ref()
    }

    pub fn selected_template(&self) -> Option<&Template> {
        self.selected_template.as_ref()
    }

    pub fn detection_results(&self) -> &[DetectionResult] {
        &self.detection_results
    }

    pub fn advanced_data(&self) -> Option<&AdvancedData> {
        self.advanced_data.as_ref()
    }

    pub fn project_info(&self) -> &ProjectInfo {
        &self.project_info
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn is_project_completed(&self) -> bool {
        self.is_project_completed
    }

    pub fn data_loaded_flags(&self) -> DataLoadedFlags {
        self.data_loaded
    }

    pub fn is_data_loaded(&self, key: DataKey) -> bool {
        self.data_loaded.get(key)
    }

    pub fn is_advanced_processed(&self) -> bool {
        self.is_advanced_processed
    }

    pub fn paid_template_credits(&self) -> u64 {
        self.paid_template_credits
    }

    pub fn credits(&self) -> &CreditLedger {
        &self.ledger
    }

    pub fn credits_mut(&mut self) -> &mut CreditLedger {
        &mut self.ledger
    }

    pub fn uploads(&self) -> &UploadTracker {
        &self.uploads
    }

    pub fn processing(&self) -> &ProcessingTracker {
        &self.processing
    }

    pub fn processing_mut(&mut self) -> &mut ProcessingTracker {
        &mut self.processing
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        self.snapshots.snapshots()
    }

    // Mutators

    pub fn set_uploaded_images(&mut self, images: Vec<ImageRef>) {
        self.uploaded_images = images;
    }

    pub fn set_project_id(&mut self, id: Option<String>) {
        self.project_id = id;
    }

    pub fn set_step(&mut self, step: u32) {
        tracing::debug!(from = self.current_step, to = step, "Workflow step changed");
        self.current_step = step;
    }

    pub fn set_project_completed(&mut self, completed: bool) {
        self.is_project_completed = completed;
    }

    pub fn set_analysis_result(&mut self, result: AnalysisResult) {
        self.analysis_result = Some(result);
        self.data_loaded.analysis = true;
    }

    pub fn set_selected_template(&mut self, template: Option<Template>) {
        self.selected_template = template;
    }

    pub fn set_detection_results(&mut self, results: Vec<DetectionResult>) {
        self.detection_results = results;
        self.data_loaded.detection = true;
    }

    /// Shallow-merge `patch` into the result at `index`. Out-of-range
    /// indexes and patches that would produce an invalid record are ignored.
    pub fn update_detection_result(&mut self, index: usize, patch: &Map<String, Value>) -> bool {
        let merged = match self.detection_results.get(index).and_then(|r| r.merged(patch)) {
            Some(merged) => merged,
            None => return false,
        };
        self.detection_results[index] = merged;
        true
    }

    /// Same as [`Self::update_detection_result`], addressed by result id or
    /// image id.
    pub fn update_detection_result_by_id(&mut self, key: &str, patch: &Map<String, Value>) -> bool {
        match self.detection_results.iter().position(|r| r.matches(key)) {
            Some(index) => self.update_detection_result(index, patch),
            None => false,
        }
    }

    pub fn set_advanced_data(&mut self, data: AdvancedData) {
        self.advanced_data = Some(data);
        self.data_loaded.advanced = true;
    }

    pub fn set_project_info(&mut self, patch: ProjectInfoPatch) {
        self.project_info.apply(patch);
    }

    /// Clear one loaded flag, or all of them with `None`
    pub fn reset_data_loaded_flag(&mut self, key: Option<DataKey>) {
        match key {
            Some(key) => self.data_loaded.set(key, false),
            None => self.data_loaded = DataLoadedFlags::default(),
        }
    }

    pub fn set_advanced_processed(&mut self, processed: bool) {
        self.is_advanced_processed = processed;
    }

    pub fn set_paid_template_credits(&mut self, credits: u64) {
        self.paid_template_credits = credits;
    }

    // Templates and pricing

    pub fn can_switch_template(&self, target: TemplateId) -> SwitchDecision {
        templates::check_switch(
            self.selected_template.as_ref().map(|t| t.id),
            target,
            self.is_advanced_processed,
        )
    }

    pub fn template_credits(id: TemplateId) -> u64 {
        id.credits()
    }

    /// Price difference between two templates, never negative
    pub fn template_upgrade_cost(from: TemplateId, to: TemplateId) -> u64 {
        from.upgrade_cost(to)
    }

    /// Select `target`, charging whatever its price exceeds the template
    /// credits already paid for this project. Returns the amount charged.
    pub fn switch_template(&mut self, target: TemplateId) -> Result<u64, SessionError> {
        let decision = self.can_switch_template(target);
        if !decision.allowed {
            let from = self
                .selected_template
                .as_ref()
                .map(|t| t.id)
                .unwrap_or(TemplateId::Basic);
            return Err(SessionError::TemplateLocked {
                from,
                to: target,
                reason: decision.reason,
            });
        }

        let cost = target.credits().saturating_sub(self.paid_template_credits);
        if cost > 0 && !self.ledger.debit(cost, &format!("template_{}", target)) {
            return Err(SessionError::InsufficientCredits {
                required: cost,
                available: self.ledger.balance(),
            });
        }

        self.selected_template = Some(Template::builtin(target));
        self.paid_template_credits = self.paid_template_credits.max(target.credits());
        tracing::info!(template = %target, charged = cost, "Report template selected");
        Ok(cost)
    }

    /// Debit the scene analysis price
    pub fn charge_scene_analysis(&mut self, reanalysis: bool) -> Result<u64, SessionError> {
        let (price, reason) = if reanalysis {
            (prices::SCENE_REANALYSIS, "scene_reanalysis")
        } else {
            (prices::SCENE_ANALYSIS, "scene_analysis")
        };
        if !self.ledger.debit(price, reason) {
            return Err(SessionError::InsufficientCredits {
                required: price,
                available: self.ledger.balance(),
            });
        }
        Ok(price)
    }

    // Snapshots

    pub fn step_name(step: u32) -> String {
        match step {
            1 => "Image upload".to_string(),
            2 => "Scene analysis".to_string(),
            3 => "Report template".to_string(),
            4 => "Detection review".to_string(),
            5 => "Advanced report".to_string(),
            6 => "Report export".to_string(),
            n => format!("Step {}", n),
        }
    }

    /// Capture the current session at the front of the snapshot list
    pub fn create_snapshot(&mut self) -> Snapshot {
        let snapshot = Snapshot {
            id: Uuid::now_v7(),
            step: self.current_step,
            step_name: Self::step_name(self.current_step),
            timestamp: Utc::now(),
            image_count: self.uploaded_images.len(),
            template_name: self
                .selected_template
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "None".to_string()),
            analysis_result: self.analysis_result.clone(),
            selected_template: self.selected_template.clone(),
            detection_results: self.detection_results.clone(),
            project_info: self.project_info.clone(),
            credits: self.ledger.account().clone(),
        };
        tracing::debug!(id = %snapshot.id, step = snapshot.step, "Snapshot created");
        self.snapshots.push(snapshot).clone()
    }

    /// Roll back to a snapshot and consume it. Uploaded images are cleared,
    /// not restored.
    pub fn restore_snapshot(&mut self, id: Uuid) -> bool {
        let snapshot = match self.snapshots.take(id) {
            Some(snapshot) => snapshot,
            None => {
                tracing::error!(id = %id, "Snapshot not found");
                return false;
            }
        };

        self.current_step = snapshot.step;
        self.uploaded_images.clear();
        self.analysis_result = snapshot.analysis_result;
        self.selected_template = snapshot.selected_template;
        self.detection_results = snapshot.detection_results;
        self.project_info = snapshot.project_info;
        self.ledger.replace_account(snapshot.credits);

        tracing::info!(id = %id, step = self.current_step, "Snapshot restored");
        true
    }

    /// Snapshot only once the workflow is past the first step
    pub fn auto_save_snapshot(&mut self) -> Option<Snapshot> {
        if self.current_step > 1 {
            Some(self.create_snapshot())
        } else {
            None
        }
    }

    /// Start a new project. Credits, credit history and snapshots survive.
    pub fn reset_project(&mut self) {
        self.uploaded_images.clear();
        self.project_id = None;
        self.analysis_result = None;
        self.selected_template = None;
        self.detection_results.clear();
        self.advanced_data = None;
        self.project_info = ProjectInfo::default();
        self.current_step = 1;
        self.is_project_completed = false;
        self.data_loaded = DataLoadedFlags::default();
        self.is_advanced_processed = false;
        self.paid_template_credits = 0;
        self.processing.reset_progress();
        self.uploads.reset();
        tracing::info!(balance = self.ledger.balance(), "Project reset");
    }

    // Derived views

    pub fn statistics(&self) -> Statistics {
        Statistics::from_results(&self.detection_results)
    }

    pub fn needs_advanced_report(&self) -> bool {
        self.selected_template
            .as_ref()
            .is_some_and(Template::needs_advanced_processing)
    }

    pub fn has_unsaved_data(&self) -> bool {
        self.project_id.is_some() && !self.is_project_completed && self.current_step > 1
    }

    pub fn has_low_balance(&self) -> bool {
        self.ledger.has_low_balance()
    }

    pub fn user_level(&self) -> UserLevel {
        credits::user_level(self.ledger.history())
    }

    pub fn next_level(&self) -> Option<NextLevel> {
        credits::next_level(self.ledger.history())
    }

    pub fn has_supplementary_data(&self) -> bool {
        self.uploads.has_supplementary_data()
    }

    pub fn completed_material_types(&self) -> Vec<MaterialType> {
        self.uploads.completed_material_types()
    }

    pub fn skipped_stages(&self) -> BTreeSet<ProcessingStage> {
        self.uploads.skipped_stages()
    }

    pub fn discount_percent(&self) -> u32 {
        self.uploads.discount_percent()
    }

    /// Stages still to run for the selected template
    pub fn processing_plan(&self) -> Vec<ProcessingStage> {
        match self.selected_template {
            Some(ref template) => processing::planned_stages(template.id, &self.skipped_stages()),
            None => Vec::new(),
        }
    }

    pub fn estimated_hours(&self) -> Option<HoursRange> {
        self.selected_template
            .as_ref()
            .and_then(|t| processing::estimated_hours(t.id))
    }

    /// Fail uploads that were in flight when the session was persisted
    pub fn recover_interrupted_uploads(&self) -> usize {
        self.uploads.recover_interrupted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::StaticAdminFlag;
    use crate::uploads::{FileDescriptor, TransferState};
    use serde_json::json;

    fn deps(admin: bool) -> SessionDeps {
        SessionDeps {
            admin: Arc::new(StaticAdminFlag::new(admin)),
            recorder: None,
            transport: Arc::new(SimulatedTransport::new(Duration::from_millis(1), 100 * 1024 * 1024)),
        }
    }

    fn session() -> WorkflowSession {
        let mut config = Config::default();
        config.uploads.stagger_ms = 2;
        WorkflowSession::new(&config, deps(false))
    }

    fn detection(id: &str, confidence: f64, issues: usize) -> DetectionResult {
        DetectionResult {
            id: Some(id.to_string()),
            image_id: Some(format!("img-{}", id)),
            confidence,
            issues: (0..issues).map(|_| json!({ "kind": "crack" })).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_session_defaults() {
        let session = session();
        assert_eq!(session.current_step(), 1);
        assert_eq!(session.credits().balance(), 10_000);
        assert!(!session.has_low_balance());
        assert!(!session.has_unsaved_data());
        assert_eq!(session.data_loaded_flags(), DataLoadedFlags::default());
    }

    #[test]
    fn test_setters_flip_loaded_flags() {
        let mut session = session();
        session.set_analysis_result(json!({ "scene": "bridge" }));
        session.set_detection_results(vec![detection("a", 0.9, 1)]);
        session.set_advanced_data(json!({ "ortho": "ortho.tif" }));
        assert!(session.is_data_loaded(DataKey::Analysis));
        assert!(session.is_data_loaded(DataKey::Detection));
        assert!(session.is_data_loaded(DataKey::Advanced));

        session.reset_data_loaded_flag(Some(DataKey::Detection));
        assert!(!session.is_data_loaded(DataKey::Detection));
        assert!(session.is_data_loaded(DataKey::Analysis));

        session.reset_data_loaded_flag(None);
        assert_eq!(session.data_loaded_flags(), DataLoadedFlags::default());
    }

    #[test]
    fn test_update_detection_result() {
        let mut session = session();
        session.set_detection_results(vec![detection("a", 0.5, 0), detection("b", 0.6, 0)]);

        let patch = json!({ "confidence": 0.95, "reviewed": true });
        assert!(session.update_detection_result(1, patch.as_object().unwrap()));
        assert_eq!(session.detection_results()[1].confidence, 0.95);

        assert!(session.update_detection_result_by_id("img-a", patch.as_object().unwrap()));
        assert_eq!(
            session.detection_results()[0].extra.get("reviewed"),
            Some(&json!(true))
        );

        assert!(!session.update_detection_result(5, patch.as_object().unwrap()));
        assert!(!session.update_detection_result_by_id("missing", patch.as_object().unwrap()));
    }

    #[test]
    fn test_switch_template_charges_difference() {
        let mut session = session();
        assert_eq!(session.switch_template(TemplateId::Ortho).unwrap(), 99);
        assert_eq!(session.credits().balance(), 9_901);
        assert_eq!(session.paid_template_credits(), 99);

        assert_eq!(session.switch_template(TemplateId::Full).unwrap(), 200);
        assert_eq!(session.credits().balance(), 9_701);
        assert_eq!(session.paid_template_credits(), 299);

        // Already paid for more than basic
        assert_eq!(session.switch_template(TemplateId::Basic).unwrap(), 0);
        assert_eq!(session.selected_template().unwrap().id, TemplateId::Basic);
        assert_eq!(session.credits().balance(), 9_701);
    }

    #[test]
    fn test_switch_template_locked_after_advanced_processing() {
        let mut session = session();
        session.switch_template(TemplateId::Ortho).unwrap();
        session.set_advanced_processed(true);

        let decision = session.can_switch_template(TemplateId::Basic);
        assert!(!decision.allowed);
        assert!(session.can_switch_template(TemplateId::ThreeD).allowed);
        assert!(session.can_switch_template(TemplateId::Full).allowed);

        let err = session.switch_template(TemplateId::Basic).unwrap_err();
        assert!(matches!(err, SessionError::TemplateLocked { .. }));
        assert_eq!(session.selected_template().unwrap().id, TemplateId::Ortho);
    }

    #[test]
    fn test_switch_template_insufficient_credits() {
        let mut config = Config::default();
        config.credits.initial_balance = 150;
        let mut session = WorkflowSession::new(&config, deps(false));

        let err = session.switch_template(TemplateId::ThreeD).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InsufficientCredits {
                required: 199,
                available: 150
            }
        ));
        assert!(session.selected_template().is_none());
        assert_eq!(session.credits().balance(), 150);
        assert!(session.credits().history().is_empty());
    }

    #[test]
    fn test_switch_template_with_admin_bypass() {
        let mut config = Config::default();
        config.credits.initial_balance = 0;
        let mut session = WorkflowSession::new(&config, deps(true));

        assert_eq!(session.switch_template(TemplateId::Full).unwrap(), 299);
        assert_eq!(session.credits().balance(), 0);
        assert!(session.credits().history()[0].reason.ends_with("[admin bypass]"));
    }

    #[test]
    fn test_template_pricing() {
        assert_eq!(WorkflowSession::template_credits(TemplateId::ThreeD), 199);
        assert_eq!(
            WorkflowSession::template_upgrade_cost(TemplateId::Ortho, TemplateId::Full),
            200
        );
        assert_eq!(
            WorkflowSession::template_upgrade_cost(TemplateId::Full, TemplateId::Basic),
            0
        );
    }

    #[test]
    fn test_charge_scene_analysis() {
        let mut session = session();
        assert_eq!(session.charge_scene_analysis(false).unwrap(), 20);
        assert_eq!(session.charge_scene_analysis(true).unwrap(), 20);
        assert_eq!(session.credits().balance(), 9_960);
        assert_eq!(session.credits().history()[0].reason, "scene_reanalysis");
    }

    #[test]
    fn test_step_names() {
        assert_eq!(WorkflowSession::step_name(1), "Image upload");
        assert_eq!(WorkflowSession::step_name(6), "Report export");
        assert_eq!(WorkflowSession::step_name(9), "Step 9");
    }

    #[test]
    fn test_restore_snapshot_rolls_back_and_consumes() {
        let mut session = session();
        session.set_uploaded_images(vec![ImageRef {
            id: "img-1".into(),
            name: "deck.jpg".into(),
            path: None,
        }]);
        session.set_step(3);
        session.set_detection_results(vec![detection("a", 0.7, 1)]);
        let snapshot = session.create_snapshot();
        assert_eq!(snapshot.image_count, 1);
        assert_eq!(snapshot.step_name, "Report template");
        assert_eq!(snapshot.template_name, "None");

        session.set_step(5);
        session.charge_scene_analysis(false).unwrap();
        session.set_detection_results(Vec::new());

        assert!(session.restore_snapshot(snapshot.id));
        assert_eq!(session.current_step(), 3);
        assert_eq!(session.detection_results().len(), 1);
        assert!(session.uploaded_images().is_empty());
        assert_eq!(session.credits().balance(), 10_000);
        assert!(session.snapshots().is_empty());

        assert!(!session.restore_snapshot(snapshot.id));
    }

    #[test]
    fn test_auto_save_only_after_first_step() {
        let mut session = session();
        assert!(session.auto_save_snapshot().is_none());
        session.set_step(2);
        assert!(session.auto_save_snapshot().is_some());
        assert_eq!(session.snapshots().len(), 1);
    }

    #[test]
    fn test_reset_project_keeps_credits() {
        let mut session = session();
        session.set_project_id(Some("proj-1".into()));
        session.set_step(4);
        session.switch_template(TemplateId::Ortho).unwrap();
        session.set_detection_results(vec![detection("a", 0.9, 2)]);
        session.processing_mut().set_stage(ProcessingStage::DenseMatching);
        session
            .uploads()
            .enqueue(vec![FileDescriptor::new("pos.txt", 10)], MaterialType::Pos);
        let history_len = session.credits().history().len();

        session.reset_project();

        assert_eq!(session.current_step(), 1);
        assert!(session.detection_results().is_empty());
        assert!(session.selected_template().is_none());
        assert_eq!(session.paid_template_credits(), 0);
        assert_eq!(session.processing().active_stage(), ProcessingStage::Idle);
        assert!(session.uploads().files().is_empty());
        assert_eq!(session.credits().balance(), 9_901);
        assert_eq!(session.credits().history().len(), history_len);
    }

    #[test]
    fn test_derived_flags() {
        let mut session = session();
        assert!(!session.needs_advanced_report());
        session.switch_template(TemplateId::Basic).unwrap();
        assert!(!session.needs_advanced_report());
        session.switch_template(TemplateId::ThreeD).unwrap();
        assert!(session.needs_advanced_report());

        session.set_project_id(Some("proj-1".into()));
        assert!(!session.has_unsaved_data());
        session.set_step(2);
        assert!(session.has_unsaved_data());
        session.set_project_completed(true);
        assert!(!session.has_unsaved_data());
    }

    #[test]
    fn test_processing_plan_and_estimate() {
        let mut session = session();
        assert!(session.processing_plan().is_empty());
        session.switch_template(TemplateId::Ortho).unwrap();
        assert_eq!(
            session.processing_plan(),
            vec![
                ProcessingStage::AerialTriangulation,
                ProcessingStage::DenseMatching,
                ProcessingStage::DemGeneration,
                ProcessingStage::OrthoGeneration,
            ]
        );
        assert_eq!(session.estimated_hours(), Some(HoursRange { min: 2, max: 4 }));
    }

    #[test]
    fn test_persisted_round_trip_recovers_interrupted_uploads() {
        let config = Config::default();
        let mut session = session();
        session.set_step(3);
        session.set_project_info(ProjectInfoPatch {
            name: Some("Dam survey".into()),
            ..Default::default()
        });
        let ids = session
            .uploads()
            .enqueue(vec![FileDescriptor::new("model.obj", 10)], MaterialType::Model3d);

        let mut persisted = session.to_persisted();
        persisted.uploads.files[0].transfer_state = TransferState::Uploading;

        let restored = WorkflowSession::restore(&config, deps(false), persisted);
        assert_eq!(restored.current_step(), 3);
        assert_eq!(restored.project_info().name, "Dam survey");
        assert_eq!(restored.recover_interrupted_uploads(), 1);
        assert_eq!(
            restored.uploads().file(&ids[0]).unwrap().transfer_state,
            TransferState::Error
        );
    }
}
