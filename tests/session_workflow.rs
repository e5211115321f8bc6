//! Integration tests for a full inspection project
//!
//! These tests drive a `WorkflowSession` through the public API only:
//! - Step progression with auto-saved snapshots
//! - Template selection and credit charging
//! - Supplementary uploads feeding the discount and processing plan
//! - Persistence round-trip through `SessionStore`

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use inspection_session::credits::StaticAdminFlag;
use inspection_session::discount::MaterialType;
use inspection_session::processing::ProcessingStage;
use inspection_session::session::{DetectionResult, ImageRef};
use inspection_session::snapshots::SNAPSHOT_LIMIT;
use inspection_session::templates::TemplateId;
use inspection_session::uploads::{FileDescriptor, SimulatedTransport, TransferState};
use inspection_session::{Config, SessionDeps, SessionStore, WorkflowSession};

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn test_config(state_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.state = state_dir.path().to_string_lossy().into_owned();
    config.uploads.stagger_ms = 2;
    config.uploads.tick_ms = 1;
    config
}

fn deps(config: &Config) -> SessionDeps {
    SessionDeps {
        admin: Arc::new(StaticAdminFlag::new(false)),
        recorder: None,
        transport: Arc::new(SimulatedTransport::from_config(&config.uploads)),
    }
}

fn images(n: usize) -> Vec<ImageRef> {
    (0..n)
        .map(|i| ImageRef {
            id: format!("img-{}", i),
            name: format!("IMG_{:04}.JPG", i),
            path: None,
        })
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_supplementary_uploads_shape_processing_plan() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut session = WorkflowSession::new(&config, deps(&config));

    session.switch_template(TemplateId::Full).unwrap();

    let uploads = session.uploads();
    uploads.enqueue(vec![FileDescriptor::new("camera.pos", 2_048)], MaterialType::Pos);
    uploads.enqueue(vec![FileDescriptor::new("cloud.las", 4_096)], MaterialType::Sfm);
    uploads.enqueue(vec![FileDescriptor::new("site.tif", 8_192)], MaterialType::Ortho);
    assert_eq!(uploads.start_all(), 3);

    tokio::time::timeout(Duration::from_secs(5), uploads.wait_idle())
        .await
        .unwrap();

    assert!(session
        .uploads()
        .files()
        .iter()
        .all(|f| f.transfer_state == TransferState::Completed));
    assert_eq!(session.discount_percent(), 70);
    assert_eq!(
        session.skipped_stages().into_iter().collect::<Vec<_>>(),
        vec![
            ProcessingStage::AerialTriangulation,
            ProcessingStage::DenseMatching,
            ProcessingStage::OrthoGeneration,
        ]
    );
    assert_eq!(
        session.processing_plan(),
        vec![
            ProcessingStage::DemGeneration,
            ProcessingStage::Model3dReconstruction,
            ProcessingStage::TextureMapping,
        ]
    );
    assert_eq!(
        session.completed_material_types(),
        vec![MaterialType::Pos, MaterialType::Sfm, MaterialType::Ortho]
    );
}

#[test]
fn test_walkthrough_with_undo() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut session = WorkflowSession::new(&config, deps(&config));

    session.set_project_id(Some("proj-7".into()));
    session.set_uploaded_images(images(3));
    assert!(session.auto_save_snapshot().is_none());

    session.set_step(2);
    session.charge_scene_analysis(false).unwrap();
    session.set_analysis_result(json!({ "scene": "tunnel" }));
    let before_template = session.auto_save_snapshot().unwrap();
    assert_eq!(before_template.credits.balance, 9_980);

    session.set_step(3);
    session.switch_template(TemplateId::ThreeD).unwrap();
    assert_eq!(session.credits().balance(), 9_781);

    assert!(session.restore_snapshot(before_template.id));
    assert_eq!(session.current_step(), 2);
    assert!(session.selected_template().is_none());
    assert_eq!(session.credits().balance(), 9_980);
    assert!(session.uploaded_images().is_empty());
    assert!(session.snapshots().is_empty());
}

#[test]
fn test_snapshot_history_is_bounded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut session = WorkflowSession::new(&config, deps(&config));

    let mut ids = Vec::new();
    for step in 2..=12 {
        session.set_step(step);
        ids.push(session.create_snapshot().id);
    }

    assert_eq!(session.snapshots().len(), SNAPSHOT_LIMIT);
    assert_eq!(session.snapshots()[0].step, 12);
    assert!(!session.restore_snapshot(ids[0]));
}

#[test]
fn test_persistence_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = SessionStore::from_config(&config);

    {
        let mut session = WorkflowSession::new(&config, deps(&config));
        session.set_project_id(Some("proj-9".into()));
        session.set_step(4);
        session.switch_template(TemplateId::Ortho).unwrap();
        session.set_detection_results(vec![DetectionResult {
            id: Some("r1".into()),
            confidence: 0.875,
            issues: vec![json!({ "kind": "corrosion" })],
            ..Default::default()
        }]);
        session
            .processing_mut()
            .set_progress(ProcessingStage::DenseMatching, 40.0);
        session.create_snapshot();
        store.save(&session.to_persisted()).unwrap();
    }

    let persisted = store.load().unwrap().unwrap();
    let session = WorkflowSession::restore(&config, deps(&config), persisted.clone());

    assert_eq!(session.project_id(), Some("proj-9"));
    assert_eq!(session.current_step(), 4);
    assert_eq!(session.credits().balance(), 9_901);
    assert_eq!(session.paid_template_credits(), 99);
    assert_eq!(session.statistics().issue_count, 1);
    assert_eq!(
        session.processing().progress(ProcessingStage::DenseMatching),
        40.0
    );
    assert_eq!(session.snapshots().len(), 1);
    assert_eq!(session.to_persisted(), persisted);
}

#[test]
fn test_reset_keeps_balance_and_history() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut session = WorkflowSession::new(&config, deps(&config));

    session.set_step(5);
    session.credits_mut().credit(600, "top-up");
    session.switch_template(TemplateId::Full).unwrap();
    session.set_detection_results(vec![DetectionResult::default()]);
    let balance = session.credits().balance();
    let history = session.credits().history().to_vec();

    session.reset_project();

    assert_eq!(session.current_step(), 1);
    assert!(session.detection_results().is_empty());
    assert_eq!(session.credits().balance(), balance);
    assert_eq!(session.credits().history(), history.as_slice());
    assert_eq!(session.user_level().display_name(), "VIP 1");
}
