use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::transport::{ProgressHandle, TransferJob, TransferOutcome, Transport};
use super::{FileDescriptor, SupplementaryFile, TransferState};
use crate::discount::{self, MaterialType};
use crate::processing::ProcessingStage;

/// Upload-side session state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadState {
    pub files: Vec<SupplementaryFile>,
    /// Material type chosen for the most recent batch
    pub selected_source: Option<MaterialType>,
    /// Cached discount, recomputed when the last transfer finishes or a file
    /// is removed
    pub discount_percent: u32,
    /// Transfers are in flight; not persisted
    #[serde(skip)]
    pub is_uploading: bool,
}

/// Clamp to 0–100; NaN counts as no progress
fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// State shared between the tracker and its transfer tasks
#[derive(Clone)]
pub(crate) struct Board {
    state: Arc<Mutex<UploadState>>,
    idle: Arc<Notify>,
}

impl Board {
    fn new(state: UploadState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            idle: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UploadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn progress(&self, file_id: &str) -> Option<f64> {
        self.lock()
            .files
            .iter()
            .find(|f| f.id == file_id)
            .map(|f| f.progress)
    }

    pub(crate) fn set_progress(&self, file_id: &str, value: f64) -> bool {
        let mut state = self.lock();
        match state.files.iter_mut().find(|f| f.id == file_id) {
            Some(file) => {
                file.progress = clamp_progress(value);
                true
            }
            None => false,
        }
    }

    /// Move a pending file to uploading. `None` if it was removed or is no
    /// longer pending.
    fn begin(&self, file_id: &str) -> Option<TransferJob> {
        let mut state = self.lock();
        let file = state.files.iter_mut().find(|f| f.id == file_id)?;
        if file.transfer_state != TransferState::Pending {
            return None;
        }
        file.transfer_state = TransferState::Uploading;
        file.progress = 0.0;
        Some(TransferJob {
            file_id: file.id.clone(),
            name: file.name.clone(),
            size_bytes: file.size_bytes,
            material_type: file.material_type,
        })
    }

    /// Record a terminal state and, once every file is terminal, end the
    /// upload session and recompute the discount.
    fn finish(&self, file_id: &str, outcome: TransferState) {
        let mut state = self.lock();
        let file = match state.files.iter_mut().find(|f| f.id == file_id) {
            Some(file) => file,
            None => return,
        };
        file.transfer_state = outcome;
        if outcome == TransferState::Completed {
            file.progress = 100.0;
        }

        if state.files.iter().all(|f| f.transfer_state.is_terminal()) {
            state.is_uploading = false;
            state.discount_percent = discount::total_discount(&state.files);
            tracing::info!(
                files = state.files.len(),
                discount = state.discount_percent,
                "Supplementary uploads finished"
            );
            drop(state);
            self.idle.notify_waiters();
        }
    }

    fn end_session_if_quiet(&self, state: &mut UploadState) {
        let any_uploading = state
            .files
            .iter()
            .any(|f| f.transfer_state == TransferState::Uploading);
        if !any_uploading {
            state.is_uploading = false;
            self.idle.notify_waiters();
        }
    }
}

async fn run_transfer(
    board: Board,
    transport: Arc<dyn Transport>,
    file_id: String,
    delay: Duration,
) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let job = match board.begin(&file_id) {
        Some(job) => job,
        None => {
            tracing::debug!(file_id = %file_id, "Transfer skipped; file no longer pending");
            return;
        }
    };
    tracing::debug!(file_id = %file_id, name = %job.name, "Transfer started");

    let progress = ProgressHandle::new(board.clone(), file_id.clone());
    match transport.transfer(&job, &progress).await {
        Ok(TransferOutcome::Delivered) => board.finish(&file_id, TransferState::Completed),
        Ok(TransferOutcome::Abandoned) => {
            tracing::debug!(file_id = %file_id, "Transfer abandoned; file was removed");
        }
        Err(e) => {
            tracing::warn!(file_id = %file_id, name = %job.name, error = %e, "Transfer failed");
            board.finish(&file_id, TransferState::Error);
        }
    }
}

/// Tracks supplementary files and drives one transfer task per file
pub struct UploadTracker {
    board: Board,
    transport: Arc<dyn Transport>,
    stagger: Duration,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl UploadTracker {
    pub fn new(transport: Arc<dyn Transport>, stagger: Duration) -> Self {
        Self::from_state(UploadState::default(), transport, stagger)
    }

    pub fn from_state(state: UploadState, transport: Arc<dyn Transport>, stagger: Duration) -> Self {
        Self {
            board: Board::new(state),
            transport,
            stagger,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn has_live_task(tasks: &HashMap<String, JoinHandle<()>>, file_id: &str) -> bool {
        tasks.get(file_id).is_some_and(|h| !h.is_finished())
    }

    /// Copy of the current upload state
    pub fn state(&self) -> UploadState {
        self.board.lock().clone()
    }

    pub fn files(&self) -> Vec<SupplementaryFile> {
        self.board.lock().files.clone()
    }

    pub fn file(&self, file_id: &str) -> Option<SupplementaryFile> {
        self.board
            .lock()
            .files
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
    }

    pub fn is_uploading(&self) -> bool {
        self.board.lock().is_uploading
    }

    pub fn discount_percent(&self) -> u32 {
        self.board.lock().discount_percent
    }

    pub fn selected_source(&self) -> Option<MaterialType> {
        self.board.lock().selected_source
    }

    pub fn skipped_stages(&self) -> BTreeSet<ProcessingStage> {
        discount::skipped_stages(&self.board.lock().files)
    }

    pub fn has_supplementary_data(&self) -> bool {
        self.board
            .lock()
            .files
            .iter()
            .any(|f| f.transfer_state == TransferState::Completed)
    }

    pub fn completed_material_types(&self) -> Vec<MaterialType> {
        self.board
            .lock()
            .files
            .iter()
            .filter(|f| f.transfer_state == TransferState::Completed)
            .map(|f| f.material_type)
            .collect()
    }

    /// Queue files as pending and remember the material type as the active
    /// data source. Returns the generated ids.
    pub fn enqueue(&self, files: Vec<FileDescriptor>, material_type: MaterialType) -> Vec<String> {
        let mut state = self.board.lock();
        state.selected_source = Some(material_type);
        let ids = files
            .into_iter()
            .map(|desc| {
                let file = SupplementaryFile::new(desc.name, desc.size_bytes, material_type);
                let id = file.id.clone();
                state.files.push(file);
                id
            })
            .collect::<Vec<_>>();
        tracing::info!(count = ids.len(), material = %material_type, "Supplementary files queued");
        ids
    }

    /// Start every pending file, the k-th one after `k × stagger`.
    /// Returns the number of transfers scheduled.
    pub fn start_all(&self) -> usize {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime available; uploads not started");
                return 0;
            }
        };

        let mut tasks = self.tasks();
        let pending: Vec<String> = {
            let mut state = self.board.lock();
            let pending: Vec<String> = state
                .files
                .iter()
                .filter(|f| f.transfer_state == TransferState::Pending)
                .filter(|f| !Self::has_live_task(&tasks, &f.id))
                .map(|f| f.id.clone())
                .collect();
            if !pending.is_empty() {
                state.is_uploading = true;
            }
            pending
        };

        for (k, file_id) in pending.iter().enumerate() {
            let delay = self.stagger * k as u32;
            let handle = runtime.spawn(run_transfer(
                self.board.clone(),
                self.transport.clone(),
                file_id.clone(),
                delay,
            ));
            tasks.insert(file_id.clone(), handle);
        }

        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Supplementary uploads started");
        }
        pending.len()
    }

    /// Restart an errored file immediately. Unknown ids and files not in
    /// the error state are ignored.
    pub fn retry(&self, file_id: &str) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime available; retry not started");
                return false;
            }
        };

        {
            let mut state = self.board.lock();
            let file = match state.files.iter_mut().find(|f| f.id == file_id) {
                Some(file) if file.transfer_state == TransferState::Error => file,
                _ => return false,
            };
            file.transfer_state = TransferState::Pending;
            file.progress = 0.0;
            state.is_uploading = true;
        }

        let handle = runtime.spawn(run_transfer(
            self.board.clone(),
            self.transport.clone(),
            file_id.to_string(),
            Duration::ZERO,
        ));
        self.tasks().insert(file_id.to_string(), handle);
        tracing::info!(file_id = %file_id, "Supplementary upload retried");
        true
    }

    /// Remove a file whatever its state. Unknown ids are ignored.
    pub fn cancel(&self, file_id: &str) -> bool {
        {
            let mut state = self.board.lock();
            let pos = match state.files.iter().position(|f| f.id == file_id) {
                Some(pos) => pos,
                None => return false,
            };
            state.files.remove(pos);
            state.discount_percent = discount::total_discount(&state.files);
            self.board.end_session_if_quiet(&mut state);
        }

        if let Some(handle) = self.tasks().remove(file_id) {
            handle.abort();
        }
        tracing::info!(file_id = %file_id, "Supplementary upload cancelled");
        true
    }

    /// Drop the file list and data source. Refused while uploading.
    pub fn clear_completed(&self) -> bool {
        let mut state = self.board.lock();
        if state.is_uploading {
            return false;
        }
        state.files.clear();
        state.selected_source = None;
        state.discount_percent = 0;
        drop(state);

        for (_, handle) in self.tasks().drain() {
            handle.abort();
        }
        true
    }

    /// Abort every transfer and return to the initial state
    pub fn reset(&self) {
        for (_, handle) in self.tasks().drain() {
            handle.abort();
        }
        *self.board.lock() = UploadState::default();
        self.board.idle.notify_waiters();
    }

    /// Files persisted mid-transfer have no task after a restart; mark them
    /// errored so they can be retried. Returns how many were affected.
    pub fn recover_interrupted(&self) -> usize {
        let tasks = self.tasks();
        let mut state = self.board.lock();
        let mut recovered = 0;
        for file in state.files.iter_mut() {
            if file.transfer_state == TransferState::Uploading
                && !Self::has_live_task(&tasks, &file.id)
            {
                file.transfer_state = TransferState::Error;
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::warn!(count = recovered, "Interrupted uploads marked as failed");
        }
        recovered
    }

    /// Wait until no upload session is in progress
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.board.idle.notified();
            if !self.is_uploading() {
                return;
            }
            notified.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn progress_handle(&self, file_id: &str) -> ProgressHandle {
        ProgressHandle::new(self.board.clone(), file_id.to_string())
    }
}

impl Drop for UploadTracker {
    fn drop(&mut self) {
        for (_, handle) in self.tasks().drain() {
            handle.abort();
        }
    }
}
