//! Client-side upload tracking.
//!
//! Locally started uploads are tracked optimistically and merged with the
//! server's list of in-flight uploads by [`reconcile`]. Once an entry has a
//! task id the server's view of it wins.

mod poller;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use poller::{PollerHandle, UploadCoordinator};

use crate::files::{MediaKind, RemoteUploadStatus, UploadReceipt, UploadTask};
use crate::util::format_file_size;

/// Client-generated identifier, stable for the lifetime of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    pub fn generate() -> Self {
        Self(format!("file_{}", Uuid::now_v7().simple()))
    }

    /// Deterministic id for entries first seen in a server snapshot.
    fn for_remote(task_id: &str) -> Self {
        Self(format!("remote_{task_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Done,
    Error,
}

impl UploadStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Uploading)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl From<RemoteUploadStatus> for UploadStatus {
    fn from(value: RemoteUploadStatus) -> Self {
        match value {
            RemoteUploadStatus::Uploading => Self::Uploading,
            RemoteUploadStatus::Success => Self::Done,
            RemoteUploadStatus::Failed => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEntry {
    pub local_id: LocalId,
    pub task_id: Option<String>,
    pub file_name: String,
    pub file_size_display: String,
    pub media_kind: MediaKind,
    pub status: UploadStatus,
    /// Fraction complete, 0.0 to 1.0.
    pub progress: f64,
    pub error: Option<String>,
}

impl UploadEntry {
    fn new_local(file_name: &str, size_bytes: u64, media_kind: MediaKind) -> Self {
        Self {
            local_id: LocalId::generate(),
            task_id: None,
            file_name: file_name.to_string(),
            file_size_display: format_file_size(size_bytes),
            media_kind,
            status: UploadStatus::Uploading,
            progress: 0.0,
            error: None,
        }
    }

    /// Entry for an upload the server reports but this client never started.
    pub fn from_remote(task: &UploadTask) -> Self {
        let mut entry = Self {
            local_id: LocalId::for_remote(&task.task_id),
            task_id: Some(task.task_id.clone()),
            file_name: task.file_name.clone(),
            file_size_display: format_file_size(task.size),
            media_kind: task.file_type,
            status: UploadStatus::Uploading,
            progress: 0.0,
            error: None,
        };
        entry.apply_remote(task);
        entry
    }

    fn apply_remote(&mut self, task: &UploadTask) {
        self.status = task.status.into();
        self.progress = remote_progress(task);
        self.error = match self.status {
            UploadStatus::Error => Some(
                task.message
                    .clone()
                    .unwrap_or_else(|| "Processing failed".to_string()),
            ),
            _ => None,
        };
    }

    fn key(&self) -> &str {
        self.task_id.as_deref().unwrap_or_else(|| self.local_id.as_str())
    }
}

fn remote_progress(task: &UploadTask) -> f64 {
    match task.progress {
        Some(percent) => (percent / 100.0).clamp(0.0, 1.0),
        None if task.status == RemoteUploadStatus::Success => 1.0,
        None => 0.0,
    }
}

/// Merges local entries with a server snapshot of in-flight uploads.
///
/// - a local entry whose task id is in the snapshot takes the server's
///   status and progress;
/// - a local entry with a task id missing from the snapshot that is still
///   uploading is promoted to done;
/// - snapshot tasks without a local entry are appended;
/// - the result holds one entry per task id (or local id when there is no
///   task id); a later duplicate replaces the earlier one in place.
///
/// Merging the same snapshot twice yields the same list.
pub fn reconcile(local: &[UploadEntry], remote: &[UploadTask]) -> Vec<UploadEntry> {
    let remote_by_task: HashMap<&str, &UploadTask> = remote
        .iter()
        .map(|task| (task.task_id.as_str(), task))
        .collect();

    let mut merged = Vec::with_capacity(local.len() + remote.len());
    for entry in local {
        let mut entry = entry.clone();
        if let Some(task_id) = entry.task_id.clone() {
            match remote_by_task.get(task_id.as_str()) {
                Some(task) => entry.apply_remote(task),
                None if entry.status == UploadStatus::Uploading => {
                    entry.status = UploadStatus::Done;
                    entry.progress = 1.0;
                }
                None => {}
            }
        }
        merged.push(entry);
    }

    let known: HashSet<&str> = local
        .iter()
        .filter_map(|entry| entry.task_id.as_deref())
        .collect();
    merged.extend(
        remote
            .iter()
            .filter(|task| !known.contains(task.task_id.as_str()))
            .map(UploadEntry::from_remote),
    );

    dedupe(merged)
}

fn dedupe(entries: Vec<UploadEntry>) -> Vec<UploadEntry> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<UploadEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(&index) = positions.get(entry.key()) {
            unique[index] = entry;
        } else {
            positions.insert(entry.key().to_string(), unique.len());
            unique.push(entry);
        }
    }
    unique
}

/// Ordered list of tracked uploads.
#[derive(Debug, Clone, Default)]
pub struct UploadTracker {
    entries: Vec<UploadEntry>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[UploadEntry] {
        &self.entries
    }

    pub fn get(&self, local_id: &LocalId) -> Option<&UploadEntry> {
        self.entries.iter().find(|entry| &entry.local_id == local_id)
    }

    pub fn find_task(&self, task_id: &str) -> Option<&UploadEntry> {
        self.entries
            .iter()
            .find(|entry| entry.task_id.as_deref() == Some(task_id))
    }

    /// Starts tracking a file that is about to be uploaded.
    pub fn begin(&mut self, file_name: &str, size_bytes: u64, media_kind: MediaKind) -> LocalId {
        let entry = UploadEntry::new_local(file_name, size_bytes, media_kind);
        let local_id = entry.local_id.clone();
        self.entries.push(entry);
        local_id
    }

    /// Records a successful upload call.
    ///
    /// A poll may already have added the task under a `remote_` id; that
    /// entry is dropped so the task stays under the caller's local id.
    pub fn complete(&mut self, local_id: &LocalId, receipt: &UploadReceipt) -> bool {
        let updated = self.update(local_id, |entry| {
            entry.task_id = Some(receipt.task_id.clone());
            entry.status = UploadStatus::Done;
            entry.progress = 1.0;
            entry.error = None;
        });
        if updated {
            self.entries.retain(|entry| {
                &entry.local_id == local_id
                    || entry.task_id.as_deref() != Some(receipt.task_id.as_str())
            });
        }
        updated
    }

    pub fn fail(&mut self, local_id: &LocalId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(local_id, |entry| {
            entry.status = UploadStatus::Error;
            entry.error = Some(message);
        })
    }

    pub fn remove(&mut self, local_id: &LocalId) -> Option<UploadEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.local_id == local_id)?;
        Some(self.entries.remove(index))
    }

    pub fn remove_task(&mut self, task_id: &str) -> Option<UploadEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.task_id.as_deref() == Some(task_id))?;
        Some(self.entries.remove(index))
    }

    /// Drops entries that finished successfully; returns how many were removed.
    pub fn acknowledge_done(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.status != UploadStatus::Done);
        before - self.entries.len()
    }

    pub fn apply_remote(&mut self, remote: &[UploadTask]) {
        self.entries = reconcile(&self.entries, remote);
    }

    pub fn all_terminal(&self) -> bool {
        self.entries.iter().all(|entry| entry.status.is_terminal())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn update(&mut self, local_id: &LocalId, apply: impl FnOnce(&mut UploadEntry)) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| &entry.local_id == local_id)
        {
            Some(entry) => {
                apply(entry);
                true
            }
            None => false,
        }
    }
}
