//! Upload coordination and background status polling.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{LocalId, UploadEntry, UploadTracker};
use crate::error::{Error, Result};
use crate::files::{file_name_of, FilesApi, MediaKind};
use crate::storage::KeyValueStore;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the upload tracker for one session and keeps it in sync with the
/// server.
///
/// Every change to the tracked list is published to [`subscribe`]rs.
///
/// [`subscribe`]: UploadCoordinator::subscribe
#[derive(Clone)]
pub struct UploadCoordinator<S: KeyValueStore> {
    inner: Arc<CoordinatorInner<S>>,
}

struct CoordinatorInner<S: KeyValueStore> {
    files: FilesApi<S>,
    tracker: Mutex<UploadTracker>,
    updates: watch::Sender<Vec<UploadEntry>>,
}

impl<S: KeyValueStore> UploadCoordinator<S> {
    pub fn new(files: FilesApi<S>) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(CoordinatorInner {
                files,
                tracker: Mutex::new(UploadTracker::new()),
                updates,
            }),
        }
    }

    pub fn files(&self) -> &FilesApi<S> {
        &self.inner.files
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadEntry>> {
        self.inner.updates.subscribe()
    }

    pub fn snapshot(&self) -> Vec<UploadEntry> {
        self.lock_tracker().entries().to_vec()
    }

    /// Uploads `bytes` and records the outcome on a tracked entry.
    ///
    /// The entry stays in the list when the upload fails, marked as an error.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        kind: MediaKind,
    ) -> Result<UploadEntry> {
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        let local_id = self.with_tracker(|tracker| tracker.begin(file_name, size, kind));

        match self.inner.files.upload(file_name, bytes, kind).await {
            Ok(receipt) => {
                tracing::info!("Uploaded '{}' as task {}", file_name, receipt.task_id);
                self.with_tracker(|tracker| tracker.complete(&local_id, &receipt));
                self.entry(&local_id)
            }
            Err(error) => {
                tracing::warn!("Upload of '{}' failed: {}", file_name, error);
                self.with_tracker(|tracker| tracker.fail(&local_id, error.user_message()));
                Err(error)
            }
        }
    }

    pub async fn upload_path(&self, path: &Path) -> Result<UploadEntry> {
        let file_name = file_name_of(path)?;
        let bytes = tokio::fs::read(path).await?;
        let kind = MediaKind::from_file_name(&file_name);
        self.upload(&file_name, bytes, kind).await
    }

    /// Cancels a tracked upload. Entries without a task id never reached the
    /// server and are only dropped locally.
    pub async fn cancel(&self, local_id: &LocalId) -> Result<()> {
        let task_id = {
            let tracker = self.lock_tracker();
            let entry = tracker
                .get(local_id)
                .ok_or_else(|| Error::Validation(format!("No tracked upload '{local_id}'")))?;
            entry.task_id.clone()
        };

        if let Some(task_id) = task_id {
            self.inner.files.cancel_upload(&task_id).await?;
        }
        self.with_tracker(|tracker| tracker.remove(local_id));
        Ok(())
    }

    /// Cancels by server task id, whether or not it is tracked here.
    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        self.inner.files.cancel_upload(task_id).await?;
        self.with_tracker(|tracker| tracker.remove_task(task_id));
        Ok(())
    }

    /// Fetches the server's upload list once and merges it.
    pub async fn poll_once(&self) -> Result<()> {
        let remote = self.inner.files.list_uploads().await?;
        tracing::debug!("Server reports {} tracked uploads", remote.len());
        self.with_tracker(|tracker| tracker.apply_remote(&remote));
        Ok(())
    }

    /// Forgets every tracked upload.
    pub fn reset(&self) {
        self.with_tracker(UploadTracker::clear);
    }

    /// Logs the session out and resets the tracker.
    pub async fn logout(&self) -> Result<()> {
        let result = self.inner.files.session().logout().await;
        self.reset();
        result
    }

    /// Polls at the configured interval until the handle is stopped or
    /// dropped.
    pub fn start_polling(&self) -> PollerHandle {
        let period = self.inner.files.session().config().poll_interval;
        self.start_polling_every(period)
    }

    /// Polls immediately and then every `period`. A failed poll is logged and
    /// the loop carries on.
    pub fn start_polling_every(&self, period: Duration) -> PollerHandle {
        let coordinator = self.clone();
        let period = period.max(MIN_POLL_INTERVAL);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = coordinator.poll_once().await {
                    tracing::warn!("Upload status poll failed: {}", error);
                }
            }
        });
        PollerHandle { task: Some(task) }
    }

    fn entry(&self, local_id: &LocalId) -> Result<UploadEntry> {
        self.lock_tracker()
            .get(local_id)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("No tracked upload '{local_id}'")))
    }

    fn with_tracker<R>(&self, apply: impl FnOnce(&mut UploadTracker) -> R) -> R {
        let mut tracker = self.lock_tracker();
        let result = apply(&mut tracker);
        self.inner.updates.send_replace(tracker.entries().to_vec());
        result
    }

    fn lock_tracker(&self) -> std::sync::MutexGuard<'_, UploadTracker> {
        self.inner
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Running poll loop. Dropping the handle cancels the loop.
#[derive(Debug)]
pub struct PollerHandle {
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the loop and waits until it has wound down.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
