//! Wire and domain types for the files API.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Media category the backend processes differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Guesses the kind from a file name: `mp4` and `mp3` are video, anything
    /// else is treated as an image.
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("mp4" | "mp3") => Self::Video,
            _ => Self::Image,
        }
    }

    /// Lenient parse used for server payloads; unknown values map to image.
    pub fn from_server_value(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("video") {
            Self::Video
        } else {
            Self::Image
        }
    }

    /// Value for the upload endpoint's `type` query parameter.
    pub const fn as_upload_param(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Value for the file listing's `type` filter.
    pub const fn as_filter_param(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_upload_param())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media kind '{other}'")),
        }
    }
}

/// Processing state reported by the server for an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteUploadStatus {
    Uploading,
    Failed,
    Success,
}

impl RemoteUploadStatus {
    /// Anything other than `success` or `failed` counts as still uploading.
    pub fn from_server_value(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Uploading,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Failed => "failed",
            Self::Success => "success",
        }
    }
}

/// Result of starting an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub task_id: String,
    pub file_name: String,
    pub file_type: MediaKind,
}

impl UploadReceipt {
    /// Receipt for servers that answer an upload with the bare task id.
    pub fn from_plain_task_id(task_id: &str, file_name: &str, kind: MediaKind) -> Self {
        Self {
            task_id: task_id.trim().to_string(),
            file_name: file_name.to_string(),
            file_type: kind,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawUploadReceipt {
    task_id: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
}

impl RawUploadReceipt {
    pub(crate) fn into_receipt(self, file_name: &str, kind: MediaKind) -> UploadReceipt {
        UploadReceipt {
            task_id: self.task_id,
            file_name: self.file_name.unwrap_or_else(|| file_name.to_string()),
            file_type: self
                .file_type
                .as_deref()
                .map_or(kind, MediaKind::from_server_value),
        }
    }
}

/// An upload the server is tracking (in flight or recently finished).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub task_id: String,
    pub file_name: String,
    pub file_type: MediaKind,
    pub status: RemoteUploadStatus,
    /// Percentage reported by the server, 0 to 100.
    pub progress: Option<f64>,
    pub size: u64,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUploadTask {
    task_id: String,
    file_name: String,
    #[serde(default)]
    file_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl From<RawUploadTask> for UploadTask {
    fn from(value: RawUploadTask) -> Self {
        Self {
            task_id: value.task_id,
            file_name: value.file_name,
            file_type: MediaKind::from_server_value(&value.file_type),
            status: RemoteUploadStatus::from_server_value(&value.status),
            progress: value.progress,
            size: value.size,
            message: value.message,
            timestamp: value.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadListResponse {
    #[serde(default)]
    uploads: Vec<RawUploadTask>,
}

impl UploadListResponse {
    pub(crate) fn into_tasks(self) -> Vec<UploadTask> {
        self.uploads.into_iter().map(Into::into).collect()
    }
}

/// A processed file available for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub task_id: String,
    pub file_name: String,
    pub file_type: MediaKind,
    pub size: u64,
    pub url: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStoredFile {
    task_id: String,
    file_name: String,
    #[serde(default)]
    file_type: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    timestamp: String,
}

impl From<RawStoredFile> for StoredFile {
    fn from(value: RawStoredFile) -> Self {
        Self {
            task_id: value.task_id,
            file_name: value.file_name,
            file_type: MediaKind::from_server_value(&value.file_type),
            size: value.size,
            url: value.url,
            timestamp: value.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileListResponse {
    #[serde(default)]
    files: Vec<RawStoredFile>,
}

impl FileListResponse {
    pub(crate) fn into_files(self) -> Vec<StoredFile> {
        self.files.into_iter().map(Into::into).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadResponse {
    #[serde(default)]
    pub(crate) download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_from_file_name_checks_extension() {
        assert_eq!(MediaKind::from_file_name("clip.MP4"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("voice.mp3"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("photo.png"), MediaKind::Image);
        assert_eq!(MediaKind::from_file_name("no-extension"), MediaKind::Image);
    }

    #[test]
    fn server_values_are_parsed_leniently() {
        assert_eq!(MediaKind::from_server_value("VIDEO"), MediaKind::Video);
        assert_eq!(MediaKind::from_server_value("anything"), MediaKind::Image);
        assert_eq!(
            RemoteUploadStatus::from_server_value("SUCCESS"),
            RemoteUploadStatus::Success
        );
        assert_eq!(
            RemoteUploadStatus::from_server_value("failed"),
            RemoteUploadStatus::Failed
        );
        assert_eq!(
            RemoteUploadStatus::from_server_value("processing"),
            RemoteUploadStatus::Uploading
        );
    }

    #[test]
    fn remote_status_labels_match_server_values() {
        for status in [
            RemoteUploadStatus::Uploading,
            RemoteUploadStatus::Failed,
            RemoteUploadStatus::Success,
        ] {
            assert_eq!(RemoteUploadStatus::from_server_value(status.label()), status);
        }
        assert_eq!(RemoteUploadStatus::Failed.label(), "failed");
    }

    #[test]
    fn upload_list_payload_maps_into_tasks() {
        let payload = serde_json::json!({
            "uploads": [{
                "taskId": "task-1",
                "fileName": "photo.png",
                "fileType": "IMAGE",
                "status": "uploading",
                "progress": 40.0,
                "size": 2048,
                "timestamp": "2025-01-01T00:00:00"
            }]
        });
        let tasks = serde_json::from_value::<UploadListResponse>(payload)
            .unwrap()
            .into_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].file_type, MediaKind::Image);
        assert_eq!(tasks[0].status, RemoteUploadStatus::Uploading);
        assert_eq!(tasks[0].progress, Some(40.0));
    }

    #[test]
    fn plain_task_id_receipt_is_uploading() {
        let receipt = UploadReceipt::from_plain_task_id(" task-9\n", "clip.mp4", MediaKind::Video);
        assert_eq!(receipt.task_id, "task-9");
        assert_eq!(receipt.file_name, "clip.mp4");
        assert_eq!(receipt.file_type, MediaKind::Video);
    }
}
