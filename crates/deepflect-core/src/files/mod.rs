//! Files API: media uploads, upload status, and processed-file history.
//!
//! Every call goes through [`AuthorizedClient`], so each request carries the
//! session's bearer token and gets one refresh-and-retry on 401.

mod models;

use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};

pub use models::{MediaKind, RemoteUploadStatus, StoredFile, UploadReceipt, UploadTask};

use crate::auth::{SessionManager, LOGIN_REQUIRED, SESSION_EXPIRED};
use crate::client::AuthorizedClient;
use crate::error::{server_error, Error, Result};
use crate::storage::KeyValueStore;
use models::{DownloadResponse, FileListResponse, RawUploadReceipt, UploadListResponse};

const UPLOADS_ROUTE: &str = "/api/v1/files/uploads";
const FILES_ROUTE: &str = "/api/v1/files";

#[derive(Clone)]
pub struct FilesApi<S: KeyValueStore> {
    client: AuthorizedClient<S>,
}

impl<S: KeyValueStore> FilesApi<S> {
    pub fn new(session: SessionManager<S>) -> Self {
        Self {
            client: AuthorizedClient::new(session),
        }
    }

    pub const fn session(&self) -> &SessionManager<S> {
        self.client.session()
    }

    /// Starts processing of `bytes` as a multipart `file` field.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        kind: MediaKind,
    ) -> Result<UploadReceipt> {
        let url = self.endpoint(UPLOADS_ROUTE);
        let mime = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string();

        tracing::debug!("Uploading '{}' ({} bytes) as {}", file_name, bytes.len(), kind);
        let response = self
            .client
            .send(|http| {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.to_string())
                    .mime_str(&mime)?;
                Ok(http
                    .post(&url)
                    .query(&[("type", kind.as_upload_param())])
                    .multipart(Form::new().part("file", part)))
            })
            .await?;
        let response = self.check(response, "File upload failed").await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        if is_json {
            let raw = response.json::<RawUploadReceipt>().await?;
            return Ok(raw.into_receipt(file_name, kind));
        }

        let task_id = response.text().await?;
        if task_id.trim().is_empty() {
            return Err(Error::InvalidPayload(
                "Upload response did not include a task id".to_string(),
            ));
        }
        Ok(UploadReceipt::from_plain_task_id(&task_id, file_name, kind))
    }

    /// Reads a local file and uploads it; the kind defaults to a guess from
    /// the file name.
    pub async fn upload_path(&self, path: &Path, kind: Option<MediaKind>) -> Result<UploadReceipt> {
        let file_name = file_name_of(path)?;
        let bytes = tokio::fs::read(path).await?;
        let kind = kind.unwrap_or_else(|| MediaKind::from_file_name(&file_name));
        self.upload(&file_name, bytes, kind).await
    }

    pub async fn cancel_upload(&self, task_id: &str) -> Result<()> {
        let url = self.task_endpoint(UPLOADS_ROUTE, task_id, "");
        let response = self.client.send(|http| Ok(http.delete(&url))).await?;
        self.check(response, "Failed to cancel the upload").await?;
        Ok(())
    }

    /// Uploads the server is still processing or has recently finished.
    pub async fn list_uploads(&self) -> Result<Vec<UploadTask>> {
        let url = self.endpoint(UPLOADS_ROUTE);
        let response = self.client.send(|http| Ok(http.get(&url))).await?;
        let response = self
            .check(response, "Failed to load uploads in progress")
            .await?;
        Ok(response.json::<UploadListResponse>().await?.into_tasks())
    }

    pub async fn list_files(&self, kind: Option<MediaKind>) -> Result<Vec<StoredFile>> {
        let url = self.endpoint(FILES_ROUTE);
        let response = self
            .client
            .send(|http| {
                let request = http.get(&url);
                Ok(match kind {
                    Some(kind) => request.query(&[("type", kind.as_filter_param())]),
                    None => request,
                })
            })
            .await?;
        let response = self.check(response, "Failed to load the file list").await?;
        Ok(response.json::<FileListResponse>().await?.into_files())
    }

    pub async fn download_url(&self, task_id: &str) -> Result<String> {
        let url = self.task_endpoint(FILES_ROUTE, task_id, "/download");
        let response = self.client.send(|http| Ok(http.get(&url))).await?;
        let response = self.check(response, "File download failed").await?;
        response
            .json::<DownloadResponse>()
            .await?
            .download_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::InvalidPayload("The server did not return a download URL".to_string())
            })
    }

    /// Resolves the download URL and fetches the processed file.
    pub async fn download(&self, task_id: &str) -> Result<Vec<u8>> {
        let download_url = self.download_url(task_id).await?;
        let response = self.session().http().get(&download_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(server_error(status, &body, "File download failed"));
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete_file(&self, task_id: &str) -> Result<()> {
        let url = self.task_endpoint(FILES_ROUTE, task_id, "");
        let response = self.client.send(|http| Ok(http.delete(&url))).await?;
        self.check(response, "Failed to delete the file").await?;
        Ok(())
    }

    fn endpoint(&self, route: &str) -> String {
        self.session().config().endpoint(route)
    }

    fn task_endpoint(&self, route: &str, task_id: &str, suffix: &str) -> String {
        format!(
            "{}/{}{}",
            self.endpoint(route),
            urlencoding::encode(task_id.trim()),
            suffix
        )
    }

    async fn check(&self, response: Response, fallback: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(Error::Session(SESSION_EXPIRED.to_string())),
            StatusCode::FORBIDDEN => {
                if self.session().tokens().access_token()?.is_none() {
                    Err(Error::Session(LOGIN_REQUIRED.to_string()))
                } else {
                    Err(Error::Forbidden(
                        "The server denied access; try logging in again".to_string(),
                    ))
                }
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(server_error(status, &body, fallback))
            }
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| Error::Validation(format!("'{}' is not a file path", path.display())))
}
