use std::time::Duration;

use chrono::{DateTime, Utc};
use deepflect_core::files::FilesApi;
use deepflect_core::util::format_file_size;
use deepflect_core::{
    ClientConfig, SessionManager, StoredFile, UploadCoordinator, UploadEntry, UploadTask,
};

use crate::auth::{session_for_profile, SessionStore};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Profile name plus the client configuration it resolves to.
pub struct ProfileContext {
    pub name: String,
    pub client_config: ClientConfig,
}

impl ProfileContext {
    pub fn load(global_profile: Option<&str>) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let name = config.resolve_profile_name(global_profile);
        let client_config =
            resolve_client_config(&name, config.profile(&name), ClientConfig::from_env()?)?;
        Ok(Self {
            name,
            client_config,
        })
    }

    pub fn session(&self) -> Result<SessionManager<SessionStore>, CliError> {
        Ok(session_for_profile(&self.name, self.client_config.clone())?)
    }

    pub fn coordinator(&self) -> Result<UploadCoordinator<SessionStore>, CliError> {
        Ok(UploadCoordinator::new(FilesApi::new(self.session()?)))
    }

    /// Overrides the polling period used by `coordinator().start_polling()`.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
        if let Some(interval) = interval {
            self.client_config = self.client_config.with_poll_interval(interval);
        }
        self
    }
}

/// `DEEPFLECT_API_BASE_URL` wins over the profile's stored base URL.
pub fn resolve_client_config(
    profile_name: &str,
    profile: Option<&CliProfile>,
    env_config: Option<ClientConfig>,
) -> Result<ClientConfig, CliError> {
    if let Some(config) = env_config {
        return Ok(config);
    }
    let Some(base_url) = profile.and_then(CliProfile::api_base_url) else {
        return Err(CliError::Config(format!(
            "Profile '{profile_name}' has no API base URL. Run `deepflect config init --profile {profile_name} --api-base-url <URL>` first."
        )));
    };
    Ok(ClientConfig::new(base_url)?)
}

pub fn normalize_task_id(task_id: &str) -> Result<String, CliError> {
    let trimmed = task_id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyTaskId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn format_progress(fraction: f64) -> String {
    format!("{:.0}%", fraction.clamp(0.0, 1.0) * 100.0)
}

pub fn format_upload_lines(entries: &[UploadEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let mut line = format!(
                "{:<9}  {:>4}  {}  ({})",
                entry.status.label(),
                format_progress(entry.progress),
                entry.file_name,
                entry.file_size_display
            );
            if let Some(task_id) = &entry.task_id {
                line.push_str(&format!("  task={task_id}"));
            }
            if let Some(error) = &entry.error {
                line.push_str(&format!("  error: {error}"));
            }
            line
        })
        .collect()
}

pub fn format_task_lines(tasks: &[UploadTask]) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let progress = task
                .progress
                .map_or_else(|| "-".to_string(), |percent| format!("{percent:.0}%"));
            format!(
                "{:<24}  {:<9}  {:>4}  {}  ({})",
                task.task_id,
                task.status.label(),
                progress,
                task.file_name,
                format_file_size(task.size)
            )
        })
        .collect()
}

pub fn format_file_lines(files: &[StoredFile]) -> Vec<String> {
    files
        .iter()
        .map(|file| {
            format!(
                "{:<24}  {:<5}  {:>12}  {}  {}",
                file.task_id,
                file.file_type,
                format_file_size(file.size),
                file.timestamp,
                file.file_name
            )
        })
        .collect()
}

pub fn format_expiry(expires_at: Option<DateTime<Utc>>) -> String {
    expires_at.map_or_else(
        || "unknown".to_string(),
        |expires_at| expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn print_lines(lines: &[String], empty_message: &str) {
    if lines.is_empty() {
        println!("{empty_message}");
    } else {
        for line in lines {
            println!("{line}");
        }
    }
}
