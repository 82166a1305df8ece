use std::path::{Path, PathBuf};

use deepflect_core::files::FilesApi;
use deepflect_core::{KeyValueStore, MediaKind, StoredFile};

use crate::cli::FilesCommands;
use crate::commands::common::{format_file_lines, normalize_task_id, print_lines, ProfileContext};
use crate::error::CliError;

pub async fn run_files(command: FilesCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let profile = ProfileContext::load(global_profile)?;
    let files = FilesApi::new(profile.session()?);

    match command {
        FilesCommands::List { file_type, json } => {
            let listed = files.list_files(file_type.map(MediaKind::from)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listed)?);
            } else {
                print_lines(&format_file_lines(&listed), "No files yet.");
            }
        }
        FilesCommands::Download { task_id, output } => {
            let task_id = normalize_task_id(&task_id)?;
            let destination = match output {
                Some(path) => path,
                None => default_download_path(&files, &task_id).await?,
            };
            let bytes = files.download(&task_id).await?;
            write_download(&destination, &bytes)?;
            println!("Saved {} ({} bytes)", destination.display(), bytes.len());
        }
        FilesCommands::Delete { task_id } => {
            let task_id = normalize_task_id(&task_id)?;
            files.delete_file(&task_id).await?;
            println!("Deleted file {task_id}");
        }
    }

    Ok(())
}

/// Uses the listed file name for the task, or the task id when the file is
/// not in the listing.
async fn default_download_path<S: KeyValueStore>(
    files: &FilesApi<S>,
    task_id: &str,
) -> Result<PathBuf, CliError> {
    let listed = files.list_files(None).await?;
    Ok(download_file_name(&listed, task_id))
}

pub fn download_file_name(listed: &[StoredFile], task_id: &str) -> PathBuf {
    listed
        .iter()
        .find(|file| file.task_id == task_id)
        .and_then(|file| Path::new(&file.file_name).file_name().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(task_id))
}

pub fn write_download(destination: &Path, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(destination, bytes)?;
    Ok(())
}
