use std::path::PathBuf;
use std::time::Duration;

use deepflect_core::{KeyValueStore, UploadCoordinator};

use crate::commands::common::{format_upload_lines, print_lines, ProfileContext};
use crate::error::CliError;

pub async fn run_upload(
    paths: &[PathBuf],
    watch: bool,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let profile = ProfileContext::load(global_profile)?;
    let coordinator = profile.coordinator()?;

    let mut failed = 0;
    for path in paths {
        match coordinator.upload_path(path).await {
            Ok(entry) => println!(
                "Uploaded {} ({}) task={}",
                entry.file_name,
                entry.file_size_display,
                entry.task_id.as_deref().unwrap_or("-")
            ),
            Err(error) => {
                failed += 1;
                eprintln!("Failed to upload {}: {}", path.display(), error.user_message());
            }
        }
    }

    if watch {
        let period = profile.client_config.poll_interval;
        watch_until_settled(&coordinator, period).await?;
    }

    if failed > 0 {
        return Err(CliError::UploadsFailed(failed, paths.len()));
    }
    Ok(())
}

/// Polls until every tracked upload reached a terminal state or the user
/// interrupts.
pub async fn watch_until_settled<S: KeyValueStore>(
    coordinator: &UploadCoordinator<S>,
    period: Duration,
) -> Result<(), CliError> {
    if coordinator.snapshot().is_empty() {
        return Ok(());
    }

    let mut updates = coordinator.subscribe();
    let poller = coordinator.start_polling_every(period);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let entries = updates.borrow_and_update().clone();
                println!();
                print_lines(&format_upload_lines(&entries), "No uploads tracked.");
                if entries.iter().all(|entry| entry.status.is_terminal()) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                println!("Stopped watching uploads.");
                break;
            }
        }
    }

    poller.stop().await;
    Ok(())
}
