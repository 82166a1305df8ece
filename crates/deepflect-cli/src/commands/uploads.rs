use std::time::Duration;

use crate::cli::UploadsCommands;
use crate::commands::common::{
    format_task_lines, format_upload_lines, normalize_task_id, print_lines, ProfileContext,
};
use crate::error::CliError;

pub async fn run_uploads(
    command: UploadsCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let interval = match &command {
        UploadsCommands::Watch { interval_secs } => interval_secs.map(Duration::from_secs),
        _ => None,
    };
    let profile = ProfileContext::load(global_profile)?.with_poll_interval(interval);
    let coordinator = profile.coordinator()?;

    match command {
        UploadsCommands::List { json } => {
            let tasks = coordinator.files().list_uploads().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                print_lines(&format_task_lines(&tasks), "No uploads in progress.");
            }
        }
        UploadsCommands::Watch { .. } => {
            let period = profile.client_config.poll_interval;
            let mut updates = coordinator.subscribe();
            let poller = coordinator.start_polling();
            println!("Watching uploads every {}s; press Ctrl-C to stop.", period.as_secs());

            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let entries = updates.borrow_and_update().clone();
                        println!();
                        print_lines(&format_upload_lines(&entries), "No uploads in progress.");
                    }
                    signal = tokio::signal::ctrl_c() => {
                        signal?;
                        break;
                    }
                }
            }
            poller.stop().await;
        }
        UploadsCommands::Cancel { task_id } => {
            let task_id = normalize_task_id(&task_id)?;
            coordinator.cancel_task(&task_id).await?;
            println!("Cancelled upload {task_id}");
        }
    }

    Ok(())
}
