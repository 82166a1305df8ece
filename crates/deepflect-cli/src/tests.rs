use std::time::Duration;

use chrono::{TimeZone, Utc};
use clap::Parser;
use deepflect_core::files::{FilesApi, RemoteUploadStatus};
use deepflect_core::{
    ClientConfig, MediaKind, MemoryStore, SessionManager, StoredFile, UploadCoordinator,
    UploadStatus, UploadTask,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::cli::{
    AuthCommands, Cli, Commands, CompletionShell, FileTypeArg, FilesCommands, UploadsCommands,
};
use crate::commands::common::{
    format_expiry, format_file_lines, format_progress, format_task_lines, normalize_task_id,
    resolve_client_config, ProfileContext,
};
use crate::commands::completions::render_completions;
use crate::commands::config::merge_api_base_url;
use crate::commands::files::{download_file_name, write_download};
use crate::commands::upload::watch_until_settled;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn stored_file(task_id: &str, file_name: &str) -> StoredFile {
    StoredFile {
        task_id: task_id.to_string(),
        file_name: file_name.to_string(),
        file_type: MediaKind::Video,
        size: 2048,
        url: "https://cdn.example.com/file".to_string(),
        timestamp: "2025-01-01T00:00:00".to_string(),
    }
}

#[test]
fn parses_upload_with_watch_and_global_profile() {
    let cli = Cli::try_parse_from(["deepflect", "upload", "a.png", "b.mp4", "--watch", "--profile", "work"])
        .unwrap();
    assert_eq!(cli.profile.as_deref(), Some("work"));
    let Some(Commands::Upload { paths, watch }) = cli.command else {
        panic!("expected upload command");
    };
    assert_eq!(paths.len(), 2);
    assert!(watch);
}

#[test]
fn upload_requires_at_least_one_path() {
    assert!(Cli::try_parse_from(["deepflect", "upload"]).is_err());
}

#[test]
fn parses_files_list_type_filter() {
    let cli = Cli::try_parse_from(["deepflect", "files", "list", "--type", "video", "--json"]).unwrap();
    let Some(Commands::Files {
        command: FilesCommands::List { file_type, json },
    }) = cli.command
    else {
        panic!("expected files list command");
    };
    assert_eq!(file_type, Some(FileTypeArg::Video));
    assert_eq!(file_type.map(MediaKind::from), Some(MediaKind::Video));
    assert!(json);
}

#[test]
fn parses_auth_register_and_delete_account() {
    let cli = Cli::try_parse_from([
        "deepflect",
        "auth",
        "register",
        "--email",
        "a@b.com",
        "--password",
        "secret1",
        "--confirm-password",
        "secret1",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Auth {
            command: AuthCommands::Register { .. }
        })
    ));

    let cli = Cli::try_parse_from(["deepflect", "auth", "delete-account"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Auth {
            command: AuthCommands::DeleteAccount { yes: false }
        })
    ));
}

#[test]
fn parses_uploads_watch_interval() {
    let cli = Cli::try_parse_from(["deepflect", "uploads", "watch", "--interval-secs", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Uploads {
            command: UploadsCommands::Watch {
                interval_secs: Some(5)
            }
        })
    ));
}

#[test]
fn completions_mention_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("deepflect"));
}

#[test]
fn merge_api_base_url_prefers_explicit_and_validates() {
    let merged = merge_api_base_url(
        Some(" https://api.example.com/ ".to_string()),
        Some("https://env.example.com".to_string()),
        None,
    )
    .unwrap();
    assert_eq!(merged.as_deref(), Some("https://api.example.com"));

    let merged = merge_api_base_url(None, None, Some("https://stored.example.com".to_string()))
        .unwrap();
    assert_eq!(merged.as_deref(), Some("https://stored.example.com"));

    assert_eq!(merge_api_base_url(None, None, None).unwrap(), None);
    assert!(matches!(
        merge_api_base_url(Some("api.example.com".to_string()), None, None),
        Err(CliError::Config(_))
    ));
}

#[test]
fn resolve_client_config_prefers_environment() {
    let profile = CliProfile {
        api_base_url: Some("https://profile.example.com".to_string()),
    };
    let from_env = ClientConfig::new("https://env.example.com").unwrap();

    let config = resolve_client_config("default", Some(&profile), Some(from_env)).unwrap();
    assert_eq!(config.api_base_url(), "https://env.example.com");

    let config = resolve_client_config("default", Some(&profile), None).unwrap();
    assert_eq!(config.api_base_url(), "https://profile.example.com");

    let error = resolve_client_config("work", None, None).err().unwrap();
    assert!(error.to_string().contains("deepflect config init --profile work"));
}

#[test]
fn watch_interval_overrides_profile_poll_interval() {
    let profile = ProfileContext {
        name: "default".to_string(),
        client_config: ClientConfig::new("https://api.example.com").unwrap(),
    };
    let profile = profile.with_poll_interval(None);
    assert_eq!(profile.client_config.poll_interval, Duration::from_secs(3));

    let profile = profile.with_poll_interval(Some(Duration::from_secs(7)));
    assert_eq!(profile.client_config.poll_interval, Duration::from_secs(7));
}

#[test]
fn normalize_task_id_rejects_blank() {
    assert_eq!(normalize_task_id(" task-1 ").unwrap(), "task-1");
    assert!(matches!(normalize_task_id("  "), Err(CliError::EmptyTaskId)));
}

#[test]
fn formatting_helpers() {
    assert_eq!(format_progress(0.4), "40%");
    assert_eq!(format_progress(1.7), "100%");
    assert_eq!(format_expiry(None), "unknown");
    assert_eq!(
        format_expiry(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single()),
        "2025-01-02 03:04:05 UTC"
    );

    let lines = format_file_lines(&[stored_file("task-1", "clip.mp4")]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("clip.mp4"));
    assert!(lines[0].contains("2.00 KB"));

    let tasks = format_task_lines(&[UploadTask {
        task_id: "task-1".to_string(),
        file_name: "photo.png".to_string(),
        file_type: MediaKind::Image,
        status: RemoteUploadStatus::Uploading,
        progress: None,
        size: 0,
        message: None,
        timestamp: None,
    }]);
    assert!(tasks[0].contains("uploading"));
    assert!(tasks[0].contains(" - "));
}

#[test]
fn download_name_comes_from_listing() {
    let listed = vec![stored_file("task-1", "../clip.mp4")];
    assert_eq!(download_file_name(&listed, "task-1").to_str(), Some("clip.mp4"));
    assert_eq!(download_file_name(&listed, "task-2").to_str(), Some("task-2"));
}

#[test]
fn write_download_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out").join("clip.mp4");
    write_download(&destination, b"bytes").unwrap();
    assert_eq!(std::fs::read(destination).unwrap(), b"bytes".to_vec());
}

#[tokio::test]
async fn watch_until_settled_stops_once_server_finishes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/files/uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_string("task-1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files/uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploads": [{
                "taskId": "task-1",
                "fileName": "photo.png",
                "fileType": "image",
                "status": "success",
                "size": 3
            }]
        })))
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).unwrap();
    let session = SessionManager::new(config, MemoryStore::new()).unwrap();
    let coordinator = UploadCoordinator::new(FilesApi::new(session));
    coordinator
        .upload("photo.png", b"png".to_vec(), MediaKind::Image)
        .await
        .unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        watch_until_settled(&coordinator, Duration::from_millis(100)),
    )
    .await
    .unwrap()
    .unwrap();

    let entries = coordinator.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, UploadStatus::Done);
    assert_eq!(entries[0].progress, 1.0);
}
