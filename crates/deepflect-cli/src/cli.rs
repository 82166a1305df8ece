use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use deepflect_core::MediaKind;

#[derive(Parser)]
#[command(name = "deepflect")]
#[command(about = "Upload media for deepfake protection and track processing")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// CLI profile name (selects API base URL and stored session)
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload one or more media files
    Upload {
        /// Files to upload
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
        /// Keep polling until every upload has finished processing
        #[arg(long)]
        watch: bool,
    },
    /// Inspect uploads the server is processing
    Uploads {
        #[command(subcommand)]
        command: UploadsCommands,
    },
    /// Browse, download and delete processed files
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage the account and stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FileTypeArg {
    Image,
    Video,
}

impl From<FileTypeArg> for MediaKind {
    fn from(value: FileTypeArg) -> Self {
        match value {
            FileTypeArg::Image => Self::Image,
            FileTypeArg::Video => Self::Video,
        }
    }
}

#[derive(Subcommand)]
pub enum UploadsCommands {
    /// List uploads still known to the server
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll upload status until interrupted
    Watch {
        /// Seconds between polls (profile default when omitted)
        #[arg(long, value_name = "N")]
        interval_secs: Option<u64>,
    },
    /// Cancel an upload by task id
    Cancel {
        /// Server task id
        task_id: String,
    },
}

#[derive(Subcommand)]
pub enum FilesCommands {
    /// List processed files
    List {
        /// Only show files of this type
        #[arg(long = "type", value_enum, value_name = "TYPE")]
        file_type: Option<FileTypeArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download a processed file
    Download {
        /// Server task id
        task_id: String,
        /// Destination path (original file name in the current directory when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Delete a processed file
    Delete {
        /// Server task id
        task_id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Backend API base URL (e.g. <https://api.example.com>)
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Register {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Repeat the password
        #[arg(long, value_name = "PASSWORD")]
        confirm_password: String,
    },
    /// Login with email/password and store session in keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status,
    /// Logout profile and clear stored session
    Logout,
    /// Send a password reset email
    ResetPassword {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Permanently delete the account
    DeleteAccount {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}
