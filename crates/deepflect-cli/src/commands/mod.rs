pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod files;
pub mod upload;
pub mod uploads;
