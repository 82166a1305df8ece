//! deepflect-core - Core library for Deepflect
//!
//! Session and token lifecycle, the authorized request wrapper, the files API
//! client, and client-side upload tracking shared by every Deepflect
//! front end.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod storage;
pub mod uploads;
pub mod util;

pub use auth::{SessionManager, UserInfo};
pub use client::AuthorizedClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use files::{FilesApi, MediaKind, StoredFile, UploadReceipt, UploadTask};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StoredSession, TokenStore};
pub use uploads::{
    reconcile, LocalId, PollerHandle, UploadCoordinator, UploadEntry, UploadStatus,
    UploadTracker,
};
