//! Shared types, error model, and configuration for kbsync.
//!
//! This crate is the foundation depended on by all other kbsync crates.
//! It provides:
//! - [`KbSyncError`]: the unified error type
//! - Domain types ([`KnowledgeBaseFields`], [`TriggerMode`], [`PageRecord`], [`RevisionRecord`])
//! - Configuration ([`AppConfig`], [`HelpCenterConfig`], [`SyncSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnvironmentConfig, HelpCenterConfig, HelpCenterSection, StorageConfig,
    SyncSection, SyncSettings, config_dir, config_file_path, expand_home, init_config,
    load_config, load_config_from,
};
pub use error::{KbSyncError, Result};
pub use types::{KnowledgeBaseFields, NewRevision, PageRecord, RevisionRecord, TriggerMode};
