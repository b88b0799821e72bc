//! Core domain types for kbsync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KbSyncError;

// ---------------------------------------------------------------------------
// TriggerMode
// ---------------------------------------------------------------------------

/// The page lifecycle event that invoked synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Fired after a page is created.
    OnCreate,
    /// Fired after a page is edited.
    OnEdit,
    /// Fired after a page is copied; the destination page is synchronized.
    OnCopy,
    /// Fired before a page is deleted.
    OnDelete,
}

impl TriggerMode {
    /// All trigger modes, in lifecycle order.
    pub const ALL: [TriggerMode; 4] = [
        TriggerMode::OnCreate,
        TriggerMode::OnEdit,
        TriggerMode::OnCopy,
        TriggerMode::OnDelete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerMode::OnCreate => "create",
            TriggerMode::OnEdit => "edit",
            TriggerMode::OnCopy => "copy",
            TriggerMode::OnDelete => "delete",
        }
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerMode {
    type Err = KbSyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(TriggerMode::OnCreate),
            "edit" => Ok(TriggerMode::OnEdit),
            "copy" => Ok(TriggerMode::OnCopy),
            "delete" => Ok(TriggerMode::OnDelete),
            other => Err(KbSyncError::validation(format!(
                "unknown trigger mode '{other}': expected create, edit, copy, or delete"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// KnowledgeBaseFields
// ---------------------------------------------------------------------------

/// The subset of a page's content that governs remote article sync.
///
/// `remote_article_id == 0` means no remote article exists for the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseFields {
    /// Whether the page should have a live remote article.
    pub active: bool,
    /// Help-center article id, or 0 when none exists.
    pub remote_article_id: u64,
    pub title: String,
    pub body: String,
    /// Scheduled publish time, carried through to the next revision.
    pub go_live_at: Option<DateTime<Utc>>,
    /// Moderation flag, carried through to the next revision.
    pub submitted_for_moderation: bool,
}

impl KnowledgeBaseFields {
    /// Whether a remote article has been created and not since deleted.
    pub fn has_remote_article(&self) -> bool {
        self.remote_article_id != 0
    }
}

// ---------------------------------------------------------------------------
// Pages and revisions
// ---------------------------------------------------------------------------

/// A content document owned by the host CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: i64,
    /// Page kind; only the configured KB-bearing kind is synchronized.
    pub kind: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// An immutable snapshot of a page's content at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// Monotonic revision id; higher is newer.
    pub id: i64,
    pub page_id: i64,
    /// The page content as a JSON object.
    pub content: serde_json::Value,
    /// Authoring user, if any.
    pub user_id: Option<i64>,
    pub submitted_for_moderation: bool,
    pub go_live_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a revision to a page.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRevision {
    pub content: serde_json::Value,
    pub user_id: Option<i64>,
    pub submitted_for_moderation: bool,
    pub go_live_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_mode_parses_cli_names() {
        for mode in TriggerMode::ALL {
            let parsed: TriggerMode = mode.as_str().parse().expect("parse mode");
            assert_eq!(parsed, mode);
        }
        assert!("publish".parse::<TriggerMode>().is_err());
    }

    #[test]
    fn remote_article_presence() {
        let mut fields = KnowledgeBaseFields {
            active: true,
            remote_article_id: 0,
            title: "Resetting your password".into(),
            body: "<p>Click forgot password.</p>".into(),
            go_live_at: None,
            submitted_for_moderation: false,
        };
        assert!(!fields.has_remote_article());
        fields.remote_article_id = 42;
        assert!(fields.has_remote_article());
    }
}
