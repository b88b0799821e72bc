//! Page state snapshots.
//!
//! Reads the knowledge-base fields out of a page's latest revision and writes
//! an updated copy back as a new revision. Content keys that are not KB fields
//! pass through untouched.

use chrono::{DateTime, Utc};
use kbsync_shared::{
    KbSyncError, KnowledgeBaseFields, NewRevision, PageRecord, Result, RevisionRecord,
    SyncSettings,
};
use kbsync_storage::Storage;
use serde::Deserialize;
use serde_json::{Map, Value};

const KEY_ARTICLE_ID: &str = "knowledge_base_id";
const KEY_ACTIVE: &str = "kb_active";
const KEY_TITLE: &str = "knowledge_base_title";
const KEY_BODY: &str = "knowledge_base_body";
const KEY_GO_LIVE_AT: &str = "go_live_at";

/// The KB keys of a page's content JSON. All but `go_live_at` are required.
#[derive(Debug, Deserialize)]
struct KbContent {
    knowledge_base_id: u64,
    kb_active: bool,
    knowledge_base_title: String,
    knowledge_base_body: String,
    #[serde(default)]
    go_live_at: Option<DateTime<Utc>>,
}

/// A page's knowledge-base state as of its latest revision.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub page: PageRecord,
    pub fields: KnowledgeBaseFields,
    /// The revision the snapshot was read from.
    pub base_revision_id: i64,
    /// Full content object, including non-KB keys.
    content: Map<String, Value>,
}

impl PageSnapshot {
    /// Load the snapshot for `page_id`.
    ///
    /// Fails with `NotApplicable` outside production, for pages that are not
    /// of the KB-bearing kind, and for pages with no revisions; with
    /// `MalformedState` if the latest content lacks the KB fields.
    pub async fn load(storage: &Storage, settings: &SyncSettings, page_id: i64) -> Result<Self> {
        if !settings.production {
            return Err(KbSyncError::not_applicable("not a production environment"));
        }

        let page = storage
            .get_page(page_id)
            .await?
            .ok_or_else(|| KbSyncError::not_applicable(format!("page {page_id} does not exist")))?;

        if page.kind != settings.page_kind {
            return Err(KbSyncError::not_applicable(format!(
                "page {page_id} is a '{}', not a '{}'",
                page.kind, settings.page_kind
            )));
        }

        let revision = storage.latest_revision(page_id).await?.ok_or_else(|| {
            KbSyncError::not_applicable(format!("page {page_id} has no revisions"))
        })?;

        Self::from_revision(page, revision)
    }

    /// Build a snapshot from an already-fetched revision.
    pub fn from_revision(page: PageRecord, revision: RevisionRecord) -> Result<Self> {
        let content = match revision.content {
            Value::Object(map) => map,
            other => {
                return Err(KbSyncError::malformed(format!(
                    "revision {} content is not a JSON object: {other}",
                    revision.id
                )));
            }
        };

        let kb: KbContent = serde_json::from_value(Value::Object(content.clone())).map_err(|e| {
            KbSyncError::malformed(format!("revision {} of page {}: {e}", revision.id, page.id))
        })?;

        let fields = KnowledgeBaseFields {
            active: kb.kb_active,
            remote_article_id: kb.knowledge_base_id,
            title: kb.knowledge_base_title,
            body: kb.knowledge_base_body,
            go_live_at: revision.go_live_at.or(kb.go_live_at),
            submitted_for_moderation: revision.submitted_for_moderation,
        };

        Ok(Self {
            page,
            fields,
            base_revision_id: revision.id,
            content,
        })
    }

    /// The content object with the current fields written over the KB keys.
    pub fn content(&self) -> Value {
        let mut content = self.content.clone();
        content.insert(
            KEY_ARTICLE_ID.into(),
            Value::from(self.fields.remote_article_id),
        );
        content.insert(KEY_ACTIVE.into(), Value::Bool(self.fields.active));
        content.insert(KEY_TITLE.into(), Value::String(self.fields.title.clone()));
        content.insert(KEY_BODY.into(), Value::String(self.fields.body.clone()));
        content.insert(
            KEY_GO_LIVE_AT.into(),
            self.fields
                .go_live_at
                .map_or(Value::Null, |t| Value::String(t.to_rfc3339())),
        );
        Value::Object(content)
    }

    /// Persist the snapshot as one new revision authored by `acting_user`.
    pub async fn save(&self, storage: &Storage, acting_user: Option<i64>) -> Result<RevisionRecord> {
        storage
            .create_revision(
                self.page.id,
                &NewRevision {
                    content: self.content(),
                    user_id: acting_user,
                    submitted_for_moderation: self.fields.submitted_for_moderation,
                    go_live_at: self.fields.go_live_at,
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("kbsync_core_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn production() -> SyncSettings {
        SyncSettings {
            production: true,
            page_kind: "knowledge_base_page".into(),
        }
    }

    fn kb_content(id: u64, active: bool) -> Value {
        json!({
            "knowledge_base_id": id,
            "kb_active": active,
            "knowledge_base_title": "Two-factor setup",
            "knowledge_base_body": "<p>Scan the QR code.</p>",
            "go_live_at": null,
            "intro": "Keep this"
        })
    }

    async fn seed(storage: &Storage, id: i64, kind: &str, content: Value) {
        storage.insert_page(id, kind, "page").await.unwrap();
        storage
            .create_revision(
                id,
                &NewRevision {
                    content,
                    user_id: Some(1),
                    submitted_for_moderation: true,
                    go_live_at: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn loads_fields_from_latest_revision() {
        let storage = test_storage().await;
        seed(&storage, 1, "knowledge_base_page", kb_content(0, false)).await;
        storage
            .create_revision(
                1,
                &NewRevision {
                    content: kb_content(42, true),
                    user_id: None,
                    submitted_for_moderation: false,
                    go_live_at: None,
                },
            )
            .await
            .unwrap();

        let snapshot = PageSnapshot::load(&storage, &production(), 1)
            .await
            .expect("load");
        assert!(snapshot.fields.active);
        assert_eq!(snapshot.fields.remote_article_id, 42);
        assert_eq!(snapshot.fields.title, "Two-factor setup");
        assert!(!snapshot.fields.submitted_for_moderation);
    }

    #[tokio::test]
    async fn non_production_is_not_applicable() {
        let storage = test_storage().await;
        seed(&storage, 1, "knowledge_base_page", kb_content(0, true)).await;

        let settings = SyncSettings {
            production: false,
            ..production()
        };
        let err = PageSnapshot::load(&storage, &settings, 1).await.unwrap_err();
        assert!(matches!(err, KbSyncError::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn other_page_kinds_are_not_applicable() {
        let storage = test_storage().await;
        seed(&storage, 1, "blog_page", kb_content(0, true)).await;

        let err = PageSnapshot::load(&storage, &production(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, KbSyncError::NotApplicable { .. }));

        let err = PageSnapshot::load(&storage, &production(), 2)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn missing_fields_are_malformed() {
        let storage = test_storage().await;
        seed(
            &storage,
            1,
            "knowledge_base_page",
            json!({"knowledge_base_id": 0, "kb_active": true}),
        )
        .await;

        let err = PageSnapshot::load(&storage, &production(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, KbSyncError::MalformedState { .. }));
        assert!(err.to_string().contains("knowledge_base_title"));
    }

    #[tokio::test]
    async fn wrong_types_are_malformed() {
        let storage = test_storage().await;
        let mut content = kb_content(0, true);
        content["knowledge_base_id"] = json!("42");
        seed(&storage, 1, "knowledge_base_page", content).await;

        let err = PageSnapshot::load(&storage, &production(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, KbSyncError::MalformedState { .. }));
    }

    #[tokio::test]
    async fn save_appends_revision_and_keeps_other_keys() {
        let storage = test_storage().await;
        seed(&storage, 1, "knowledge_base_page", kb_content(0, true)).await;

        let mut snapshot = PageSnapshot::load(&storage, &production(), 1)
            .await
            .unwrap();
        snapshot.fields.remote_article_id = 42;

        let revision = snapshot.save(&storage, Some(5)).await.expect("save");
        assert!(revision.id > snapshot.base_revision_id);
        assert_eq!(revision.user_id, Some(5));
        assert!(revision.submitted_for_moderation);
        assert_eq!(revision.content["knowledge_base_id"], 42);
        assert_eq!(revision.content["intro"], "Keep this");

        assert_eq!(storage.count_revisions(1).await.unwrap(), 2);
        // The base revision still reads as before
        let history = storage.list_revisions(1).await.unwrap();
        assert_eq!(history[0].content["knowledge_base_id"], 0);
    }

    #[test]
    fn go_live_prefers_revision_column() {
        let page = PageRecord {
            id: 1,
            kind: "knowledge_base_page".into(),
            title: "p".into(),
            created_at: Utc::now(),
        };
        let mut content = kb_content(0, true);
        content["go_live_at"] = json!("2026-01-01T09:00:00Z");
        let revision_time = DateTime::parse_from_rfc3339("2026-02-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let snapshot = PageSnapshot::from_revision(
            page.clone(),
            RevisionRecord {
                id: 1,
                page_id: 1,
                content: content.clone(),
                user_id: None,
                submitted_for_moderation: false,
                go_live_at: Some(revision_time),
                created_at: Utc::now(),
            },
        )
        .unwrap();
        assert_eq!(snapshot.fields.go_live_at, Some(revision_time));

        let snapshot = PageSnapshot::from_revision(
            page,
            RevisionRecord {
                id: 2,
                page_id: 1,
                content,
                user_id: None,
                submitted_for_moderation: false,
                go_live_at: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        assert_eq!(
            snapshot.fields.go_live_at.map(|t| t.to_rfc3339()),
            Some("2026-01-01T09:00:00+00:00".to_string())
        );
    }

    #[test]
    fn non_object_content_is_malformed() {
        let page = PageRecord {
            id: 1,
            kind: "knowledge_base_page".into(),
            title: "p".into(),
            created_at: Utc::now(),
        };
        let err = PageSnapshot::from_revision(
            page,
            RevisionRecord {
                id: 1,
                page_id: 1,
                content: json!([1, 2, 3]),
                user_id: None,
                submitted_for_moderation: false,
                go_live_at: None,
                created_at: Utc::now(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, KbSyncError::MalformedState { .. }));
    }
}
