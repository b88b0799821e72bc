//! libSQL page and revision store.
//!
//! The [`Storage`] struct wraps a libSQL database holding host pages and their
//! append-only revision history. Sync reads the latest revision of a page and,
//! after a successful remote call, appends a new one.
//!
//! **Access rules:**
//! - Sync and page commands: read-write via [`Storage::open`]
//! - History inspection: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use kbsync_shared::{KbSyncError, NewRevision, PageRecord, Result, RevisionRecord};
use libsql::{Connection, Database, params};

const REVISION_COLUMNS: &str =
    "id, page_id, content_json, user_id, submitted_for_moderation, go_live_at, created_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KbSyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.enable_foreign_keys().await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KbSyncError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    async fn enable_foreign_keys(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA foreign_keys = ON", params![])
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    KbSyncError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(KbSyncError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Insert a new page record.
    pub async fn insert_page(&self, id: i64, kind: &str, title: &str) -> Result<PageRecord> {
        self.check_writable()?;
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO pages (id, kind, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, kind, title, now.to_rfc3339()],
            )
            .await
            .map_err(|e| KbSyncError::Storage(format!("insert page {id}: {e}")))?;

        Ok(PageRecord {
            id,
            kind: kind.to_string(),
            title: title.to_string(),
            created_at: now,
        })
    }

    /// Get a page by ID.
    pub async fn get_page(&self, id: i64) -> Result<Option<PageRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, title, created_at FROM pages WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(PageRecord {
                id: row
                    .get::<i64>(0)
                    .map_err(|e| KbSyncError::Storage(e.to_string()))?,
                kind: row
                    .get::<String>(1)
                    .map_err(|e| KbSyncError::Storage(e.to_string()))?,
                title: row
                    .get::<String>(2)
                    .map_err(|e| KbSyncError::Storage(e.to_string()))?,
                created_at: parse_timestamp(
                    &row.get::<String>(3)
                        .map_err(|e| KbSyncError::Storage(e.to_string()))?,
                )?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(KbSyncError::Storage(e.to_string())),
        }
    }

    /// Delete a page and its revision history.
    pub async fn delete_page(&self, id: i64) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM revisions WHERE page_id = ?1", params![id])
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;
        self.conn
            .execute("DELETE FROM pages WHERE id = ?1", params![id])
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Copy a page: a new page of the same kind whose first revision
    /// duplicates the source's latest content verbatim.
    pub async fn copy_page(
        &self,
        source_id: i64,
        dest_id: i64,
        title: Option<&str>,
        user_id: Option<i64>,
    ) -> Result<PageRecord> {
        self.check_writable()?;
        let source = self.get_page(source_id).await?.ok_or_else(|| {
            KbSyncError::validation(format!("source page {source_id} does not exist"))
        })?;
        let latest = self.latest_revision(source_id).await?.ok_or_else(|| {
            KbSyncError::validation(format!("source page {source_id} has no revisions"))
        })?;

        let page = self
            .insert_page(dest_id, &source.kind, title.unwrap_or(&source.title))
            .await?;
        self.create_revision(
            dest_id,
            &NewRevision {
                content: latest.content,
                user_id,
                submitted_for_moderation: false,
                go_live_at: latest.go_live_at,
            },
        )
        .await?;

        tracing::debug!(source_id, dest_id, "page copied");
        Ok(page)
    }

    // -----------------------------------------------------------------------
    // Revision operations
    // -----------------------------------------------------------------------

    /// Append a revision to a page. Existing revisions are never touched.
    pub async fn create_revision(
        &self,
        page_id: i64,
        revision: &NewRevision,
    ) -> Result<RevisionRecord> {
        self.check_writable()?;
        let now = Utc::now();
        let content_json = serde_json::to_string(&revision.content)
            .map_err(|e| KbSyncError::Storage(format!("serialize revision content: {e}")))?;

        let mut rows = self
            .conn
            .query(
                "INSERT INTO revisions (page_id, content_json, user_id, submitted_for_moderation, go_live_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id",
                params![
                    page_id,
                    content_json,
                    revision.user_id,
                    i64::from(revision.submitted_for_moderation),
                    revision.go_live_at.map(|t| t.to_rfc3339()),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| KbSyncError::Storage(format!("create revision for page {page_id}: {e}")))?;

        let id: i64 = match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| KbSyncError::Storage(e.to_string()))?,
            Ok(None) => {
                return Err(KbSyncError::Storage(format!(
                    "create revision for page {page_id}: no id returned"
                )));
            }
            Err(e) => return Err(KbSyncError::Storage(e.to_string())),
        };

        Ok(RevisionRecord {
            id,
            page_id,
            content: revision.content.clone(),
            user_id: revision.user_id,
            submitted_for_moderation: revision.submitted_for_moderation,
            go_live_at: revision.go_live_at,
            created_at: now,
        })
    }

    /// The newest revision of a page, if it has any.
    pub async fn latest_revision(&self, page_id: i64) -> Result<Option<RevisionRecord>> {
        let sql = format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE page_id = ?1 ORDER BY id DESC LIMIT 1"
        );
        let mut rows = self
            .conn
            .query(&sql, params![page_id])
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_revision(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(KbSyncError::Storage(e.to_string())),
        }
    }

    /// All revisions of a page, oldest first.
    pub async fn list_revisions(&self, page_id: i64) -> Result<Vec<RevisionRecord>> {
        let sql =
            format!("SELECT {REVISION_COLUMNS} FROM revisions WHERE page_id = ?1 ORDER BY id");
        let mut rows = self
            .conn
            .query(&sql, params![page_id])
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?
        {
            results.push(row_to_revision(&row)?);
        }
        Ok(results)
    }

    /// Number of revisions stored for a page.
    pub async fn count_revisions(&self, page_id: i64) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM revisions WHERE page_id = ?1",
                params![page_id],
            )
            .await
            .map_err(|e| KbSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| KbSyncError::Storage(e.to_string()))?;
                Ok(count as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(KbSyncError::Storage(e.to_string())),
        }
    }
}

/// Convert a database row to a [`RevisionRecord`].
fn row_to_revision(row: &libsql::Row) -> Result<RevisionRecord> {
    let content_json: String = row
        .get(2)
        .map_err(|e| KbSyncError::Storage(e.to_string()))?;
    let content = serde_json::from_str(&content_json)
        .map_err(|e| KbSyncError::Storage(format!("invalid revision content: {e}")))?;

    Ok(RevisionRecord {
        id: row
            .get::<i64>(0)
            .map_err(|e| KbSyncError::Storage(e.to_string()))?,
        page_id: row
            .get::<i64>(1)
            .map_err(|e| KbSyncError::Storage(e.to_string()))?,
        content,
        user_id: row.get::<i64>(3).ok(),
        submitted_for_moderation: row.get::<i64>(4).unwrap_or(0) != 0,
        go_live_at: match row.get::<String>(5).ok() {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        },
        created_at: parse_timestamp(
            &row.get::<String>(6)
                .map_err(|e| KbSyncError::Storage(e.to_string()))?,
        )?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KbSyncError::Storage(format!("invalid date '{s}': {e}")))
}
