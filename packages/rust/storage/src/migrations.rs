//! SQL migration definitions for the kbsync database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: pages, append-only revisions",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Host pages, keyed by the host's primary key
CREATE TABLE IF NOT EXISTS pages (
    id         INTEGER PRIMARY KEY,
    kind       TEXT NOT NULL,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Page revisions; id order is revision order
CREATE TABLE IF NOT EXISTS revisions (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id                  INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    content_json             TEXT NOT NULL,
    user_id                  INTEGER,
    submitted_for_moderation INTEGER NOT NULL DEFAULT 0,
    go_live_at               TEXT,
    created_at               TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_revisions_page_id ON revisions(page_id, id);

-- Revisions are never edited in place
CREATE TRIGGER IF NOT EXISTS revisions_append_only BEFORE UPDATE ON revisions BEGIN
    SELECT RAISE(ABORT, 'revisions are append-only');
END;

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
