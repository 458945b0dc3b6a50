//! SQL migration definitions for the ingest registry.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

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
        description: "Initial schema: packages, objects, datastreams, ingest_jobs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Storage Service packages we have downloaded
CREATE TABLE IF NOT EXISTS packages (
    uuid          TEXT PRIMARY KEY,
    package_type  TEXT NOT NULL,
    file_name     TEXT NOT NULL,
    size          INTEGER NOT NULL,
    sha256        TEXT NOT NULL,
    downloaded_at TEXT NOT NULL
);

-- Repository objects created by ingest (compounds and their parts)
CREATE TABLE IF NOT EXISTS objects (
    pid           TEXT PRIMARY KEY,
    label         TEXT NOT NULL,
    kind          TEXT NOT NULL CHECK (kind IN ('compound', 'part')),
    parent_pid    TEXT REFERENCES objects(pid),
    collection    TEXT,
    content_model TEXT NOT NULL,
    aip_uuid      TEXT,
    dip_uuid      TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_objects_parent ON objects(parent_pid);
CREATE INDEX IF NOT EXISTS idx_objects_aip ON objects(aip_uuid);

-- Datastreams attached to each object
CREATE TABLE IF NOT EXISTS datastreams (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    pid           TEXT NOT NULL REFERENCES objects(pid) ON DELETE CASCADE,
    dsid          TEXT NOT NULL,
    label         TEXT NOT NULL,
    mime_type     TEXT NOT NULL,
    control_group TEXT NOT NULL,
    checksum      TEXT,
    UNIQUE(pid, dsid)
);

CREATE INDEX IF NOT EXISTS idx_datastreams_pid ON datastreams(pid);

-- Ingest job history
CREATE TABLE IF NOT EXISTS ingest_jobs (
    id          TEXT PRIMARY KEY,
    aip_uuid    TEXT NOT NULL,
    dip_uuid    TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    status      TEXT NOT NULL DEFAULT 'running',
    error       TEXT
);

CREATE INDEX IF NOT EXISTS idx_ingest_jobs_aip ON ingest_jobs(aip_uuid);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
