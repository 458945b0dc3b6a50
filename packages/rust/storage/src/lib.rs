//! libSQL-backed ingest registry.
//!
//! The [`Registry`] records what has been pulled from the Storage Service and
//! what has been created in the repository, so re-runs can skip AIPs that
//! already have an object. Objects are create-once: rows are inserted and
//! read, never updated.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};

use ushanka_shared::{Pid, Result, UshankaError};

/// One downloaded package, as recorded at download time.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub uuid: String,
    pub package_type: String,
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
    pub downloaded_at: String,
}

/// One repository object created by an ingest run.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub pid: String,
    pub label: String,
    /// `compound` or `part`.
    pub kind: String,
    pub parent_pid: Option<String>,
    pub collection: Option<String>,
    pub content_model: String,
    pub aip_uuid: Option<String>,
    pub dip_uuid: Option<String>,
    pub created_at: String,
}

/// One datastream attached to an object.
#[derive(Debug, Clone)]
pub struct DatastreamRecord {
    pub pid: String,
    pub dsid: String,
    pub label: String,
    pub mime_type: String,
    pub control_group: String,
    pub checksum: Option<String>,
}

/// Primary registry handle wrapping a libSQL database.
pub struct Registry {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Registry {
    /// Open or create a registry at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UshankaError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| UshankaError::Registry(e.to_string()))?;

        let registry = Self {
            db,
            conn,
            readonly: false,
        };
        registry.run_migrations().await?;
        Ok(registry)
    }

    /// Open a registry at `path` in read-only mode (for reporting).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| UshankaError::Registry(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
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
                    UshankaError::Registry(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
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
            return Err(UshankaError::Registry(
                "registry is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Package operations
    // -----------------------------------------------------------------------

    /// Record a downloaded package. Re-downloads overwrite the old row.
    pub async fn insert_package(
        &self,
        uuid: &str,
        package_type: &str,
        file_name: &str,
        size: u64,
        sha256: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO packages (uuid, package_type, file_name, size, sha256, downloaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(uuid) DO UPDATE SET
                   file_name = excluded.file_name,
                   size = excluded.size,
                   sha256 = excluded.sha256,
                   downloaded_at = excluded.downloaded_at",
                params![
                    uuid,
                    package_type,
                    file_name,
                    size as i64,
                    sha256,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        Ok(())
    }

    /// List all recorded packages, newest first.
    pub async fn list_packages(&self) -> Result<Vec<PackageRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT uuid, package_type, file_name, size, sha256, downloaded_at
                 FROM packages ORDER BY downloaded_at DESC",
                params![],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(PackageRecord {
                uuid: get_col(&row, 0)?,
                package_type: get_col(&row, 1)?,
                file_name: get_col(&row, 2)?,
                size: row
                    .get::<i64>(3)
                    .map_err(|e| UshankaError::Registry(e.to_string()))? as u64,
                sha256: get_col(&row, 4)?,
                downloaded_at: get_col(&row, 5)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Object operations
    // -----------------------------------------------------------------------

    /// Record a created repository object.
    pub async fn insert_object(&self, object: &ObjectRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO objects
                   (pid, label, kind, parent_pid, collection, content_model,
                    aip_uuid, dip_uuid, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    object.pid.as_str(),
                    object.label.as_str(),
                    object.kind.as_str(),
                    object.parent_pid.as_deref(),
                    object.collection.as_deref(),
                    object.content_model.as_str(),
                    object.aip_uuid.as_deref(),
                    object.dip_uuid.as_deref(),
                    object.created_at.as_str(),
                ],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        Ok(())
    }

    /// The compound object already created for an AIP, if any.
    ///
    /// This is what makes re-runs idempotent: an AIP with a compound on
    /// record is skipped instead of deposited twice.
    pub async fn compound_for_aip(&self, aip_uuid: &str) -> Result<Option<Pid>> {
        let mut rows = self
            .conn
            .query(
                "SELECT pid FROM objects WHERE aip_uuid = ?1 AND kind = 'compound'",
                params![aip_uuid],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let pid: String = get_col(&row, 0)?;
                Ok(Some(Pid::new(&pid)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(UshankaError::Registry(e.to_string())),
        }
    }

    /// List all recorded objects, compounds before their parts.
    pub async fn list_objects(&self) -> Result<Vec<ObjectRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT pid, label, kind, parent_pid, collection, content_model,
                        aip_uuid, dip_uuid, created_at
                 FROM objects ORDER BY created_at, kind",
                params![],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ObjectRecord {
                pid: get_col(&row, 0)?,
                label: get_col(&row, 1)?,
                kind: get_col(&row, 2)?,
                parent_pid: row.get::<Option<String>>(3).ok().flatten(),
                collection: row.get::<Option<String>>(4).ok().flatten(),
                content_model: get_col(&row, 5)?,
                aip_uuid: row.get::<Option<String>>(6).ok().flatten(),
                dip_uuid: row.get::<Option<String>>(7).ok().flatten(),
                created_at: get_col(&row, 8)?,
            });
        }
        Ok(results)
    }

    /// Record a datastream attached to an object.
    pub async fn insert_datastream(&self, datastream: &DatastreamRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO datastreams (pid, dsid, label, mime_type, control_group, checksum)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    datastream.pid.as_str(),
                    datastream.dsid.as_str(),
                    datastream.label.as_str(),
                    datastream.mime_type.as_str(),
                    datastream.control_group.as_str(),
                    datastream.checksum.as_deref(),
                ],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        Ok(())
    }

    /// Datastreams recorded for one object, in dsid order.
    pub async fn datastreams_for(&self, pid: &str) -> Result<Vec<DatastreamRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT pid, dsid, label, mime_type, control_group, checksum
                 FROM datastreams WHERE pid = ?1 ORDER BY dsid",
                params![pid],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(DatastreamRecord {
                pid: get_col(&row, 0)?,
                dsid: get_col(&row, 1)?,
                label: get_col(&row, 2)?,
                mime_type: get_col(&row, 3)?,
                control_group: get_col(&row, 4)?,
                checksum: row.get::<Option<String>>(5).ok().flatten(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Ingest job operations
    // -----------------------------------------------------------------------

    /// Insert a new ingest job. Returns the generated job ID.
    pub async fn insert_ingest_job(&self, aip_uuid: &str, dip_uuid: &str) -> Result<String> {
        self.check_writable()?;
        let id = uuid::Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_jobs (id, aip_uuid, dip_uuid, started_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), aip_uuid, dip_uuid, now.as_str()],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        Ok(id)
    }

    /// Close an ingest job with its final status and optional error detail.
    pub async fn finish_ingest_job(
        &self,
        job_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_jobs SET finished_at = ?1, status = ?2, error = ?3 WHERE id = ?4",
                params![now.as_str(), status, error, job_id],
            )
            .await
            .map_err(|e| UshankaError::Registry(e.to_string()))?;
        Ok(())
    }
}

fn get_col(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| UshankaError::Registry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("{prefix}-{}", uuid::Uuid::now_v7()))
            .join("registry.db")
    }

    fn compound_record(pid: &str, aip: &str) -> ObjectRecord {
        ObjectRecord {
            pid: pid.into(),
            label: "Chronicling COVID-19".into(),
            kind: "compound".into(),
            parent_pid: None,
            collection: Some("islandora:test".into()),
            content_model: "islandora:compoundCModel".into(),
            aip_uuid: Some(aip.into()),
            dip_uuid: Some("dddd-1".into()),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let path = tmp_db("ushanka-reg");
        let registry = Registry::open(&path).await.unwrap();
        assert_eq!(registry.get_schema_version().await, 1);
        drop(registry);

        // Re-open: migrations must be a no-op.
        let registry = Registry::open(&path).await.unwrap();
        assert_eq!(registry.get_schema_version().await, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn package_roundtrip_and_overwrite() {
        let path = tmp_db("ushanka-reg-pkg");
        let registry = Registry::open(&path).await.unwrap();

        registry
            .insert_package("aaaa-1", "AIP", "chronicling.7z", 81143107, "e41f")
            .await
            .unwrap();
        registry
            .insert_package("aaaa-1", "AIP", "chronicling.7z", 81143107, "f52a")
            .await
            .unwrap();

        let packages = registry.list_packages().await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].sha256, "f52a");
        assert_eq!(packages[0].size, 81143107);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn compound_lookup_by_aip() {
        let path = tmp_db("ushanka-reg-obj");
        let registry = Registry::open(&path).await.unwrap();

        registry
            .insert_object(&compound_record("test:27", "aaaa-1"))
            .await
            .unwrap();
        registry
            .insert_object(&ObjectRecord {
                pid: "test:28".into(),
                kind: "part".into(),
                parent_pid: Some("test:27".into()),
                content_model: "islandora:binaryObjectCModel".into(),
                ..compound_record("test:28", "aaaa-1")
            })
            .await
            .unwrap();

        let pid = registry.compound_for_aip("aaaa-1").await.unwrap();
        assert_eq!(pid.unwrap().as_str(), "test:27");
        assert!(registry.compound_for_aip("bbbb-9").await.unwrap().is_none());

        let objects = registry.list_objects().await.unwrap();
        assert_eq!(objects.len(), 2);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn datastreams_unique_per_object() {
        let path = tmp_db("ushanka-reg-ds");
        let registry = Registry::open(&path).await.unwrap();
        registry
            .insert_object(&compound_record("test:27", "aaaa-1"))
            .await
            .unwrap();

        let ds = DatastreamRecord {
            pid: "test:27".into(),
            dsid: "MODS".into(),
            label: "MODS Record".into(),
            mime_type: "application/xml".into(),
            control_group: "X".into(),
            checksum: None,
        };
        registry.insert_datastream(&ds).await.unwrap();
        assert!(registry.insert_datastream(&ds).await.is_err());

        let streams = registry.datastreams_for("test:27").await.unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].control_group, "X");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let path = tmp_db("ushanka-reg-ro");
        // Create with write handle first so the schema exists.
        drop(Registry::open(&path).await.unwrap());

        let registry = Registry::open_readonly(&path).await.unwrap();
        let err = registry
            .insert_package("aaaa-1", "AIP", "x.7z", 1, "ab")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn ingest_job_lifecycle() {
        let path = tmp_db("ushanka-reg-job");
        let registry = Registry::open(&path).await.unwrap();

        let job_id = registry.insert_ingest_job("aaaa-1", "dddd-1").await.unwrap();
        registry
            .finish_ingest_job(&job_id, "completed", None)
            .await
            .unwrap();

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
