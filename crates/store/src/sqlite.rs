//! SQLite storage engine.
//!
//! One [`SqliteStore`] backs both storage ports: [`pipeline::AnalysisStore`]
//! for analysis records plus the dependency reverse index, and
//! [`pipeline::DedupStore`] for content fingerprints. Analysis payloads are
//! stored as serialized JSON under the `(repository, path, commit_sha)`
//! identity key; the reverse index is rebuilt in the same transaction as
//! every write, so a record and its index rows never disagree.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use pipeline::types::WorkflowAnalysis;
use pipeline::{
    AnalysisStore, CommitSha, DedupEntry, DedupStore, DependencyName, Fingerprint, RepositoryId,
    StoreError, WorkflowPath, WriteOutcome,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workflow_analyses (
    repository   TEXT NOT NULL,
    path         TEXT NOT NULL,
    commit_sha   TEXT NOT NULL,
    payload      TEXT NOT NULL,
    fingerprint  TEXT NOT NULL,
    analyzed_at  TEXT NOT NULL,
    PRIMARY KEY (repository, path, commit_sha)
);

CREATE TABLE IF NOT EXISTS dependency_locations (
    dependency   TEXT NOT NULL,
    repository   TEXT NOT NULL,
    path         TEXT NOT NULL,
    commit_sha   TEXT NOT NULL,
    PRIMARY KEY (dependency, repository, path, commit_sha)
);

CREATE INDEX IF NOT EXISTS idx_dependency_locations_name
    ON dependency_locations (dependency);

CREATE TABLE IF NOT EXISTS dedup_entries (
    repository    TEXT NOT NULL,
    path          TEXT NOT NULL,
    fingerprint   TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (repository, path)
);
";

/// SQLite-backed implementation of the storage ports.
///
/// A single writer connection behind a mutex. Analysis volume is one row per
/// workflow change, so writer contention is not a concern at this scale.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store backed by a file on disk, creating it when absent.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(connection_error)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(connection_error)?;
        conn.pragma_update(None, "busy_timeout", 5_000)
            .map_err(connection_error)?;
        Self::initialize(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(connection_error)?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(connection_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Internal {
            message: "storage mutex poisoned".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Busy and locked faults are worth retrying; everything else is a schema or
/// data problem that retrying cannot fix.
fn store_error(error: rusqlite::Error) -> StoreError {
    match &error {
        rusqlite::Error::SqliteFailure(fault, _)
            if matches!(
                fault.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            StoreError::Transient {
                message: error.to_string(),
            }
        }
        _ => StoreError::Internal {
            message: error.to_string(),
        },
    }
}

fn connection_error(error: rusqlite::Error) -> StoreError {
    StoreError::Internal {
        message: error.to_string(),
    }
}

fn serialization_error(error: serde_json::Error) -> StoreError {
    StoreError::Internal {
        message: format!("analysis payload serialization failed: {error}"),
    }
}

// ---------------------------------------------------------------------------
// AnalysisStore
// ---------------------------------------------------------------------------

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn write(&self, analysis: &WorkflowAnalysis) -> Result<WriteOutcome, StoreError> {
        let payload = serde_json::to_string(analysis).map_err(serialization_error)?;
        let (repository, path, sha) = analysis.identity_key();

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_error)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT payload FROM workflow_analyses
                 WHERE repository = ?1 AND path = ?2 AND commit_sha = ?3",
                params![repository.as_str(), path.as_str(), sha.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)?;

        let outcome = match existing.as_deref() {
            Some(current) if current == payload => {
                // Identical record already present; leave the row and its
                // index entries untouched.
                tx.commit().map_err(store_error)?;
                return Ok(WriteOutcome::Unchanged);
            }
            Some(_) => WriteOutcome::Updated,
            None => WriteOutcome::Inserted,
        };

        tx.execute(
            "INSERT INTO workflow_analyses
                 (repository, path, commit_sha, payload, fingerprint, analyzed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (repository, path, commit_sha) DO UPDATE SET
                 payload = excluded.payload,
                 fingerprint = excluded.fingerprint,
                 analyzed_at = excluded.analyzed_at",
            params![
                repository.as_str(),
                path.as_str(),
                sha.as_str(),
                payload,
                analysis.content_fingerprint.as_str(),
                analysis.analyzed_at.to_rfc3339(),
            ],
        )
        .map_err(store_error)?;

        // Rebuild the reverse index rows for this record.
        tx.execute(
            "DELETE FROM dependency_locations
             WHERE repository = ?1 AND path = ?2 AND commit_sha = ?3",
            params![repository.as_str(), path.as_str(), sha.as_str()],
        )
        .map_err(store_error)?;
        for record in &analysis.dependencies {
            tx.execute(
                "INSERT OR IGNORE INTO dependency_locations
                     (dependency, repository, path, commit_sha)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.reference.name.as_str(),
                    repository.as_str(),
                    path.as_str(),
                    sha.as_str(),
                ],
            )
            .map_err(store_error)?;
        }

        tx.commit().map_err(store_error)?;
        tracing::debug!(
            repository = repository.as_str(),
            path = path.as_str(),
            sha = sha.as_str(),
            ?outcome,
            dependencies = analysis.dependencies.len(),
            "analysis written"
        );
        Ok(outcome)
    }

    async fn read(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        sha: &CommitSha,
    ) -> Result<Option<WorkflowAnalysis>, StoreError> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM workflow_analyses
                 WHERE repository = ?1 AND path = ?2 AND commit_sha = ?3",
                params![repository.as_str(), path.as_str(), sha.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)?;

        payload
            .map(|json| {
                serde_json::from_str(&json).map_err(|err| StoreError::Internal {
                    message: format!("stored analysis payload is corrupt: {err}"),
                })
            })
            .transpose()
    }

    async fn locations_for(
        &self,
        name: &DependencyName,
    ) -> Result<Vec<(RepositoryId, WorkflowPath)>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT DISTINCT repository, path FROM dependency_locations
                 WHERE dependency = ?1
                 ORDER BY repository, path",
            )
            .map_err(store_error)?;

        let rows = statement
            .query_map(params![name.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(store_error)?;

        let mut locations = Vec::new();
        for row in rows {
            let (repository, path) = row.map_err(store_error)?;
            let (Some(repository), Some(path)) =
                (RepositoryId::new(repository), WorkflowPath::new(path))
            else {
                return Err(StoreError::Internal {
                    message: "dependency index row with empty key".to_string(),
                });
            };
            locations.push((repository, path));
        }
        Ok(locations)
    }
}

// ---------------------------------------------------------------------------
// DedupStore
// ---------------------------------------------------------------------------

#[async_trait]
impl DedupStore for SqliteStore {
    async fn last_entry(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
    ) -> Result<Option<DedupEntry>, StoreError> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT fingerprint, first_seen_at FROM dedup_entries
                 WHERE repository = ?1 AND path = ?2",
                params![repository.as_str(), path.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(store_error)?;

        row.map(|(fingerprint, first_seen_at)| {
            let Some(fingerprint) = Fingerprint::new(fingerprint) else {
                return Err(StoreError::Internal {
                    message: "dedup row with empty fingerprint".to_string(),
                });
            };
            let first_seen_at = DateTime::parse_from_rfc3339(&first_seen_at)
                .map_err(|err| StoreError::Internal {
                    message: format!("dedup row with invalid timestamp: {err}"),
                })?
                .with_timezone(&Utc);
            Ok(DedupEntry {
                fingerprint,
                first_seen_at,
            })
        })
        .transpose()
    }

    async fn record_fingerprint(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        fingerprint: &Fingerprint,
        first_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO dedup_entries (repository, path, fingerprint, first_seen_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (repository, path) DO UPDATE SET
                 fingerprint = excluded.fingerprint,
                 first_seen_at = excluded.first_seen_at",
            params![
                repository.as_str(),
                path.as_str(),
                fingerprint.as_str(),
                first_seen_at.to_rfc3339(),
            ],
        )
        .map_err(store_error)?;
        Ok(())
    }
}
