//! libSQL page cache.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the raw text of
//! fetched task and category pages, keyed by `(kind, name)`. It is the only
//! place page text persists between runs; the extraction engine never sees it.
//!
//! **Access rules:**
//! - page sources: read-write via [`Storage::open`]
//! - `rccli cache stats`: read-only via [`Storage::open_readonly`], never creates the file
//! - `rccli cache clear`: read-write, one page via [`Storage::delete_page`] or all via [`Storage::clear`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use rosetta_shared::{PageKind, Result, RosettaError};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A cached page with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub kind: PageKind,
    pub name: String,
    pub body: String,
    /// SHA-256 of `body`, lowercase hex.
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

/// Listing row: everything but the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub kind: PageKind,
    pub name: String,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    /// Body length in bytes.
    pub bytes: u64,
}

/// Aggregate counts for `rccli cache stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub tasks: u64,
    pub categories: u64,
    pub total_bytes: u64,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

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
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RosettaError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RosettaError::Storage(format!(
                "cache database {} does not exist",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

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
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        RosettaError::Storage(format!(
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
            return Err(RosettaError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Get a cached page, if present.
    pub async fn get_page(&self, kind: PageKind, name: &str) -> Result<Option<CachedPage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT kind, name, body, content_hash, fetched_at
                 FROM pages WHERE kind = ?1 AND name = ?2",
                params![kind.as_str(), name],
            )
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_cached_page(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(RosettaError::Storage(e.to_string())),
        }
    }

    /// Insert or replace a page, stamping it with the current time.
    pub async fn put_page(&self, kind: PageKind, name: &str, body: &str) -> Result<CachedPage> {
        self.check_writable()?;
        let page = CachedPage {
            kind,
            name: name.to_string(),
            body: body.to_string(),
            content_hash: compute_hash(body),
            fetched_at: Utc::now(),
        };

        self.conn
            .execute(
                "INSERT INTO pages (kind, name, body, content_hash, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(kind, name) DO UPDATE SET
                   body = excluded.body,
                   content_hash = excluded.content_hash,
                   fetched_at = excluded.fetched_at",
                params![
                    kind.as_str(),
                    page.name.as_str(),
                    page.body.as_str(),
                    page.content_hash.as_str(),
                    page.fetched_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

        tracing::debug!(%kind, name, bytes = body.len(), "page cached");
        Ok(page)
    }

    /// Delete one page. Returns whether a row was removed.
    pub async fn delete_page(&self, kind: PageKind, name: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "DELETE FROM pages WHERE kind = ?1 AND name = ?2",
                params![kind.as_str(), name],
            )
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    /// List cached pages, optionally of a single kind, ordered by kind then name.
    pub async fn list_pages(&self, kind: Option<PageKind>) -> Result<Vec<PageEntry>> {
        let mut rows = match kind {
            Some(kind) => {
                self.conn
                    .query(
                        "SELECT kind, name, content_hash, fetched_at, length(CAST(body AS BLOB))
                         FROM pages WHERE kind = ?1 ORDER BY kind, name",
                        params![kind.as_str()],
                    )
                    .await
            }
            None => {
                self.conn
                    .query(
                        "SELECT kind, name, content_hash, fetched_at, length(CAST(body AS BLOB))
                         FROM pages ORDER BY kind, name",
                        params![],
                    )
                    .await
            }
        }
        .map_err(|e| RosettaError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(PageEntry {
                kind: parse_kind(
                    &row.get::<String>(0)
                        .map_err(|e| RosettaError::Storage(e.to_string()))?,
                )?,
                name: row
                    .get::<String>(1)
                    .map_err(|e| RosettaError::Storage(e.to_string()))?,
                content_hash: row
                    .get::<String>(2)
                    .map_err(|e| RosettaError::Storage(e.to_string()))?,
                fetched_at: parse_timestamp(
                    &row.get::<String>(3)
                        .map_err(|e| RosettaError::Storage(e.to_string()))?,
                )?,
                bytes: row.get::<i64>(4).map_or(0, |v| v.max(0) as u64),
            });
        }
        Ok(results)
    }

    /// Page counts per kind and total body size.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut rows = self
            .conn
            .query(
                "SELECT kind, COUNT(*), COALESCE(SUM(length(CAST(body AS BLOB))), 0)
                 FROM pages GROUP BY kind",
                params![],
            )
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;

        let mut stats = CacheStats::default();
        while let Ok(Some(row)) = rows.next().await {
            let kind = parse_kind(
                &row.get::<String>(0)
                    .map_err(|e| RosettaError::Storage(e.to_string()))?,
            )?;
            let count = row.get::<i64>(1).map_or(0, |v| v.max(0) as u64);
            match kind {
                PageKind::Task => stats.tasks = count,
                PageKind::Category => stats.categories = count,
            }
            stats.total_bytes += row.get::<i64>(2).map_or(0, |v| v.max(0) as u64);
        }
        Ok(stats)
    }

    /// Remove every cached page. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute("DELETE FROM pages", params![])
            .await
            .map_err(|e| RosettaError::Storage(e.to_string()))?;
        tracing::info!(removed = affected, "page cache cleared");
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_kind(s: &str) -> Result<PageKind> {
    s.parse::<PageKind>().map_err(RosettaError::Storage)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RosettaError::Storage(format!("bad timestamp '{s}': {e}")))
}

fn row_to_cached_page(row: &libsql::Row) -> Result<CachedPage> {
    Ok(CachedPage {
        kind: parse_kind(
            &row.get::<String>(0)
                .map_err(|e| RosettaError::Storage(e.to_string()))?,
        )?,
        name: row
            .get::<String>(1)
            .map_err(|e| RosettaError::Storage(e.to_string()))?,
        body: row
            .get::<String>(2)
            .map_err(|e| RosettaError::Storage(e.to_string()))?,
        content_hash: row
            .get::<String>(3)
            .map_err(|e| RosettaError::Storage(e.to_string()))?,
        fetched_at: parse_timestamp(
            &row.get::<String>(4)
                .map_err(|e| RosettaError::Storage(e.to_string()))?,
        )?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("rc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("rc_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn put_and_get_page() {
        let storage = test_storage().await;
        let stored = storage
            .put_page(PageKind::Task, "100_doors", "==C==\n<lang c>x</lang>")
            .await
            .expect("put page");
        assert_eq!(stored.content_hash.len(), 64);

        let page = storage
            .get_page(PageKind::Task, "100_doors")
            .await
            .expect("get page")
            .expect("page present");
        assert_eq!(page.body, "==C==\n<lang c>x</lang>");
        assert_eq!(page.content_hash, stored.content_hash);

        // Same name, other kind: separate key.
        let missing = storage
            .get_page(PageKind::Category, "100_doors")
            .await
            .expect("get page");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn put_page_overwrites() {
        let storage = test_storage().await;
        let first = storage.put_page(PageKind::Task, "A", "one").await.unwrap();
        let second = storage.put_page(PageKind::Task, "A", "two").await.unwrap();
        assert_ne!(first.content_hash, second.content_hash);

        let page = storage.get_page(PageKind::Task, "A").await.unwrap().unwrap();
        assert_eq!(page.body, "two");
        assert_eq!(storage.list_pages(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_delete_and_stats() {
        let storage = test_storage().await;
        storage.put_page(PageKind::Task, "B", "bb").await.unwrap();
        storage.put_page(PageKind::Task, "A", "a").await.unwrap();
        storage.put_page(PageKind::Category, "Puzzles", "<ul></ul>").await.unwrap();

        let tasks = storage.list_pages(Some(PageKind::Task)).await.unwrap();
        let names: Vec<&str> = tasks.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(tasks[1].bytes, 2);

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.tasks, 2);
        assert_eq!(stats.categories, 1);
        assert_eq!(stats.total_bytes, 1 + 2 + 9);

        assert!(storage.delete_page(PageKind::Task, "A").await.unwrap());
        assert!(!storage.delete_page(PageKind::Task, "A").await.unwrap());
        assert_eq!(storage.clear().await.unwrap(), 2);
        assert!(storage.list_pages(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("rc_test_{}.db", Uuid::now_v7()));
        {
            let rw = Storage::open(&tmp).await.expect("open");
            rw.put_page(PageKind::Task, "A", "a").await.unwrap();
        }
        let ro = Storage::open_readonly(&tmp).await.expect("open readonly");
        assert!(ro.get_page(PageKind::Task, "A").await.unwrap().is_some());
        assert!(ro.put_page(PageKind::Task, "B", "b").await.is_err());
        assert!(ro.clear().await.is_err());
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("rc_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
