//! Persistent cover blob store with capacity- and time-bounded eviction.
//!
//! One row per cover key: `(id, expires, size, blob)`. Entries are never
//! updated in place; a second insert for an existing key is a write conflict
//! surfaced as [`StoreError::DuplicateKey`]. Rows leave the store through
//! lazy expiration at read time, the capacity trim that runs before every
//! insert, or the monthly purge.

use crate::{Result, StoreError};
use bytes::Bytes;
use chrono::{DateTime, Datelike, Local, Timelike};
use sqlx::{Pool, Sqlite};
use tracing::{debug, warn};

/// Lifetime of a stored cover: 8 days, in seconds.
///
/// Fixed, never randomized: randomized expiry would make the oldest-first
/// eviction order nondeterministic.
pub const OBJECT_TTL_SECS: i64 = 86_400 * 8;

/// Size- and time-bounded blob store over a shared SQLite pool.
///
/// Cheap to clone; clones share the underlying pool. The engine's
/// single-writer locking makes each operation atomic, but there is no
/// transaction spanning a caller's miss-resolve-insert sequence: two
/// concurrent misses may both insert, and the loser gets
/// [`StoreError::DuplicateKey`] while the winner's row stays intact.
#[derive(Clone)]
pub struct BlobStore {
    pool: Pool<Sqlite>,
    /// Maximum total blob bytes to retain
    capacity: i64,
}

impl BlobStore {
    /// Wrap an existing pool (see [`crate::db::create_pool`]).
    pub fn new(pool: Pool<Sqlite>, capacity: i64) -> Self {
        Self { pool, capacity }
    }

    /// The configured capacity in bytes.
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Look up a blob by key.
    ///
    /// An expired row is deleted as a side effect of the read and reported
    /// as a miss, so every read can mutate store state.
    pub async fn get(&self, key: u64) -> Result<Option<Bytes>> {
        let id = key as i64;
        let row: Option<(i64, Vec<u8>)> =
            sqlx::query_as("SELECT expires, blob FROM covers WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((expires, _)) if expires <= unix_time() => {
                debug!(key = id, "Cover entry expired, removing");
                sqlx::query("DELETE FROM covers WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            }
            Some((_, blob)) => Ok(Some(Bytes::from(blob))),
            None => Ok(None),
        }
    }

    /// Insert a new blob, trimming the store to capacity first.
    ///
    /// The entry expires [`OBJECT_TTL_SECS`] from now. Inserting a key that
    /// already exists fails with [`StoreError::DuplicateKey`] and leaves the
    /// existing row untouched; a `get` should always precede a `put`.
    pub async fn put(&self, key: u64, blob: &[u8]) -> Result<()> {
        self.trim(self.capacity).await?;

        let id = key as i64;
        let expires = unix_time() + OBJECT_TTL_SECS;
        let inserted = sqlx::query("INSERT INTO covers (id, expires, size, blob) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(expires)
            .bind(blob.len() as i64)
            .bind(blob)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => {
                debug!(key = id, size = blob.len(), "Stored cover blob");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateKey { key: id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a single row, e.g. after its blob failed to decode.
    ///
    /// Returns whether a row was removed.
    pub async fn delete(&self, key: u64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM covers WHERE id = ?")
            .bind(key as i64)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    /// Trim the store to at most `max_bytes` of stored blobs.
    ///
    /// `max_bytes == 0` drops every row. Otherwise, when over budget,
    /// expired rows go first; if that is not enough, rows are removed in
    /// ascending `expires` order (oldest TTL first, which approximates
    /// insertion order since the TTL is a constant) until within budget.
    pub async fn trim(&self, max_bytes: i64) -> Result<()> {
        if max_bytes == 0 {
            sqlx::query("DELETE FROM covers").execute(&self.pool).await?;
            debug!("Cover store purged");
            return Ok(());
        }

        let mut available = max_bytes - self.used_bytes().await?;
        if available >= 0 {
            return Ok(());
        }

        let affected = sqlx::query("DELETE FROM covers WHERE expires < ?")
            .bind(unix_time())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected > 0 {
            debug!(rows = affected, "Trim removed expired covers");
            available = max_bytes - self.used_bytes().await?;
        }

        if available < 0 {
            let rows: Vec<(i64, i64)> =
                sqlx::query_as("SELECT id, size FROM covers ORDER BY expires ASC")
                    .fetch_all(&self.pool)
                    .await?;
            for (id, size) in rows {
                if available >= 0 {
                    break;
                }
                sqlx::query("DELETE FROM covers WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                debug!(key = id, size, "Trim evicted cover");
                available += size;
            }
        }

        Ok(())
    }

    /// Remove every row and release the underlying pool.
    ///
    /// The store must not be used afterwards.
    pub async fn evict_all(&self) -> Result<()> {
        self.trim(0).await?;
        self.pool.close().await;
        Ok(())
    }

    /// Monthly purge, independent of capacity: remove every row whose
    /// expiry predates the first instant of the current month plus the TTL.
    ///
    /// An entry inserted late last month expires early enough to fall under
    /// this threshold, so each rotation epoch starts from a clean slate even
    /// when the store has plenty of headroom.
    pub async fn evict_expired(&self) -> Result<()> {
        let threshold = first_of_month_unix(Local::now()) + OBJECT_TTL_SECS;
        let affected = sqlx::query("DELETE FROM covers WHERE expires < ?")
            .bind(threshold)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected > 0 {
            debug!(rows = affected, "Monthly purge removed covers");
        }
        Ok(())
    }

    /// Sum of stored blob sizes in bytes.
    pub async fn used_bytes(&self) -> Result<i64> {
        let (sum,): (Option<i64>,) = sqlx::query_as("SELECT SUM(size) FROM covers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to compute cover store usage");
                StoreError::Database(e)
            })?;
        Ok(sum.unwrap_or(0))
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Current unix timestamp in seconds.
fn unix_time() -> i64 {
    Local::now().timestamp()
}

/// Unix timestamp of the first instant of `now`'s calendar month.
fn first_of_month_unix(now: DateTime<Local>) -> i64 {
    now.with_day(1)
        .and_then(|d| d.with_hour(0))
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .map(|d| d.timestamp())
        .unwrap_or_else(|| now.timestamp())
}
