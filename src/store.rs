//! Deduplicating lead store backed by SQLite.
//!
//! Uniqueness of `post_url` is enforced by the storage layer itself, not
//! by a read-then-write check, so concurrent or repeated cycles cannot
//! race their way into duplicates: of two conflicting inserts exactly one
//! reports `Inserted`.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

/// A persisted lead.
#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: i64,
    pub profile_url: Option<String>,
    pub user_name: String,
    pub post_content: String,
    pub posted_at: DateTime<Utc>,
    /// True when `posted_at` is the normalization fallback rather than a
    /// parsed date.
    pub posted_at_estimated: bool,
    pub post_url: String,
    pub scraped_at: DateTime<Utc>,
    pub reported: bool,
    pub search_query_ref: String,
}

/// A lead as produced by extraction, before the store assigns identity.
#[derive(Debug, Clone, Serialize)]
pub struct NewLead {
    pub profile_url: Option<String>,
    pub user_name: String,
    pub post_content: String,
    pub posted_at: DateTime<Utc>,
    pub posted_at_estimated: bool,
    pub post_url: String,
    pub search_query_ref: String,
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate,
}

/// SQLite-backed store, one `leads` table keyed by `post_url`.
pub struct LeadStore {
    db: Connection,
}

impl LeadStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        Self::init(db)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_url TEXT,
                user_name TEXT NOT NULL DEFAULT '',
                post_content TEXT NOT NULL DEFAULT '',
                posted_at TEXT NOT NULL,
                posted_at_estimated INTEGER NOT NULL DEFAULT 0,
                post_url TEXT NOT NULL UNIQUE,
                scraped_at TEXT NOT NULL,
                reported INTEGER NOT NULL DEFAULT 0,
                search_query_ref TEXT NOT NULL DEFAULT ''
            );",
        )?;
        Ok(Self { db })
    }

    /// Insert a lead, relying on the UNIQUE constraint for deduplication.
    ///
    /// `scraped_at` is assigned here, exactly once. A conflicting
    /// `post_url` returns [`InsertOutcome::Duplicate`]; it is not an error.
    pub fn insert(&self, lead: &NewLead) -> Result<InsertOutcome, StoreError> {
        let scraped_at = Utc::now();
        let changed = self.db.execute(
            "INSERT INTO leads
                (profile_url, user_name, post_content, posted_at,
                 posted_at_estimated, post_url, scraped_at, search_query_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(post_url) DO NOTHING",
            params![
                lead.profile_url,
                lead.user_name,
                lead.post_content,
                lead.posted_at.to_rfc3339(),
                lead.posted_at_estimated,
                lead.post_url,
                scraped_at.to_rfc3339(),
                lead.search_query_ref,
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted(self.db.last_insert_rowid()))
        }
    }

    /// Leads not yet handed to reporting, in insertion order.
    pub fn unreported(&self) -> Result<Vec<Lead>, StoreError> {
        let mut stmt = self.db.prepare(
            "SELECT id, profile_url, user_name, post_content, posted_at,
                    posted_at_estimated, post_url, scraped_at, reported,
                    search_query_ref
             FROM leads WHERE reported = 0 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], row_to_lead)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark leads as reported. Idempotent: already-reported ids are
    /// untouched and re-marking is not an error.
    pub fn mark_reported(&self, ids: &[i64]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql =
            format!("UPDATE leads SET reported = 1 WHERE reported = 0 AND id IN ({placeholders})");
        let changed = self
            .db
            .execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(changed)
    }

    /// (total, unreported) counts.
    pub fn counts(&self) -> Result<(u64, u64), StoreError> {
        let total: u64 = self
            .db
            .query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;
        let unreported: u64 =
            self.db
                .query_row("SELECT COUNT(*) FROM leads WHERE reported = 0", [], |row| {
                    row.get(0)
                })?;
        Ok((total, unreported))
    }
}

fn row_to_lead(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        profile_url: row.get(1)?,
        user_name: row.get(2)?,
        post_content: row.get(3)?,
        posted_at: parse_ts(row, 4)?,
        posted_at_estimated: row.get(5)?,
        post_url: row.get(6)?,
        scraped_at: parse_ts(row, 7)?,
        reported: row.get(8)?,
        search_query_ref: row.get(9)?,
    })
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(post_url: &str) -> NewLead {
        NewLead {
            profile_url: Some("https://feed.example/in/jane".to_string()),
            user_name: "Jane Doe".to_string(),
            post_content: "Looking for a contractor.".to_string(),
            posted_at: Utc::now(),
            posted_at_estimated: false,
            post_url: post_url.to_string(),
            search_query_ref: "test-query".to_string(),
        }
    }

    #[test]
    fn test_insert_then_duplicate() {
        let store = LeadStore::open_in_memory().unwrap();
        let first = store.insert(&sample("https://feed.example/posts/1")).unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = store.insert(&sample("https://feed.example/posts/1")).unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);

        let (total, unreported) = store.counts().unwrap();
        assert_eq!(total, 1);
        assert_eq!(unreported, 1);
    }

    #[test]
    fn test_unreported_in_insertion_order() {
        let store = LeadStore::open_in_memory().unwrap();
        for i in 0..3 {
            store
                .insert(&sample(&format!("https://feed.example/posts/{i}")))
                .unwrap();
        }
        let leads = store.unreported().unwrap();
        let urls: Vec<&str> = leads.iter().map(|l| l.post_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://feed.example/posts/0",
                "https://feed.example/posts/1",
                "https://feed.example/posts/2",
            ]
        );
    }

    #[test]
    fn test_mark_reported_idempotent() {
        let store = LeadStore::open_in_memory().unwrap();
        store.insert(&sample("https://feed.example/posts/1")).unwrap();
        let ids: Vec<i64> = store.unreported().unwrap().iter().map(|l| l.id).collect();

        assert_eq!(store.mark_reported(&ids).unwrap(), 1);
        // Second call is a no-op, not an error.
        assert_eq!(store.mark_reported(&ids).unwrap(), 0);
        assert!(store.unreported().unwrap().is_empty());
    }

    #[test]
    fn test_round_trips_timestamps_and_flags() {
        let store = LeadStore::open_in_memory().unwrap();
        let mut lead = sample("https://feed.example/posts/9");
        lead.posted_at_estimated = true;
        lead.profile_url = None;
        store.insert(&lead).unwrap();

        let got = &store.unreported().unwrap()[0];
        assert!(got.posted_at_estimated);
        assert!(got.profile_url.is_none());
        assert_eq!(got.posted_at.timestamp(), lead.posted_at.timestamp());
        assert!(!got.reported);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.db");
        {
            let store = LeadStore::open(&path).unwrap();
            store.insert(&sample("https://feed.example/posts/1")).unwrap();
        }
        let store = LeadStore::open(&path).unwrap();
        let (total, _) = store.counts().unwrap();
        assert_eq!(total, 1);
    }
}
