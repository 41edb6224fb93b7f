//! SQLite-backed [`EventSource`].
//!
//! Events live in a single `events` table indexed on
//! `(created_at_us, event_id)`, so both page queries and range counts are
//! index scans. Runtime pragmas mirror the usual defaults for a local store:
//! - `journal_mode = WAL` so a writer importing events does not block readers
//! - `busy_timeout = 5s` to ride out transient lock contention

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, types::Type};
use std::path::Path;
use std::time::Duration;

use super::{EventQuery, EventSource, QueryMode, QueryResponse, ResponseMeta, SortOrder, SourceError};
use crate::model::{Event, PREVIEW_MAX_CHARS, Role, truncate_preview};

/// Busy timeout used for event store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    created_at_us INTEGER NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
    content TEXT NOT NULL,
    thread_id TEXT NOT NULL,
    thread_label TEXT NOT NULL DEFAULT '',
    user_id TEXT NOT NULL,
    user_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at_us, event_id);
";

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL)];

/// Build a `SELECT` over the event columns followed by `rest`.
///
/// Content is cut one character past the preview bound so
/// [`truncate_preview`] can tell whether it needs to mark the cut.
fn select_events(rest: &str) -> String {
    format!(
        "SELECT event_id, created_at_us, role, substr(content, 1, {}), \
         thread_id, thread_label, user_id, user_name FROM events {rest}",
        PREVIEW_MAX_CHARS + 1
    )
}

/// An event source reading from a SQLite database.
#[derive(Debug)]
pub struct SqliteEventSource {
    conn: Connection,
}

impl SqliteEventSource {
    /// Open (or create) the event store at `path`, apply pragmas, and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring, or migrating the database fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create event store directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open event store {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// A private in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory event store")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrate(&mut conn).context("apply event store migrations")?;
        Ok(Self { conn })
    }

    /// Insert one event. Returns `false` when an event with the same id exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert(&self, event: &Event) -> Result<bool> {
        let changed = insert_event(&self.conn, event)
            .with_context(|| format!("insert event {}", event.id))?;
        Ok(changed > 0)
    }

    /// Insert a batch of events in one transaction. Returns how many were new.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; the batch is then rolled back.
    pub fn insert_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> Result<usize> {
        let tx = self.conn.transaction().context("begin import transaction")?;
        let mut inserted = 0;
        for event in events {
            inserted += insert_event(&tx, event)
                .with_context(|| format!("insert event {}", event.id))?;
        }
        tx.commit().context("commit import transaction")?;
        Ok(inserted)
    }

    /// Total number of stored events.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .context("count events")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Look up one event by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn get(&self, id: &str) -> Result<Option<Event>> {
        self.conn
            .query_row(&select_events("WHERE event_id = ?1"), params![id], row_to_event)
            .optional()
            .with_context(|| format!("get event {id}"))
    }

    fn run(&self, query: &EventQuery) -> rusqlite::Result<QueryResponse> {
        let start_us = query.range.start().timestamp_micros();
        let end_us = query.range.end().timestamp_micros();

        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE created_at_us >= ?1 AND created_at_us < ?2",
            params![start_us, end_us],
            |row| row.get(0),
        )?;
        let total = usize::try_from(total).unwrap_or(0);

        let events = match query.mode {
            QueryMode::Timestamps => {
                let mut stmt = self.conn.prepare(
                    "SELECT event_id, created_at_us, role FROM events \
                     WHERE created_at_us >= ?1 AND created_at_us < ?2 \
                     ORDER BY created_at_us ASC, event_id ASC",
                )?;
                let rows = stmt.query_map(params![start_us, end_us], row_to_stamp)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            QueryMode::Page {
                limit,
                offset,
                order,
            } => {
                let direction = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                let sql = select_events(&format!(
                    "WHERE created_at_us >= ?1 AND created_at_us < ?2 \
                     ORDER BY created_at_us {direction}, event_id {direction} \
                     LIMIT ?3 OFFSET ?4"
                ));
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    params![start_us, end_us, to_sql_int(limit), to_sql_int(offset)],
                    row_to_event,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        let meta = ResponseMeta::for_query(query, total, events.len());
        Ok(QueryResponse { events, meta })
    }
}

impl EventSource for SqliteEventSource {
    fn query(&mut self, query: &EventQuery) -> Result<QueryResponse, SourceError> {
        self.run(query).map_err(|err| match err {
            rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
                SourceError::Malformed(err.to_string())
            }
            other => SourceError::Unavailable(other.to_string()),
        })
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if the pragma query fails or the value is out of range.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO events \
         (event_id, created_at_us, role, content, thread_id, thread_label, user_id, user_name) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.id,
            event.created_at.timestamp_micros(),
            event.role.as_str(),
            event.content_preview,
            event.thread_id,
            event.thread_label,
            event.user_id,
            event.user_name,
        ],
    )
}

fn created_at_column(row: &rusqlite::Row<'_>) -> rusqlite::Result<DateTime<Utc>> {
    let created_at_us: i64 = row.get(1)?;
    DateTime::<Utc>::from_timestamp_micros(created_at_us).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Integer,
            format!("timestamp {created_at_us} out of range").into(),
        )
    })
}

fn role_column(row: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
    let role_raw: String = row.get(2)?;
    role_raw
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let content: String = row.get(3)?;

    Ok(Event {
        id: row.get(0)?,
        created_at: created_at_column(row)?,
        role: role_column(row)?,
        content_preview: truncate_preview(&content, PREVIEW_MAX_CHARS),
        thread_id: row.get(4)?,
        thread_label: row.get(5)?,
        user_id: row.get(6)?,
        user_name: row.get(7)?,
        count: None,
    })
}

/// Map an `(event_id, created_at_us, role)` row. Year zoom only counts
/// events per month, so display columns are never read.
fn row_to_stamp(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        created_at: created_at_column(row)?,
        role: role_column(row)?,
        content_preview: String::new(),
        thread_id: String::new(),
        thread_label: String::new(),
        user_id: String::new(),
        user_name: None,
        count: None,
    })
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
