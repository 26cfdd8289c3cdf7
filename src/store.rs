//! SQLite-backed history of every birth date ever seen as "current oldest".
//!
//! Rows are only ever inserted or updated; the table doubles as the
//! anti-vandalism log once a birth date has been announced.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};

use crate::{KnownBirthdate, StoreError};

/// The narrow surface the decision engine needs from persistence.
pub(crate) trait BirthdateStore {
    fn list_known_birthdates(&self) -> Result<Vec<KnownBirthdate>, StoreError>;
    fn insert(&self, birth_date_epoch: i64) -> Result<(), StoreError>;
    fn increment_times_seen(&self, birth_date_epoch: i64) -> Result<(), StoreError>;
    fn mark_tweeted(&self, birth_date_epoch: i64) -> Result<(), StoreError>;
}

pub(crate) struct SqliteStore {
    conn: Connection,
}

// ── Schema SQL ───────────────────────────────────────────────────────────

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS known_birthdates (
    birth_date_epoch INTEGER PRIMARY KEY,
    times_seen INTEGER NOT NULL DEFAULT 1 CHECK (times_seen >= 1),
    tweeted INTEGER NOT NULL DEFAULT 0 CHECK (tweeted IN (0, 1)),
    first_seen_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
";

impl SqliteStore {
    /// Open or create the store file with full schema.
    pub(crate) fn open_or_create(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Read-only view for dry runs and listings. A missing file reads as an
    /// empty history and nothing is created on disk.
    pub(crate) fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no store file, using empty history");
            let store = Self {
                conn: Connection::open_in_memory()?,
            };
            store.init_schema()?;
            return Ok(store);
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::debug!(path = %path.display(), "store opened read-only");
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn row_to_known(row: &rusqlite::Row) -> Result<KnownBirthdate, rusqlite::Error> {
        Ok(KnownBirthdate {
            birth_date_epoch: row.get(0)?,
            times_seen: row.get(1)?,
            tweeted: row.get::<_, i64>(2)? != 0,
        })
    }
}

impl BirthdateStore for SqliteStore {
    fn list_known_birthdates(&self) -> Result<Vec<KnownBirthdate>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT birth_date_epoch, times_seen, tweeted
             FROM known_birthdates ORDER BY birth_date_epoch ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Self::row_to_known(row))?
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = rows.len(), "loaded known birthdates");
        Ok(rows)
    }

    fn insert(&self, birth_date_epoch: i64) -> Result<(), StoreError> {
        let result = self.conn.execute(
            "INSERT INTO known_birthdates (birth_date_epoch, times_seen, tweeted) VALUES (?, 1, 0)",
            params![birth_date_epoch],
        );
        match result {
            Ok(_) => {
                tracing::info!(birth_date_epoch, "recorded new birth date");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(birth_date_epoch))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn increment_times_seen(&self, birth_date_epoch: i64) -> Result<(), StoreError> {
        // Announced rows are frozen history.
        let changed = self.conn.execute(
            "UPDATE known_birthdates
             SET times_seen = times_seen + 1, updated_at = strftime('%s', 'now')
             WHERE birth_date_epoch = ? AND tweeted = 0",
            params![birth_date_epoch],
        )?;
        if changed == 0 {
            let tweeted: Option<i64> = self
                .conn
                .query_row(
                    "SELECT tweeted FROM known_birthdates WHERE birth_date_epoch = ?",
                    params![birth_date_epoch],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match tweeted {
                Some(_) => StoreError::AlreadyAnnounced(birth_date_epoch),
                None => StoreError::UnknownBirthdate(birth_date_epoch),
            });
        }
        tracing::info!(birth_date_epoch, "incremented times seen");
        Ok(())
    }

    fn mark_tweeted(&self, birth_date_epoch: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE known_birthdates
             SET tweeted = 1, updated_at = strftime('%s', 'now')
             WHERE birth_date_epoch = ?",
            params![birth_date_epoch],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownBirthdate(birth_date_epoch));
        }
        tracing::info!(birth_date_epoch, "marked birth date as announced");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
