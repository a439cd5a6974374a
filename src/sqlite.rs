//! # SQLite Store
//!
//! Durable contact store backed by SQLite. The schema is bootstrapped on
//! open: one `contacts` table plus non-unique indexes on email, phone and
//! linked_id to carry the match and cluster queries.
//!
//! Transactions open with [`TransactionBehavior::Immediate`], taking the
//! write lock up front. That serializes concurrent identify calls, closing
//! the race where two of them both see "no match" for the same new identity
//! and create two primaries.

use crate::model::{Contact, ContactId, LinkPrecedence};
use crate::store::{ContactStore, ContactTx, StoreError};
use anyhow::Result;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS contacts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  email TEXT,
  phone_number TEXT,
  linked_id INTEGER,
  link_precedence TEXT NOT NULL CHECK (link_precedence IN ('primary', 'secondary')),
  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL,
  deleted_at_ms INTEGER
);
CREATE INDEX IF NOT EXISTS idx_contacts_email ON contacts(email);
CREATE INDEX IF NOT EXISTS idx_contacts_phone ON contacts(phone_number);
CREATE INDEX IF NOT EXISTS idx_contacts_linked_id ON contacts(linked_id);
";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl JournalMode {
    fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// Open options for the SQLite store.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStoreOptions {
    pub journal_mode: JournalMode,
    pub busy_timeout_ms: u64,
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Durable contact store over a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, SqliteStoreOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: SqliteStoreOptions,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, options)
    }

    /// Private in-memory database; used by tests, lives until drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, SqliteStoreOptions::default())
    }

    fn init(conn: Connection, options: SqliteStoreOptions) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))?;
        // The pragma returns the resulting mode as a row.
        let _mode: String = conn.query_row(
            &format!("PRAGMA journal_mode = {}", options.journal_mode.as_str()),
            [],
            |row| row.get(0),
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Number of stored contacts, deleted rows included.
    pub fn contact_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl ContactStore for SqliteStore {
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut dyn ContactTx) -> Result<T>,
    ) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::Sql)?;
        let mut guard = SqliteTx { tx };
        match f(&mut guard) {
            Ok(value) => {
                guard.tx.commit().map_err(StoreError::Sql)?;
                Ok(value)
            }
            // Dropping the transaction rolls it back.
            Err(err) => Err(err),
        }
    }
}

struct SqliteTx<'conn> {
    tx: Transaction<'conn>,
}

impl ContactTx for SqliteTx<'_> {
    fn find_matches(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT id, email, phone_number, linked_id, link_precedence, \
                    created_at_ms, updated_at_ms, deleted_at_ms \
             FROM contacts \
             WHERE deleted_at_ms IS NULL \
               AND (email = ?1 OR phone_number = ?2) \
             ORDER BY created_at_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![email, phone], contact_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn find_cluster(&mut self, primary: ContactId) -> Result<Vec<Contact>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT id, email, phone_number, linked_id, link_precedence, \
                    created_at_ms, updated_at_ms, deleted_at_ms \
             FROM contacts \
             WHERE deleted_at_ms IS NULL \
               AND (id = ?1 OR linked_id = ?1) \
             ORDER BY created_at_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![primary.0], contact_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_primary(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, StoreError> {
        let now = now_ms();
        self.tx.execute(
            "INSERT INTO contacts (email, phone_number, link_precedence, created_at_ms, updated_at_ms) \
             VALUES (?1, ?2, 'primary', ?3, ?3)",
            params![email, phone, now],
        )?;
        let id = ContactId(self.tx.last_insert_rowid());
        self.find_by_id(id)?.ok_or(StoreError::MissingContact(id))
    }

    fn create_secondary(
        &mut self,
        primary: ContactId,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, StoreError> {
        let now = now_ms();
        self.tx.execute(
            "INSERT INTO contacts (email, phone_number, linked_id, link_precedence, created_at_ms, updated_at_ms) \
             VALUES (?1, ?2, ?3, 'secondary', ?4, ?4)",
            params![email, phone, primary.0, now],
        )?;
        let id = ContactId(self.tx.last_insert_rowid());
        self.find_by_id(id)?.ok_or(StoreError::MissingContact(id))
    }

    fn update_to_secondary(
        &mut self,
        id: ContactId,
        primary: ContactId,
    ) -> Result<(), StoreError> {
        let changed = self.tx.execute(
            "UPDATE contacts \
             SET linked_id = ?1, link_precedence = 'secondary', updated_at_ms = ?2 \
             WHERE id = ?3",
            params![primary.0, now_ms(), id.0],
        )?;
        if changed == 0 {
            return Err(StoreError::MissingContact(id));
        }
        Ok(())
    }

    fn find_by_id(&mut self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        let contact = self
            .tx
            .query_row(
                "SELECT id, email, phone_number, linked_id, link_precedence, \
                        created_at_ms, updated_at_ms, deleted_at_ms \
                 FROM contacts WHERE id = ?1",
                params![id.0],
                contact_from_row,
            )
            .optional()?;
        Ok(contact)
    }
}

impl FromSql for LinkPrecedence {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(FromSqlError::Other(
                format!("unknown link_precedence: {other}").into(),
            )),
        }
    }
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: ContactId(row.get(0)?),
        email: row.get(1)?,
        phone_number: row.get(2)?,
        linked_id: row.get::<_, Option<i64>>(3)?.map(ContactId),
        link_precedence: row.get(4)?,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
        deleted_at_ms: row.get(7)?,
    })
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_schema_bootstrap_and_insert() -> Result<()> {
        let mut store = SqliteStore::open_in_memory()?;
        let created = store.transaction(|tx| {
            let primary = tx.create_primary(Some("a@x.com"), Some("111111"))?;
            Ok(primary)
        })?;

        assert!(created.is_primary());
        assert_eq!(created.email.as_deref(), Some("a@x.com"));
        assert_eq!(store.contact_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_find_matches_null_inputs_never_match() -> Result<()> {
        let mut store = SqliteStore::open_in_memory()?;
        store.transaction(|tx| {
            tx.create_primary(Some("a@x.com"), None)?;
            tx.create_primary(None, Some("111111"))?;

            let by_phone = tx.find_matches(None, Some("111111"))?;
            assert_eq!(by_phone.len(), 1);
            assert_eq!(by_phone[0].phone_number.as_deref(), Some("111111"));

            // A NULL email input must not match rows with NULL email.
            let none = tx.find_matches(None, Some("999999"))?;
            assert!(none.is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_update_to_secondary_missing_row() -> Result<()> {
        let mut store = SqliteStore::open_in_memory()?;
        let result = store.transaction(|tx| {
            tx.update_to_secondary(ContactId(42), ContactId(1))?;
            Ok(())
        });

        let err = result.unwrap_err().downcast::<StoreError>().unwrap();
        assert!(matches!(err, StoreError::MissingContact(ContactId(42))));
        Ok(())
    }

    #[test]
    fn test_transaction_rolls_back_on_error() -> Result<()> {
        let mut store = SqliteStore::open_in_memory()?;
        let result: Result<()> = store.transaction(|tx| {
            tx.create_primary(Some("a@x.com"), None)?;
            Err(anyhow!("forced failure"))
        });

        assert!(result.is_err());
        assert_eq!(store.contact_count()?, 0);
        Ok(())
    }
}
