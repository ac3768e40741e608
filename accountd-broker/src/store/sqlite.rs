//! SQLite-backed account graph

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{AccountLink, InsertOutcome, LinkStore, StoreResult};
use crate::error::BrokerError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based durable account graph
pub struct SqliteLinkStore {
    conn: Mutex<Connection>,
}

impl SqliteLinkStore {
    /// Open or create a database at the given path
    pub fn open(path: &str) -> Result<Self, BrokerError> {
        let conn = Connection::open(path).map_err(store_err)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh in-memory database, handy for tests
    pub fn open_in_memory() -> Result<Self, BrokerError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), BrokerError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(store_err)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Current schema version (0 if no schema exists yet)
    fn get_schema_version(conn: &Connection) -> Result<i32, BrokerError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(store_err)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(store_err)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), BrokerError> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- The account graph: identifier -> user, identifier unique
            CREATE TABLE IF NOT EXISTS accounts (
                account TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_accounts_user_id ON accounts(user_id);
            "#,
        )
        .map_err(store_err)
    }
}

fn store_err(err: rusqlite::Error) -> BrokerError {
    BrokerError::Store(err.to_string())
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountLink> {
    Ok(AccountLink {
        account: row.get(0)?,
        user: row.get(1)?,
        created_at: parse_timestamp(row.get(2)?),
    })
}

impl LinkStore for SqliteLinkStore {
    fn link_for(&self, account: &str) -> StoreResult<Option<AccountLink>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT account, user_id, created_at FROM accounts WHERE account = ?1",
            params![account],
            row_to_link,
        )
        .optional()
        .map_err(store_err)
    }

    fn links_for_user(&self, user: &str) -> StoreResult<Vec<AccountLink>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT account, user_id, created_at FROM accounts \
                 WHERE user_id = ?1 ORDER BY rowid",
            )
            .map_err(store_err)?;
        let links = stmt
            .query_map(params![user], row_to_link)
            .map_err(store_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_err)?;
        Ok(links)
    }

    fn insert(&self, account: &str, user: &str) -> StoreResult<InsertOutcome> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO accounts (account, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![account, user, Utc::now().to_rfc3339()],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            // The unique constraint is the backstop against concurrent
            // registration; report who won instead of failing.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let existing_user: String = conn
                    .query_row(
                        "SELECT user_id FROM accounts WHERE account = ?1",
                        params![account],
                        |row| row.get(0),
                    )
                    .map_err(store_err)?;
                Ok(InsertOutcome::Conflict { existing_user })
            }
            Err(err) => Err(store_err(err)),
        }
    }

    fn repoint(&self, account: &str, user: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounts (account, user_id, created_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(account) DO UPDATE SET user_id = excluded.user_id",
            params![account, user, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn resolve(&self, name: &str) -> StoreResult<Option<(String, Vec<AccountLink>)>> {
        let owner: Option<String> = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT user_id FROM accounts WHERE user_id = ?1 OR account = ?1 LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?
        };

        match owner {
            Some(user) => {
                let links = self.links_for_user(&user)?;
                Ok(Some((user, links)))
            }
            None => Ok(None),
        }
    }
}
