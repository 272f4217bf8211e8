use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::{
    accounts::Account,
    claim::outcome::{ClaimFailure, ClaimResult, ClaimStatus, ErrorKind},
    error::Result,
};

/// A site known to the account store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRecord {
    pub name: String,
    pub base_url: String,
}

/// SQLite database holding sites, accounts and the claim ledger.
///
/// One connection behind a mutex; statements are short, so concurrent
/// executors simply take turns.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS sites (
                name TEXT PRIMARY KEY,
                base_url TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_name TEXT NOT NULL,
                username TEXT NOT NULL,
                credential_ref TEXT NOT NULL,
                UNIQUE (site_name, username)
            );

            CREATE TABLE IF NOT EXISTS claim_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                amount_claimed REAL NOT NULL,
                completed_at TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                error_kind TEXT,
                error_reason TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_claim_results_account
                ON claim_results(account_id, completed_at);",
        )?;
        Ok(())
    }

    pub fn upsert_site(&self, name: &str, base_url: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sites (name, base_url) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET base_url = excluded.base_url",
            params![name, base_url],
        )?;
        Ok(())
    }

    pub fn list_sites(&self) -> Result<Vec<SiteRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name, base_url FROM sites ORDER BY name")?;

        let sites = stmt
            .query_map([], |row| {
                Ok(SiteRecord {
                    name: row.get(0)?,
                    base_url: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    /// Insert an account and return its id
    pub fn add_account(&self, site_name: &str, username: &str, credential_ref: &str) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO accounts (site_name, username, credential_ref) VALUES (?1, ?2, ?3)",
            params![site_name, username, credential_ref],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT a.id, a.site_name, s.base_url, a.username, a.credential_ref
             FROM accounts a
             LEFT JOIN sites s ON s.name = a.site_name
             ORDER BY a.id",
        )?;

        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let account = self
            .conn()
            .query_row(
                "SELECT a.id, a.site_name, s.base_url, a.username, a.credential_ref
                 FROM accounts a
                 LEFT JOIN sites s ON s.name = a.site_name
                 WHERE a.id = ?1",
                [id],
                account_from_row,
            )
            .optional()?;

        Ok(account)
    }

    /// Append one ledger row; rows are never updated afterwards
    pub fn append_claim_result(&self, result: &ClaimResult) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO claim_results
             (account_id, status, amount_claimed, completed_at, attempts, error_kind, error_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.account_id,
                result.status.as_str(),
                result.amount_claimed,
                result.completed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                result.attempts,
                result.error.as_ref().map(|e| e.kind.as_str()),
                result.error.as_ref().map(|e| e.reason.as_str()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent results for an account, newest first
    pub fn claim_history(&self, account_id: i64, limit: usize) -> Result<Vec<ClaimResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT account_id, status, amount_claimed, completed_at, attempts, error_kind, error_reason
             FROM claim_results
             WHERE account_id = ?1
             ORDER BY completed_at DESC, id DESC
             LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let history = stmt
            .query_map(params![account_id, limit], claim_result_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(history)
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        site_name: row.get(1)?,
        site_base_url: row.get(2)?,
        username: row.get(3)?,
        credential_ref: row.get(4)?,
    })
}

fn claim_result_from_row(row: &Row<'_>) -> rusqlite::Result<ClaimResult> {
    let status: String = row.get(1)?;
    let status = status
        .parse::<ClaimStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

    let completed_at: String = row.get(3)?;
    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    let error_kind: Option<String> = row.get(5)?;
    let error = match error_kind {
        Some(kind) => {
            let kind = kind
                .parse::<ErrorKind>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;
            Some(ClaimFailure {
                kind,
                reason: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(ClaimResult {
        account_id: row.get(0)?,
        status,
        amount_claimed: row.get(2)?,
        completed_at,
        attempts: row.get(4)?,
        error,
        ledger_error: None,
    })
}
