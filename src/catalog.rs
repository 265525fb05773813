// src/catalog.rs
//
// =============================================================================
// CTAPROD: TRANSFORMATION CATALOG (v 0.3)
// =============================================================================
//
// The local transformation service.
//
// Architecture:
// - SQLite using the "Hybrid Relational" pattern.
// - Looked-up fields (name, type, status, hash) are columns.
// - The metadata query is JSON text; the XML body is stored verbatim.
// - HPC-safe journaling (DELETE mode), long busy timeout.
//
// Contract: names are unique. A second transformation with the same name is
// refused with a `SubmissionFailure` ("duplicate name"), never an error.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use crate::core::{
    AgentType, MetaQuery, TransformationId, TransformationRecord, TransformationStatus,
};
use crate::error::SubmissionFailure;
use crate::transformation::{Transformation, TransformationClient};

const RECORD_COLUMNS: &str = "id, name, type, description, status, agent_type, group_size,
     meta_query_json, body_hash, created_at_ms";

pub struct TransformationCatalog {
    path: PathBuf,
}

impl TransformationCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let catalog = Self {
            path: path.as_ref().to_path_buf(),
        };
        catalog.init()?;
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn()?;

        // DELETE journal mode: no WAL side files on shared filesystems.
        conn.execute_batch(
            "PRAGMA journal_mode=DELETE;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=10000;",
        )?;

        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS transformations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                description TEXT,
                long_description TEXT,
                status TEXT NOT NULL,
                agent_type TEXT NOT NULL,
                group_size INTEGER,
                meta_query_json TEXT,
                body TEXT NOT NULL,
                body_hash TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transformations_hash ON transformations(body_hash);
            COMMIT;",
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.path).context("Failed to open transformation catalog")
    }

    // -------------------------------------------------------------------------
    // WRITE API
    // -------------------------------------------------------------------------

    /// Inserts `t`. `Ok(Err(..))` is a refusal, `Err(..)` a database fault.
    pub fn insert(
        &self,
        t: &Transformation,
    ) -> Result<std::result::Result<TransformationId, SubmissionFailure>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let taken: Option<i64> = tx
            .query_row(
                "SELECT id FROM transformations WHERE name = ?1",
                params![t.name()],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(existing) = taken {
            return Ok(Err(SubmissionFailure::new(format!(
                "Transformation '{}' not added: duplicate name (already registered as {})",
                t.name(),
                existing
            ))));
        }

        let hash = t.body_hash();
        let same_body: Option<String> = tx
            .query_row(
                "SELECT name FROM transformations WHERE body_hash = ?1 LIMIT 1",
                params![hash],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(other) = same_body {
            log::warn!(
                "Transformation '{}' has the same body as '{}'",
                t.name(),
                other
            );
        }

        let meta_json = t
            .input_meta_query()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "INSERT INTO transformations
                (name, type, description, long_description, status, agent_type,
                 group_size, meta_query_json, body, body_hash, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                t.name(),
                t.transformation_type(),
                t.description(),
                t.long_description(),
                t.status().as_str(),
                t.agent_type().as_str(),
                t.group_size(), // Option<u32> handles NULL automatically
                meta_json,
                t.body(),
                hash,
                Utc::now().timestamp_millis(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        log::debug!("Catalog {}: stored '{}' as {}", self.path.display(), t.name(), id);
        Ok(Ok(id))
    }

    // -------------------------------------------------------------------------
    // READ API
    // -------------------------------------------------------------------------

    pub fn get(&self, id: TransformationId) -> Result<Option<TransformationRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {RECORD_COLUMNS} FROM transformations WHERE id = ?1");
        conn.query_row(&sql, params![id], RawRecord::from_row)
            .optional()?
            .map(RawRecord::decode)
            .transpose()
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<TransformationRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {RECORD_COLUMNS} FROM transformations WHERE name = ?1");
        conn.query_row(&sql, params![name], RawRecord::from_row)
            .optional()?
            .map(RawRecord::decode)
            .transpose()
    }

    /// The stored XML body of transformation `id`.
    pub fn body(&self, id: TransformationId) -> Result<Option<String>> {
        let conn = self.conn()?;
        let body = conn
            .query_row(
                "SELECT body FROM transformations WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(body)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM transformations", [], |r| r.get(0))?;
        Ok(n as usize)
    }
}

impl TransformationClient for TransformationCatalog {
    fn add_transformation(
        &mut self,
        transformation: &Transformation,
    ) -> std::result::Result<TransformationId, SubmissionFailure> {
        match self.insert(transformation) {
            Ok(answer) => answer,
            Err(e) => Err(SubmissionFailure::new(format!(
                "Transformation catalog error: {e:#}"
            ))),
        }
    }
}

// Raw column values; text columns are decoded outside the rusqlite closure
// so JSON / enum errors surface with context.
struct RawRecord {
    id: i64,
    name: String,
    transformation_type: String,
    description: Option<String>,
    status: String,
    agent_type: String,
    group_size: Option<u32>,
    meta_json: Option<String>,
    body_hash: String,
    created_at_ms: i64,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            transformation_type: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            agent_type: row.get(5)?,
            group_size: row.get(6)?,
            meta_json: row.get(7)?,
            body_hash: row.get(8)?,
            created_at_ms: row.get(9)?,
        })
    }

    fn decode(self) -> Result<TransformationRecord> {
        let input_meta_query = match &self.meta_json {
            Some(json) => Some(
                serde_json::from_str::<MetaQuery>(json)
                    .with_context(|| format!("Corrupt meta query for transformation {}", self.id))?,
            ),
            None => None,
        };
        Ok(TransformationRecord {
            id: self.id,
            name: self.name,
            transformation_type: self.transformation_type,
            description: self.description.unwrap_or_default(),
            status: parse_status(&self.status)?,
            agent_type: parse_agent_type(&self.agent_type)?,
            group_size: self.group_size,
            input_meta_query,
            body_hash: self.body_hash,
            created_at: millis_to_utc(self.created_at_ms)?,
        })
    }
}

fn parse_status(raw: &str) -> Result<TransformationStatus> {
    match raw {
        "New" => Ok(TransformationStatus::New),
        "Active" => Ok(TransformationStatus::Active),
        other => anyhow::bail!("Unknown transformation status '{other}'"),
    }
}

fn parse_agent_type(raw: &str) -> Result<AgentType> {
    match raw {
        "Manual" => Ok(AgentType::Manual),
        "Automatic" => Ok(AgentType::Automatic),
        other => anyhow::bail!("Unknown agent type '{other}'"),
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("Invalid timestamp {ms}"))
}
