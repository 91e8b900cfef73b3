use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::deal::NormalizedDeal;

/// Durable, deduplicated list of funding deals in a SQLite file.
pub struct FundingStore {
    conn: Connection,
    path: PathBuf,
}

/// Outcome of one [`FundingStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveSummary {
    pub submitted: usize,
    pub before: usize,
    pub after: usize,
}

impl SaveSummary {
    /// Rows the store grew by; duplicates that replaced an existing row don't count.
    pub fn net_new(&self) -> usize {
        self.after.saturating_sub(self.before)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSummary {
    pub total: usize,
    pub target: usize,
    pub by_sector: Vec<(String, usize)>,
    pub by_stage: Vec<(String, usize)>,
    pub avg_confidence: f64,
    pub total_amount: f64,
    pub last_updated: Option<String>,
    pub new_deals_added: Option<usize>,
}

const DEAL_COLUMNS: &str = "company, amount, stage, lead_investor, other_investors, sector, region, \
     date, source_url, source, confidence_score, is_target_deal";

impl FundingStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("Failed to open store {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM deals", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Every stored deal, in storage order.
    pub fn load_all(&self) -> Result<Vec<NormalizedDeal>> {
        load_deals(&self.conn)
    }

    /// Read-merge-write in one transaction: existing rows, then `new`, collapsed by
    /// dedup key keeping the last occurrence.
    pub fn save(&mut self, new: &[NormalizedDeal]) -> Result<SaveSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = load_deals(&tx)?;
        let before = existing.len();
        let merged = merge_deals(existing, new.to_vec());

        tx.execute("DELETE FROM deals", [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO deals (position, {DEAL_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))?;
            for (i, d) in merged.iter().enumerate() {
                stmt.execute(params![
                    i as i64,
                    d.company,
                    d.amount,
                    d.stage,
                    d.lead_investor,
                    serde_json::to_string(&d.other_investors)?,
                    d.sector,
                    d.region,
                    d.date.map(|dt| dt.format("%Y-%m-%d").to_string()),
                    d.source_url,
                    d.source,
                    d.confidence_score,
                    d.is_target_deal,
                ])?;
            }
        }

        let after = merged.len();
        {
            let mut meta = tx.prepare("INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["last_updated", Utc::now().to_rfc3339()])?;
            meta.execute(params!["total_deals", after.to_string()])?;
            meta.execute(params!["new_deals_added", new.len().to_string()])?;
        }
        tx.commit().context("Failed to commit deals")?;

        debug!("Store: {} + {} submitted -> {} rows", before, new.len(), after);
        Ok(SaveSummary {
            submitted: new.len(),
            before,
            after,
        })
    }

    /// Stored deals, optionally only target deals, newest first by storage order.
    pub fn list(&self, target_only: bool, limit: Option<usize>) -> Result<Vec<NormalizedDeal>> {
        let mut sql = format!("SELECT {DEAL_COLUMNS} FROM deals");
        if target_only {
            sql.push_str(" WHERE is_target_deal = 1");
        }
        sql.push_str(" ORDER BY position DESC");
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_deal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn summary(&self) -> Result<StoreSummary> {
        let (total, target, avg_confidence, total_amount): (i64, i64, Option<f64>, Option<f64>) =
            self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_target_deal), 0), AVG(confidence_score), SUM(amount)
                 FROM deals",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )?;

        Ok(StoreSummary {
            total: total as usize,
            target: target as usize,
            by_sector: self.counts_by("sector")?,
            by_stage: self.counts_by("stage")?,
            avg_confidence: avg_confidence.unwrap_or(0.0),
            total_amount: total_amount.unwrap_or(0.0),
            last_updated: self.meta("last_updated")?,
            new_deals_added: self.meta("new_deals_added")?.and_then(|v| v.parse().ok()),
        })
    }

    fn counts_by(&self, column: &str) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM deals GROUP BY {column} ORDER BY n DESC, {column}"
        ))?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM store_meta WHERE key = ?1", [key], |r| r.get(0))
            .optional()?)
    }

    /// Deletes the database and its WAL side files. Returns the paths removed.
    pub fn remove_store_files(path: &Path) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for suffix in ["", "-wal", "-shm"] {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            let p = PathBuf::from(name);
            match fs::remove_file(&p) {
                Ok(()) => removed.push(p),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to delete {}", p.display())),
            }
        }
        Ok(removed)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS deals (
            position         INTEGER PRIMARY KEY,
            company          TEXT NOT NULL,
            amount           REAL NOT NULL DEFAULT 0,
            stage            TEXT NOT NULL DEFAULT '',
            lead_investor    TEXT NOT NULL DEFAULT '',
            other_investors  TEXT NOT NULL DEFAULT '[]',
            sector           TEXT NOT NULL DEFAULT '',
            region           TEXT,
            date             TEXT,
            source_url       TEXT NOT NULL,
            source           TEXT NOT NULL,
            confidence_score REAL NOT NULL DEFAULT 0,
            is_target_deal   BOOLEAN NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_deals_target ON deals(is_target_deal);

        CREATE TABLE IF NOT EXISTS store_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn load_deals(conn: &Connection) -> Result<Vec<NormalizedDeal>> {
    let mut stmt = conn.prepare(&format!("SELECT {DEAL_COLUMNS} FROM deals ORDER BY position"))?;
    let rows = stmt
        .query_map([], row_to_deal)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_to_deal(row: &Row) -> rusqlite::Result<NormalizedDeal> {
    let investors: String = row.get(4)?;
    let other_investors = serde_json::from_str(&investors)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let date: Option<String> = row.get(7)?;
    Ok(NormalizedDeal {
        company: row.get(0)?,
        amount: row.get(1)?,
        stage: row.get(2)?,
        lead_investor: row.get(3)?,
        other_investors,
        sector: row.get(5)?,
        region: row.get(6)?,
        date: date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        source_url: row.get(8)?,
        source: row.get(9)?,
        confidence_score: row.get(10)?,
        is_target_deal: row.get(11)?,
    })
}

/// `existing ++ new` with duplicates removed; the survivor of each key is its last
/// occurrence, kept at that occurrence's position.
pub fn merge_deals(existing: Vec<NormalizedDeal>, new: Vec<NormalizedDeal>) -> Vec<NormalizedDeal> {
    let all: Vec<NormalizedDeal> = existing.into_iter().chain(new).collect();
    let mut last = HashMap::new();
    for (i, d) in all.iter().enumerate() {
        last.insert(d.dedup_key(), i);
    }
    all.into_iter()
        .enumerate()
        .filter(|(i, d)| last.get(&d.dedup_key()) == Some(i))
        .map(|(_, d)| d)
        .collect()
}
