use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("cannot open ledger {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot write ledger {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Append-only file of article URLs that have been attempted, one per line.
pub struct UrlLedger {
    path: PathBuf,
    file: File,
    seen: HashSet<String>,
}

impl UrlLedger {
    /// Opens (creating if needed) the ledger and loads every recorded URL.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let open_err = |source: io::Error| LedgerError::Open { path: path.to_path_buf(), source };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(open_err)?;
        }
        let seen = read_urls(path).map_err(open_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;
        debug!("Ledger {} holds {} URLs", path.display(), seen.len());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            seen,
        })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url.trim())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Records `url` durably. Adding a URL twice writes it once.
    pub fn add(&mut self, url: &str) -> Result<(), LedgerError> {
        let url = url.trim();
        if url.is_empty() || self.seen.contains(url) {
            return Ok(());
        }
        let write_err = |source: io::Error| LedgerError::Write { path: self.path.clone(), source };
        writeln!(self.file, "{}", url).map_err(write_err)?;
        self.file.flush().map_err(write_err)?;
        self.file.sync_data().map_err(write_err)?;
        self.seen.insert(url.to_string());
        Ok(())
    }

    /// Every recorded URL, in file order.
    pub fn load_all(&self) -> Result<Vec<String>, LedgerError> {
        let file = File::open(&self.path).map_err(|source| LedgerError::Open { path: self.path.clone(), source })?;
        let mut out = Vec::new();
        let mut dedup = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LedgerError::Open { path: self.path.clone(), source })?;
            let url = line.trim();
            if !url.is_empty() && dedup.insert(url.to_string()) {
                out.push(url.to_string());
            }
        }
        Ok(out)
    }

    /// Forgets every URL. Maintenance only.
    pub fn clear(&mut self) -> Result<(), LedgerError> {
        let write_err = |source: io::Error| LedgerError::Write { path: self.path.clone(), source };
        self.file.set_len(0).map_err(write_err)?;
        self.file.sync_data().map_err(write_err)?;
        self.seen.clear();
        Ok(())
    }

    /// Deletes a ledger file if present.
    pub fn remove(path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn read_urls(path: &Path) -> io::Result<HashSet<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };
    let mut seen = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let url = line.trim();
        if !url.is_empty() {
            seen.insert(url.to_string());
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed_urls.log");
        {
            let mut ledger = UrlLedger::open(&path).unwrap();
            assert!(ledger.is_empty());
            ledger.add("https://n.example/a").unwrap();
            ledger.add("https://n.example/b").unwrap();
        }
        let ledger = UrlLedger::open(&path).unwrap();
        assert!(ledger.contains("https://n.example/a"));
        assert!(ledger.contains("https://n.example/b"));
        assert!(!ledger.contains("https://n.example/c"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.log");
        let mut ledger = UrlLedger::open(&path).unwrap();
        ledger.add("https://n.example/a").unwrap();
        ledger.add("https://n.example/a ").unwrap();
        ledger.add("").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "https://n.example/a\n");
        assert_eq!(ledger.load_all().unwrap(), vec!["https://n.example/a"]);
    }

    #[test]
    fn clear_then_add() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.log");
        let mut ledger = UrlLedger::open(&path).unwrap();
        ledger.add("https://n.example/a").unwrap();
        ledger.clear().unwrap();
        assert!(!ledger.contains("https://n.example/a"));
        ledger.add("https://n.example/b").unwrap();
        assert_eq!(ledger.load_all().unwrap(), vec!["https://n.example/b"]);
    }

    #[test]
    fn remove_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!UrlLedger::remove(&dir.path().join("nope.log")).unwrap());
    }
}
