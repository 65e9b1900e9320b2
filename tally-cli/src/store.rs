use std::fs;
use std::path::{Path, PathBuf};

use tally_common::error::{LedgerError, Result};
use tally_ledger::{Journal, Ledger};

/// On-disk layout under the data directory:
/// `ledger.json` — full ledger state (accounts, registry, proof chain),
/// `journal.log` — plaintext canonical journal, appended per transaction.
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("journal.log")
    }

    pub fn load_ledger(&self) -> Result<Ledger> {
        let path = self.ledger_path();
        if !path.exists() {
            return Ok(Ledger::new());
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| LedgerError::MalformedRecord(e.to_string()))
    }

    pub fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let raw = serde_json::to_string_pretty(ledger)
            .map_err(|e| LedgerError::MalformedRecord(e.to_string()))?;
        fs::write(self.ledger_path(), raw)?;
        Ok(())
    }

    /// Opens the journal, replaying the existing log if present. Appends
    /// stream straight back to the same file.
    pub fn load_journal(&self) -> Result<Journal> {
        let path = self.journal_path();
        if path.exists() {
            Journal::load_plain(&path)
        } else {
            fs::create_dir_all(&self.data_dir)?;
            Ok(Journal::with_path(&path))
        }
    }
}
