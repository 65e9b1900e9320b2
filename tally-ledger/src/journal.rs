use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tally_common::crypto::hash::{constant_time_eq, sha256_hex};
use tally_common::crypto::keys::{verify_with_key, Keypair};
use tally_common::crypto::merkle::{MerkleProof, MerkleTree};
use tally_common::error::{LedgerError, Result};
use tally_common::transaction::Transaction;
use tally_common::utils::time::current_time;

/// One link of the journal's hash chain.
///
/// `hash = SHA256(canonical_json(tx) ‖ le64(sequence) ‖ prev_hash_or_empty)`;
/// the first entry carries no `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub transaction: Transaction,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub sequence: u64,
}

impl JournalEntry {
    fn compute_hash(tx: &Transaction, sequence: u64, prev_hash: Option<&str>) -> String {
        let mut preimage = tx.to_canonical_json().into_bytes();
        preimage.extend_from_slice(&sequence.to_le_bytes());
        if let Some(prev) = prev_hash {
            preimage.extend_from_slice(prev.as_bytes());
        }
        sha256_hex(&preimage)
    }
}

/// A signed commitment to the journal at a point in time.
///
/// Publish this (and the attester's public key) out of band; a holder of
/// any journaled transaction can then prove inclusion against
/// `merkle_root` without the full batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAttestation {
    pub timestamp: i64,
    pub entry_count: u64,
    pub merkle_root: String,
    pub tip_hash: Option<String>,
    /// 128-char hex Ed25519 signature over the attestation preimage.
    pub signature: Option<String>,
}

impl BatchAttestation {
    fn signing_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}",
            self.timestamp,
            self.entry_count,
            self.merkle_root,
            self.tip_hash.as_deref().unwrap_or(""),
        )
        .into_bytes()
    }

    /// Checks the attester's signature. Unsigned attestations verify false.
    pub fn verify_signature(&self, public_key: &[u8]) -> Result<bool> {
        let stored = match &self.signature {
            Some(s) => s,
            None => return Ok(false),
        };
        let signature = hex::decode(stored).map_err(|_| LedgerError::SignatureInvalid)?;
        verify_with_key(public_key, &self.signing_bytes(), &signature)
    }
}

/// Append-only, hash-chained log of transactions.
///
/// Entry `i`'s hash covers entry `i-1`'s hash, so the chain linkage is
/// total: modifying any entry invalidates every subsequent hash.
///
/// The plaintext file format persists only the transactions; hashes are
/// recomputed on load, so a plaintext file is not tamper-evident on its
/// own. The encrypted form authenticates the whole stream and is the
/// attested artifact.
#[derive(Debug, Default)]
pub struct Journal {
    pub(crate) entries: Vec<JournalEntry>,
    path: Option<PathBuf>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A journal that streams each appended transaction to `path` as a
    /// canonical JSON line.
    pub fn with_path(path: &Path) -> Self {
        Self {
            entries: Vec::new(),
            path: Some(path.to_path_buf()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn get(&self, sequence: u64) -> Option<&JournalEntry> {
        self.entries.get(sequence as usize)
    }

    pub fn get_by_id(&self, tx_id: &str) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.transaction.id == tx_id)
    }

    /// Every entry touching `name` as source or sink, in journal order.
    pub fn by_account(&self, name: &str) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.transaction.from_account == name || e.transaction.to_account == name)
            .collect()
    }

    /// Hash of the newest entry; the summary of the whole chain.
    pub fn tip_hash(&self) -> Option<&str> {
        self.entries.last().map(|e| e.hash.as_str())
    }

    /// Chains a clone of `tx` onto the log.
    ///
    /// When a file path is configured the canonical JSON line is streamed
    /// to it; an I/O failure leaves the in-memory journal intact.
    pub fn append(&mut self, tx: &Transaction) -> Result<&JournalEntry> {
        let sequence = self.entries.len() as u64;
        let prev_hash = self.entries.last().map(|e| e.hash.clone());
        let hash = JournalEntry::compute_hash(tx, sequence, prev_hash.as_deref());

        let entry = JournalEntry {
            transaction: tx.clone(),
            prev_hash,
            hash,
            sequence,
        };

        if let Some(path) = &self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", entry.transaction.to_canonical_json())?;
        }

        self.entries.push(entry);
        tracing::debug!(sequence, tx = %tx.id, "journal entry appended");
        Ok(self.entries.last().expect("just pushed"))
    }

    /// Recomputes every entry hash and checks sequence and chain linkage.
    ///
    /// Hash comparisons are constant-time.
    pub fn verify_integrity(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            let sequence = i as u64;
            if entry.sequence != sequence {
                return Err(LedgerError::IntegrityBroken {
                    sequence,
                    reason: format!("sequence number is {}", entry.sequence),
                });
            }

            let expected_prev = if i == 0 {
                None
            } else {
                Some(self.entries[i - 1].hash.as_str())
            };
            match (entry.prev_hash.as_deref(), expected_prev) {
                (None, None) => {}
                (Some(stored), Some(expected))
                    if constant_time_eq(stored.as_bytes(), expected.as_bytes()) => {}
                _ => {
                    return Err(LedgerError::IntegrityBroken {
                        sequence,
                        reason: "chain linkage broken".to_string(),
                    });
                }
            }

            let recomputed =
                JournalEntry::compute_hash(&entry.transaction, sequence, entry.prev_hash.as_deref());
            if !constant_time_eq(recomputed.as_bytes(), entry.hash.as_bytes()) {
                return Err(LedgerError::IntegrityBroken {
                    sequence,
                    reason: "entry hash mismatch".to_string(),
                });
            }
        }
        Ok(())
    }

    // ── Merkle attestation ───────────────────────────────────────────────────

    /// Commits to the whole batch of journaled transactions.
    pub fn merkle_tree(&self) -> MerkleTree {
        MerkleTree::build(self.entries.iter().map(|e| e.transaction.hash()).collect())
    }

    pub fn merkle_root(&self) -> [u8; 32] {
        self.merkle_tree().root()
    }

    /// Inclusion proof for a journaled transaction, or `None` if absent.
    pub fn merkle_proof(&self, tx_id: &str) -> Option<MerkleProof> {
        let index = self.entries.iter().position(|e| e.transaction.id == tx_id)?;
        self.merkle_tree().proof(index)
    }

    /// Snapshot commitment to the whole journal: the Merkle root over the
    /// batch plus the chain tip, optionally signed by the attester.
    pub fn attest(&self, keypair: Option<&Keypair>) -> BatchAttestation {
        let mut attestation = BatchAttestation {
            timestamp: current_time(),
            entry_count: self.entries.len() as u64,
            merkle_root: hex::encode(self.merkle_root()),
            tip_hash: self.tip_hash().map(str::to_string),
            signature: None,
        };
        if let Some(keypair) = keypair {
            attestation.signature = Some(hex::encode(keypair.sign(&attestation.signing_bytes())));
        }
        attestation
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Writes one canonical JSON line per transaction.
    ///
    /// The hash chain is not persisted; [`Journal::load_plain`] re-derives
    /// it. A plaintext export therefore proves nothing by itself — use
    /// [`Journal::save_encrypted`] for the attested artifact.
    pub fn save_plain(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.transaction.to_canonical_json());
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Replays a plaintext file through [`Journal::append`].
    ///
    /// Blank lines are skipped. A malformed final line is assumed to be a
    /// torn write and ignored with a warning; a malformed interior line is
    /// an error.
    pub fn load_plain(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut journal = Self::new();
        journal.replay(&raw)?;
        journal.path = Some(path.to_path_buf());
        Ok(journal)
    }

    /// Encrypts the canonical line stream as a single authenticated blob.
    pub fn save_encrypted(&self, path: &Path, password: &str) -> Result<()> {
        let mut plaintext = String::new();
        for entry in &self.entries {
            plaintext.push_str(&entry.transaction.to_canonical_json());
            plaintext.push('\n');
        }
        tally_vault::secure_file::save(path, plaintext.as_bytes(), password)
            .map_err(LedgerError::from)?;
        tracing::info!(path = %path.display(), entries = self.entries.len(), "encrypted journal saved");
        Ok(())
    }

    /// Decrypts and replays an encrypted journal.
    ///
    /// A wrong password or tampered file fails authentication; nothing is
    /// replayed in that case.
    pub fn load_encrypted(path: &Path, password: &str) -> Result<Self> {
        let plaintext = tally_vault::secure_file::load(path, password).map_err(LedgerError::from)?;
        let raw = String::from_utf8(plaintext)
            .map_err(|_| LedgerError::MalformedRecord("journal is not UTF-8".to_string()))?;
        let mut journal = Self::new();
        journal.replay(&raw)?;
        Ok(journal)
    }

    fn replay(&mut self, raw: &str) -> Result<()> {
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        for (i, line) in lines.iter().enumerate() {
            match Transaction::from_canonical_json(line) {
                Ok(tx) => {
                    self.append(&tx)?;
                }
                Err(e) if i == lines.len() - 1 => {
                    // Torn tail from a crashed append.
                    tracing::warn!("ignoring malformed trailing journal line: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
