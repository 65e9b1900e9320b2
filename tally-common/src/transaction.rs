use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::hash::{constant_time_eq, hmac_sha256, sha256};
use crate::crypto::keys::{verify_with_key, Keypair};
use crate::error::{LedgerError, Result};
use crate::utils::security::generate_nonce;
use crate::utils::time::current_time;

/// A single movement of value, immutable once appended to a journal.
///
/// `amount` is an integer in the asset's smallest unit. The random `nonce`
/// keeps two otherwise-identical transactions distinct. Field order below is
/// the canonical JSON order; hashing and signing never use the JSON bytes,
/// only the canonical signing preimage (see [`Transaction::signing_bytes`]),
/// so reformatted files hash identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// 8-byte hex digest derived from (timestamp, source, sink, amount).
    pub id: String,
    /// Seconds since epoch.
    pub timestamp: i64,
    pub amount: i64,
    pub currency: String,
    pub from_account: String,
    pub to_account: String,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(with = "hex::serde")]
    pub nonce: [u8; 12],
    /// 128-char hex Ed25519 signature over the signing preimage.
    #[serde(default)]
    pub signature: Option<String>,
    /// 64-char hex HMAC-SHA256 of the signing preimage under a signer key.
    #[serde(default)]
    pub integrity_hmac: Option<String>,
    /// Id of a transaction that must already be processed.
    #[serde(default)]
    pub depends_on: Option<String>,
}

fn derive_id(timestamp: i64, from: &str, to: &str, amount: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_le_bytes());
    hasher.update(from.as_bytes());
    hasher.update(to.as_bytes());
    hasher.update(amount.to_le_bytes());
    hex::encode(&hasher.finalize()[..8])
}

impl Transaction {
    pub fn new(amount: i64, currency: &str, from_account: &str, to_account: &str) -> Self {
        let timestamp = current_time();
        Self {
            id: derive_id(timestamp, from_account, to_account, amount),
            timestamp,
            amount,
            currency: currency.to_string(),
            from_account: from_account.to_string(),
            to_account: to_account.to_string(),
            memo: None,
            nonce: generate_nonce(),
            signature: None,
            integrity_hmac: None,
            depends_on: None,
        }
    }

    pub fn with_memo(mut self, memo: &str) -> Self {
        self.memo = Some(memo.to_string());
        self
    }

    pub fn with_dependency(mut self, depends_on: &str) -> Self {
        self.depends_on = Some(depends_on.to_string());
        self
    }

    pub fn nonce_hex(&self) -> String {
        hex::encode(self.nonce)
    }

    /// Canonical signing preimage, stable and bit-exact:
    /// `"{timestamp}|{amount}|{currency}|{from}|{to}|{memo_or_empty}|{nonce_hex}"`.
    ///
    /// Signature, HMAC and journal hashes are all computed over these bytes.
    pub fn signing_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.timestamp,
            self.amount,
            self.currency,
            self.from_account,
            self.to_account,
            self.memo.as_deref().unwrap_or(""),
            self.nonce_hex(),
        )
        .into_bytes()
    }

    /// Signs the preimage and attaches the signature.
    pub fn sign(&mut self, keypair: &Keypair) {
        let signature = keypair.sign(&self.signing_bytes());
        self.signature = Some(hex::encode(signature));
    }

    /// Verifies the attached signature under `public_key`.
    ///
    /// An unsigned transaction verifies as false; a malformed stored
    /// signature is an error rather than a silent mismatch.
    pub fn verify_signature(&self, public_key: &[u8]) -> Result<bool> {
        let stored = match &self.signature {
            Some(s) => s,
            None => return Ok(false),
        };
        let signature: Vec<u8> =
            hex::decode(stored).map_err(|_| LedgerError::SignatureInvalid)?;
        if signature.len() != 64 {
            return Err(LedgerError::SignatureInvalid);
        }
        verify_with_key(public_key, &self.signing_bytes(), &signature)
    }

    /// Computes and attaches HMAC-SHA256 of the preimage under `key`.
    pub fn attach_hmac(&mut self, key: &[u8]) {
        let mac = hmac_sha256(key, &self.signing_bytes());
        self.integrity_hmac = Some(hex::encode(mac));
    }

    /// Recomputes the HMAC and compares it in constant time.
    pub fn verify_hmac(&self, key: &[u8]) -> bool {
        let stored = match &self.integrity_hmac {
            Some(s) => s,
            None => return false,
        };
        let decoded = match hex::decode(stored) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let expected = hmac_sha256(key, &self.signing_bytes());
        constant_time_eq(&decoded, &expected)
    }

    /// SHA-256 of the canonical JSON encoding; the Merkle leaf value.
    pub fn hash(&self) -> [u8; 32] {
        sha256(self.to_canonical_json().as_bytes())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// One-line canonical JSON object, the persisted wire form.
    pub fn to_canonical_json(&self) -> String {
        serde_json::to_string(self).expect("transaction serialization is infallible")
    }

    pub fn from_canonical_json(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| LedgerError::MalformedRecord(e.to_string()))
    }
}
