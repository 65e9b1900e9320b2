use thiserror::Error;

use tally_common::LedgerError;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Key derivation refused its parameters.
    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    /// AEAD tag mismatch: wrong password, wrong key, or tampered ciphertext.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VaultError> for LedgerError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::AuthenticationFailed => LedgerError::AuthenticationFailed,
            VaultError::KdfFailed(msg) => LedgerError::InvalidKeyFormat(msg),
            VaultError::MalformedEnvelope(msg) => LedgerError::MalformedRecord(msg),
            VaultError::Io(e) => LedgerError::Io(e),
        }
    }
}
