use thiserror::Error;

/// Unified error type for every fallible ledger operation.
///
/// Validation and crypto errors are surfaced without mutating state;
/// integrity errors are diagnostic. Overflow on the money path is fatal
/// in the sense that the operation is refused, never silently wrapped.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("source account not found: {0}")]
    FromAccountNotFound(String),

    #[error("destination account not found: {0}")]
    ToAccountNotFound(String),

    #[error("currency mismatch: account {account} holds {held}, transaction is in {requested}")]
    CurrencyMismatch {
        account: String,
        held: String,
        requested: String,
    },

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("asset already exists: {0}")]
    AssetExists(String),

    #[error("asset is frozen: {0}")]
    AssetFrozen(String),

    #[error("invalid asset definition: {0}")]
    InvalidAsset(String),

    #[error("amount {amount} exceeds per-transaction limit {limit} for asset {asset}")]
    TransactionAmountTooLarge {
        asset: String,
        amount: i64,
        limit: i64,
    },

    #[error("dependency not processed: {0}")]
    DependencyNotFound(String),

    #[error("self-transfer not allowed: {0}")]
    SelfTransfer(String),

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("journal integrity broken at sequence {sequence}: {reason}")]
    IntegrityBroken { sequence: u64, reason: String },

    #[error("duplicate transaction id: {0}")]
    DuplicateTransaction(String),

    #[error("orphan transaction {id}: unknown account {account}")]
    OrphanTransaction { id: String, account: String },

    // ── Crypto ───────────────────────────────────────────────────────────────
    #[error("invalid transaction signature")]
    SignatureInvalid,

    #[error("integrity HMAC does not match")]
    HmacInvalid,

    /// Decryption tag mismatch: wrong password, wrong key, or tampered data.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    // ── Numeric ──────────────────────────────────────────────────────────────
    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    // ── Storage ──────────────────────────────────────────────────────────────
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    // ── Rollback ─────────────────────────────────────────────────────────────
    #[error("no rollback snapshot for transaction: {0}")]
    SnapshotNotFound(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
