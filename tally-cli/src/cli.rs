use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Double-entry ledger with a hash-chained journal")]
pub struct Cli {
    /// Directory holding the ledger state and journal
    #[arg(long, global = true, default_value = "./tally-data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Record transactions
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },
    /// Print an account's balance in smallest units
    Balance {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Run the auditor
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
    /// Inspect or export the journal
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },
    /// Manage the asset registry
    Asset {
        #[command(subcommand)]
        command: AssetCommands,
    },
    /// Generate an Ed25519 keypair
    Keygen {
        #[arg(short, long, value_name = "OUT")]
        out: Option<PathBuf>,
        /// Store the secret key password-encrypted instead of as plain hex
        #[arg(long)]
        password: Option<String>,
    },
    /// Produce a detached signature over a file
    Sign {
        #[arg(long = "in", value_name = "FILE")]
        input: PathBuf,
        #[arg(long, value_name = "KEYFILE")]
        key: PathBuf,
        #[arg(long, value_name = "OUT")]
        out: Option<PathBuf>,
        /// Password for a keystore written with `keygen --password`
        #[arg(long)]
        password: Option<String>,
    },
    /// Verify a detached signature
    Verify {
        #[arg(long = "in", value_name = "FILE")]
        input: PathBuf,
        #[arg(long, value_name = "SIGFILE")]
        sig: PathBuf,
        #[arg(long, value_name = "PUBKEYFILE")]
        key: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create an account; fails if it exists
    Create {
        name: String,
        /// asset | liability | equity | revenue | expense
        account_type: String,
        currency: String,
    },
    /// List all accounts
    List,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Apply a transaction and append it to the journal
    Add {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        memo: Option<String>,
        /// Id of a transaction that must already be processed
        #[arg(long)]
        depends_on: Option<String>,
        /// Sign the transaction with this hex secret key file
        #[arg(long, value_name = "KEYFILE")]
        sign_key: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Summary of the audit booleans and counts
    Verify,
    /// Full JSON audit report
    Report,
}

#[derive(Subcommand)]
pub enum JournalCommands {
    /// Enumerate journal entries
    List,
    /// Check the hash chain and print the tip
    Verify,
    /// Write the plaintext journal. The export is not tamper-evident; only
    /// the encrypted journal form is the attested artifact.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Write the authenticated encrypted journal
    ExportEncrypted {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        password: String,
    },
    /// Print the Merkle inclusion proof for a journaled transaction
    Proof {
        #[arg(value_name = "TX_ID")]
        tx_id: String,
    },
    /// Print a batch attestation (Merkle root + chain tip), optionally
    /// signed with a hex secret key file
    Attest {
        #[arg(long, value_name = "KEYFILE")]
        key: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AssetCommands {
    /// Register a new asset
    Register {
        id: String,
        #[arg(long, default_value_t = 8)]
        decimals: u8,
        #[arg(long)]
        name: Option<String>,
        /// Per-transaction cap in smallest units
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Freeze an asset; transactions in it are rejected
    Freeze { id: String },
    /// Lift a freeze
    Unfreeze { id: String },
}
