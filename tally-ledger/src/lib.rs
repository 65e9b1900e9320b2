pub mod account;
pub mod audit;
pub mod contract;
pub mod journal;
pub mod ledger;

// Public Re-exports
pub use account::{Account, AccountType};
pub use audit::{AuditProofChain, AuditReport, Auditor};
pub use contract::ContractHooks;
pub use journal::{BatchAttestation, Journal, JournalEntry};
pub use ledger::Ledger;
