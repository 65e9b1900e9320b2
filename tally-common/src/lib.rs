pub mod asset;
pub mod crypto;
pub mod error;
pub mod fixed;
pub mod transaction;
pub mod utils;

// Public Re-exports
pub use asset::{Asset, AssetKind, AssetRegistry};
pub use error::{LedgerError, Result};
pub use fixed::FixedPoint;
pub use transaction::Transaction;
