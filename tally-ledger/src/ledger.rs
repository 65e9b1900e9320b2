use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use tally_common::asset::{Asset, AssetRegistry};
use tally_common::error::{LedgerError, Result};
use tally_common::transaction::Transaction;

use crate::account::{Account, AccountType};
use crate::audit::{AuditEventKind, AuditProofChain};

/// One row of a trial balance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub name: String,
    pub account_type: AccountType,
    pub balance: i64,
    pub currency: String,
}

/// The accounting kernel: typed accounts, asset policy, transaction
/// application with dependency ordering, and rollback snapshots.
///
/// A `Ledger` is a plain value owned by one caller. It performs no internal
/// synchronization; sharing one across threads requires external exclusive
/// locking.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    accounts: HashMap<String, Account>,
    pub registry: AssetRegistry,
    processed: HashSet<String>,
    /// Rollback snapshots keyed by transaction id: the affected accounts'
    /// prior balances, held until commit or rollback.
    snapshots: HashMap<String, Vec<(String, i64)>>,
    /// Hash-linked log of lifecycle events.
    pub proof_chain: AuditProofChain,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn create_account(
        &mut self,
        name: &str,
        account_type: AccountType,
        currency: &str,
    ) -> Result<()> {
        if self.accounts.contains_key(name) {
            return Err(LedgerError::AccountExists(name.to_string()));
        }
        let account = Account::new(name, account_type, currency);
        self.accounts.insert(name.to_string(), account);
        self.proof_chain.record(
            AuditEventKind::AccountCreated,
            format!("{}:{}:{}", name, account_type, currency),
        );
        tracing::info!(account = %name, %account_type, %currency, "account created");
        Ok(())
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn balance(&self, name: &str) -> Result<i64> {
        self.accounts
            .get(name)
            .map(|a| a.balance)
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()))
    }

    /// Debits a single account outside transaction flow, e.g. to fund an
    /// opening balance. The movement is recorded as a balance update event
    /// but has no journal counterpart.
    pub fn debit(&mut self, name: &str, amount: i64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(name)
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()))?;
        account.debit(amount)?;
        let balance = account.balance;
        self.proof_chain.record(
            AuditEventKind::BalanceUpdated,
            format!("{}:debit:{}:{}", name, amount, balance),
        );
        Ok(())
    }

    /// Credit counterpart of [`Ledger::debit`].
    pub fn credit(&mut self, name: &str, amount: i64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(name)
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()))?;
        account.credit(amount)?;
        let balance = account.balance;
        self.proof_chain.record(
            AuditEventKind::BalanceUpdated,
            format!("{}:credit:{}:{}", name, amount, balance),
        );
        Ok(())
    }

    // ── Assets ───────────────────────────────────────────────────────────────

    pub fn register_asset(&mut self, asset: Asset) -> Result<()> {
        let id = asset.id.clone();
        self.registry.register(asset)?;
        self.proof_chain
            .record(AuditEventKind::AssetRegistered, id);
        Ok(())
    }

    // ── Transaction processing ───────────────────────────────────────────────

    pub fn is_processed(&self, tx_id: &str) -> bool {
        self.processed.contains(tx_id)
    }

    /// Applies a transaction: credit the source, debit the destination.
    ///
    /// Validation order: dependency, self-transfer, asset policy, account
    /// existence and currency. Source and sink must be distinct accounts.
    /// Both new balances are computed before either account is touched, so
    /// a refused transaction never leaves a half-applied state.
    pub fn process_transaction(&mut self, tx: &Transaction) -> Result<()> {
        if let Some(dep) = &tx.depends_on {
            if !self.processed.contains(dep) {
                return Err(LedgerError::DependencyNotFound(dep.clone()));
            }
        }

        if tx.from_account == tx.to_account {
            return Err(LedgerError::SelfTransfer(tx.from_account.clone()));
        }

        self.registry.validate_transaction(&tx.currency, tx.amount)?;

        let from = self
            .accounts
            .get(&tx.from_account)
            .ok_or_else(|| LedgerError::FromAccountNotFound(tx.from_account.clone()))?;
        if from.currency != tx.currency {
            return Err(LedgerError::CurrencyMismatch {
                account: from.name.clone(),
                held: from.currency.clone(),
                requested: tx.currency.clone(),
            });
        }
        let to = self
            .accounts
            .get(&tx.to_account)
            .ok_or_else(|| LedgerError::ToAccountNotFound(tx.to_account.clone()))?;
        if to.currency != tx.currency {
            return Err(LedgerError::CurrencyMismatch {
                account: to.name.clone(),
                held: to.currency.clone(),
                requested: tx.currency.clone(),
            });
        }

        let new_from = from.account_type.credited(from.balance, tx.amount)?;
        let new_to = to.account_type.debited(to.balance, tx.amount)?;

        self.accounts
            .get_mut(&tx.from_account)
            .expect("checked above")
            .balance = new_from;
        self.accounts
            .get_mut(&tx.to_account)
            .expect("checked above")
            .balance = new_to;

        self.processed.insert(tx.id.clone());
        self.proof_chain
            .record(AuditEventKind::TransactionProcessed, tx.id.clone());
        tracing::debug!(
            tx = %tx.id,
            from = %tx.from_account,
            to = %tx.to_account,
            amount = tx.amount,
            currency = %tx.currency,
            "transaction applied"
        );
        Ok(())
    }

    /// Snapshots the affected accounts, then applies the transaction.
    ///
    /// On failure the snapshot is restored and the original error returned.
    /// On success the snapshot stays available until [`Ledger::commit`]
    /// drops it or [`Ledger::rollback`] applies it.
    pub fn process_with_rollback(&mut self, tx: &Transaction) -> Result<()> {
        let snapshot: Vec<(String, i64)> = [&tx.from_account, &tx.to_account]
            .iter()
            .filter_map(|name| {
                self.accounts
                    .get(*name)
                    .map(|a| (a.name.clone(), a.balance))
            })
            .collect();
        self.snapshots.insert(tx.id.clone(), snapshot);

        match self.process_transaction(tx) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.restore_snapshot(&tx.id);
                self.snapshots.remove(&tx.id);
                Err(e)
            }
        }
    }

    /// Drops the rollback snapshot; the transaction becomes final.
    pub fn commit(&mut self, tx_id: &str) -> Result<()> {
        self.snapshots
            .remove(tx_id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::SnapshotNotFound(tx_id.to_string()))
    }

    /// Restores every snapshotted balance and forgets the transaction.
    pub fn rollback(&mut self, tx_id: &str) -> Result<()> {
        if !self.snapshots.contains_key(tx_id) {
            return Err(LedgerError::SnapshotNotFound(tx_id.to_string()));
        }
        self.restore_snapshot(tx_id);
        self.snapshots.remove(tx_id);
        self.processed.remove(tx_id);
        self.proof_chain
            .record(AuditEventKind::TransactionRolledBack, tx_id.to_string());
        tracing::info!(tx = %tx_id, "transaction rolled back");
        Ok(())
    }

    fn restore_snapshot(&mut self, tx_id: &str) {
        if let Some(snapshot) = self.snapshots.get(tx_id) {
            for (name, balance) in snapshot {
                if let Some(account) = self.accounts.get_mut(name) {
                    account.balance = *balance;
                }
            }
        }
    }

    // ── Reporting ────────────────────────────────────────────────────────────

    /// The accounting correctness gate:
    /// `Σ(asset) = Σ(liability) + Σ(equity) + Σ(revenue) − Σ(expense)`.
    pub fn verify_double_entry(&self) -> bool {
        let mut assets: i128 = 0;
        let mut liabilities: i128 = 0;
        let mut equity: i128 = 0;
        let mut revenue: i128 = 0;
        let mut expenses: i128 = 0;

        for account in self.accounts.values() {
            let balance = account.balance as i128;
            match account.account_type {
                AccountType::Asset => assets += balance,
                AccountType::Liability => liabilities += balance,
                AccountType::Equity => equity += balance,
                AccountType::Revenue => revenue += balance,
                AccountType::Expense => expenses += balance,
            }
        }

        assets == liabilities + equity + revenue - expenses
    }

    pub fn trial_balance(&self) -> Vec<TrialBalanceRow> {
        let mut rows: Vec<TrialBalanceRow> = self
            .accounts
            .values()
            .map(|a| TrialBalanceRow {
                name: a.name.clone(),
                account_type: a.account_type,
                balance: a.balance,
                currency: a.currency.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Records a checkpoint event summarising the current state.
    pub fn record_checkpoint(&mut self, summary: &str) {
        self.proof_chain
            .record(AuditEventKind::SystemCheckpoint, summary.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::asset::AssetKind;

    fn usd_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .register_asset(
                Asset::new("USD", AssetKind::Native, "USD", "United States Dollar", 2).unwrap(),
            )
            .unwrap();
        ledger
            .create_account("alice", AccountType::Asset, "USD")
            .unwrap();
        ledger
            .create_account("bob", AccountType::Asset, "USD")
            .unwrap();
        ledger
    }

    #[test]
    fn test_create_account_rejects_duplicates() {
        let mut ledger = usd_ledger();
        assert!(matches!(
            ledger.create_account("alice", AccountType::Asset, "USD"),
            Err(LedgerError::AccountExists(_))
        ));
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 100_000).unwrap();

        let tx = Transaction::new(50_000, "USD", "alice", "bob").with_memo("Payment");
        ledger.process_transaction(&tx).unwrap();

        assert_eq!(ledger.balance("alice").unwrap(), 50_000);
        assert_eq!(ledger.balance("bob").unwrap(), 50_000);
        assert!(ledger.is_processed(&tx.id));
    }

    #[test]
    fn test_unknown_accounts_and_currency_mismatch() {
        let mut ledger = usd_ledger();
        ledger
            .register_asset(Asset::new("BTC", AssetKind::Native, "BTC", "Bitcoin", 8).unwrap())
            .unwrap();
        ledger
            .create_account("carol", AccountType::Asset, "BTC")
            .unwrap();

        let tx = Transaction::new(1, "USD", "nobody", "bob");
        assert!(matches!(
            ledger.process_transaction(&tx),
            Err(LedgerError::FromAccountNotFound(_))
        ));

        let tx = Transaction::new(1, "USD", "alice", "nobody");
        assert!(matches!(
            ledger.process_transaction(&tx),
            Err(LedgerError::ToAccountNotFound(_))
        ));

        let tx = Transaction::new(1, "USD", "alice", "carol");
        assert!(matches!(
            ledger.process_transaction(&tx),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_self_transfer_is_rejected() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 100_000).unwrap();

        let tx = Transaction::new(50_000, "USD", "alice", "alice");
        assert!(matches!(
            ledger.process_transaction(&tx),
            Err(LedgerError::SelfTransfer(_))
        ));
        assert_eq!(ledger.balance("alice").unwrap(), 100_000);
        assert!(!ledger.is_processed(&tx.id));
    }

    #[test]
    fn test_dependency_ordering() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 100_000).unwrap();

        let tx1 = Transaction::new(10_000, "USD", "alice", "bob");
        let tx2 = Transaction::new(5_000, "USD", "bob", "alice").with_dependency(&tx1.id);

        assert!(matches!(
            ledger.process_transaction(&tx2),
            Err(LedgerError::DependencyNotFound(_))
        ));

        ledger.process_transaction(&tx1).unwrap();
        ledger.process_transaction(&tx2).unwrap();
    }

    #[test]
    fn test_rollback_restores_balances() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 100_000).unwrap();

        let tx = Transaction::new(50_000, "USD", "alice", "bob");
        ledger.process_with_rollback(&tx).unwrap();
        assert_eq!(ledger.balance("alice").unwrap(), 50_000);

        ledger.rollback(&tx.id).unwrap();
        assert_eq!(ledger.balance("alice").unwrap(), 100_000);
        assert_eq!(ledger.balance("bob").unwrap(), 0);
        assert!(!ledger.is_processed(&tx.id));

        // The snapshot is gone; a second rollback has nothing to restore.
        assert!(matches!(
            ledger.rollback(&tx.id),
            Err(LedgerError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_commit_drops_the_snapshot() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 100_000).unwrap();

        let tx = Transaction::new(50_000, "USD", "alice", "bob");
        ledger.process_with_rollback(&tx).unwrap();
        ledger.commit(&tx.id).unwrap();

        assert!(matches!(
            ledger.rollback(&tx.id),
            Err(LedgerError::SnapshotNotFound(_))
        ));
        assert_eq!(ledger.balance("bob").unwrap(), 50_000);
    }

    #[test]
    fn test_failed_process_with_rollback_leaves_no_trace() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 100_000).unwrap();
        ledger.registry.freeze("USD").unwrap();

        let tx = Transaction::new(50_000, "USD", "alice", "bob");
        assert!(matches!(
            ledger.process_with_rollback(&tx),
            Err(LedgerError::AssetFrozen(_))
        ));

        assert_eq!(ledger.balance("alice").unwrap(), 100_000);
        assert!(!ledger.is_processed(&tx.id));
        assert!(matches!(
            ledger.rollback(&tx.id),
            Err(LedgerError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_double_entry_holds_across_account_types() {
        let mut ledger = Ledger::new();
        ledger
            .register_asset(
                Asset::new("USD", AssetKind::Native, "USD", "United States Dollar", 2).unwrap(),
            )
            .unwrap();
        ledger
            .create_account("cash", AccountType::Asset, "USD")
            .unwrap();
        ledger
            .create_account("capital", AccountType::Equity, "USD")
            .unwrap();
        ledger
            .create_account("rent", AccountType::Expense, "USD")
            .unwrap();

        // Owner funds the business: equity -> cash.
        let funding = Transaction::new(500_000, "USD", "capital", "cash");
        ledger.process_transaction(&funding).unwrap();
        assert!(ledger.verify_double_entry());

        // Pay rent: cash -> rent expense.
        let rent = Transaction::new(120_000, "USD", "cash", "rent");
        ledger.process_transaction(&rent).unwrap();
        assert!(ledger.verify_double_entry());

        assert_eq!(ledger.balance("cash").unwrap(), 380_000);
        assert_eq!(ledger.balance("capital").unwrap(), 500_000);
        assert_eq!(ledger.balance("rent").unwrap(), 120_000);
    }

    #[test]
    fn test_trial_balance_lists_every_account() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 42).unwrap();

        let rows = ledger.trial_balance();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "alice");
        assert_eq!(rows[0].balance, 42);
        assert_eq!(rows[1].name, "bob");
    }

    #[test]
    fn test_lifecycle_events_are_chained() {
        let mut ledger = usd_ledger();
        ledger.debit("alice", 10).unwrap();
        let tx = Transaction::new(5, "USD", "alice", "bob");
        ledger.process_transaction(&tx).unwrap();

        assert!(ledger.proof_chain.verify_chain().is_ok());
        assert!(ledger.proof_chain.len() >= 4);
    }
}
