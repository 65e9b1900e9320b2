//! End-to-end flows: funding, transfers, rollback, dependency ordering,
//! encrypted persistence, asset policy, and the full audit pass.

use tally_common::asset::{Asset, AssetKind};
use tally_common::error::LedgerError;
use tally_common::transaction::Transaction;
use tally_ledger::account::AccountType;
use tally_ledger::audit::Auditor;
use tally_ledger::journal::Journal;
use tally_ledger::ledger::Ledger;
use tempfile::tempdir;

/// USD ledger with an equity account for opening balances.
fn usd_ledger() -> Ledger {
    let mut ledger = Ledger::new();
    ledger
        .register_asset(
            Asset::new("USD", AssetKind::Native, "USD", "United States Dollar", 2).unwrap(),
        )
        .unwrap();
    ledger
        .create_account("opening", AccountType::Equity, "USD")
        .unwrap();
    ledger
        .create_account("alice", AccountType::Asset, "USD")
        .unwrap();
    ledger
        .create_account("bob", AccountType::Asset, "USD")
        .unwrap();
    ledger
}

/// Funds `account` with `amount` through a journaled opening-balance
/// transaction so the double-entry gate and the audit replay both hold.
fn fund(ledger: &mut Ledger, journal: &mut Journal, account: &str, amount: i64) -> Transaction {
    let tx = Transaction::new(amount, "USD", "opening", account).with_memo("opening balance");
    ledger.process_transaction(&tx).unwrap();
    journal.append(&tx).unwrap();
    tx
}

#[test]
fn simple_transfer_and_balance() {
    let mut ledger = usd_ledger();
    let mut journal = Journal::new();
    fund(&mut ledger, &mut journal, "alice", 100_000);

    let tx = Transaction::new(50_000, "USD", "alice", "bob").with_memo("Payment");
    ledger.process_transaction(&tx).unwrap();
    journal.append(&tx).unwrap();

    assert_eq!(ledger.balance("alice").unwrap(), 50_000);
    assert_eq!(ledger.balance("bob").unwrap(), 50_000);
    assert!(ledger.verify_double_entry());
}

#[test]
fn rollback_restores_the_world() {
    let mut ledger = usd_ledger();
    let mut journal = Journal::new();
    fund(&mut ledger, &mut journal, "alice", 100_000);

    let tx = Transaction::new(50_000, "USD", "alice", "bob");
    ledger.process_with_rollback(&tx).unwrap();
    ledger.rollback(&tx.id).unwrap();

    assert_eq!(ledger.balance("alice").unwrap(), 100_000);
    assert_eq!(ledger.balance("bob").unwrap(), 0);
    assert!(!ledger.is_processed(&tx.id));
    assert!(ledger.verify_double_entry());
}

#[test]
fn dependency_is_enforced_until_satisfied() {
    let mut ledger = usd_ledger();
    let mut journal = Journal::new();
    fund(&mut ledger, &mut journal, "alice", 100_000);

    let tx1 = Transaction::new(10_000, "USD", "alice", "bob");
    let tx2 = Transaction::new(2_500, "USD", "bob", "alice").with_dependency(&tx1.id);

    let err = ledger.process_transaction(&tx2).unwrap_err();
    assert!(matches!(err, LedgerError::DependencyNotFound(dep) if dep == tx1.id));

    ledger.process_transaction(&tx1).unwrap();
    ledger.process_transaction(&tx2).unwrap();
    assert_eq!(ledger.balance("bob").unwrap(), 7_500);
}

#[test]
fn encrypted_journal_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("journal.enc");

    let mut ledger = usd_ledger();
    let mut journal = Journal::new();
    fund(&mut ledger, &mut journal, "alice", 100_000);
    for amount in [10_000, 20_000] {
        let tx = Transaction::new(amount, "USD", "alice", "bob");
        ledger.process_transaction(&tx).unwrap();
        journal.append(&tx).unwrap();
    }

    journal.save_encrypted(&path, "pw").unwrap();

    let reopened = Journal::load_encrypted(&path, "pw").unwrap();
    assert_eq!(reopened.len(), 3);
    assert!(reopened.verify_integrity().is_ok());

    assert!(matches!(
        Journal::load_encrypted(&path, "wrong"),
        Err(LedgerError::AuthenticationFailed)
    ));
}

#[test]
fn frozen_asset_policy() {
    let mut ledger = Ledger::new();
    ledger
        .register_asset(
            Asset::new("BTC", AssetKind::Native, "BTC", "Bitcoin", 8)
                .unwrap()
                .with_transaction_limit(1_000_000),
        )
        .unwrap();
    ledger
        .create_account("treasury", AccountType::Equity, "BTC")
        .unwrap();
    ledger
        .create_account("hot", AccountType::Asset, "BTC")
        .unwrap();

    ledger.registry.freeze("BTC").unwrap();
    let tx = Transaction::new(100, "BTC", "treasury", "hot");
    assert!(matches!(
        ledger.process_transaction(&tx),
        Err(LedgerError::AssetFrozen(_))
    ));

    ledger.registry.unfreeze("BTC").unwrap();
    let ok = Transaction::new(500_000, "BTC", "treasury", "hot");
    ledger.process_transaction(&ok).unwrap();
    assert_eq!(ledger.balance("hot").unwrap(), 500_000);

    let too_big = Transaction::new(2_000_000, "BTC", "treasury", "hot");
    assert!(matches!(
        ledger.process_transaction(&too_big),
        Err(LedgerError::TransactionAmountTooLarge { .. })
    ));
}

#[test]
fn full_audit_over_a_clean_history() {
    // All accounts follow the asset sign convention here so the auditor's
    // signed replay agrees with the live balances.
    let mut ledger = Ledger::new();
    ledger
        .register_asset(
            Asset::new("USD", AssetKind::Native, "USD", "United States Dollar", 2).unwrap(),
        )
        .unwrap();
    for name in ["vault", "alice", "bob"] {
        ledger
            .create_account(name, AccountType::Asset, "USD")
            .unwrap();
    }

    let mut journal = Journal::new();
    for (to, amount) in [("alice", 100_000), ("bob", 30_000)] {
        let tx = Transaction::new(amount, "USD", "vault", to).with_memo("opening balance");
        ledger.process_transaction(&tx).unwrap();
        journal.append(&tx).unwrap();
    }

    for amount in [5_000, 2_500, 12_000] {
        let tx = Transaction::new(amount, "USD", "alice", "bob");
        ledger.process_transaction(&tx).unwrap();
        journal.append(&tx).unwrap();
    }

    let report = Auditor::new(b"audit-key").audit(&ledger, &journal);
    assert!(report.is_valid(), "{:?}", report);
    assert_eq!(report.total_transactions, 5);

    // The lifecycle chain recorded everything and still verifies.
    assert!(ledger.proof_chain.verify_chain().is_ok());

    // The batch attestation covers every journaled transaction.
    let root = journal.merkle_root();
    for entry in journal.entries() {
        let proof = journal.merkle_proof(&entry.transaction.id).unwrap();
        assert!(proof.verify(entry.transaction.hash(), root));
    }
}

#[test]
fn plaintext_export_replays_into_the_same_chain() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("journal.log");

    let mut ledger = usd_ledger();
    let mut journal = Journal::new();
    fund(&mut ledger, &mut journal, "alice", 100_000);
    let tx = Transaction::new(1_000, "USD", "alice", "bob");
    ledger.process_transaction(&tx).unwrap();
    journal.append(&tx).unwrap();

    journal.save_plain(&path).unwrap();
    let loaded = Journal::load_plain(&path).unwrap();

    assert_eq!(loaded.len(), journal.len());
    assert_eq!(loaded.tip_hash(), journal.tip_hash());
    assert!(loaded.verify_integrity().is_ok());
}

#[test]
fn signed_and_hmac_transactions_survive_persistence() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("journal.enc");
    let keypair = tally_common::crypto::keys::Keypair::generate();

    let mut ledger = usd_ledger();
    let mut journal = Journal::new();
    fund(&mut ledger, &mut journal, "alice", 10_000);

    let mut tx = Transaction::new(4_000, "USD", "alice", "bob");
    tx.sign(&keypair);
    tx.attach_hmac(b"tx-integrity-key");
    ledger.process_transaction(&tx).unwrap();
    journal.append(&tx).unwrap();

    journal.save_encrypted(&path, "pw").unwrap();
    let reopened = Journal::load_encrypted(&path, "pw").unwrap();

    let restored = &reopened.get_by_id(&tx.id).unwrap().transaction;
    assert!(restored.verify_signature(&keypair.public_bytes()).unwrap());
    assert!(restored.verify_hmac(b"tx-integrity-key"));
}
