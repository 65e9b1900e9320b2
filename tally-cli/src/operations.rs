use std::fs;
use std::path::{Path, PathBuf};

use tally_common::asset::{Asset, AssetKind};
use tally_common::crypto::keys::{verify_with_key, Keypair};
use tally_common::error::{LedgerError, Result};
use tally_common::transaction::Transaction;
use tally_ledger::account::AccountType;
use tally_ledger::audit::Auditor;

use crate::cli::{
    AccountCommands, AssetCommands, AuditCommands, Cli, Commands, JournalCommands, TxCommands,
};
use crate::store::Store;

/// Key for the whole-trail audit HMAC. Deployments that want the HMAC to
/// carry weight should set `TALLY_AUDIT_KEY` and publish it out of band.
fn audit_key() -> Vec<u8> {
    std::env::var("TALLY_AUDIT_KEY")
        .map(String::into_bytes)
        .unwrap_or_else(|_| b"tally-default-audit-key".to_vec())
}

pub fn run(cli: Cli) -> Result<()> {
    let store = Store::new(&cli.data_dir);
    match cli.command {
        Commands::Account { command } => account(&store, command),
        Commands::Tx { command } => tx(&store, command),
        Commands::Balance { name } => balance(&store, &name),
        Commands::Audit { command } => audit(&store, command),
        Commands::Journal { command } => journal(&store, command),
        Commands::Asset { command } => asset(&store, command),
        Commands::Keygen { out, password } => keygen(out, password),
        Commands::Sign {
            input,
            key,
            out,
            password,
        } => sign(&input, &key, out, password),
        Commands::Verify { input, sig, key } => verify(&input, &sig, &key),
    }
}

fn account(store: &Store, command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::Create {
            name,
            account_type,
            currency,
        } => {
            let account_type = AccountType::parse(&account_type).ok_or_else(|| {
                LedgerError::MalformedRecord(format!(
                    "unknown account type {:?}; expected asset, liability, equity, revenue or expense",
                    account_type
                ))
            })?;
            let mut ledger = store.load_ledger()?;
            ledger.create_account(&name, account_type, &currency)?;
            store.save_ledger(&ledger)?;
            println!("Created account {} ({}, {})", name, account_type, currency);
            Ok(())
        }
        AccountCommands::List => {
            let ledger = store.load_ledger()?;
            for row in ledger.trial_balance() {
                println!(
                    "{:<24} {:<10} {:>16} {}",
                    row.name, row.account_type.to_string(), row.balance, row.currency
                );
            }
            Ok(())
        }
    }
}

fn tx(store: &Store, command: TxCommands) -> Result<()> {
    match command {
        TxCommands::Add {
            from,
            to,
            amount,
            currency,
            memo,
            depends_on,
            sign_key,
        } => {
            let mut ledger = store.load_ledger()?;
            let mut journal = store.load_journal()?;

            let mut tx = Transaction::new(amount, &currency, &from, &to);
            if let Some(memo) = memo {
                tx = tx.with_memo(&memo);
            }
            if let Some(dep) = depends_on {
                tx = tx.with_dependency(&dep);
            }
            if let Some(key_path) = sign_key {
                let secret = read_hex_file(&key_path, "key file")?;
                let keypair = Keypair::from_secret_bytes(&secret)?;
                tx.sign(&keypair);
            }

            ledger.process_transaction(&tx)?;
            journal.append(&tx)?;
            store.save_ledger(&ledger)?;

            println!("Appended transaction {}", tx.id);
            Ok(())
        }
    }
}

fn balance(store: &Store, name: &str) -> Result<()> {
    let ledger = store.load_ledger()?;
    println!("{}", ledger.balance(name)?);
    Ok(())
}

fn audit(store: &Store, command: AuditCommands) -> Result<()> {
    let mut ledger = store.load_ledger()?;
    let journal = store.load_journal()?;
    let report = Auditor::new(&audit_key()).audit(&ledger, &journal);

    match command {
        AuditCommands::Verify => {
            println!("integrity_valid:    {}", report.integrity_valid);
            println!("double_entry_valid: {}", report.double_entry_valid);
            println!("hmac_valid:         {}", report.hmac_valid);
            println!("transactions:       {}", report.total_transactions);
            println!("discrepancies:      {}", report.balance_discrepancies.len());
            println!("duplicates:         {}", report.duplicate_ids.len());
            println!("orphans:            {}", report.orphan_ids.len());
            if !report.is_valid() {
                // Diagnostic output already printed; fail with the domain code.
                std::process::exit(2);
            }
            ledger.record_checkpoint(&format!(
                "audit ok: {} transactions, tip {}",
                report.total_transactions,
                journal.tip_hash().unwrap_or("-"),
            ));
            store.save_ledger(&ledger)?;
            Ok(())
        }
        AuditCommands::Report => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| LedgerError::MalformedRecord(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn journal(store: &Store, command: JournalCommands) -> Result<()> {
    let journal = store.load_journal()?;
    match command {
        JournalCommands::List => {
            for entry in journal.entries() {
                let tx = &entry.transaction;
                println!(
                    "{:>6}  {}  {} -> {}  {} {}  {}",
                    entry.sequence,
                    tx.id,
                    tx.from_account,
                    tx.to_account,
                    tx.amount,
                    tx.currency,
                    tx.memo.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        JournalCommands::Verify => {
            match journal.verify_integrity() {
                Ok(()) => {
                    println!("Journal integrity: OK ({} entries)", journal.len());
                    println!("Tip hash: {}", journal.tip_hash().unwrap_or("-"));
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        JournalCommands::Export { file } => {
            journal.save_plain(&file)?;
            println!("Exported {} entries to {}", journal.len(), file.display());
            println!("Note: the plaintext export is not tamper-evident.");
            Ok(())
        }
        JournalCommands::ExportEncrypted { file, password } => {
            journal.save_encrypted(&file, &password)?;
            println!("Exported {} entries to {}", journal.len(), file.display());
            Ok(())
        }
        JournalCommands::Proof { tx_id } => {
            let Some(proof) = journal.merkle_proof(&tx_id) else {
                eprintln!("error: transaction {} is not in the journal", tx_id);
                std::process::exit(2);
            };
            println!("Merkle root: {}", hex::encode(journal.merkle_root()));
            let json = serde_json::to_string_pretty(&proof)
                .map_err(|e| LedgerError::MalformedRecord(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
        JournalCommands::Attest { key } => {
            let keypair = match key {
                Some(path) => {
                    let secret = read_hex_file(&path, "key file")?;
                    Some(Keypair::from_secret_bytes(&secret)?)
                }
                None => None,
            };
            let attestation = journal.attest(keypair.as_ref());
            let json = serde_json::to_string_pretty(&attestation)
                .map_err(|e| LedgerError::MalformedRecord(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn asset(store: &Store, command: AssetCommands) -> Result<()> {
    let mut ledger = store.load_ledger()?;
    match command {
        AssetCommands::Register {
            id,
            decimals,
            name,
            limit,
        } => {
            let display_name = name.unwrap_or_else(|| id.clone());
            let mut asset = Asset::new(&id, AssetKind::Token, &id, &display_name, decimals)?;
            if let Some(limit) = limit {
                asset = asset.with_transaction_limit(limit);
            }
            ledger.register_asset(asset)?;
            println!("Registered asset {}", id);
        }
        AssetCommands::Freeze { id } => {
            ledger.registry.freeze(&id)?;
            println!("Froze asset {}", id);
        }
        AssetCommands::Unfreeze { id } => {
            ledger.registry.unfreeze(&id)?;
            println!("Unfroze asset {}", id);
        }
    }
    store.save_ledger(&ledger)
}

fn keygen(out: Option<PathBuf>, password: Option<String>) -> Result<()> {
    let keypair = Keypair::generate();
    let path = out.unwrap_or_else(|| PathBuf::from("tally.key"));
    let pub_path = path.with_extension("pub");

    match &password {
        Some(password) => tally_vault::keystore::save_keypair(&path, &keypair, password)
            .map_err(LedgerError::from)?,
        None => fs::write(&path, hex::encode(keypair.secret_bytes()))?,
    }
    fs::write(&pub_path, hex::encode(keypair.public_bytes()))?;

    println!("Secret key: {}", path.display());
    println!("Public key: {}", pub_path.display());
    println!("PubHex:     {}", hex::encode(keypair.public_bytes()));
    println!(
        "Fingerprint: {}",
        bs58::encode(keypair.public_bytes()).into_string()
    );
    Ok(())
}

fn read_hex_file(path: &Path, expected: &str) -> Result<Vec<u8>> {
    let raw = fs::read_to_string(path)?;
    hex::decode(raw.trim())
        .map_err(|_| LedgerError::InvalidKeyFormat(format!("{} is not valid hex", expected)))
}

fn sign(input: &Path, key: &Path, out: Option<PathBuf>, password: Option<String>) -> Result<()> {
    let message = fs::read(input)?;
    let keypair = match &password {
        Some(password) => {
            tally_vault::keystore::load_keypair(key, password).map_err(LedgerError::from)?
        }
        None => {
            let secret = read_hex_file(key, "key file")?;
            Keypair::from_secret_bytes(&secret)?
        }
    };

    let signature = keypair.sign(&message);
    let sig_path = out.unwrap_or_else(|| {
        let mut p = input.as_os_str().to_owned();
        p.push(".sig");
        PathBuf::from(p)
    });
    fs::write(&sig_path, hex::encode(signature))?;

    println!("Signature: {}", sig_path.display());
    Ok(())
}

fn verify(input: &Path, sig: &Path, key: &Path) -> Result<()> {
    let message = fs::read(input)?;
    let signature = read_hex_file(sig, "signature file")?;
    let public_key = read_hex_file(key, "public key file")?;

    if verify_with_key(&public_key, &message, &signature)? {
        println!("Signature is valid");
        Ok(())
    } else {
        Err(LedgerError::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded_store(dir: &Path) -> Store {
        let store = Store::new(dir);
        asset(
            &store,
            AssetCommands::Register {
                id: "USD".to_string(),
                decimals: 2,
                name: Some("United States Dollar".to_string()),
                limit: None,
            },
        )
        .unwrap();
        for name in ["vault", "alice"] {
            account(
                &store,
                AccountCommands::Create {
                    name: name.to_string(),
                    account_type: "asset".to_string(),
                    currency: "USD".to_string(),
                },
            )
            .unwrap();
        }
        store
    }

    fn transfer(store: &Store, from: &str, to: &str, amount: i64) -> Result<()> {
        tx(
            store,
            TxCommands::Add {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                currency: "USD".to_string(),
                memo: None,
                depends_on: None,
                sign_key: None,
            },
        )
    }

    #[test]
    fn test_state_persists_across_invocations() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = seeded_store(dir.path());
        transfer(&store, "vault", "alice", 100_000).unwrap();

        // A fresh Store sees the same world, as a second CLI run would.
        let reopened = Store::new(dir.path());
        let ledger = reopened.load_ledger().unwrap();
        assert_eq!(ledger.balance("alice").unwrap(), 100_000);
        assert_eq!(reopened.load_journal().unwrap().len(), 1);
    }

    #[test]
    fn test_audit_verify_records_a_checkpoint() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = seeded_store(dir.path());
        transfer(&store, "vault", "alice", 5_000).unwrap();

        audit(&store, AuditCommands::Verify).unwrap();

        let ledger = store.load_ledger().unwrap();
        let tip = ledger.proof_chain.entries().last().unwrap();
        assert_eq!(tip.event.tag(), "system_checkpoint");
        assert!(ledger.proof_chain.verify_chain().is_ok());
    }

    #[test]
    fn test_duplicate_account_is_a_domain_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = seeded_store(dir.path());

        let result = account(
            &store,
            AccountCommands::Create {
                name: "alice".to_string(),
                account_type: "asset".to_string(),
                currency: "USD".to_string(),
            },
        );
        assert!(matches!(result, Err(LedgerError::AccountExists(_))));
    }

    #[test]
    fn test_frozen_asset_blocks_transfers() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = seeded_store(dir.path());

        asset(
            &store,
            AssetCommands::Freeze {
                id: "USD".to_string(),
            },
        )
        .unwrap();
        assert!(matches!(
            transfer(&store, "vault", "alice", 1),
            Err(LedgerError::AssetFrozen(_))
        ));

        asset(
            &store,
            AssetCommands::Unfreeze {
                id: "USD".to_string(),
            },
        )
        .unwrap();
        transfer(&store, "vault", "alice", 1).unwrap();
    }

    #[test]
    fn test_keygen_sign_verify_round_trip() {
        let dir = tempdir().expect("Failed to create temp dir");
        let key_path = dir.path().join("id.key");
        let message_path = dir.path().join("message.txt");
        let sig_path = dir.path().join("message.sig");

        keygen(Some(key_path.clone()), None).unwrap();
        fs::write(&message_path, b"attested content").unwrap();

        sign(&message_path, &key_path, Some(sig_path.clone()), None).unwrap();
        verify(&message_path, &sig_path, &key_path.with_extension("pub")).unwrap();

        // A modified message no longer verifies.
        fs::write(&message_path, b"tampered content").unwrap();
        assert!(matches!(
            verify(&message_path, &sig_path, &key_path.with_extension("pub")),
            Err(LedgerError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_encrypted_keystore_flow() {
        let dir = tempdir().expect("Failed to create temp dir");
        let key_path = dir.path().join("id.key");
        let message_path = dir.path().join("message.txt");
        let sig_path = dir.path().join("message.sig");

        keygen(Some(key_path.clone()), Some("pw".to_string())).unwrap();
        fs::write(&message_path, b"content").unwrap();

        sign(
            &message_path,
            &key_path,
            Some(sig_path.clone()),
            Some("pw".to_string()),
        )
        .unwrap();
        verify(&message_path, &sig_path, &key_path.with_extension("pub")).unwrap();

        let wrong = sign(
            &message_path,
            &key_path,
            Some(sig_path),
            Some("wrong".to_string()),
        );
        assert!(matches!(wrong, Err(LedgerError::AuthenticationFailed)));
    }
}
