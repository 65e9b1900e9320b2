//! Password-protected storage for Ed25519 signing keys.
//!
//! The stored artifact is the standard envelope over the 32 secret bytes;
//! the public half is re-derived on load, so nothing but the envelope needs
//! to exist on disk.

use std::fs;
use std::path::Path;

use zeroize::Zeroize;

use tally_common::crypto::keys::Keypair;

use crate::envelope::EncryptedData;
use crate::error::VaultError;

pub fn save_keypair(path: &Path, keypair: &Keypair, password: &str) -> Result<(), VaultError> {
    let mut secret = keypair.secret_bytes();
    let envelope = EncryptedData::encrypt_with_password(password, &secret);
    secret.zeroize();

    fs::write(path, envelope?.to_base64())?;
    tracing::info!(path = %path.display(), "keypair stored");
    Ok(())
}

pub fn load_keypair(path: &Path, password: &str) -> Result<Keypair, VaultError> {
    let encoded = fs::read_to_string(path)?;
    let envelope = EncryptedData::from_base64(&encoded, true)?;
    let mut secret = envelope.decrypt_with_password(password)?;

    let keypair = Keypair::from_secret_bytes(&secret)
        .map_err(|_| VaultError::MalformedEnvelope("stored key is not 32 bytes".into()));
    secret.zeroize();
    keypair
}
