use std::fs;
use std::path::Path;

use crate::envelope::EncryptedData;
use crate::error::VaultError;

/// Encrypts `plaintext` under `password` and writes the base64 envelope.
pub fn save(path: &Path, plaintext: &[u8], password: &str) -> Result<(), VaultError> {
    let envelope = EncryptedData::encrypt_with_password(password, plaintext)?;
    fs::write(path, envelope.to_base64())?;
    tracing::debug!(path = %path.display(), bytes = plaintext.len(), "encrypted file written");
    Ok(())
}

/// Reads a base64 envelope written by [`save`] and decrypts it.
pub fn load(path: &Path, password: &str) -> Result<Vec<u8>, VaultError> {
    let encoded = fs::read_to_string(path)?;
    let envelope = EncryptedData::from_base64(&encoded, true)?;
    envelope.decrypt_with_password(password)
}

/// Direct-key variant of [`save`]; no salt is written.
pub fn save_with_key(path: &Path, plaintext: &[u8], key: &[u8; 32]) -> Result<(), VaultError> {
    let envelope = EncryptedData::encrypt_with_key(key, plaintext)?;
    fs::write(path, envelope.to_base64())?;
    Ok(())
}

pub fn load_with_key(path: &Path, key: &[u8; 32]) -> Result<Vec<u8>, VaultError> {
    let encoded = fs::read_to_string(path)?;
    let envelope = EncryptedData::from_base64(&encoded, false)?;
    envelope.decrypt_with_key(key)
}
