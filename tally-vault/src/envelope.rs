use aes_gcm::{
    aead::{generic_array::GenericArray, Aead},
    Aes256Gcm, KeyInit,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use zeroize::Zeroize;

use tally_common::utils::security::{generate_nonce, generate_salt};

use crate::error::VaultError;
use crate::password::Password;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// An authenticated-encryption envelope.
///
/// `ciphertext` is `nonce(12) ‖ AES-256-GCM ciphertext+tag`. The salt is
/// present iff the key was derived from a password; direct-key envelopes
/// carry no salt. On-disk form is `base64(salt? ‖ ciphertext)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedData {
    pub salt: Option<[u8; SALT_LEN]>,
    pub ciphertext: Vec<u8>,
}

fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    let nonce = generate_nonce();

    let sealed = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::AuthenticationFailed)?;

    let mut output = nonce.to_vec();
    output.extend_from_slice(&sealed);
    Ok(output)
}

fn open(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, VaultError> {
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::MalformedEnvelope(format!(
            "ciphertext too short: {} bytes",
            data.len()
        )));
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    cipher
        .decrypt(GenericArray::from_slice(nonce), sealed)
        .map_err(|_| VaultError::AuthenticationFailed)
}

impl EncryptedData {
    /// Encrypts under a caller-supplied 32-byte key. No salt is recorded.
    pub fn encrypt_with_key(key: &[u8; 32], plaintext: &[u8]) -> Result<Self, VaultError> {
        Ok(Self {
            salt: None,
            ciphertext: seal(key, plaintext)?,
        })
    }

    pub fn decrypt_with_key(&self, key: &[u8; 32]) -> Result<Vec<u8>, VaultError> {
        open(key, &self.ciphertext)
    }

    /// Encrypts under a password-derived key with a fresh random salt.
    pub fn encrypt_with_password(password: &str, plaintext: &[u8]) -> Result<Self, VaultError> {
        let salt = generate_salt();
        let key = Password::new(password, salt).derive_key()?;
        Ok(Self {
            salt: Some(salt),
            ciphertext: seal(key.as_bytes(), plaintext)?,
        })
    }

    /// Decrypts a password-mode envelope. The salt must be present.
    pub fn decrypt_with_password(&self, password: &str) -> Result<Vec<u8>, VaultError> {
        let salt = self.salt.ok_or_else(|| {
            VaultError::MalformedEnvelope("password-mode envelope has no salt".into())
        })?;
        let key = Password::new(password, salt).derive_key()?;
        open(key.as_bytes(), &self.ciphertext)
    }

    /// On-disk form: `base64(salt? ‖ nonce ‖ ciphertext+tag)`.
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(
            self.salt.map_or(0, |s| s.len()) + self.ciphertext.len(),
        );
        if let Some(salt) = &self.salt {
            raw.extend_from_slice(salt);
        }
        raw.extend_from_slice(&self.ciphertext);
        let encoded = BASE64.encode(&raw);
        raw.zeroize();
        encoded
    }

    /// Parses the on-disk form. `salted` states the key provenance the
    /// caller expects; the envelope length alone cannot distinguish them.
    pub fn from_base64(encoded: &str, salted: bool) -> Result<Self, VaultError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| VaultError::MalformedEnvelope(e.to_string()))?;

        let minimum = if salted { SALT_LEN } else { 0 } + NONCE_LEN + TAG_LEN;
        if raw.len() < minimum {
            return Err(VaultError::MalformedEnvelope(format!(
                "envelope too short: {} bytes, need at least {}",
                raw.len(),
                minimum
            )));
        }

        if salted {
            let (salt, ciphertext) = raw.split_at(SALT_LEN);
            let mut fixed = [0u8; SALT_LEN];
            fixed.copy_from_slice(salt);
            Ok(Self {
                salt: Some(fixed),
                ciphertext: ciphertext.to_vec(),
            })
        } else {
            Ok(Self {
                salt: None,
                ciphertext: raw,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::utils::security::generate_seed;

    #[test]
    fn test_password_round_trip() {
        let envelope = EncryptedData::encrypt_with_password("pw", b"ledger bytes").unwrap();
        assert!(envelope.salt.is_some());

        let plaintext = envelope.decrypt_with_password("pw").unwrap();
        assert_eq!(plaintext, b"ledger bytes");
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let envelope = EncryptedData::encrypt_with_password("pw", b"secret").unwrap();
        assert!(matches!(
            envelope.decrypt_with_password("wrong"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_direct_key_round_trip() {
        let key = generate_seed();
        let envelope = EncryptedData::encrypt_with_key(&key, b"payload").unwrap();
        assert!(envelope.salt.is_none());

        assert_eq!(envelope.decrypt_with_key(&key).unwrap(), b"payload");

        let other = generate_seed();
        assert!(matches!(
            envelope.decrypt_with_key(&other),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let mut envelope = EncryptedData::encrypt_with_password("pw", b"secret").unwrap();
        let last = envelope.ciphertext.len() - 1;
        envelope.ciphertext[last] ^= 0x01;

        assert!(matches!(
            envelope.decrypt_with_password("pw"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_base64_round_trip_salted() {
        let envelope = EncryptedData::encrypt_with_password("pw", b"on disk").unwrap();
        let encoded = envelope.to_base64();

        let restored = EncryptedData::from_base64(&encoded, true).unwrap();
        assert_eq!(restored, envelope);
        assert_eq!(restored.decrypt_with_password("pw").unwrap(), b"on disk");
    }

    #[test]
    fn test_base64_round_trip_direct_key() {
        let key = generate_seed();
        let envelope = EncryptedData::encrypt_with_key(&key, b"on disk").unwrap();
        let encoded = envelope.to_base64();

        let restored = EncryptedData::from_base64(&encoded, false).unwrap();
        assert_eq!(restored.decrypt_with_key(&key).unwrap(), b"on disk");
    }

    #[test]
    fn test_short_envelope_is_malformed() {
        let encoded = BASE64.encode([0u8; 10]);
        assert!(matches!(
            EncryptedData::from_base64(&encoded, true),
            Err(VaultError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            EncryptedData::from_base64("!!!not base64!!!", false),
            Err(VaultError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_fresh_salt_per_save() {
        let a = EncryptedData::encrypt_with_password("pw", b"x").unwrap();
        let b = EncryptedData::encrypt_with_password("pw", b"x").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
