use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{LedgerError, Result};

/// Ed25519 keypair used to sign transactions and detached payloads.
///
/// The secret half is zeroized when the `SigningKey` drops.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing: SigningKey::generate(&mut csprng),
        }
    }

    /// Restores a keypair from the 32 secret bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::InvalidKeyFormat("secret key must be 32 bytes".into()))?;
        Ok(Self {
            signing: SigningKey::from_bytes(&secret),
        })
    }

    /// Exports the 32 secret bytes. Callers own the copy and its zeroization.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

/// Verifies a detached signature under an externally supplied public key.
pub fn verify_with_key(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| LedgerError::InvalidKeyFormat("public key must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| LedgerError::InvalidKeyFormat(e.to_string()))?;
    let signature = Signature::from_slice(signature)
        .map_err(|_| LedgerError::InvalidKeyFormat("signature must be 64 bytes".into()))?;

    Ok(verifying_key.verify(message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        assert_eq!(signature.len(), 64);
        assert!(verify_with_key(&keypair.public_bytes(), message, &signature).unwrap());
        assert!(!verify_with_key(&keypair.public_bytes(), b"wrong message", &signature).unwrap());
    }

    #[test]
    fn test_secret_round_trip() {
        let keypair = Keypair::generate();
        let restored = Keypair::from_secret_bytes(&keypair.secret_bytes()).unwrap();
        assert_eq!(keypair.public_bytes(), restored.public_bytes());
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        assert!(matches!(
            Keypair::from_secret_bytes(&[0u8; 16]),
            Err(LedgerError::InvalidKeyFormat(_))
        ));
        assert!(matches!(
            verify_with_key(&[0u8; 8], b"msg", &[0u8; 64]),
            Err(LedgerError::InvalidKeyFormat(_))
        ));
    }
}
