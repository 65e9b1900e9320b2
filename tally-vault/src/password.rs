use argon2::{Argon2, Params};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::VaultError;

/// Argon2id cost constants. These are part of the on-disk format: changing
/// them changes every derived key. Tuned for roughly 100 ms on a developer
/// workstation.
pub const DEFAULT_ITERATIONS: u32 = 3;
pub const DEFAULT_MEMORY_KIB: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 1;

/// A 32-byte key derived from a password, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A password plus its KDF inputs. Both the password bytes and the
/// parameters are wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop, Clone)]
pub struct Password {
    password: Vec<u8>,
    salt: [u8; 16],
    iterations: u32,
    memory: u32,
    parallelism: u32,
}

impl Password {
    pub fn new(password: &str, salt: [u8; 16]) -> Self {
        Self::with_params(
            password,
            salt,
            DEFAULT_ITERATIONS,
            DEFAULT_MEMORY_KIB,
            DEFAULT_PARALLELISM,
        )
    }

    pub fn with_params(
        password: &str,
        salt: [u8; 16],
        iterations: u32,
        memory: u32,
        parallelism: u32,
    ) -> Self {
        Self {
            password: password.as_bytes().to_vec(),
            salt,
            iterations,
            memory,
            parallelism,
        }
    }

    /// Derives the 32-byte encryption key with Argon2id v0x13.
    pub fn derive_key(&self) -> Result<DerivedKey, VaultError> {
        let params = Params::new(self.memory, self.iterations, self.parallelism, Some(32))
            .map_err(|e| VaultError::KdfFailed(e.to_string()))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(&self.password, &self.salt, &mut key)
            .map_err(|e| VaultError::KdfFailed(e.to_string()))?;

        Ok(DerivedKey(key))
    }
}
