//! Encryption key derived from a passphrase.

use crate::encryption::{self, Key};
use crate::Result;

/// An encryption key that can be used for overriding the encryption key of a bucket or prefix of
/// an access grant. See [`Grant::override_encryption_key`](crate::access::Grant::override_encryption_key).
#[derive(Clone)]
pub struct EncryptionKey {
    inner: Key,
}

impl EncryptionKey {
    /// Derives a salted encryption key from `passphrase` using Argon2id.
    ///
    /// `salt` can be any value, for example a user identifier, and it's what allows to generate
    /// different keys from the same passphrase.
    ///
    /// NOTE: this is a CPU and memory heavy operation, hence the derived key should be kept rather
    /// than deriving it again.
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self> {
        let inner = encryption::derive_root_key(
            passphrase.as_bytes(),
            salt,
            encryption::DEFAULT_KDF_CONCURRENCY,
        )?;

        Ok(Self { inner })
    }

    /// Returns the key material.
    pub(crate) fn key(&self) -> &Key {
        &self.inner
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("EncryptionKey").finish_non_exhaustive()
    }
}
