//! Key derivation and authenticated encryption of paths, object's content and metadata.
//!
//! The keys form a hierarchy that follows the object's path: the key of a bucket is derived from
//! the root key and the bucket's name, and the key of every path component is derived from the
//! key of its parent and the component itself. Holding the key of a prefix gives access to
//! everything below it and nothing above or beside it.

pub(crate) mod path;
pub(crate) mod store;

pub(crate) use store::Store;

use crate::{Error, Result};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Size in bytes of every key.
pub(crate) const KEY_SIZE: usize = 32;
/// Size in bytes of the nonces used by the authenticated encryption.
pub(crate) const NONCE_SIZE: usize = 12;
/// Number of bytes that the authenticated encryption adds to the plain text.
pub(crate) const TAG_SIZE: usize = 16;
/// Parallelism used by the passphrase key derivation when it isn't specified.
pub(crate) const DEFAULT_KDF_CONCURRENCY: u8 = 8;

/// Argon2id memory cost in KiB.
const KDF_MEMORY_COST: u32 = 64 * 1024;
/// Argon2id number of iterations.
const KDF_TIME_COST: u32 = 1;

/// A symmetric key. Its memory is zeroed when it's dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Key([u8; KEY_SIZE]);

impl Key {
    /// Creates a key from its raw bytes.
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a new random key.
    pub(crate) fn random() -> Self {
        Self(rand::random())
    }

    /// Returns the raw bytes of the key.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Derives the root key from a passphrase with Argon2id.
///
/// `concurrency` is the Argon2 parallelism and it must be greater than 0. The salt is hashed before
/// using it, so it can have any length.
pub(crate) fn derive_root_key(passphrase: &[u8], salt: &[u8], concurrency: u8) -> Result<Key> {
    if concurrency == 0 {
        return Err(Error::new_invalid_arguments(
            "concurrency",
            "must be greater than 0",
        ));
    }

    let params = Params::new(
        KDF_MEMORY_COST,
        KDF_TIME_COST,
        u32::from(concurrency),
        Some(KEY_SIZE),
    )
    .map_err(|err| Error::new_internal("invalid key derivation parameters", err.to_string().into()))?;

    let salt = Sha256::digest(salt);
    let mut output = [0u8; KEY_SIZE];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passphrase, &salt, &mut output)
        .map_err(|err| Error::new_internal("passphrase key derivation", err.to_string().into()))?;

    let key = Key::from_bytes(output);
    output.zeroize();
    Ok(key)
}

/// Returns the HMAC-SHA256 of `message` with `key`.
pub(crate) fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any size, so the constructor never fails.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any size");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Derives a child key of `parent` for the `message` domain.
pub(crate) fn derive_key(parent: &Key, message: &str) -> Key {
    Key::from_bytes(hmac_sha256(parent.as_bytes(), message.as_bytes()))
}

/// Encrypts `plaintext` with `key` and `nonce`, the returned cipher text is authenticated.
pub(crate) fn seal(key: &Key, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    ChaCha20Poly1305::new(key.as_bytes().into())
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::new_internal_without_inner("authenticated encryption failed"))
}

/// Decrypts `ciphertext` sealed with [`seal`] using the same `key` and `nonce`.
///
/// It returns `None` if the cipher text isn't authentic, which happens when the key or the nonce
/// aren't the ones used for encrypting it or the cipher text was tampered.
pub(crate) fn open(key: &Key, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Option<Vec<u8>> {
    ChaCha20Poly1305::new(key.as_bytes().into())
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()
}

/// Returns the nonce used for encrypting the segment with `index` of an object's content.
///
/// Every object has its own random content key, hence the nonce only has to be unique per
/// segment.
pub(crate) fn segment_nonce(index: u32) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..4].copy_from_slice(&index.to_le_bytes());
    nonce
}

/// Returns the nonce used for encrypting the custom metadata of an object with its content key.
pub(crate) fn metadata_nonce() -> [u8; NONCE_SIZE] {
    [0xff; NONCE_SIZE]
}

/// Encrypts the object's content key with the key derived for the object's path.
///
/// It returns the encrypted key and the random nonce used for encrypting it.
pub(crate) fn wrap_key(path_key: &Key, content_key: &Key) -> Result<(Vec<u8>, Vec<u8>)> {
    let nonce: [u8; NONCE_SIZE] = rand::random();
    let encrypted = seal(path_key, &nonce, content_key.as_bytes())?;
    Ok((encrypted, nonce.to_vec()))
}

/// Decrypts a content key encrypted with [`wrap_key`].
pub(crate) fn unwrap_key(path_key: &Key, encrypted: &[u8], nonce: &[u8]) -> Result<Key> {
    let nonce: [u8; NONCE_SIZE] = nonce
        .try_into()
        .map_err(|_| Error::new_internal_without_inner("invalid encrypted key nonce size"))?;

    let mut plain = open(path_key, &nonce, encrypted).ok_or_else(|| {
        Error::new_internal_without_inner(
            "object's content key cannot be decrypted with the access grant's key",
        )
    })?;

    let bytes: [u8; KEY_SIZE] = plain.as_slice().try_into().map_err(|_| {
        Error::new_internal_without_inner("decrypted object's content key has an invalid size")
    })?;
    plain.zeroize();

    Ok(Key::from_bytes(bytes))
}
