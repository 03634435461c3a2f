//! Encryption of the components of object's paths.

use super::{derive_key, hmac_sha256, open, seal, Key, NONCE_SIZE};
use crate::{Error, Result};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;

/// Separator of the path components.
pub(crate) const SEPARATOR: char = '/';

/// Splits `path` in its components. An empty path has no components.
pub(crate) fn components(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }

    path.split(SEPARATOR).collect()
}

/// Returns the key of the `segment` child of the node whose key is `parent`.
pub(crate) fn child_key(parent: &Key, segment: &str) -> Key {
    derive_key(parent, &format!("path:{}", segment))
}

/// Encrypts one path component with the key of its parent.
///
/// The nonce is derived from the component, so the same component under the same parent always
/// produces the same cipher text, which is what allows the satellite to list and look up objects
/// by their encrypted paths. Empty components stay empty so the trailing separator of a prefix is
/// kept.
pub(crate) fn encrypt_segment(parent: &Key, segment: &str) -> Result<String> {
    if segment.is_empty() {
        return Ok(String::new());
    }

    let mac = hmac_sha256(parent.as_bytes(), format!("nonce:{}", segment).as_bytes());
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&mac[..NONCE_SIZE]);

    let mut sealed = nonce.to_vec();
    sealed.extend(seal(parent, &nonce, segment.as_bytes())?);

    Ok(URL_SAFE.encode(sealed))
}

/// Decrypts one path component encrypted with [`encrypt_segment`].
pub(crate) fn decrypt_segment(parent: &Key, encoded: &str) -> Result<String> {
    if encoded.is_empty() {
        return Ok(String::new());
    }

    let sealed = URL_SAFE
        .decode(encoded)
        .map_err(|err| Error::new_internal("invalid encrypted path segment encoding", err.into()))?;

    if sealed.len() < NONCE_SIZE {
        return Err(Error::new_internal_without_inner(
            "encrypted path segment is too short",
        ));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let mut n = [0u8; NONCE_SIZE];
    n.copy_from_slice(nonce);

    let plain = open(parent, &n, ciphertext).ok_or_else(|| {
        Error::new_internal_without_inner(
            "encrypted path segment cannot be decrypted with the access grant's key",
        )
    })?;

    String::from_utf8(plain)
        .map_err(|err| Error::new_internal("decrypted path segment isn't UTF-8", err.into()))
}

/// Encrypts `components` starting from the node whose key is `key`.
///
/// It returns the encrypted components and the key of the last one.
pub(crate) fn encrypt_components(key: Key, components: &[&str]) -> Result<(Vec<String>, Key)> {
    let mut key = key;
    let mut encrypted = Vec::with_capacity(components.len());
    for c in components {
        encrypted.push(encrypt_segment(&key, c)?);
        key = child_key(&key, c);
    }

    Ok((encrypted, key))
}

/// Decrypts `components` starting from the node whose key is `key`.
///
/// It returns the decrypted components and the key of the last one.
pub(crate) fn decrypt_components(key: Key, components: &[&str]) -> Result<(Vec<String>, Key)> {
    let mut key = key;
    let mut decrypted = Vec::with_capacity(components.len());
    for c in components {
        let plain = decrypt_segment(&key, c)?;
        key = child_key(&key, &plain);
        decrypted.push(plain);
    }

    Ok((decrypted, key))
}

#[cfg(test)]
mod test {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_components() {
        assert!(components("").is_empty(), "empty path");
        assert_eq!(components("a"), vec!["a"]);
        assert_eq!(components("a/b/"), vec!["a", "b", ""]);
        assert_eq!(components("/a"), vec!["", "a"]);
    }

    #[test]
    fn test_encrypt_segment() {
        let key = Key::from_bytes([1; 32]);
        let enc = encrypt_segment(&key, "videos").expect("encrypt");
        assert_eq!(
            enc,
            encrypt_segment(&key, "videos").expect("encrypt"),
            "deterministic"
        );
        assert!(!enc.contains(SEPARATOR), "no separator in encrypted segment");
        assert_ne!(
            enc,
            encrypt_segment(&Key::from_bytes([2; 32]), "videos").expect("encrypt"),
            "parent key matters"
        );

        assert_eq!(encrypt_segment(&key, "").expect("encrypt"), "", "empty segment");

        URL_SAFE.decode(&enc).expect("base64url segment");
        decrypt_segment(&Key::from_bytes([2; 32]), &enc).expect_err("decrypt with another key");
        decrypt_segment(&key, "not-base64!").expect_err("decrypt invalid encoding");
    }

    #[test]
    fn test_child_key() {
        let root = Key::from_bytes([3; 32]);
        let (_, key) = encrypt_components(root.clone(), &["a", "b"]).expect("encrypt");
        assert_eq!(
            key,
            child_key(&child_key(&root, "a"), "b"),
            "key of the last component"
        );
    }

    proptest! {
        #[test]
        fn prop_components_round_trip(
            seed in any::<[u8; 32]>(),
            comps in prop::collection::vec("[^/]{0,12}", 0..6),
        ) {
            let key = Key::from_bytes(seed);
            let comps: Vec<&str> = comps.iter().map(String::as_str).collect();

            let (encrypted, enc_key) = encrypt_components(key.clone(), &comps).unwrap();
            let encrypted: Vec<&str> = encrypted.iter().map(String::as_str).collect();
            let (decrypted, dec_key) = decrypt_components(key, &encrypted).unwrap();

            prop_assert_eq!(decrypted, comps);
            prop_assert_eq!(enc_key, dec_key);
        }
    }
}
