//! Keys held by an access grant and the resolution of object's paths against them.

use super::path::{self, SEPARATOR};
use super::Key;
use crate::{error, Error, Result};

use serde::{Deserialize, Serialize};

/// The encryption access of an access grant.
///
/// It holds an optional root key, from which the key of any bucket and path can be derived, and
/// a list of keys of specific bucket's prefixes. The keys of the prefixes are the only ones held
/// by shared access grants, so everything out of them can't be encrypted nor decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Store {
    default_key: Option<Key>,
    entries: Vec<Entry>,
    bypass: bool,
}

/// The key of a bucket's prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    bucket: String,
    unencrypted: Vec<String>,
    encrypted: Vec<String>,
    key: Key,
}

/// A path resolved against a store: the key of the deepest known node and the components which
/// are left to process from it.
struct Resolved<'a> {
    key: Key,
    prefix: Vec<String>,
    rest: Vec<&'a str>,
}

impl Store {
    /// Creates a store which derives every key from `root`.
    pub(crate) fn new(root: Key) -> Self {
        Self {
            default_key: Some(root),
            entries: Vec::new(),
            bypass: false,
        }
    }

    /// Returns true if the paths aren't encrypted nor decrypted.
    pub(crate) fn is_bypass(&self) -> bool {
        self.bypass
    }

    /// Disables the path encryption. Paths are sent and listed as they are passed and returned by
    /// the satellite.
    pub(crate) fn enable_bypass(&mut self) {
        self.bypass = true;
    }

    /// Sets `key` as the key of the `prefix` of `bucket`. `prefix` is empty or a path ending with
    /// a separator.
    ///
    /// The encrypted form of `prefix` is computed with the keys already held by the store, hence
    /// it fails if the store cannot encrypt it.
    pub(crate) fn add(&mut self, bucket: &str, prefix: &str, key: Key) -> Result<()> {
        let prefix = prefix.strip_suffix(SEPARATOR).unwrap_or(prefix);
        let encrypted: Vec<String> = if self.bypass {
            path::components(prefix)
                .into_iter()
                .map(String::from)
                .collect()
        } else {
            let resolved = self.resolve(bucket, prefix)?;
            let (enc, _) = path::encrypt_components(resolved.key, &resolved.rest)?;
            resolved.prefix.into_iter().chain(enc).collect()
        };

        let unencrypted: Vec<String> = path::components(prefix)
            .into_iter()
            .map(String::from)
            .collect();

        self.entries
            .retain(|e| !(e.bucket == bucket && e.unencrypted == unencrypted));
        self.entries.push(Entry {
            bucket: String::from(bucket),
            unencrypted,
            encrypted,
            key,
        });

        Ok(())
    }

    /// Returns the encrypted form of the `path` inside of `bucket`.
    ///
    /// `path` can be an object key or a prefix ending with a separator.
    pub(crate) fn encrypt_path(&self, bucket: &str, path: &str) -> Result<String> {
        if self.bypass {
            return Ok(String::from(path));
        }

        Ok(self.encrypt_path_with_key(bucket, path)?.0)
    }

    /// Returns the encrypted form of the `path` inside of `bucket` and the key derived for it.
    ///
    /// It fails when the path encryption is bypassed because no key can be derived from an
    /// encrypted path.
    pub(crate) fn encrypt_path_with_key(&self, bucket: &str, path: &str) -> Result<(String, Key)> {
        if self.bypass {
            return Err(Error::new_uplink(error::Uplink::PermissionDenied(
                String::from("object's content cannot be encrypted when the path encryption is bypassed"),
            )));
        }

        let resolved = self.resolve(bucket, path)?;
        let (enc, key) = path::encrypt_components(resolved.key, &resolved.rest)?;
        let comps: Vec<String> = resolved.prefix.into_iter().chain(enc).collect();

        Ok((comps.join("/"), key))
    }

    /// Returns the plain form of the `encrypted` path inside of `bucket`.
    pub(crate) fn decrypt_path(&self, bucket: &str, encrypted: &str) -> Result<String> {
        if self.bypass {
            return Ok(String::from(encrypted));
        }

        let comps = path::components(encrypted);
        let (key, prefix, consumed) = match self.longest_entry(bucket, &comps, |e| &e.encrypted) {
            Some(e) => (e.key.clone(), e.unencrypted.clone(), e.encrypted.len()),
            None => (self.bucket_key(bucket)?, Vec::new(), 0),
        };

        let (dec, _) = path::decrypt_components(key, &comps[consumed..])?;
        let comps: Vec<String> = prefix.into_iter().chain(dec).collect();
        Ok(comps.join("/"))
    }

    /// Creates a store that only holds the keys of `prefixes`; each prefix is a bucket and a path
    /// inside of it, where an empty path means the whole bucket.
    ///
    /// It returns the new store and the encrypted form of each prefix, in the same order.
    pub(crate) fn share(&self, prefixes: &[(String, String)]) -> Result<(Self, Vec<String>)> {
        let mut shared = Self {
            default_key: None,
            entries: Vec::with_capacity(prefixes.len()),
            bypass: self.bypass,
        };

        let mut encrypted_prefixes = Vec::with_capacity(prefixes.len());
        for (bucket, prefix) in prefixes {
            let prefix = prefix.strip_suffix(SEPARATOR).unwrap_or(prefix);
            let unencrypted: Vec<String> = path::components(prefix)
                .into_iter()
                .map(String::from)
                .collect();

            let (encrypted, key): (Vec<String>, Option<Key>) = if self.bypass {
                (unencrypted.clone(), None)
            } else {
                let resolved = self.resolve(bucket, prefix)?;
                let (enc, key) = path::encrypt_components(resolved.key, &resolved.rest)?;
                (resolved.prefix.into_iter().chain(enc).collect(), Some(key))
            };

            encrypted_prefixes.push(encrypted.join("/"));
            if let Some(key) = key {
                shared.entries.push(Entry {
                    bucket: bucket.clone(),
                    unencrypted,
                    encrypted,
                    key,
                });
            }
        }

        Ok((shared, encrypted_prefixes))
    }

    /// Resolves `path` of `bucket` to the deepest node whose key is held by the store.
    fn resolve<'a>(&self, bucket: &str, path: &'a str) -> Result<Resolved<'a>> {
        let comps = path::components(path);
        match self.longest_entry(bucket, &comps, |e| &e.unencrypted) {
            Some(e) => Ok(Resolved {
                key: e.key.clone(),
                prefix: e.encrypted.clone(),
                rest: comps[e.unencrypted.len()..].to_vec(),
            }),
            None => Ok(Resolved {
                key: self.bucket_key(bucket)?,
                prefix: Vec::new(),
                rest: comps,
            }),
        }
    }

    /// Returns the entry of `bucket` with the longest prefix, selected by `prefix_of`, that
    /// matches the beginning of `comps`.
    fn longest_entry<F>(&self, bucket: &str, comps: &[&str], prefix_of: F) -> Option<&Entry>
    where
        F: Fn(&Entry) -> &Vec<String>,
    {
        self.entries
            .iter()
            .filter(|e| e.bucket == bucket)
            .filter(|e| {
                let prefix = prefix_of(e);
                prefix.len() <= comps.len() && prefix.iter().zip(comps).all(|(p, c)| p == c)
            })
            .max_by_key(|e| prefix_of(e).len())
    }

    /// Returns the key of `bucket` derived from the root key.
    fn bucket_key(&self, bucket: &str) -> Result<Key> {
        match &self.default_key {
            Some(root) => Ok(path::child_key(root, bucket)),
            None => Err(Error::new_uplink(error::Uplink::PermissionDenied(format!(
                "the access grant doesn't hold the encryption key of the requested path in bucket '{}'",
                bucket
            )))),
        }
    }
}
