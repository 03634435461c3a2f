//! Object's metadata types.

use crate::encryption::{self, Key};
use crate::transport::ObjectInfo;
use crate::{Error, Result};

use std::collections::HashMap;
use std::time::Duration;

/// It's a container for custom information of a specific "item".
/// It's provided by the users as key-value pairs which must only contain valid
/// UTF-8 characters. Keys are unique, so only one value can be associated with
/// it.
///
/// By convention an application that stores metadata should prepend to the keys
/// a prefix, for example an application named "Image Board" might use the
/// "image-board:" prefix and a key could be "image-board:title".
///
/// The satellite only stores it encrypted with the key of the object's content.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Custom {
    /// The key-value pairs.
    entries: HashMap<String, String>,
}

impl Custom {
    /// Creates an empty custom metadata with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the current number of entries (i.e. key-value pairs).
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Gets the entry's value associated with the passed key. Returns none if
    /// there isn't any entry associated to the key.
    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }

    /// Inserts a new entry with the specified key and value, returning false if
    /// the key didn't exit, otherwise true and replace the value associated to
    /// the key.
    pub fn insert(&mut self, key: String, value: String) -> bool {
        self.entries.insert(key, value).is_some()
    }

    /// An iterator for visiting all the metadata key-value pairs.
    pub fn iter(&self) -> impl std::iter::Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Deletes the entry with the associated key, returning false if the key
    /// didn't exist, otherwise true.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Encrypts the entries with the object's content key.
    ///
    /// Empty metadata is encrypted to an empty vector, so objects without custom metadata don't
    /// store anything.
    pub(crate) fn encrypt(&self, content_key: &Key) -> Result<Vec<u8>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(&String, &String)> = self.entries.iter().collect();
        entries.sort();
        let plain = bincode::serialize(&entries)
            .map_err(|err| Error::new_internal("encoding custom metadata", err.into()))?;

        encryption::seal(content_key, &encryption::metadata_nonce(), &plain)
    }

    /// Decrypts metadata encrypted with [`Self::encrypt`].
    pub(crate) fn decrypt(content_key: &Key, encrypted: &[u8]) -> Result<Self> {
        if encrypted.is_empty() {
            return Ok(Self::default());
        }

        let plain = encryption::open(content_key, &encryption::metadata_nonce(), encrypted)
            .ok_or_else(|| {
                Error::new_internal_without_inner(
                    "custom metadata cannot be decrypted with the object's content key",
                )
            })?;

        let entries: Vec<(String, String)> = bincode::deserialize(&plain)
            .map_err(|err| Error::new_internal("decoding custom metadata", err.into()))?;

        Ok(Self {
            entries: entries.into_iter().collect(),
        })
    }
}

/// It's a container of system information of a specific "item".
/// It's provided by the service and only the service can alter it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct System {
    /// When the associated "item" was created.
    ///
    /// The time is measured since the Unix Epoch time. It's zero for items which aren't
    /// committed yet and for prefixes.
    pub created: Duration,
    /// When the associated "item" expires. When it never expires is `None`.
    ///
    /// The time is measured since the Unix Epoch time.
    pub expires: Option<Duration>,
    /// Then length of the data associated to this metadata.
    pub content_length: u64,
}

impl System {
    /// Creates the system metadata of an object returned by the satellite.
    pub(crate) fn from_object_info(info: &ObjectInfo) -> Self {
        Self {
            created: info.created,
            expires: info.expires,
            content_length: info.content_length,
        }
    }
}
