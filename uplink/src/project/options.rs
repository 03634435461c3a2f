//! All the Storj DCS options types related to a Project.

use crate::{Error, Result};

use std::time::Duration;

/// Options for downloading an object.
#[derive(Debug, Clone, Copy)]
pub struct Download {
    /// The initial point of the object's blob to download.
    /// If it's negative, it will start at the suffix of the blob but it's isn't supported to be
    /// negative with a positive `length`.
    pub offset: i64,
    /// The length of the blob starting from `offset` to download.
    /// If it's negative, it will read until the end of the blob.
    pub length: i64,
}

impl Default for Download {
    fn default() -> Self {
        Self {
            offset: 0,
            length: -1,
        }
    }
}

/// Options for listing buckets.
#[derive(Debug, Default, Clone)]
pub struct ListBuckets {
    /// It's the starting position of the iterator. The first item of the list
    /// is the one right after the cursor.
    cursor: String,
}

impl ListBuckets {
    /// Creates options for listing buckets with the specified cursor value.
    /// It returns an error if `cursor` is empty.
    pub fn with_cursor(cursor: &str) -> Result<Self> {
        if cursor.is_empty() {
            return Err(Error::new_invalid_arguments("cursor", "cannot be empty"));
        }

        Ok(Self {
            cursor: String::from(cursor),
        })
    }

    /// Returns the cursor.
    pub(crate) fn cursor(&self) -> &str {
        &self.cursor
    }
}

/// Options for listing objects.
#[derive(Debug, Default, Clone)]
pub struct ListObjects {
    /// Only list objects with this key prefix. When not empty, it must ends with slash.
    prefix: String,
    /// Specifies the starting position of the iterator by offsetting from the first object of the
    /// list.
    /// The first item of the list is the one after the cursor.
    /// The list of objects depends on the `prefix`.
    cursor: String,
    /// Iterate the objects without collapsing prefixes.
    pub recursive: bool,
    /// Include the "system metadata" associated with the objects.
    pub system: bool,
    /// Include the "custom metadata" associated with the objects.
    pub custom: bool,
}

impl ListObjects {
    /// Creates options of listing objects options with the specified prefix.
    ///
    /// `prefix` must not be empty and end with '/'.
    pub fn with_prefix(prefix: &str) -> Result<Self> {
        validate_prefix(prefix)?;
        Ok(Self::new(prefix, ""))
    }

    /// Creates options of listing objects options with the specified cursor.
    ///
    /// `cursor` must not be empty.
    pub fn with_cursor(cursor: &str) -> Result<Self> {
        validate_cursor(cursor)?;
        Ok(Self::new("", cursor))
    }

    /// Creates options of listing objects options with the specified prefix and cursor.
    ///
    /// `prefix` and `cursor` must not be empty and `prefix` must also end with '/'.
    pub fn with_prefix_and_cursor(prefix: &str, cursor: &str) -> Result<Self> {
        validate_prefix(prefix)?;
        validate_cursor(cursor)?;
        Ok(Self::new(prefix, cursor))
    }

    fn new(prefix: &str, cursor: &str) -> Self {
        Self {
            prefix: String::from(prefix),
            cursor: String::from(cursor),
            ..Default::default()
        }
    }

    /// Returns the prefix.
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the cursor.
    pub(crate) fn cursor(&self) -> &str {
        &self.cursor
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if !prefix.ends_with('/') {
        return Err(Error::new_invalid_arguments(
            "prefix",
            "cannot be empty and must end with '/'",
        ));
    }

    Ok(())
}

fn validate_cursor(cursor: &str) -> Result<()> {
    if cursor.is_empty() {
        return Err(Error::new_invalid_arguments("cursor", "cannot be empty"));
    }

    Ok(())
}

/// Options for uploading objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct Upload {
    /// Determine when the object expires.
    ///
    /// The time is measured with the number of seconds since the Unix Epoch time. 0 is never and
    /// it's the same as `None`.
    pub expires: Option<Duration>,
}

impl Upload {
    /// Returns the expiration time, normalizing zero to `None`.
    pub(crate) fn expires(&self) -> Option<Duration> {
        self.expires.filter(|e| !e.is_zero())
    }
}
