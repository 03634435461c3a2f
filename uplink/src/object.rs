//! Storj DCS Object and related types.

pub mod download;
pub mod upload;

pub use download::Download;
pub use upload::Upload;

use crate::encryption::{self, Store};
use crate::project::Session;
use crate::transport::{ListObjectsRequest, ObjectInfo};
use crate::{metadata, Result};

use std::collections::VecDeque;
use std::sync::Arc;

/// Contains information about an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// The identifier of the object inside of the bucket which it belongs.
    ///
    /// When the access grant bypasses the path encryption, it's the encrypted key as the satellite
    /// stores it.
    pub key: String,
    /// Indicates if the key is a prefix for other objects.
    pub is_prefix: bool,
    /// The system metadata associated with the object.
    pub metadata_system: metadata::System,
    /// The custom metadata associated with the object.
    pub metadata_custom: metadata::Custom,
}

impl Info {
    /// Creates a new instance from an object returned by the satellite, decrypting its key with
    /// `store`.
    ///
    /// The system metadata is only set when `system` is true and the custom metadata when
    /// `custom` is true; the custom metadata is never decrypted when `store` bypasses the path
    /// encryption because the object's content key cannot be derived.
    pub(crate) fn from_object_info(
        store: &Store,
        info: &ObjectInfo,
        system: bool,
        custom: bool,
    ) -> Result<Self> {
        let key = store.decrypt_path(&info.bucket, &info.encrypted_key)?;

        let metadata_system = if system && !info.is_prefix {
            metadata::System::from_object_info(info)
        } else {
            metadata::System::default()
        };

        let metadata_custom = if custom
            && !info.is_prefix
            && !store.is_bypass()
            && !info.metadata.custom.is_empty()
        {
            let (_, path_key) = store.encrypt_path_with_key(&info.bucket, &key)?;
            let content_key = encryption::unwrap_key(
                &path_key,
                &info.metadata.encrypted_key,
                &info.metadata.key_nonce,
            )?;
            metadata::Custom::decrypt(&content_key, &info.metadata.custom)?
        } else {
            metadata::Custom::default()
        };

        Ok(Self {
            key,
            is_prefix: info.is_prefix,
            metadata_system,
            metadata_custom,
        })
    }
}

/// Iterates over a collection of objects' information.
///
/// The objects are requested to the satellite lazily, one page at a time, and their keys are
/// decrypted as they are returned. The iteration ends after returning the first error.
#[derive(Debug)]
pub struct Iterator {
    session: Arc<Session>,
    req: ListObjectsRequest,
    system: bool,
    custom: bool,
    page: VecDeque<ObjectInfo>,
    more: bool,
    done: bool,
}

impl Iterator {
    /// Creates an iterator over the objects of `bucket` whose encrypted key starts with
    /// `encrypted_prefix` and sorts after `encrypted_cursor`.
    pub(crate) fn new(
        session: Arc<Session>,
        bucket: &str,
        encrypted_prefix: String,
        encrypted_cursor: String,
        recursive: bool,
        system: bool,
        custom: bool,
    ) -> Self {
        let limit = session.config().list_page_size();
        Self {
            session,
            req: ListObjectsRequest {
                bucket: String::from(bucket),
                encrypted_prefix,
                encrypted_cursor,
                recursive,
                limit,
            },
            system,
            custom,
            page: VecDeque::new(),
            more: true,
            done: false,
        }
    }

    /// Requests the next page of objects.
    fn fetch(&mut self) -> Result<()> {
        let req = &self.req;
        let page = self
            .session
            .call(|sat, ctx, key| sat.list_objects(ctx, key, req))?;

        self.more = page.more && !page.items.is_empty();
        if let Some(last) = page.items.last() {
            self.req.encrypted_cursor = last.encrypted_key.clone();
        }
        self.page.extend(page.items);

        Ok(())
    }
}

impl std::iter::Iterator for Iterator {
    type Item = Result<Info>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.page.is_empty() {
            if !self.more {
                self.done = true;
                return None;
            }

            if let Err(err) = self.fetch() {
                self.done = true;
                return Some(Err(err));
            }
        }

        let info = self.page.pop_front()?;
        let res = Info::from_object_info(
            self.session.encryption(),
            &info,
            self.system,
            self.custom,
        );
        if res.is_err() {
            self.done = true;
        }

        Some(res)
    }
}
