//! Access grants, permission scoped encryption and object storage client for Storj-like clusters.
//!
//! An [`access::Grant`] holds everything needed for accessing a project: the URL of the
//! satellite, an API key and the encryption keys of the object's paths. Access grants can be
//! shared with fewer permissions, a time window and a set of bucket's prefixes; the shared access
//! grant only holds the encryption keys of those prefixes, so the rest of the paths can neither
//! be encrypted nor decrypted with it.
//!
//! A [`Project`] is opened with an access grant for managing buckets and uploading, downloading,
//! listing and deleting objects.

#![deny(missing_docs)]

pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod encryption;
pub(crate) mod encryption_key;
pub(crate) mod helpers;
pub(crate) mod project;

pub mod access;
pub mod backcomp;
pub mod bucket;
pub mod error;
pub mod expose;
pub mod macaroon;
pub mod metadata;
pub mod object;
pub mod private;
pub mod transport;

pub use bucket::Bucket;
pub use config::Config;
pub use context::Context;
pub use encryption_key::EncryptionKey;
pub use error::Error;
pub use project::{options, Project};

/// A specialized [`Result`](https://doc.rust-lang.org/std/result/enum.Result.html)
/// type for Uplink operations.
///
/// This type is broadly used across this crate for any operations which may
/// produce an error.
///
/// This type is generally used to avoid writing out `uplink::Error`
/// directly and reduce repetition making the signature functions more concise.
pub type Result<T> = std::result::Result<T, error::Error>;
