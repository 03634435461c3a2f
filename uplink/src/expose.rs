//! Versioned internal interface exposed to the crates that need to reach functionality which
//! isn't part of the public API, like the [`backcomp`](crate::backcomp) functions.
//!
//! Each version is a trait object with a fixed set of typed methods; a caller asks for the
//! version it was written against and gets `None` when this crate doesn't expose it anymore.

use crate::access::Grant;
use crate::{Config, Context, Result};

/// Identifies a version of the internal interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u32);

impl Version {
    /// The first version of the internal interface.
    pub const V1: Version = Version(1);
}

/// Access grant operations of the internal interface.
pub trait Access: Send + Sync {
    /// Generates a new access grant using a passphrase, governed by `ctx` and using
    /// `concurrency` as the parallelism of the key derivation.
    fn request_access_with_passphrase_and_concurrency(
        &self,
        ctx: &Context,
        config: &Config,
        satellite_addr: &str,
        api_key: &str,
        passphrase: &str,
        concurrency: u8,
    ) -> Result<Grant>;
}

/// Implementation of the version 1.
struct V1;

impl Access for V1 {
    fn request_access_with_passphrase_and_concurrency(
        &self,
        ctx: &Context,
        config: &Config,
        satellite_addr: &str,
        api_key: &str,
        passphrase: &str,
        concurrency: u8,
    ) -> Result<Grant> {
        Grant::request_access_with_passphrase_and_concurrency(
            ctx,
            config,
            satellite_addr,
            api_key,
            passphrase,
            concurrency,
        )
    }
}

/// Returns the internal interface of `version` if this crate exposes it.
pub fn lookup(version: Version) -> Option<&'static dyn Access> {
    match version {
        Version::V1 => Some(&V1),
        _ => None,
    }
}
