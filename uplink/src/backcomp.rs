//! Functions kept for backward compatibility with the applications which were written against
//! older versions of this crate.
//!
//! They reach the functionality that they need through the versioned [`expose`](crate::expose)
//! interface, so they fail with [`Error::SdkIncompatibility`] instead of misbehaving if the
//! version they require isn't exposed.

use crate::access::Grant;
use crate::expose::{self, Version};
use crate::{Config, Context, Error, Result};

/// Version of the internal interface used by the functions of this module.
const REQUIRED_VERSION: Version = Version::V1;

/// Generates a new access grant using a passphrase requesting to the satellite a project-based
/// salt for deterministic key derivation, with `concurrency` as the parallelism of the key
/// derivation.
///
/// It behaves as
/// [`Grant::request_access_with_config_and_passphrase`](crate::access::Grant::request_access_with_config_and_passphrase)
/// apart from being governed by `ctx` and using a specific concurrency.
pub fn request_access_with_passphrase_and_concurrency(
    ctx: &Context,
    config: &Config,
    satellite_addr: &str,
    api_key: &str,
    passphrase: &str,
    concurrency: u8,
) -> Result<Grant> {
    request_access_through(
        REQUIRED_VERSION,
        ctx,
        config,
        satellite_addr,
        api_key,
        passphrase,
        concurrency,
    )
}

fn request_access_through(
    version: Version,
    ctx: &Context,
    config: &Config,
    satellite_addr: &str,
    api_key: &str,
    passphrase: &str,
    concurrency: u8,
) -> Result<Grant> {
    let access = expose::lookup(version).ok_or_else(|| {
        Error::SdkIncompatibility(format!(
            "internal interface version {} isn't exposed",
            version.0
        ))
    })?;

    access.request_access_with_passphrase_and_concurrency(
        ctx,
        config,
        satellite_addr,
        api_key,
        passphrase,
        concurrency,
    )
}
