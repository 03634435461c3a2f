//! Access Grant and bound types.

use crate::config::Config;
use crate::encryption::{self, Store};
use crate::macaroon::{ApiKey, Caveat, CaveatPath};
use crate::transport::NodeUrl;
use crate::{helpers, Context, EncryptionKey, Error, Result};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Version of the access grant serialization format.
const SERIALIZATION_VERSION: u8 = 0;
/// Number of bytes of the checksum appended to the serialized access grants.
const CHECKSUM_SIZE: usize = 4;

/// Represents an access grant
///
/// An access grant contains everything to access a project and specific buckets.
///
/// It includes a potentially-restricted API Key, a potentially-restricted set of encryption
/// information, and information about the Satellite responsible for the project's metadata.
///
/// An access grant is immutable through [`Self::share`], which always returns a new independent
/// access grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    satellite: NodeUrl,
    api_key: ApiKey,
    encryption: Store,
}

impl Grant {
    /// Creates a new access grant from a serialized access grant string.
    pub fn new(serialized_access: &str) -> Result<Self> {
        helpers::not_empty_str_fn_arg("serialized_access", serialized_access)?;

        let bytes = URL_SAFE_NO_PAD.decode(serialized_access).map_err(|err| {
            Error::InvalidCredentials(format!("invalid access grant encoding: {}", err))
        })?;

        if bytes.len() <= CHECKSUM_SIZE {
            return Err(Error::InvalidCredentials(String::from(
                "invalid access grant: too short",
            )));
        }

        let (data, checksum) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
        if checksum != &blake3::hash(data).as_bytes()[..CHECKSUM_SIZE] {
            return Err(Error::InvalidCredentials(String::from(
                "invalid access grant: checksum mismatch",
            )));
        }

        match data.split_first() {
            Some((&SERIALIZATION_VERSION, payload)) => bincode::deserialize(payload)
                .map_err(|err| Error::InvalidCredentials(format!("invalid access grant: {}", err))),
            Some((version, _)) => Err(Error::InvalidCredentials(format!(
                "invalid access grant: unsupported version {}",
                version
            ))),
            None => Err(Error::InvalidCredentials(String::from(
                "invalid access grant: empty",
            ))),
        }
    }

    /// Generates a new access grant using a passphrase requesting to the satellite a project-based
    /// salt for deterministic key derivation.
    ///
    /// It uses the default [`Config`].
    pub fn request_access_with_passphrase(
        satellite_addr: &str,
        api_key: &str,
        passphrase: &str,
    ) -> Result<Self> {
        Self::request_access_with_config_and_passphrase(
            &Config::default(),
            satellite_addr,
            api_key,
            passphrase,
        )
    }

    /// Generates a new access grant using the configuration and the specific satellite address, API
    /// key, and passphrase.
    /// It connects to the satellite address for getting a project-based salt for deterministic key
    /// derivation.
    ///
    /// `satellite_addr` is the node URL of the satellite (i.e. `<node id>@<address>`).
    ///
    /// NOTE: this is a CPU-heavy operation that uses a password-based key derivation (Argon2). It
    /// should be a setup-only step. Most common interactions with the library should be using a
    /// serialized access grant through [`Grant::new()`](Self::new).
    pub fn request_access_with_config_and_passphrase(
        config: &Config,
        satellite_addr: &str,
        api_key: &str,
        passphrase: &str,
    ) -> Result<Self> {
        Self::request_access_with_passphrase_and_concurrency(
            &Context::background(),
            config,
            satellite_addr,
            api_key,
            passphrase,
            encryption::DEFAULT_KDF_CONCURRENCY,
        )
    }

    /// Generates a new access grant like [`Self::request_access_with_config_and_passphrase`] but
    /// governed by `ctx` and using `concurrency` as the parallelism of the key derivation.
    pub(crate) fn request_access_with_passphrase_and_concurrency(
        ctx: &Context,
        config: &Config,
        satellite_addr: &str,
        api_key: &str,
        passphrase: &str,
        concurrency: u8,
    ) -> Result<Self> {
        helpers::not_empty_str_fn_arg("satellite_addr", satellite_addr)?;
        helpers::not_empty_str_fn_arg("api_key", api_key)?;
        helpers::not_empty_str_fn_arg("passphrase", passphrase)?;

        let satellite: NodeUrl = satellite_addr.parse()?;
        let api_key = ApiKey::parse(api_key)?;

        ctx.check()?;
        let sat = config
            .dialer()
            .dial(&ctx.with_timeout(config.dial_timeout()), &satellite)?;
        ctx.check()?;
        let info = sat.project_info(ctx, &api_key)?;
        ctx.check()?;

        let root = encryption::derive_root_key(passphrase.as_bytes(), &info.salt, concurrency)?;
        tracing::debug!(satellite = %satellite, concurrency, "access grant derived from passphrase");

        Ok(Self {
            satellite,
            api_key,
            encryption: Store::new(root),
        })
    }

    /// Overrides the root encryption key for the prefix in bucket with the encryption key.
    /// `prefix` must be empty or end with slash (i.e. `/`), otherwise it returns an error.
    ///
    /// This method is useful for overriding the encryption key in user-specific access grants when
    /// implementing multitenancy in a single app bucket.
    pub fn override_encryption_key(
        &mut self,
        bucket: &str,
        prefix: &str,
        encryption_key: &EncryptionKey,
    ) -> Result<()> {
        helpers::bucket_fn_arg("bucket", bucket)?;

        if !prefix.is_empty() && !prefix.ends_with('/') {
            return Err(Error::new_invalid_arguments(
                "prefix",
                "must be empty or end with a slash (i.e. '/')",
            ));
        }

        self.encryption
            .add(bucket, prefix, encryption_key.key().clone())
    }

    /// Returns the satellite node URL associated with this access grant.
    pub fn satellite_address(&self) -> String {
        self.satellite.to_string()
    }

    /// Serializes an access grant such that it can be used to create a [`Self::new()`] instance of
    /// this type.
    pub fn serialize(&self) -> Result<String> {
        let mut data = vec![SERIALIZATION_VERSION];
        data.extend(
            bincode::serialize(self)
                .map_err(|err| Error::new_internal("encoding access grant", err.into()))?,
        );

        let checksum = blake3::hash(&data);
        data.extend_from_slice(&checksum.as_bytes()[..CHECKSUM_SIZE]);

        Ok(URL_SAFE_NO_PAD.encode(data))
    }

    /// Creates a new access grant with specific permissions.
    ///
    /// An access grant can only have their existing permissions restricted, and the resulting
    /// access will only allow for the intersection of all previous share calls in the access
    /// construction chain.
    ///
    /// Prefixes restrict the access grant (and internal encryption information) to only contain
    /// enough information to allow access to just those prefixes.
    ///
    /// It returns [`Error::EmptyPermission`] if `permission` doesn't allow any operation and
    /// [`Error::InvalidTimeWindow`] if its not before is after its not after.
    ///
    /// To revoke an access grant see [`Project.revoke_access()`](crate::Project::revoke_access).
    pub fn share(&self, permission: &Permission, prefixes: Vec<SharePrefix>) -> Result<Grant> {
        if permission.is_empty() {
            return Err(Error::EmptyPermission);
        }

        if let (Some(not_before), Some(not_after)) = (permission.not_before, permission.not_after) {
            if not_before > not_after {
                return Err(Error::InvalidTimeWindow {
                    not_before,
                    not_after,
                });
            }
        }

        let prefixes: Vec<(String, String)> = prefixes
            .into_iter()
            .map(|sp| (sp.bucket, sp.prefix))
            .collect();

        let (encryption, allowed_paths) = if prefixes.is_empty() {
            (self.encryption.clone(), Vec::new())
        } else {
            let (store, encrypted) = self.encryption.share(&prefixes)?;
            let paths = prefixes
                .iter()
                .zip(encrypted)
                .map(|((bucket, _), encrypted_path_prefix)| CaveatPath {
                    bucket: bucket.clone(),
                    encrypted_path_prefix,
                })
                .collect();
            (store, paths)
        };

        let api_key = self.api_key.restrict(&Caveat {
            disallow_reads: !permission.allow_download,
            disallow_writes: !permission.allow_upload,
            disallow_lists: !permission.allow_list,
            disallow_deletes: !permission.allow_delete,
            allowed_paths,
            not_before: permission.not_before,
            not_after: permission.not_after,
            nonce: rand::random(),
        })?;

        tracing::debug!(
            satellite = %self.satellite,
            prefixes = prefixes.len(),
            "access grant shared"
        );

        Ok(Grant {
            satellite: self.satellite.clone(),
            api_key,
            encryption,
        })
    }

    /// Returns the node URL of the satellite.
    pub(crate) fn satellite_url(&self) -> &NodeUrl {
        &self.satellite
    }

    /// Returns the API key.
    pub(crate) fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the encryption access.
    pub(crate) fn encryption(&self) -> &Store {
        &self.encryption
    }

    /// Returns the encryption access for mutating it.
    pub(crate) fn encryption_mut(&mut self) -> &mut Store {
        &mut self.encryption
    }
}

/// Represents a prefix to be shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePrefix {
    bucket: String,
    prefix: String,
}

impl SharePrefix {
    /// Create a new prefix to be shared in the specified bucket.
    ///
    /// The prefix is matched by whole path components, so `videos` and `videos/` share the same
    /// prefix, which doesn't include `videosandmore/`. An empty prefix shares the whole bucket.
    ///
    /// It returns an error if bucket is empty or contains a slash.
    pub fn new(bucket: &str, prefix: &str) -> Result<Self> {
        helpers::bucket_fn_arg("bucket", bucket)?;

        Ok(SharePrefix {
            bucket: String::from(bucket),
            prefix: String::from(prefix),
        })
    }

    /// Create a new prefix to share the whole bucket.
    pub fn full_bucket(bucket: &str) -> Result<Self> {
        Self::new(bucket, "")
    }

    /// Returns the bucket where the prefix to be shared belongs.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the actual prefix to be shared.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Defines what actions and an optional specific period of time are granted to a shared access
/// grant.
///
/// A shared access grant can never has more permission that its parent, hence even some allowed
/// permission is set for the shared access Grant but not to its parent, the shared access Grant
/// won't be allowed. See [`Grant.share()`](Grant::share).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permission {
    /// Gives permission to download the content of the objects and to get the information and
    /// metadata of the buckets and objects, but it does not allow listing them.
    pub allow_download: bool,
    /// Gives permission to create buckets and upload new objects. It does not allow overwriting
    /// existing objects unless allow_delete is granted too.
    pub allow_upload: bool,
    /// Gives permission to list buckets and objects, including the metadata of the listed
    /// objects. It does not allow downloading the content of the objects.
    pub allow_list: bool,
    /// Gives permission to delete buckets and objects.
    pub allow_delete: bool,
    /// Restricts when the resulting access grant is valid for. If it is set then it must be before
    /// or equal to not_after and the resulting access grant will not work if the satellite
    /// believes the time is before the set it one.
    ///
    /// The time is measured since the Unix Epoch time.
    pub not_before: Option<Duration>,
    /// Restricts when the resulting access grant is valid for. If it is set then it must be after
    /// or equal to not_before and the resulting access grant will not work if the satellite
    /// believes the time is after the set it one.
    ///
    /// The time is measured since the Unix Epoch time.
    pub not_after: Option<Duration>,
}

impl Permission {
    /// Creates a permission that doesn't allow any operation, which is the default permission.
    /// This constructor is useful for creating a permission for after setting the specific allowed
    /// operations when none of the other constructors creates a permission with a set of allowed
    /// operations that works for your use case.
    pub fn new() -> Permission {
        Permission {
            ..Default::default()
        }
    }

    /// Creates a permission that allows all the operations (i.e. Downloading, uploading, listing
    /// and deleting).
    pub fn full() -> Permission {
        Permission {
            allow_download: true,
            allow_upload: true,
            allow_list: true,
            allow_delete: true,
            not_before: None,
            not_after: None,
        }
    }

    /// Creates a permission that allows for reading (i.e. Downloading) and  listing.
    pub fn read_only() -> Permission {
        Permission {
            allow_download: true,
            allow_upload: false,
            allow_list: true,
            allow_delete: false,
            not_before: None,
            not_after: None,
        }
    }

    /// Creates a permission that allows for writing (i.e. Uploading) and deleting.
    pub fn write_only() -> Permission {
        Permission {
            allow_download: false,
            allow_upload: true,
            allow_list: false,
            allow_delete: true,
            not_before: None,
            not_after: None,
        }
    }

    /// Returns true if the permission doesn't allow any operation.
    pub fn is_empty(&self) -> bool {
        !(self.allow_download || self.allow_upload || self.allow_list || self.allow_delete)
    }
}
