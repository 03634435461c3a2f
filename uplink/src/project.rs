//! Storj DCS Project.

pub mod options;
mod session;

pub(crate) use session::Session;

use crate::access::Grant;
use crate::config::Config;
use crate::encryption;
use crate::{bucket, error, helpers, object, Bucket, Context, Error, Result};

use std::sync::Arc;

/// Provides access to manage buckets and objects.
///
/// A project is opened from an access grant and it only allows the operations that the access
/// grant allows. The satellite verifies the permissions of each call while the encryption keys of
/// the access grant limit the paths that can be encrypted and decrypted locally.
#[derive(Debug)]
pub struct Project {
    session: Arc<Session>,
}

impl Project {
    /// Opens a project with the specified access grant.
    ///
    /// It uses the default [`Config`].
    pub fn open(grant: &Grant) -> Result<Self> {
        Self::open_with_config(grant, &Config::default())
    }

    /// Opens a project with the specified access grant and configuration.
    pub fn open_with_config(grant: &Grant, config: &Config) -> Result<Self> {
        Self::open_with_context(grant, config, Context::background())
    }

    /// Opens a project with the specified access grant and configuration whose operations are
    /// governed by `ctx`. Once `ctx` is canceled, every operation of the project, and of the
    /// uploads, downloads and iterators created from it, fail with an
    /// [`error::Uplink::Canceled`] error.
    ///
    /// It returns an [`error::Uplink::AuthorizationExpired`] error if the current time is out of
    /// the validity period of the access grant.
    pub fn open_with_context(grant: &Grant, config: &Config, ctx: Context) -> Result<Self> {
        grant.api_key().check_time(helpers::unix_now())?;

        ctx.check()?;
        let satellite = config
            .dialer()
            .dial(&ctx.with_timeout(config.dial_timeout()), grant.satellite_url())?;

        tracing::debug!(
            satellite = %grant.satellite_url(),
            user_agent = config.user_agent(),
            "project opened"
        );

        Ok(Self {
            session: Arc::new(Session::new(
                satellite,
                grant.api_key().clone(),
                grant.encryption().clone(),
                ctx,
                config.clone(),
            )),
        })
    }

    /// Closes the project.
    ///
    /// The uploads, downloads and iterators created from the project keep working until they are
    /// dropped.
    pub fn close(self) -> Result<()> {
        tracing::debug!("project closed");
        Ok(())
    }

    /// Creates a new bucket.
    ///
    /// It returns the bucket information and `true` when it's created or `false` if it already
    /// existed.
    pub fn create_bucket(&self, bucket: &str) -> Result<(Bucket, bool)> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;

        match self
            .session
            .call(|sat, ctx, key| sat.create_bucket(ctx, key, bucket))
        {
            Ok(info) => Ok((Bucket::from_bucket_info(info), true)),
            Err(Error::Uplink(error::Uplink::BucketAlreadyExists(_))) => {
                Ok((self.stat_bucket(bucket)?, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes a bucket.
    ///
    /// It returns an [`crate::Error::Uplink`] error with [`crate::error::Uplink::BucketNotEmpty`]
    /// variant if `bucket` isn't empty.
    pub fn delete_bucket(&self, bucket: &str) -> Result<Bucket> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;

        self.session
            .call(|sat, ctx, key| sat.delete_bucket(ctx, key, bucket, false))
            .map(Bucket::from_bucket_info)
    }

    /// Deletes a bucket and all its objects.
    pub fn delete_bucket_with_objects(&self, bucket: &str) -> Result<Bucket> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;

        self.session
            .call(|sat, ctx, key| sat.delete_bucket(ctx, key, bucket, true))
            .map(Bucket::from_bucket_info)
    }

    /// Deletes the object inside of `bucket` and referenced with `key`.
    ///
    /// It returns `None` if the object doesn't exist.
    pub fn delete_object(&self, bucket: &str, key: &str) -> Result<Option<object::Info>> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;
        helpers::not_empty_str_fn_arg("key", key)?;

        let store = self.session.encryption();
        let encrypted_key = store.encrypt_path(bucket, key)?;

        match self
            .session
            .call(|sat, ctx, api_key| sat.delete_object(ctx, api_key, bucket, &encrypted_key))
        {
            Ok(info) => object::Info::from_object_info(store, &info, true, true).map(Some),
            Err(Error::Uplink(error::Uplink::ObjectNotFound(_))) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Starts a download of the object inside of `bucket` and referenced with `key` with optional
    /// options.
    ///
    /// It fails before reading any byte if the access grant doesn't allow downloading the object.
    pub fn download_object(
        &self,
        bucket: &str,
        key: &str,
        opts: Option<&options::Download>,
    ) -> Result<object::Download> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;
        helpers::not_empty_str_fn_arg("key", key)?;

        let opts = opts.copied().unwrap_or_default();
        let store = self.session.encryption();
        let (encrypted_key, path_key) = store.encrypt_path_with_key(bucket, key)?;

        let resp = self
            .session
            .call(|sat, ctx, api_key| sat.download_object(ctx, api_key, bucket, &encrypted_key))?;

        let content_key = encryption::unwrap_key(
            &path_key,
            &resp.object.metadata.encrypted_key,
            &resp.object.metadata.key_nonce,
        )?;
        let info = object::Info::from_object_info(store, &resp.object, true, true)?;

        object::Download::new(
            Arc::clone(&self.session),
            bucket,
            encrypted_key,
            content_key,
            info,
            resp.segments,
            opts.offset,
            opts.length,
        )
    }

    /// Returns the bucket if it exists otherwise it creates it.
    pub fn ensure_bucket(&self, bucket: &str) -> Result<Bucket> {
        self.create_bucket(bucket).map(|(b, _)| b)
    }

    /// Returns an iterator over the list of existing buckets with optional options.
    pub fn list_buckets(&self, opts: Option<&options::ListBuckets>) -> bucket::Iterator {
        bucket::Iterator::new(
            Arc::clone(&self.session),
            opts.map(|o| o.cursor()).unwrap_or_default(),
        )
    }

    /// Returns an iterator over the list of existing object inside of `bucket` with optional
    /// options.
    ///
    /// It fails if the prefix or the cursor of the options cannot be encrypted with the keys of
    /// the access grant.
    pub fn list_objects(
        &self,
        bucket: &str,
        opts: Option<&options::ListObjects>,
    ) -> Result<object::Iterator> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;

        let default_opts = options::ListObjects::default();
        let opts = opts.unwrap_or(&default_opts);
        let store = self.session.encryption();

        let encrypted_prefix = if opts.prefix().is_empty() {
            String::new()
        } else {
            store.encrypt_path(bucket, opts.prefix())?
        };

        let encrypted_cursor = if opts.cursor().is_empty() {
            String::new()
        } else {
            store.encrypt_path(bucket, opts.cursor())?
        };

        Ok(object::Iterator::new(
            Arc::clone(&self.session),
            bucket,
            encrypted_prefix,
            encrypted_cursor,
            opts.recursive,
            opts.system,
            opts.custom,
        ))
    }

    /// Revokes the API key embedded in `access`.
    ///
    /// When an access grant is revoked, the rest of the further-restricted access grants (via the
    /// [`crate::access::Grant::share`]) are revoked.
    ///
    /// An access grant is authorized to revoke any of its further-restricted access grants. It
    /// cannot revoke itself. Revoking an access grant which is not one of its further-restricted
    /// access grants will return an error.
    pub fn revoke_access(&self, access: &Grant) -> Result<()> {
        self.session
            .call(|sat, ctx, key| sat.revoke_api_key(ctx, key, access.api_key()))?;

        tracing::debug!(satellite = %access.satellite_url(), "access grant revoked");
        Ok(())
    }

    /// Returns the bucket's information.
    pub fn stat_bucket(&self, bucket: &str) -> Result<Bucket> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;

        self.session
            .call(|sat, ctx, key| sat.get_bucket(ctx, key, bucket))
            .map(Bucket::from_bucket_info)
    }

    /// Returns the object's information inside of `bucket` and reference by `key`.
    pub fn stat_object(&self, bucket: &str, key: &str) -> Result<object::Info> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;
        helpers::not_empty_str_fn_arg("key", key)?;

        let store = self.session.encryption();
        let encrypted_key = store.encrypt_path(bucket, key)?;
        let info = self
            .session
            .call(|sat, ctx, api_key| sat.get_object(ctx, api_key, bucket, &encrypted_key))?;

        object::Info::from_object_info(store, &info, true, true)
    }

    /// Starts an object upload into `bucket` with the specified `key` and optional options.
    ///
    /// The upload doesn't reach the satellite until the first write or the commit, so the
    /// permissions of the access grant are verified at that point.
    ///
    /// It returns an [`error::Uplink::PermissionDenied`] error if the access grant bypasses the
    /// path encryption because the content of the objects cannot be encrypted.
    pub fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        opts: Option<&options::Upload>,
    ) -> Result<object::Upload> {
        helpers::not_empty_str_fn_arg("bucket", bucket)?;
        helpers::not_empty_str_fn_arg("key", key)?;

        if self.session.encryption().is_bypass() {
            return Err(Error::new_uplink(error::Uplink::PermissionDenied(
                String::from("objects cannot be uploaded when the path encryption is bypassed"),
            )));
        }

        Ok(object::Upload::new(
            Arc::clone(&self.session),
            bucket,
            key,
            opts.and_then(|o| o.expires()),
        ))
    }
}
