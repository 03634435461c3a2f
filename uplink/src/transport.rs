//! Contract between the client and the satellites.
//!
//! The client never talks to the satellites directly; it dials them through a [`Dialer`], which
//! returns a handle implementing [`Satellite`]. The default dialer resolves the addresses through
//! the process-local [`local::Network`], where the in-process satellites register themselves.

pub mod local;

use crate::macaroon::ApiKey;
use crate::{Context, Error, Result};

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Identifies a node of the network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut id = [0u8; 32];
        hex::decode_to_slice(s, &mut id)
            .map_err(|err| Error::InvalidCredentials(format!("invalid node ID '{}': {}", s, err)))?;
        Ok(Self(id))
    }
}

/// The URL of a node: its ID and its address separated by `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeUrl {
    /// The node's ID.
    pub id: NodeId,
    /// The address where the node is reachable.
    pub address: String,
}

impl fmt::Display for NodeUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

impl FromStr for NodeUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (id, address) = s.split_once('@').ok_or_else(|| {
            Error::InvalidCredentials(format!(
                "invalid node URL '{}': expected '<node id>@<address>'",
                s
            ))
        })?;

        if address.is_empty() {
            return Err(Error::InvalidCredentials(format!(
                "invalid node URL '{}': empty address",
                s
            )));
        }

        Ok(Self {
            id: id.parse()?,
            address: String::from(address),
        })
    }
}

/// Information of the project which owns an API key.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    /// The salt used for deriving the root encryption key from a passphrase.
    pub salt: Vec<u8>,
}

/// A bucket as the satellite stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// The bucket's name.
    pub name: String,
    /// The creation time, measured since the Unix Epoch time.
    pub created: Duration,
}

/// Request of a page of buckets.
#[derive(Debug, Clone, Default)]
pub struct ListBucketsRequest {
    /// Only the buckets whose name sorts after it are returned.
    pub cursor: String,
    /// Maximum number of buckets to return.
    pub limit: usize,
}

/// A page of buckets sorted by name.
#[derive(Debug, Clone, Default)]
pub struct BucketPage {
    /// The buckets.
    pub items: Vec<BucketInfo>,
    /// True if there are more buckets after the last of `items`.
    pub more: bool,
}

/// Identifies an upload in progress.
pub type StreamId = u64;

/// Request of a new upload.
#[derive(Debug, Clone)]
pub struct BeginObjectRequest {
    /// The bucket's name.
    pub bucket: String,
    /// The encrypted object's key.
    pub encrypted_key: String,
    /// The expiration time, measured since the Unix Epoch time.
    pub expires: Option<Duration>,
}

/// A started upload.
#[derive(Debug, Clone)]
pub struct BeginObjectResponse {
    /// Identifies the upload in the subsequent calls.
    pub stream_id: StreamId,
    /// Maximum number of plain bytes of each segment.
    pub max_segment_size: usize,
}

/// A segment of an upload.
#[derive(Debug, Clone)]
pub struct SegmentUploadRequest {
    /// The upload.
    pub stream_id: StreamId,
    /// The segment's position in the object, starting at 0.
    pub index: u32,
    /// The encrypted segment's data.
    pub encrypted_data: Vec<u8>,
    /// The size of the segment's data before encrypting it.
    pub plain_size: u64,
}

/// Encrypted metadata of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptedMetadata {
    /// The object's content key encrypted with the key derived from the object's path.
    pub encrypted_key: Vec<u8>,
    /// The nonce used for encrypting `encrypted_key`.
    pub key_nonce: Vec<u8>,
    /// The custom metadata encrypted with the content key.
    pub custom: Vec<u8>,
}

/// An object as the satellite stores it.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// The bucket's name.
    pub bucket: String,
    /// The encrypted object's key.
    pub encrypted_key: String,
    /// True if the entry is a prefix collapsed by a non recursive listing.
    pub is_prefix: bool,
    /// The commit time, measured since the Unix Epoch time.
    pub created: Duration,
    /// The expiration time, measured since the Unix Epoch time.
    pub expires: Option<Duration>,
    /// The size of the object's plain content.
    pub content_length: u64,
    /// The encrypted metadata.
    pub metadata: EncryptedMetadata,
}

/// Request of a page of objects.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    /// The bucket's name.
    pub bucket: String,
    /// Only the objects whose encrypted key starts with it are returned. It's empty or it ends
    /// with `/`.
    pub encrypted_prefix: String,
    /// Only the objects whose encrypted key sorts after it are returned.
    pub encrypted_cursor: String,
    /// When false, the keys are collapsed at the first `/` after the prefix.
    pub recursive: bool,
    /// Maximum number of objects to return.
    pub limit: usize,
}

/// A page of objects sorted by encrypted key.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// The objects.
    pub items: Vec<ObjectInfo>,
    /// True if there are more objects after the last of `items`.
    pub more: bool,
}

/// The position and size of a segment of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// The segment's position in the object, starting at 0.
    pub index: u32,
    /// The size of the segment's plain data.
    pub plain_size: u64,
}

/// A download authorized by the satellite.
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    /// The object.
    pub object: ObjectInfo,
    /// The segments of the object sorted by index.
    pub segments: Vec<SegmentInfo>,
}

/// The metainfo service of a satellite.
///
/// Every call is authorized with `api_key` at the satellite's current time and it must observe
/// `ctx`, returning an [`error::Uplink::Canceled`](crate::error::Uplink::Canceled) error if it's
/// done before finishing.
pub trait Satellite: Send + Sync {
    /// Returns the information of the project which owns `api_key`.
    fn project_info(&self, ctx: &Context, api_key: &ApiKey) -> Result<ProjectInfo>;

    /// Creates a bucket.
    fn create_bucket(&self, ctx: &Context, api_key: &ApiKey, name: &str) -> Result<BucketInfo>;

    /// Returns a bucket.
    fn get_bucket(&self, ctx: &Context, api_key: &ApiKey, name: &str) -> Result<BucketInfo>;

    /// Deletes a bucket. It fails if the bucket isn't empty unless `with_objects` is true.
    fn delete_bucket(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        name: &str,
        with_objects: bool,
    ) -> Result<BucketInfo>;

    /// Returns a page of the buckets that `api_key` can access.
    fn list_buckets(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &ListBucketsRequest,
    ) -> Result<BucketPage>;

    /// Starts an upload.
    fn begin_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &BeginObjectRequest,
    ) -> Result<BeginObjectResponse>;

    /// Stores a segment of an upload.
    fn upload_segment(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: SegmentUploadRequest,
    ) -> Result<()>;

    /// Makes the object of an upload visible replacing any previous object with the same key.
    fn commit_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        stream_id: StreamId,
        metadata: EncryptedMetadata,
    ) -> Result<ObjectInfo>;

    /// Discards an upload and its segments.
    fn abort_object(&self, ctx: &Context, api_key: &ApiKey, stream_id: StreamId) -> Result<()>;

    /// Returns a committed object.
    fn get_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<ObjectInfo>;

    /// Authorizes the download of a committed object and returns its segments.
    fn download_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<DownloadResponse>;

    /// Returns the encrypted data of a segment of a committed object.
    fn download_segment(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
        index: u32,
    ) -> Result<Vec<u8>>;

    /// Deletes a committed object.
    fn delete_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<ObjectInfo>;

    /// Returns a page of the committed objects of a bucket.
    fn list_objects(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &ListObjectsRequest,
    ) -> Result<ObjectPage>;

    /// Revokes `revoked` and every API key restricted from it. `api_key` must be the API key that
    /// `revoked` was restricted from or any of its ancestors.
    fn revoke_api_key(&self, ctx: &Context, api_key: &ApiKey, revoked: &ApiKey) -> Result<()>;
}

/// Establishes connections to the satellites.
pub trait Dialer: Send + Sync {
    /// Dials the satellite of `url`. It fails with
    /// [`error::Uplink::DialFailed`](crate::error::Uplink::DialFailed) when the satellite isn't
    /// reachable or its ID isn't the one of `url`.
    fn dial(&self, ctx: &Context, url: &NodeUrl) -> Result<Arc<dyn Satellite>>;
}
