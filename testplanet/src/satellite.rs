//! In-process satellite: it issues the API keys, verifies them on every call and keeps the
//! metadata of the projects.

use crate::metainfo::{Location, Metainfo, ProjectId, Segment};
use crate::storagenode::{PieceId, StorageNode};
use crate::Config;

use parking_lot::{Mutex, RwLock};
use uplink::error::Uplink as Code;
use uplink::macaroon::{Action, ActionType, ApiKey, Caveat};
use uplink::transport::{
    self, BeginObjectRequest, BeginObjectResponse, BucketInfo, BucketPage, DownloadResponse,
    EncryptedMetadata, ListBucketsRequest, ListObjectsRequest, NodeId, NodeUrl, ObjectInfo,
    ObjectPage, ProjectInfo, SegmentInfo, SegmentUploadRequest, StreamId,
};
use uplink::{Context, Error, Result};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Segments whose encrypted data is up to this size are stored in the metadata database instead
/// of the storage nodes.
const INLINE_SEGMENT_MAX_SIZE: usize = 4 * 1024;
/// Number of storage nodes which keep a copy of each remote segment.
const REPLICATION_FACTOR: usize = 3;

/// A satellite of a planet.
///
/// It's reachable by the clients through the process-local network at the address of its URL
/// while the planet isn't dropped.
pub struct Satellite {
    url: NodeUrl,
    secret: [u8; 32],
    metainfo: Mutex<Metainfo>,
    nodes: Vec<Arc<StorageNode>>,
    max_segment_size: usize,
    latency: Duration,
    clock_offset: RwLock<Duration>,
}

impl Satellite {
    pub(crate) fn new(address: String, config: &Config, nodes: Vec<Arc<StorageNode>>) -> Self {
        let id = blake3::hash(format!("satellite:{}", address).as_bytes());
        Self {
            url: NodeUrl {
                id: NodeId(*id.as_bytes()),
                address,
            },
            secret: rand::random(),
            metainfo: Mutex::new(Metainfo::default()),
            nodes,
            max_segment_size: config.max_segment_size,
            latency: config.latency,
            clock_offset: RwLock::new(Duration::ZERO),
        }
    }

    /// Returns the satellite's node ID.
    pub fn id(&self) -> NodeId {
        self.url.id
    }

    /// Returns the satellite's node URL.
    pub fn url(&self) -> &NodeUrl {
        &self.url
    }

    /// Creates a new project and returns its unrestricted API key.
    pub fn create_project(&self) -> ApiKey {
        let api_key = ApiKey::new(&self.secret);
        let salt: [u8; 32] = rand::random();
        self.metainfo
            .lock()
            .create_project(api_key.head().to_vec(), salt.to_vec());

        tracing::debug!(satellite = %self.url.id, "project created");
        api_key
    }

    /// Returns the satellite's current time, measured since the Unix Epoch time.
    pub fn now(&self) -> Duration {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        now + *self.clock_offset.read()
    }

    /// Moves the satellite's clock forward, which is the time used for verifying the validity
    /// period of the API keys and the expiration of the objects.
    pub fn advance_time(&self, by: Duration) {
        *self.clock_offset.write() += by;
    }

    /// Verifies that `api_key` authorizes the operation `op` on `encrypted_path` of `bucket` at
    /// the satellite's current time and returns the project which owns the key.
    fn authorize(
        &self,
        api_key: &ApiKey,
        op: ActionType,
        bucket: &str,
        encrypted_path: &str,
    ) -> Result<ProjectId> {
        let action = Action {
            op,
            bucket: String::from(bucket),
            encrypted_path: String::from(encrypted_path),
            time: self.now(),
        };

        let res = {
            let metainfo = self.metainfo.lock();
            api_key.check(&self.secret, &action, metainfo.revoked())
        };

        if let Err(err) = res {
            tracing::warn!(
                satellite = %self.url.id,
                op = ?op,
                bucket,
                error = %err,
                "authorization rejected"
            );
            return Err(err);
        }

        Ok(api_key.head().to_vec())
    }

    /// Stores the encrypted data of a segment, inline or replicated in the storage nodes.
    fn store_segment(&self, data: Vec<u8>) -> Location {
        if data.len() <= INLINE_SEGMENT_MAX_SIZE || self.nodes.is_empty() {
            return Location::Inline(data);
        }

        let piece: PieceId = rand::random();
        let start = piece[0] as usize % self.nodes.len();
        let nodes = (0..REPLICATION_FACTOR.min(self.nodes.len()))
            .map(|i| {
                let node = &self.nodes[(start + i) % self.nodes.len()];
                node.put(piece, data.clone());
                node.id()
            })
            .collect();

        Location::Remote { piece, nodes }
    }

    /// Returns the encrypted data of a segment from the first storage node which has it.
    fn load_segment(&self, location: &Location) -> Result<Vec<u8>> {
        match location {
            Location::Inline(data) => Ok(data.clone()),
            Location::Remote { piece, nodes } => nodes
                .iter()
                .filter_map(|id| self.nodes.iter().find(|n| n.id() == *id))
                .find_map(|n| n.get(piece))
                .ok_or_else(|| {
                    Error::Uplink(Code::Internal(String::from(
                        "segment's piece is lost in all its storage nodes",
                    )))
                }),
        }
    }

    /// Deletes the pieces of `segments` from the storage nodes.
    fn delete_segments(&self, segments: Vec<Segment>) {
        for segment in segments {
            if let Location::Remote { piece, nodes } = segment.location {
                for node in self.nodes.iter().filter(|n| nodes.contains(&n.id())) {
                    node.delete(&piece);
                }
            }
        }
    }
}

impl transport::Satellite for Satellite {
    fn project_info(&self, ctx: &Context, api_key: &ApiKey) -> Result<ProjectInfo> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::ProjectInfo, "", "")?;

        Ok(ProjectInfo {
            salt: self.metainfo.lock().salt(&project)?,
        })
    }

    fn create_bucket(&self, ctx: &Context, api_key: &ApiKey, name: &str) -> Result<BucketInfo> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Write, name, "")?;
        validate_bucket_name(name)?;

        let info = self
            .metainfo
            .lock()
            .create_bucket(&project, name, self.now())?;
        tracing::debug!(satellite = %self.url.id, bucket = name, "bucket created");
        Ok(info)
    }

    fn get_bucket(&self, ctx: &Context, api_key: &ApiKey, name: &str) -> Result<BucketInfo> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Read, name, "")?;

        self.metainfo.lock().get_bucket(&project, name)
    }

    fn delete_bucket(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        name: &str,
        with_objects: bool,
    ) -> Result<BucketInfo> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Delete, name, "")?;

        let (info, segments) =
            self.metainfo
                .lock()
                .delete_bucket(&project, name, with_objects, self.now())?;
        self.delete_segments(segments);

        tracing::debug!(satellite = %self.url.id, bucket = name, "bucket deleted");
        Ok(info)
    }

    fn list_buckets(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &ListBucketsRequest,
    ) -> Result<BucketPage> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::List, "", "")?;
        let caveats = api_key.caveats()?;
        let now = self.now();

        let limit = req.limit.max(1);
        let mut items: Vec<BucketInfo> = self
            .metainfo
            .lock()
            .list_buckets(&project, &req.cursor)?
            .into_iter()
            .filter(|b| allowed(&caveats, ActionType::List, &b.name, "", now))
            .take(limit + 1)
            .collect();

        let more = items.len() > limit;
        items.truncate(limit);
        Ok(BucketPage { items, more })
    }

    fn begin_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &BeginObjectRequest,
    ) -> Result<BeginObjectResponse> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Write, &req.bucket, &req.encrypted_key)?;

        let exists =
            self.metainfo
                .lock()
                .object_exists(&project, &req.bucket, &req.encrypted_key, self.now())?;
        if exists {
            // Overwriting an object deletes the previous one.
            self.authorize(api_key, ActionType::Delete, &req.bucket, &req.encrypted_key)?;
        }

        let stream_id = self.metainfo.lock().begin_object(
            &project,
            &req.bucket,
            &req.encrypted_key,
            req.expires,
        )?;

        Ok(BeginObjectResponse {
            stream_id,
            max_segment_size: self.max_segment_size,
        })
    }

    fn upload_segment(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: SegmentUploadRequest,
    ) -> Result<()> {
        ctx.sleep(self.latency)?;
        let (bucket, encrypted_key) = self
            .metainfo
            .lock()
            .stream_target(api_key.head(), req.stream_id)?;
        let project = self.authorize(api_key, ActionType::Write, &bucket, &encrypted_key)?;

        if req.plain_size > self.max_segment_size as u64 {
            return Err(Error::Uplink(Code::Internal(format!(
                "segment size {} exceeds the maximum segment size {}",
                req.plain_size, self.max_segment_size
            ))));
        }

        let segment = Segment {
            index: req.index,
            plain_size: req.plain_size,
            location: self.store_segment(req.encrypted_data),
        };

        let res = self
            .metainfo
            .lock()
            .add_segment(&project, req.stream_id, segment.clone());
        match res {
            Ok(replaced) => {
                self.delete_segments(replaced.into_iter().collect());
                Ok(())
            }
            Err(err) => {
                self.delete_segments(vec![segment]);
                Err(err)
            }
        }
    }

    fn commit_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        stream_id: StreamId,
        metadata: EncryptedMetadata,
    ) -> Result<ObjectInfo> {
        ctx.sleep(self.latency)?;
        let (bucket, encrypted_key) = self
            .metainfo
            .lock()
            .stream_target(api_key.head(), stream_id)?;
        let project = self.authorize(api_key, ActionType::Write, &bucket, &encrypted_key)?;

        let (info, replaced) =
            self.metainfo
                .lock()
                .commit_object(&project, stream_id, metadata, self.now())?;
        self.delete_segments(replaced);

        tracing::debug!(
            satellite = %self.url.id,
            bucket = %bucket,
            content_length = info.content_length,
            "object committed"
        );
        Ok(info)
    }

    fn abort_object(&self, ctx: &Context, api_key: &ApiKey, stream_id: StreamId) -> Result<()> {
        ctx.sleep(self.latency)?;
        let (bucket, encrypted_key) = self
            .metainfo
            .lock()
            .stream_target(api_key.head(), stream_id)?;
        let project = self.authorize(api_key, ActionType::Write, &bucket, &encrypted_key)?;

        let segments = self.metainfo.lock().abort_object(&project, stream_id)?;
        self.delete_segments(segments);
        Ok(())
    }

    fn get_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<ObjectInfo> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Read, bucket, encrypted_key)?;

        let (info, _) =
            self.metainfo
                .lock()
                .get_object(&project, bucket, encrypted_key, self.now())?;
        Ok(info)
    }

    fn download_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<DownloadResponse> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Read, bucket, encrypted_key)?;

        let (object, segments) =
            self.metainfo
                .lock()
                .get_object(&project, bucket, encrypted_key, self.now())?;

        Ok(DownloadResponse {
            object,
            segments: segments
                .iter()
                .map(|s| SegmentInfo {
                    index: s.index,
                    plain_size: s.plain_size,
                })
                .collect(),
        })
    }

    fn download_segment(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
        index: u32,
    ) -> Result<Vec<u8>> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Read, bucket, encrypted_key)?;

        let (_, segments) =
            self.metainfo
                .lock()
                .get_object(&project, bucket, encrypted_key, self.now())?;
        let segment = segments
            .iter()
            .find(|s| s.index == index)
            .ok_or_else(|| {
                Error::Uplink(Code::Internal(format!(
                    "object doesn't have the segment {}",
                    index
                )))
            })?;

        self.load_segment(&segment.location)
    }

    fn delete_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<ObjectInfo> {
        ctx.sleep(self.latency)?;
        let project = self.authorize(api_key, ActionType::Delete, bucket, encrypted_key)?;

        let (info, segments) =
            self.metainfo
                .lock()
                .delete_object(&project, bucket, encrypted_key, self.now())?;
        self.delete_segments(segments);

        tracing::debug!(satellite = %self.url.id, bucket, "object deleted");
        Ok(info)
    }

    fn list_objects(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &ListObjectsRequest,
    ) -> Result<ObjectPage> {
        ctx.sleep(self.latency)?;
        let prefix = req
            .encrypted_prefix
            .strip_suffix('/')
            .unwrap_or(&req.encrypted_prefix);
        let project = self.authorize(api_key, ActionType::List, &req.bucket, prefix)?;
        let caveats = api_key.caveats()?;
        let now = self.now();

        let limit = req.limit.max(1);
        let mut items: Vec<ObjectInfo> = self
            .metainfo
            .lock()
            .list_objects(&project, req, now)?
            .into_iter()
            .filter(|o| {
                let path = o.encrypted_key.strip_suffix('/').unwrap_or(&o.encrypted_key);
                allowed(&caveats, ActionType::List, &req.bucket, path, now)
            })
            .take(limit + 1)
            .collect();

        let more = items.len() > limit;
        items.truncate(limit);
        Ok(ObjectPage { items, more })
    }

    fn revoke_api_key(&self, ctx: &Context, api_key: &ApiKey, revoked: &ApiKey) -> Result<()> {
        ctx.sleep(self.latency)?;
        self.authorize(api_key, ActionType::ProjectInfo, "", "")?;

        if !api_key.is_parent_of(revoked) {
            return Err(Error::Uplink(Code::PermissionDenied(String::from(
                "an API key can only revoke the API keys restricted from it",
            ))));
        }

        if revoked.tails(&self.secret).last() != Some(revoked.tail()) {
            return Err(Error::Uplink(Code::PermissionDenied(String::from(
                "invalid signature of the revoked API key",
            ))));
        }

        self.metainfo.lock().revoke(*revoked.tail());
        tracing::debug!(satellite = %self.url.id, "API key revoked");
        Ok(())
    }
}

impl std::fmt::Debug for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Satellite")
            .field("url", &self.url)
            .field("nodes", &self.nodes.len())
            .field("max_segment_size", &self.max_segment_size)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

/// Returns true if all the caveats allow the operation `op` on `encrypted_path` of `bucket` at
/// `time`.
fn allowed(
    caveats: &[Caveat],
    op: ActionType,
    bucket: &str,
    encrypted_path: &str,
    time: Duration,
) -> bool {
    let action = Action {
        op,
        bucket: String::from(bucket),
        encrypted_path: String::from(encrypted_path),
        time,
    };

    caveats.iter().all(|c| c.check(&action).is_ok())
}

/// Verifies that `name` is between 3 and 63 characters of lowercase letters, digits, hyphens and
/// dots, and that it starts and ends with a letter or a digit.
fn validate_bucket_name(name: &str) -> Result<()> {
    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid = (3..=63).contains(&name.len())
        && name.chars().all(|c| valid_char(c) || c == '-' || c == '.')
        && name.starts_with(valid_char)
        && name.ends_with(valid_char);

    if !valid {
        return Err(Error::Uplink(Code::BucketNameInvalid(String::from(name))));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_bucket_name() {
        for valid in ["abc", "test-bucket", "testbucket0", "a.b-c", &"a".repeat(63)] {
            validate_bucket_name(valid).expect("valid bucket name");
        }

        for invalid in ["", "ab", "Test", "-abc", "abc-", "a_b", "a/b", &"a".repeat(64)] {
            let err = validate_bucket_name(invalid).expect_err("invalid bucket name");
            assert!(
                matches!(err, Error::Uplink(Code::BucketNameInvalid(_))),
                "expected a bucket name invalid error for {:?}, got: {}",
                invalid,
                err
            );
        }
    }
}
