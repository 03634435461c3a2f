//! Metadata database of a satellite: projects, buckets, objects and uploads in progress.
//!
//! It only enforces the consistency of the data; the authorization of the operations is done by
//! the satellite before reaching it.

use crate::storagenode::PieceId;

use uplink::error::Uplink as Code;
use uplink::macaroon::Tail;
use uplink::transport::{
    BucketInfo, EncryptedMetadata, ListObjectsRequest, NodeId, ObjectInfo, StreamId,
};
use uplink::{Error, Result};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

/// Identifies a project by the head of its API keys.
pub(crate) type ProjectId = Vec<u8>;

/// Where the data of a segment is stored.
#[derive(Debug, Clone)]
pub(crate) enum Location {
    /// Small segments are stored in the database.
    Inline(Vec<u8>),
    /// A piece replicated in several storage nodes.
    Remote { piece: PieceId, nodes: Vec<NodeId> },
}

#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub(crate) index: u32,
    pub(crate) plain_size: u64,
    pub(crate) location: Location,
}

#[derive(Debug)]
struct Object {
    created: Duration,
    expires: Option<Duration>,
    segments: Vec<Segment>,
    metadata: EncryptedMetadata,
}

impl Object {
    fn is_expired(&self, now: Duration) -> bool {
        self.expires.is_some_and(|e| e <= now)
    }

    fn info(&self, bucket: &str, encrypted_key: &str) -> ObjectInfo {
        ObjectInfo {
            bucket: String::from(bucket),
            encrypted_key: String::from(encrypted_key),
            is_prefix: false,
            created: self.created,
            expires: self.expires,
            content_length: self.segments.iter().map(|s| s.plain_size).sum(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    created: Duration,
    objects: BTreeMap<String, Object>,
}

#[derive(Debug)]
struct Project {
    salt: Vec<u8>,
    buckets: BTreeMap<String, Bucket>,
}

/// An upload which isn't committed yet.
#[derive(Debug)]
struct Stream {
    project: ProjectId,
    bucket: String,
    encrypted_key: String,
    expires: Option<Duration>,
    segments: Vec<Segment>,
}

#[derive(Debug, Default)]
pub(crate) struct Metainfo {
    projects: HashMap<ProjectId, Project>,
    streams: HashMap<StreamId, Stream>,
    next_stream: StreamId,
    revoked: HashSet<Tail>,
}

impl Metainfo {
    pub(crate) fn create_project(&mut self, id: ProjectId, salt: Vec<u8>) {
        self.projects.insert(
            id,
            Project {
                salt,
                buckets: BTreeMap::new(),
            },
        );
    }

    pub(crate) fn salt(&self, project: &[u8]) -> Result<Vec<u8>> {
        Ok(self.project(project)?.salt.clone())
    }

    pub(crate) fn revoked(&self) -> &HashSet<Tail> {
        &self.revoked
    }

    pub(crate) fn revoke(&mut self, tail: Tail) {
        self.revoked.insert(tail);
    }

    pub(crate) fn create_bucket(
        &mut self,
        project: &[u8],
        name: &str,
        now: Duration,
    ) -> Result<BucketInfo> {
        let buckets = &mut self.project_mut(project)?.buckets;
        if buckets.contains_key(name) {
            return Err(Error::Uplink(Code::BucketAlreadyExists(String::from(name))));
        }

        buckets.insert(
            String::from(name),
            Bucket {
                created: now,
                objects: BTreeMap::new(),
            },
        );

        Ok(BucketInfo {
            name: String::from(name),
            created: now,
        })
    }

    pub(crate) fn get_bucket(&self, project: &[u8], name: &str) -> Result<BucketInfo> {
        let bucket = self.bucket(project, name)?;
        Ok(BucketInfo {
            name: String::from(name),
            created: bucket.created,
        })
    }

    /// Deletes a bucket returning its information and the segments of its objects.
    pub(crate) fn delete_bucket(
        &mut self,
        project: &[u8],
        name: &str,
        with_objects: bool,
        now: Duration,
    ) -> Result<(BucketInfo, Vec<Segment>)> {
        let buckets = &mut self.project_mut(project)?.buckets;
        let bucket = buckets
            .get(name)
            .ok_or_else(|| Error::Uplink(Code::BucketNotFound(String::from(name))))?;

        if !with_objects && bucket.objects.values().any(|o| !o.is_expired(now)) {
            return Err(Error::Uplink(Code::BucketNotEmpty(String::from(name))));
        }

        let bucket = buckets
            .remove(name)
            .expect("BUG: the bucket exists because it was retrieved above");

        let info = BucketInfo {
            name: String::from(name),
            created: bucket.created,
        };
        let segments = bucket
            .objects
            .into_values()
            .flat_map(|o| o.segments)
            .collect();

        Ok((info, segments))
    }

    /// Returns the buckets whose name sorts after `cursor`.
    pub(crate) fn list_buckets(&self, project: &[u8], cursor: &str) -> Result<Vec<BucketInfo>> {
        Ok(self
            .project(project)?
            .buckets
            .iter()
            .filter(|(name, _)| name.as_str() > cursor)
            .map(|(name, b)| BucketInfo {
                name: name.clone(),
                created: b.created,
            })
            .collect())
    }

    /// Returns true if there is a live object at `encrypted_key`.
    pub(crate) fn object_exists(
        &self,
        project: &[u8],
        bucket: &str,
        encrypted_key: &str,
        now: Duration,
    ) -> Result<bool> {
        Ok(self
            .bucket(project, bucket)?
            .objects
            .get(encrypted_key)
            .is_some_and(|o| !o.is_expired(now)))
    }

    pub(crate) fn begin_object(
        &mut self,
        project: &[u8],
        bucket: &str,
        encrypted_key: &str,
        expires: Option<Duration>,
    ) -> Result<StreamId> {
        if encrypted_key.is_empty() {
            return Err(Error::Uplink(Code::ObjectKeyInvalid(String::from(
                "object key cannot be empty",
            ))));
        }

        self.bucket(project, bucket)?;

        self.next_stream += 1;
        let id = self.next_stream;
        self.streams.insert(
            id,
            Stream {
                project: project.to_vec(),
                bucket: String::from(bucket),
                encrypted_key: String::from(encrypted_key),
                expires,
                segments: Vec::new(),
            },
        );

        Ok(id)
    }

    /// Returns the bucket and the encrypted key of an upload in progress of `project`.
    pub(crate) fn stream_target(&self, project: &[u8], id: StreamId) -> Result<(String, String)> {
        let stream = self.stream(project, id)?;
        Ok((stream.bucket.clone(), stream.encrypted_key.clone()))
    }

    /// Appends `segment` to an upload in progress.
    ///
    /// A client that didn't get the response of a segment upload sends it again, so the last
    /// segment can be replaced. It returns the replaced segment, if any.
    pub(crate) fn add_segment(
        &mut self,
        project: &[u8],
        id: StreamId,
        segment: Segment,
    ) -> Result<Option<Segment>> {
        let stream = self.stream_mut(project, id)?;
        let next = stream.segments.len();
        let index = segment.index as usize;

        if index + 1 == next {
            return Ok(Some(std::mem::replace(&mut stream.segments[index], segment)));
        }
        if index != next {
            return Err(Error::Uplink(Code::Internal(format!(
                "segment {} is out of order; expected segment {}",
                segment.index, next
            ))));
        }

        stream.segments.push(segment);
        Ok(None)
    }

    /// Makes the object of an upload visible. It returns the object and the segments of the
    /// object that it replaced, if any.
    pub(crate) fn commit_object(
        &mut self,
        project: &[u8],
        id: StreamId,
        metadata: EncryptedMetadata,
        now: Duration,
    ) -> Result<(ObjectInfo, Vec<Segment>)> {
        self.stream(project, id)?;
        let stream = self
            .streams
            .remove(&id)
            .expect("BUG: the stream exists because it was retrieved above");

        let bucket = self.bucket_mut(project, &stream.bucket)?;
        let object = Object {
            created: now,
            expires: stream.expires,
            segments: stream.segments,
            metadata,
        };
        let info = object.info(&stream.bucket, &stream.encrypted_key);
        let replaced = bucket
            .objects
            .insert(stream.encrypted_key, object)
            .map(|o| o.segments)
            .unwrap_or_default();

        Ok((info, replaced))
    }

    /// Discards an upload returning its segments.
    pub(crate) fn abort_object(&mut self, project: &[u8], id: StreamId) -> Result<Vec<Segment>> {
        self.stream(project, id)?;
        Ok(self
            .streams
            .remove(&id)
            .map(|s| s.segments)
            .unwrap_or_default())
    }

    /// Returns a live object and its segments.
    pub(crate) fn get_object(
        &self,
        project: &[u8],
        bucket: &str,
        encrypted_key: &str,
        now: Duration,
    ) -> Result<(ObjectInfo, Vec<Segment>)> {
        match self.bucket(project, bucket)?.objects.get(encrypted_key) {
            Some(o) if !o.is_expired(now) => {
                Ok((o.info(bucket, encrypted_key), o.segments.clone()))
            }
            _ => Err(Error::Uplink(Code::ObjectNotFound(String::from(
                encrypted_key,
            )))),
        }
    }

    /// Deletes a live object returning its information and its segments.
    pub(crate) fn delete_object(
        &mut self,
        project: &[u8],
        bucket: &str,
        encrypted_key: &str,
        now: Duration,
    ) -> Result<(ObjectInfo, Vec<Segment>)> {
        let (info, _) = self.get_object(project, bucket, encrypted_key, now)?;
        let object = self
            .bucket_mut(project, bucket)?
            .objects
            .remove(encrypted_key)
            .expect("BUG: the object exists because it was retrieved above");

        Ok((info, object.segments))
    }

    /// Returns the live objects of a bucket matching the prefix and after the cursor of `req`,
    /// sorted by encrypted key. When the listing isn't recursive, the keys with a separator after
    /// the prefix are collapsed into a single prefix entry.
    ///
    /// `req.limit` isn't applied.
    pub(crate) fn list_objects(
        &self,
        project: &[u8],
        req: &ListObjectsRequest,
        now: Duration,
    ) -> Result<Vec<ObjectInfo>> {
        let bucket = self.bucket(project, &req.bucket)?;

        let mut items: Vec<ObjectInfo> = Vec::new();
        for (key, object) in bucket.objects.iter() {
            let Some(rest) = key.strip_prefix(req.encrypted_prefix.as_str()) else {
                continue;
            };
            if object.is_expired(now) {
                continue;
            }

            let item = match rest.find('/') {
                Some(i) if !req.recursive => ObjectInfo {
                    bucket: req.bucket.clone(),
                    encrypted_key: format!("{}{}", req.encrypted_prefix, &rest[..=i]),
                    is_prefix: true,
                    created: Duration::ZERO,
                    expires: None,
                    content_length: 0,
                    metadata: EncryptedMetadata::default(),
                },
                _ => object.info(&req.bucket, key),
            };

            if item.encrypted_key.as_str() <= req.encrypted_cursor.as_str() {
                continue;
            }
            if items
                .last()
                .is_some_and(|last| last.encrypted_key == item.encrypted_key)
            {
                continue;
            }

            items.push(item);
        }

        Ok(items)
    }

    fn project(&self, id: &[u8]) -> Result<&Project> {
        self.projects.get(id).ok_or_else(|| {
            Error::Uplink(Code::PermissionDenied(String::from(
                "API key doesn't belong to any project",
            )))
        })
    }

    fn project_mut(&mut self, id: &[u8]) -> Result<&mut Project> {
        self.projects.get_mut(id).ok_or_else(|| {
            Error::Uplink(Code::PermissionDenied(String::from(
                "API key doesn't belong to any project",
            )))
        })
    }

    fn bucket(&self, project: &[u8], name: &str) -> Result<&Bucket> {
        self.project(project)?
            .buckets
            .get(name)
            .ok_or_else(|| Error::Uplink(Code::BucketNotFound(String::from(name))))
    }

    fn bucket_mut(&mut self, project: &[u8], name: &str) -> Result<&mut Bucket> {
        self.project_mut(project)?
            .buckets
            .get_mut(name)
            .ok_or_else(|| Error::Uplink(Code::BucketNotFound(String::from(name))))
    }

    fn stream(&self, project: &[u8], id: StreamId) -> Result<&Stream> {
        match self.streams.get(&id) {
            Some(s) if s.project == project => Ok(s),
            _ => Err(Error::Uplink(Code::UploadDone(format!(
                "upload {} doesn't exist or it's already finished",
                id
            )))),
        }
    }

    fn stream_mut(&mut self, project: &[u8], id: StreamId) -> Result<&mut Stream> {
        match self.streams.get_mut(&id) {
            Some(s) if s.project == project => Ok(s),
            _ => Err(Error::Uplink(Code::UploadDone(format!(
                "upload {} doesn't exist or it's already finished",
                id
            )))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use proptest::prelude::*;

    const PROJECT: &[u8] = b"project";

    fn metainfo() -> Metainfo {
        let mut m = Metainfo::default();
        m.create_project(PROJECT.to_vec(), b"salt".to_vec());
        m.create_bucket(PROJECT, "bucket", Duration::from_secs(1))
            .expect("create bucket");
        m
    }

    fn put(m: &mut Metainfo, key: &str, expires: Option<Duration>) {
        let id = m
            .begin_object(PROJECT, "bucket", key, expires)
            .expect("begin object");
        m.add_segment(
            PROJECT,
            id,
            Segment {
                index: 0,
                plain_size: 3,
                location: Location::Inline(b"abc".to_vec()),
            },
        )
        .expect("add segment");
        m.commit_object(PROJECT, id, EncryptedMetadata::default(), Duration::from_secs(2))
            .expect("commit object");
    }

    fn keys(items: &[ObjectInfo]) -> Vec<&str> {
        items.iter().map(|i| i.encrypted_key.as_str()).collect()
    }

    #[test]
    fn test_buckets() {
        let mut m = metainfo();

        let err = m
            .create_bucket(PROJECT, "bucket", Duration::from_secs(3))
            .expect_err("bucket already exists");
        assert!(matches!(err, Error::Uplink(Code::BucketAlreadyExists(_))));

        m.create_bucket(PROJECT, "another", Duration::from_secs(3))
            .expect("create bucket");
        let names: Vec<String> = m
            .list_buckets(PROJECT, "")
            .expect("list buckets")
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["another", "bucket"], "sorted buckets");

        put(&mut m, "obj", None);
        let err = m
            .delete_bucket(PROJECT, "bucket", false, Duration::from_secs(3))
            .expect_err("bucket isn't empty");
        assert!(matches!(err, Error::Uplink(Code::BucketNotEmpty(_))));

        let (_, segments) = m
            .delete_bucket(PROJECT, "bucket", true, Duration::from_secs(3))
            .expect("delete bucket with objects");
        assert_eq!(segments.len(), 1, "segments of the deleted objects");

        let err = m
            .get_bucket(PROJECT, "bucket")
            .expect_err("deleted bucket");
        assert!(matches!(err, Error::Uplink(Code::BucketNotFound(_))));
    }

    #[test]
    fn test_list_objects() {
        let mut m = metainfo();
        for key in ["a", "a/x", "a/y", "a0", "b/c/d"] {
            put(&mut m, key, None);
        }

        let mut req = ListObjectsRequest {
            bucket: String::from("bucket"),
            recursive: true,
            ..Default::default()
        };
        let items = m
            .list_objects(PROJECT, &req, Duration::from_secs(3))
            .expect("list");
        assert_eq!(keys(&items), vec!["a", "a/x", "a/y", "a0", "b/c/d"], "recursive");

        req.recursive = false;
        let items = m
            .list_objects(PROJECT, &req, Duration::from_secs(3))
            .expect("list");
        assert_eq!(keys(&items), vec!["a", "a/", "a0", "b/"], "collapsed");
        assert!(items[1].is_prefix, "prefix entry");

        req.encrypted_cursor = String::from("a/");
        let items = m
            .list_objects(PROJECT, &req, Duration::from_secs(3))
            .expect("list");
        assert_eq!(keys(&items), vec!["a0", "b/"], "after the cursor");

        req.encrypted_cursor = String::new();
        req.encrypted_prefix = String::from("b/");
        let items = m
            .list_objects(PROJECT, &req, Duration::from_secs(3))
            .expect("list");
        assert_eq!(keys(&items), vec!["b/c/"], "inside of a prefix");
    }

    #[test]
    fn test_expired_objects_are_hidden() {
        let mut m = metainfo();
        put(&mut m, "short-lived", Some(Duration::from_secs(10)));

        m.get_object(PROJECT, "bucket", "short-lived", Duration::from_secs(5))
            .expect("live object");

        let err = m
            .get_object(PROJECT, "bucket", "short-lived", Duration::from_secs(10))
            .expect_err("expired object");
        assert!(matches!(err, Error::Uplink(Code::ObjectNotFound(_))));

        m.delete_bucket(PROJECT, "bucket", false, Duration::from_secs(11))
            .expect("a bucket with only expired objects is empty");
    }

    #[test]
    fn test_segments_resent() {
        let mut m = metainfo();
        let id = m
            .begin_object(PROJECT, "bucket", "obj", None)
            .expect("begin object");
        let segment = |index, data: &[u8]| Segment {
            index,
            plain_size: data.len() as u64,
            location: Location::Inline(data.to_vec()),
        };

        assert!(m
            .add_segment(PROJECT, id, segment(0, b"first"))
            .expect("add segment")
            .is_none());
        let replaced = m
            .add_segment(PROJECT, id, segment(0, b"again"))
            .expect("resend the last segment")
            .expect("replaced segment");
        assert_eq!(replaced.plain_size, 5, "replaced segment");

        let err = m
            .add_segment(PROJECT, id, segment(2, b"gap"))
            .expect_err("segment out of order");
        assert!(matches!(err, Error::Uplink(Code::Internal(_))));

        m.add_segment(PROJECT, id, segment(1, b"second"))
            .expect("add segment");
        let (info, _) = m
            .commit_object(PROJECT, id, EncryptedMetadata::default(), Duration::ZERO)
            .expect("commit object");
        assert_eq!(info.content_length, 11, "content length of the resent segments");
    }

    #[test]
    fn test_streams() {
        let mut m = metainfo();
        let id = m
            .begin_object(PROJECT, "bucket", "obj", None)
            .expect("begin object");

        let err = m
            .commit_object(b"other", id, EncryptedMetadata::default(), Duration::ZERO)
            .expect_err("stream of another project");
        assert!(matches!(err, Error::Uplink(Code::UploadDone(_))));

        m.abort_object(PROJECT, id).expect("abort");
        let err = m
            .abort_object(PROJECT, id)
            .expect_err("abort an aborted stream");
        assert!(matches!(err, Error::Uplink(Code::UploadDone(_))));

        assert!(
            !m.object_exists(PROJECT, "bucket", "obj", Duration::ZERO)
                .expect("object exists"),
            "aborted uploads leave nothing"
        );
    }

    proptest! {
        #[test]
        fn prop_list_resumes_after_cursor(
            keys in proptest::collection::btree_set("[ab]{1,2}(/[ab]{1,2}){0,2}", 1..12),
            recursive in any::<bool>(),
        ) {
            let mut m = metainfo();
            for key in &keys {
                put(&mut m, key, None);
            }

            let mut req = ListObjectsRequest {
                bucket: String::from("bucket"),
                recursive,
                ..Default::default()
            };
            let all = m.list_objects(PROJECT, &req, Duration::from_secs(3)).expect("list");
            prop_assert!(
                all.windows(2).all(|w| w[0].encrypted_key < w[1].encrypted_key),
                "sorted and unique"
            );

            for (i, item) in all.iter().enumerate() {
                req.encrypted_cursor = item.encrypted_key.clone();
                let rest = m.list_objects(PROJECT, &req, Duration::from_secs(3)).expect("list");
                prop_assert_eq!(keys_of(&rest), keys_of(&all[i + 1..]));
            }
        }
    }

    fn keys_of(items: &[ObjectInfo]) -> Vec<String> {
        items.iter().map(|i| i.encrypted_key.clone()).collect()
    }
}
