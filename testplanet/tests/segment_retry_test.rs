use uplink::macaroon::ApiKey;
use uplink::transport::{
    local::Network, BeginObjectRequest, BeginObjectResponse, BucketInfo, BucketPage, Dialer,
    DownloadResponse, EncryptedMetadata, ListBucketsRequest, ListObjectsRequest, NodeUrl,
    ObjectInfo, ObjectPage, ProjectInfo, Satellite, SegmentUploadRequest, StreamId,
};
use uplink::{error, Context, Error, Result};

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;

/// Dials the satellites of the local network through [`Flaky`].
struct FlakyDialer {
    failures: Arc<AtomicUsize>,
    lose_response: bool,
}

impl FlakyDialer {
    fn new(failures: usize, lose_response: bool) -> Arc<Self> {
        Arc::new(Self {
            failures: Arc::new(AtomicUsize::new(failures)),
            lose_response,
        })
    }
}

impl Dialer for FlakyDialer {
    fn dial(&self, ctx: &Context, url: &NodeUrl) -> Result<Arc<dyn Satellite>> {
        Ok(Arc::new(Flaky {
            inner: Network::global().dial(ctx, url)?,
            failures: Arc::clone(&self.failures),
            lose_response: self.lose_response,
        }))
    }
}

/// Satellite whose segment uploads fail while there are failures left.
///
/// When `lose_response` is set the segment reaches the satellite and only the response is lost.
struct Flaky {
    inner: Arc<dyn Satellite>,
    failures: Arc<AtomicUsize>,
    lose_response: bool,
}

impl Flaky {
    fn fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn transient() -> Error {
    Error::Uplink(error::Uplink::Internal(String::from("transient")))
}

impl Satellite for Flaky {
    fn project_info(&self, ctx: &Context, api_key: &ApiKey) -> Result<ProjectInfo> {
        self.inner.project_info(ctx, api_key)
    }

    fn create_bucket(&self, ctx: &Context, api_key: &ApiKey, name: &str) -> Result<BucketInfo> {
        self.inner.create_bucket(ctx, api_key, name)
    }

    fn get_bucket(&self, ctx: &Context, api_key: &ApiKey, name: &str) -> Result<BucketInfo> {
        self.inner.get_bucket(ctx, api_key, name)
    }

    fn delete_bucket(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        name: &str,
        with_objects: bool,
    ) -> Result<BucketInfo> {
        self.inner.delete_bucket(ctx, api_key, name, with_objects)
    }

    fn list_buckets(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &ListBucketsRequest,
    ) -> Result<BucketPage> {
        self.inner.list_buckets(ctx, api_key, req)
    }

    fn begin_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &BeginObjectRequest,
    ) -> Result<BeginObjectResponse> {
        self.inner.begin_object(ctx, api_key, req)
    }

    fn upload_segment(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: SegmentUploadRequest,
    ) -> Result<()> {
        if !self.fail() {
            return self.inner.upload_segment(ctx, api_key, req);
        }

        if self.lose_response {
            self.inner.upload_segment(ctx, api_key, req)?;
        }
        Err(transient())
    }

    fn commit_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        stream_id: StreamId,
        metadata: EncryptedMetadata,
    ) -> Result<ObjectInfo> {
        self.inner.commit_object(ctx, api_key, stream_id, metadata)
    }

    fn abort_object(&self, ctx: &Context, api_key: &ApiKey, stream_id: StreamId) -> Result<()> {
        self.inner.abort_object(ctx, api_key, stream_id)
    }

    fn get_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<ObjectInfo> {
        self.inner.get_object(ctx, api_key, bucket, encrypted_key)
    }

    fn download_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<DownloadResponse> {
        self.inner.download_object(ctx, api_key, bucket, encrypted_key)
    }

    fn download_segment(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
        index: u32,
    ) -> Result<Vec<u8>> {
        self.inner
            .download_segment(ctx, api_key, bucket, encrypted_key, index)
    }

    fn delete_object(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        bucket: &str,
        encrypted_key: &str,
    ) -> Result<ObjectInfo> {
        self.inner.delete_object(ctx, api_key, bucket, encrypted_key)
    }

    fn list_objects(
        &self,
        ctx: &Context,
        api_key: &ApiKey,
        req: &ListObjectsRequest,
    ) -> Result<ObjectPage> {
        self.inner.list_objects(ctx, api_key, req)
    }

    fn revoke_api_key(&self, ctx: &Context, api_key: &ApiKey, revoked: &ApiKey) -> Result<()> {
        self.inner.revoke_api_key(ctx, api_key, revoked)
    }
}

fn small_segments() -> testplanet::Config {
    testplanet::Config {
        max_segment_size: 5000,
        ..Default::default()
    }
}

#[test]
fn integration_commit_again_after_a_failed_segment() {
    testplanet::run(testplanet::Config::default(), |planet| {
        let satellite = &planet.satellites()[0];
        let access = planet.uplinks()[0].access(satellite).expect("access");
        let config = uplink::Config::default().with_dialer(FlakyDialer::new(1, false));
        let project = uplink::Project::open_with_config(&access, &config).expect("open project");
        project.ensure_bucket("testbucket").expect("ensure bucket");

        let mut upload = project
            .upload_object("testbucket", "object", None)
            .expect("upload object");
        upload.write_all(b"hello world").expect("write data");

        if let Error::Uplink(error::Uplink::Internal(_)) =
            upload.commit().expect_err("commit with a failing segment")
        {
        } else {
            panic!("expected an internal error");
        }
        assert!(
            common::list_keys(&project, "testbucket")
                .expect("list")
                .is_empty(),
            "nothing is visible after a failed commit"
        );

        upload.commit().expect("commit again");
        assert_eq!(
            common::download(&project, "testbucket", "object").expect("download"),
            b"hello world",
            "the segment is sent again"
        );
    });
}

#[test]
fn integration_write_resends_a_segment_whose_response_was_lost() {
    testplanet::run(small_segments(), |planet| {
        let satellite = &planet.satellites()[0];
        let access = planet.uplinks()[0].access(satellite).expect("access");
        let config = uplink::Config::default().with_dialer(FlakyDialer::new(1, true));
        let project = uplink::Project::open_with_config(&access, &config).expect("open project");
        project.ensure_bucket("testbucket").expect("ensure bucket");

        let data = common::random_data(12000);
        let mut upload = project
            .upload_object("testbucket", "object", None)
            .expect("upload object");

        // The first segment fails after being stored, so only its bytes are taken.
        assert_eq!(
            upload.write(&data).expect("write data"),
            5000,
            "bytes of the first segment"
        );
        upload.write_all(&data[5000..]).expect("write the rest");
        upload.commit().expect("commit");

        assert_eq!(
            upload.info().metadata_system.content_length,
            data.len() as u64,
            "content length"
        );
        assert_eq!(
            common::download(&project, "testbucket", "object").expect("download"),
            data,
            "downloaded data"
        );

        let pieces: usize = planet.storage_nodes().iter().map(|n| n.piece_count()).sum();
        assert_eq!(pieces, 2 * 3, "the piece of the resent segment is replaced");
    });
}
