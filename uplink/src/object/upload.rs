//! Contains information and operations for uploading objects.

use crate::encryption::{self, Key};
use crate::project::Session;
use crate::transport::{
    BeginObjectRequest, EncryptedMetadata, ObjectInfo, SegmentUploadRequest, StreamId,
};
use crate::{error, metadata, object, Error, Result};

use std::sync::Arc;
use std::time::Duration;

/// Allows to upload the object's data to the Storj DCS network.
///
/// The upload starts on the satellite with the first write or with the commit if nothing is
/// written. The data is buffered and sent, encrypted, one segment at a time, so nothing is
/// visible at the object's key until [`Self::commit`] succeeds.
///
/// An upload that is neither committed nor aborted is aborted when it's dropped.
#[derive(Debug)]
pub struct Upload {
    session: Arc<Session>,
    bucket: String,
    key: String,
    expires: Option<Duration>,
    content_key: Key,
    stream: Option<Stream>,
    buffer: Vec<u8>,
    next_index: u32,
    custom: metadata::Custom,
    state: State,
    committed: Option<ObjectInfo>,
}

/// An upload started on the satellite.
#[derive(Debug)]
struct Stream {
    id: StreamId,
    max_segment_size: usize,
    path_key: Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    Aborted,
}

impl Upload {
    pub(crate) fn new(
        session: Arc<Session>,
        bucket: &str,
        key: &str,
        expires: Option<Duration>,
    ) -> Self {
        Self {
            session,
            bucket: String::from(bucket),
            key: String::from(key),
            expires,
            content_key: Key::random(),
            stream: None,
            buffer: Vec::new(),
            next_index: 0,
            custom: metadata::Custom::default(),
            state: State::Open,
            committed: None,
        }
    }

    /// Aborts a non-finalized upload.
    ///
    /// Returns an [`crate::Error::Uplink`] with the [`crate::error::Uplink::UploadDone`] if this
    /// method or [`Self::commit`] was previously called. It may return others [`Error::Uplink`]
    /// variants in other cases.
    pub fn abort(&mut self) -> Result<()> {
        self.ensure_not_done()?;

        if let Some(stream) = &self.stream {
            let id = stream.id;
            self.session
                .call(|sat, ctx, key| sat.abort_object(ctx, key, id))?;
        }

        self.state = State::Aborted;
        self.buffer = Vec::new();
        tracing::debug!(bucket = %self.bucket, "upload aborted");
        Ok(())
    }

    /// Commits the uploaded data.
    ///
    /// Returns an [`crate::Error::Uplink`] with the [`crate::error::Uplink::UploadDone`] if this
    /// method or [`Self::abort`] was previously called. When it fails for any other reason the
    /// upload stays open, so it can be committed again or aborted.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_not_done()?;
        self.begin()?;

        if !self.buffer.is_empty() {
            self.upload_segment()?;
        }

        let stream = self
            .stream
            .as_ref()
            .expect("BUG: an upload must have started after `begin` succeeded");

        let (encrypted_key, key_nonce) = encryption::wrap_key(&stream.path_key, &self.content_key)?;
        let metadata = EncryptedMetadata {
            encrypted_key,
            key_nonce,
            custom: self.custom.encrypt(&self.content_key)?,
        };

        let id = stream.id;
        let info = self
            .session
            .call(|sat, ctx, key| sat.commit_object(ctx, key, id, metadata))?;

        tracing::debug!(
            bucket = %self.bucket,
            segments = self.next_index,
            content_length = info.content_length,
            "upload committed"
        );
        self.state = State::Committed;
        self.committed = Some(info);
        Ok(())
    }

    /// Returns the last information about the uploaded object.
    ///
    /// The system metadata of an upload that isn't committed has a zero creation time and
    /// content length.
    pub fn info(&self) -> object::Info {
        let metadata_system = match &self.committed {
            Some(info) => metadata::System::from_object_info(info),
            None => metadata::System {
                created: Duration::ZERO,
                expires: self.expires,
                content_length: 0,
            },
        };

        object::Info {
            key: self.key.clone(),
            is_prefix: false,
            metadata_system,
            metadata_custom: self.custom.clone(),
        }
    }

    /// Sets the custom metadata to be included with the object, replacing any previously set.
    ///
    /// It returns an [`crate::error::Uplink::UploadDone`] error if the upload is already
    /// committed or aborted.
    pub fn set_custom_metadata(&mut self, metadata: &metadata::Custom) -> Result<()> {
        self.ensure_not_done()?;
        self.custom = metadata.clone();
        Ok(())
    }

    /// Starts the upload on the satellite if it isn't started yet.
    ///
    /// It encrypts the object's key first, so a key outside of the paths of the access grant
    /// fails without issuing any call to the satellite.
    fn begin(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (encrypted_key, path_key) = self
            .session
            .encryption()
            .encrypt_path_with_key(&self.bucket, &self.key)?;

        let req = BeginObjectRequest {
            bucket: self.bucket.clone(),
            encrypted_key,
            expires: self.expires,
        };
        let resp = self
            .session
            .call(|sat, ctx, key| sat.begin_object(ctx, key, &req))?;

        if resp.max_segment_size == 0 {
            return Err(Error::new_internal_without_inner(
                "satellite returned a zero max segment size",
            ));
        }

        self.stream = Some(Stream {
            id: resp.stream_id,
            max_segment_size: resp.max_segment_size,
            path_key,
        });
        Ok(())
    }

    /// Encrypts the buffered data and sends it as the next segment.
    ///
    /// The buffer is only emptied once the satellite accepts the segment, so a failed segment is
    /// sent again by the next write or commit.
    fn upload_segment(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .expect("BUG: segments can only be uploaded after the upload has started");

        let index = self.next_index;
        let req = SegmentUploadRequest {
            stream_id: stream.id,
            index,
            encrypted_data: encryption::seal(
                &self.content_key,
                &encryption::segment_nonce(index),
                &self.buffer,
            )?,
            plain_size: self.buffer.len() as u64,
        };

        self.session
            .call(|sat, ctx, key| sat.upload_segment(ctx, key, req))?;
        self.buffer.clear();
        self.next_index += 1;
        Ok(())
    }

    /// Buffers `buf`, uploading a segment every time the buffer is full.
    ///
    /// It returns how many bytes of `buf` were buffered. An error is only returned when none
    /// of them could be, otherwise it's returned by the next write or commit.
    fn write_data(&mut self, buf: &[u8]) -> Result<usize> {
        if self.state != State::Open {
            return Err(Error::TransactionClosed);
        }

        self.begin()?;
        let max = self
            .stream
            .as_ref()
            .map(|s| s.max_segment_size)
            .expect("BUG: an upload must have started after `begin` succeeded");

        let mut written = 0;
        while written < buf.len() {
            if self.buffer.len() >= max {
                if let Err(err) = self.upload_segment() {
                    if written == 0 {
                        return Err(err);
                    }
                    break;
                }
            }

            let n = (max - self.buffer.len()).min(buf.len() - written);
            self.buffer.extend_from_slice(&buf[written..written + n]);
            written += n;
        }

        Ok(written)
    }

    fn ensure_not_done(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Committed => Err(Error::new_uplink(error::Uplink::UploadDone(
                String::from("upload already committed"),
            ))),
            State::Aborted => Err(Error::new_uplink(error::Uplink::UploadDone(
                String::from("upload already aborted"),
            ))),
        }
    }
}

impl std::io::Write for Upload {
    fn flush(&mut self) -> std::io::Result<()> {
        // The buffered data is sent when a segment is full or when the upload is committed.
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_data(buf).map_err(std::io::Error::other)
    }
}

impl Drop for Upload {
    fn drop(&mut self) {
        if self.state == State::Open && self.stream.is_some() {
            // At this point we cannot do anything about the error, so discarded.
            if let Err(err) = self.abort() {
                tracing::debug!(error = %err, "aborting dropped upload failed");
            }
        }
    }
}
