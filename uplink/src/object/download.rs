//! Contains information and operations for downloading objects.

use crate::encryption::{self, Key};
use crate::project::Session;
use crate::transport::SegmentInfo;
use crate::{object, Error, Result};

use std::sync::Arc;

/// Allows to download the object's data from the Storj DCS network.
///
/// The segments are requested and decrypted lazily as the data is read.
#[derive(Debug)]
pub struct Download {
    session: Arc<Session>,
    bucket: String,
    encrypted_key: String,
    content_key: Key,
    info: object::Info,
    /// The segments with the offset, in the object's content, of their first byte.
    segments: Vec<(u64, SegmentInfo)>,
    /// The offset, in the object's content, of the next byte to read.
    pos: u64,
    /// The offset, in the object's content, where the download ends.
    end: u64,
    /// The last fetched segment: its index in `segments` and its plain data.
    current: Option<(usize, Vec<u8>)>,
    closed: bool,
}

impl Download {
    /// Creates a download of the range of the object's content that starts at `offset` and has
    /// `length` bytes.
    ///
    /// A negative `offset` starts at that number of bytes before the end of the content and a
    /// negative `length` reads until the end of the content.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session: Arc<Session>,
        bucket: &str,
        encrypted_key: String,
        content_key: Key,
        info: object::Info,
        segments: Vec<SegmentInfo>,
        offset: i64,
        length: i64,
    ) -> Result<Self> {
        let size = info.metadata_system.content_length;

        let start = if offset < 0 {
            if length >= 0 {
                return Err(Error::new_invalid_arguments(
                    "(offset,length)",
                    "a negative offset is only allowed with a negative length",
                ));
            }
            size.saturating_sub(offset.unsigned_abs())
        } else {
            (offset as u64).min(size)
        };

        let end = if length < 0 {
            size
        } else {
            start.saturating_add(length as u64).min(size)
        };

        let mut next = 0;
        let segments = segments
            .into_iter()
            .filter(|s| s.plain_size > 0)
            .map(|s| {
                let first = next;
                next += s.plain_size;
                (first, s)
            })
            .collect();

        Ok(Self {
            session,
            bucket: String::from(bucket),
            encrypted_key,
            content_key,
            info,
            segments,
            pos: start,
            end,
            current: None,
            closed: false,
        })
    }

    /// Returns information about the downloaded object.
    pub fn info(&self) -> &object::Info {
        &self.info
    }

    /// Closes the download. Any further read returns a [`Error::TransactionClosed`] error.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::TransactionClosed);
        }

        self.closed = true;
        self.current = None;
        Ok(())
    }

    /// Copies to `buf` the data from the current position, fetching the segment which contains
    /// it if it isn't fetched yet.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::TransactionClosed);
        }

        if self.pos >= self.end || buf.is_empty() {
            return Ok(0);
        }

        let pos = self.pos;
        let i = self
            .segments
            .iter()
            .rposition(|(first, _)| *first <= pos)
            .ok_or_else(|| {
                Error::new_internal_without_inner("object's segments don't cover its content")
            })?;

        if self.current.as_ref().map(|(c, _)| *c) != Some(i) {
            let data = self.fetch_segment(i)?;
            self.current = Some((i, data));
        }

        let (first, _) = self.segments[i];
        let Some((_, data)) = &self.current else {
            return Err(Error::new_internal_without_inner(
                "object's segment wasn't fetched",
            ));
        };

        let from = (pos - first) as usize;
        if from >= data.len() {
            return Err(Error::new_internal_without_inner(
                "object's segment is shorter than its declared size",
            ));
        }

        let n = buf
            .len()
            .min(data.len() - from)
            .min((self.end - pos) as usize);
        buf[..n].copy_from_slice(&data[from..from + n]);
        self.pos += n as u64;

        Ok(n)
    }

    /// Downloads and decrypts the segment at position `i` of `self.segments`.
    fn fetch_segment(&self, i: usize) -> Result<Vec<u8>> {
        let index = self.segments[i].1.index;
        let encrypted = self.session.call(|sat, ctx, key| {
            sat.download_segment(ctx, key, &self.bucket, &self.encrypted_key, index)
        })?;

        encryption::open(
            &self.content_key,
            &encryption::segment_nonce(index),
            &encrypted,
        )
        .ok_or_else(|| {
            Error::new_internal_without_inner(
                "object's segment cannot be decrypted with its content key",
            )
        })
    }
}

impl std::io::Read for Download {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_data(buf).map_err(std::io::Error::other)
    }
}
