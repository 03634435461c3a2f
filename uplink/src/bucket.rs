//! Storj DSC Bucket and related types.

use crate::project::Session;
use crate::transport::{BucketInfo, ListBucketsRequest};
use crate::Result;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Contains information about a specific bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Name of the bucket.
    pub name: String,
    /// Unix Epoch time when the bucket was created.
    pub created_at: Duration,
}

impl Bucket {
    /// Creates a Bucket instance from the bucket returned by the satellite.
    pub(crate) fn from_bucket_info(info: BucketInfo) -> Self {
        Self {
            name: info.name,
            created_at: info.created,
        }
    }
}

/// Iterates over a collection of buckets.
///
/// The buckets are requested to the satellite lazily, one page at a time, when all the buckets of
/// the last page have been returned. The iteration ends after returning the first error.
#[derive(Debug)]
pub struct Iterator {
    session: Arc<Session>,
    cursor: String,
    page: VecDeque<Bucket>,
    more: bool,
    done: bool,
}

impl Iterator {
    /// Creates an iterator which returns the buckets whose name sorts after `cursor`.
    pub(crate) fn new(session: Arc<Session>, cursor: &str) -> Self {
        Self {
            session,
            cursor: String::from(cursor),
            page: VecDeque::new(),
            more: true,
            done: false,
        }
    }

    /// Requests the next page of buckets.
    fn fetch(&mut self) -> Result<()> {
        let req = ListBucketsRequest {
            cursor: self.cursor.clone(),
            limit: self.session.config().list_page_size(),
        };

        let page = self
            .session
            .call(|sat, ctx, key| sat.list_buckets(ctx, key, &req))?;

        self.more = page.more && !page.items.is_empty();
        if let Some(last) = page.items.last() {
            self.cursor = last.name.clone();
        }
        self.page
            .extend(page.items.into_iter().map(Bucket::from_bucket_info));

        Ok(())
    }
}

impl std::iter::Iterator for Iterator {
    type Item = Result<Bucket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.page.is_empty() {
            if !self.more {
                self.done = true;
                return None;
            }

            if let Err(err) = self.fetch() {
                self.done = true;
                return Some(Err(err));
            }
        }

        self.page.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_bucket_info() {
        let bucket = Bucket::from_bucket_info(BucketInfo {
            name: String::from("a-bucket"),
            created: Duration::from_secs(1_700_000_000),
        });

        assert_eq!(bucket.name, "a-bucket", "name");
        assert_eq!(
            bucket.created_at,
            Duration::from_secs(1_700_000_000),
            "created_at"
        );
    }
}
