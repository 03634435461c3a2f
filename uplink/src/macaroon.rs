//! API keys: HMAC chained bearer tokens whose permissions can be narrowed by anybody holding them
//! but only verified by the satellite that issued them.
//!
//! An API key is a head, a list of caveats and a tail. The satellite creates the head and derives
//! the first tail as `HMAC(secret, head)`; every caveat appended to the key replaces the tail by
//! `HMAC(tail, caveat)`. Removing a caveat requires the tail which precedes it, so restricting a
//! key is an irreversible operation and the satellite, which knows the secret, can verify the
//! whole chain.

use crate::encryption::hmac_sha256;
use crate::{error, Error, Result};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use std::collections::HashSet;
use std::time::Duration;

/// Version of the API key serialization format.
const SERIALIZATION_VERSION: u8 = 0;
/// Size in bytes of the head of the new API keys.
const HEAD_SIZE: usize = 32;

/// A tail of the chain of HMACs of an API key.
pub type Tail = [u8; 32];

/// The HMAC chain.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Macaroon {
    head: Vec<u8>,
    caveats: Vec<Vec<u8>>,
    tail: Tail,
}

/// An API key issued by a satellite for a project.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    mac: Macaroon,
}

impl ApiKey {
    /// Creates a new unrestricted API key signed with `secret`.
    ///
    /// Only the satellites issue API keys; they keep `secret` for verifying them.
    pub fn new(secret: &[u8]) -> Self {
        let head: [u8; HEAD_SIZE] = rand::random();
        let tail = hmac_sha256(secret, &head);

        Self {
            mac: Macaroon {
                head: head.to_vec(),
                caveats: Vec::new(),
                tail,
            },
        }
    }

    /// Parses a serialized API key returned by [`Self::serialize`].
    pub fn parse(serialized: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(serialized)
            .map_err(|err| Error::InvalidCredentials(format!("invalid API key encoding: {}", err)))?;

        match bytes.split_first() {
            Some((&SERIALIZATION_VERSION, payload)) => {
                let mac: Macaroon = bincode::deserialize(payload).map_err(|err| {
                    Error::InvalidCredentials(format!("invalid API key: {}", err))
                })?;

                if mac.head.is_empty() {
                    return Err(Error::InvalidCredentials(String::from(
                        "invalid API key: empty head",
                    )));
                }

                Ok(Self { mac })
            }
            Some((version, _)) => Err(Error::InvalidCredentials(format!(
                "invalid API key: unsupported version {}",
                version
            ))),
            None => Err(Error::InvalidCredentials(String::from(
                "invalid API key: empty",
            ))),
        }
    }

    /// Serializes the API key into a URL safe string.
    pub fn serialize(&self) -> String {
        let mut bytes = vec![SERIALIZATION_VERSION];
        // Serializing an in-memory struct of vectors into a vector never fails.
        bytes.extend(bincode::serialize(&self.mac).expect("BUG: API key serialization"));
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns a new API key with the `caveat` appended, so it only allows what this API key and
    /// `caveat` allow.
    pub fn restrict(&self, caveat: &Caveat) -> Result<Self> {
        let encoded = bincode::serialize(caveat)
            .map_err(|err| Error::new_internal("encoding caveat", err.into()))?;

        let mut mac = self.mac.clone();
        mac.tail = hmac_sha256(&mac.tail, &encoded);
        mac.caveats.push(encoded);

        Ok(Self { mac })
    }

    /// Returns the head of the API key, which identifies the API key that all the API keys
    /// restricted from it derive from.
    pub fn head(&self) -> &[u8] {
        &self.mac.head
    }

    /// Returns the current tail.
    pub fn tail(&self) -> &Tail {
        &self.mac.tail
    }

    /// Returns the decoded caveats in the order that they were appended.
    pub fn caveats(&self) -> Result<Vec<Caveat>> {
        self.mac
            .caveats
            .iter()
            .map(|c| {
                bincode::deserialize(c).map_err(|err| Error::new_internal("decoding caveat", err.into()))
            })
            .collect()
    }

    /// Returns the number of caveats.
    pub fn caveats_len(&self) -> usize {
        self.mac.caveats.len()
    }

    /// Returns true if the caveats of this API key are the first caveats of `other` and `other`
    /// has more; that's `other` is this API key further restricted.
    pub fn is_parent_of(&self, other: &ApiKey) -> bool {
        self.mac.head == other.mac.head
            && self.mac.caveats.len() < other.mac.caveats.len()
            && self
                .mac
                .caveats
                .iter()
                .zip(&other.mac.caveats)
                .all(|(a, b)| a == b)
    }

    /// Returns all the tails of the chain computed with `secret`, from the one of the head to the
    /// one of the last caveat.
    pub fn tails(&self, secret: &[u8]) -> Vec<Tail> {
        let mut tails = Vec::with_capacity(self.mac.caveats.len() + 1);
        let mut tail = hmac_sha256(secret, &self.mac.head);
        tails.push(tail);
        for c in &self.mac.caveats {
            tail = hmac_sha256(&tail, c);
            tails.push(tail);
        }

        tails
    }

    /// Verifies that the API key was issued with `secret`, that none of its tails is `revoked`
    /// and that all its caveats allow `action`.
    ///
    /// It returns an [`error::Uplink::AuthorizationExpired`] if the time of the action is out of
    /// the validity period of any caveat and [`error::Uplink::PermissionDenied`] for any other
    /// verification failure.
    pub fn check(&self, secret: &[u8], action: &Action, revoked: &HashSet<Tail>) -> Result<()> {
        let tails = self.tails(secret);
        if !tails.last().is_some_and(|t| constant_time_eq(t, &self.mac.tail)) {
            return Err(permission_denied("invalid API key signature"));
        }

        if tails.iter().any(|t| revoked.contains(t)) {
            return Err(permission_denied("API key has been revoked"));
        }

        for caveat in self
            .caveats()
            .map_err(|_| permission_denied("invalid API key caveat"))?
        {
            caveat.check(action)?;
        }

        Ok(())
    }

    /// Verifies that `now` is inside of the validity period of every caveat.
    ///
    /// It doesn't verify the signature, hence it's the check that a client can do without the
    /// secret.
    pub fn check_time(&self, now: Duration) -> Result<()> {
        for caveat in self.caveats()? {
            caveat.check_time(now)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("head", &hex::encode(&self.mac.head))
            .field("caveats", &self.mac.caveats.len())
            .finish_non_exhaustive()
    }
}

/// A restriction appended to an API key.
///
/// An operation is allowed by the caveat when it isn't disallowed by any flag, it happens inside
/// of the time window and it targets one of the allowed paths, if there is any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    /// Disallows downloading objects and getting the information of buckets and objects.
    pub disallow_reads: bool,
    /// Disallows uploading objects and creating buckets.
    pub disallow_writes: bool,
    /// Disallows listing buckets and objects.
    pub disallow_lists: bool,
    /// Disallows deleting objects and buckets.
    pub disallow_deletes: bool,
    /// When it isn't empty, the operations are only allowed on these paths.
    pub allowed_paths: Vec<CaveatPath>,
    /// The operations aren't allowed before this time, measured since the Unix Epoch time.
    pub not_before: Option<Duration>,
    /// The operations aren't allowed after this time, measured since the Unix Epoch time.
    pub not_after: Option<Duration>,
    /// Random value that makes every restricted API key unique.
    pub nonce: u64,
}

impl Caveat {
    /// Verifies that the caveat allows `action`.
    pub fn check(&self, action: &Action) -> Result<()> {
        self.check_time(action.time)?;

        let disallowed = match action.op {
            ActionType::Read => self.disallow_reads,
            ActionType::Write => self.disallow_writes,
            ActionType::List => self.disallow_lists,
            ActionType::Delete => self.disallow_deletes,
            ActionType::ProjectInfo => false,
        };
        if disallowed {
            return Err(permission_denied(&format!(
                "API key doesn't allow {:?} operations",
                action.op
            )));
        }

        if self.allowed_paths.is_empty() || action.bucket.is_empty() {
            return Ok(());
        }

        if self.allowed_paths.iter().any(|p| p.allows(action)) {
            return Ok(());
        }

        Err(permission_denied("API key doesn't allow operations on this path"))
    }

    /// Verifies that `now` is inside of the validity period of the caveat.
    pub fn check_time(&self, now: Duration) -> Result<()> {
        if self.not_before.is_some_and(|nb| now < nb) {
            return Err(Error::new_uplink(error::Uplink::AuthorizationExpired(
                String::from("API key isn't valid yet"),
            )));
        }

        if self.not_after.is_some_and(|na| now > na) {
            return Err(Error::new_uplink(error::Uplink::AuthorizationExpired(
                String::from("API key has expired"),
            )));
        }

        Ok(())
    }
}

/// A path where a caveat allows operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveatPath {
    /// The bucket's name.
    pub bucket: String,
    /// The encrypted prefix inside of the bucket; an empty prefix allows the whole bucket.
    pub encrypted_path_prefix: String,
}

impl CaveatPath {
    /// Returns true if `action` targets this path.
    ///
    /// An action without path targets the bucket, so it's allowed when the bucket matches.
    /// Otherwise, the path must be the prefix or be inside of it; the prefix is matched by whole
    /// components, so the prefix `a` doesn't allow the path `ab`.
    pub fn allows(&self, action: &Action) -> bool {
        if self.bucket != action.bucket {
            return false;
        }

        let prefix = self.encrypted_path_prefix.as_str();
        let path = action.encrypted_path.as_str();
        if prefix.is_empty() || path.is_empty() || path == prefix {
            return true;
        }

        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Kinds of operations checked against the caveats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Downloading an object or getting the information of a bucket or an object.
    Read,
    /// Uploading an object or creating a bucket.
    Write,
    /// Listing buckets or objects.
    List,
    /// Deleting objects or buckets.
    Delete,
    /// Getting the project information (e.g. the salt); always allowed to a valid API key.
    ProjectInfo,
}

/// An operation to authorize.
#[derive(Debug, Clone)]
pub struct Action {
    /// The kind of operation.
    pub op: ActionType,
    /// The bucket's name, empty for operations that doesn't target a bucket.
    pub bucket: String,
    /// The encrypted object's path or prefix, empty for operations on the bucket.
    pub encrypted_path: String,
    /// The time of the operation, measured since the Unix Epoch time.
    pub time: Duration,
}

fn permission_denied(msg: &str) -> Error {
    Error::new_uplink(error::Uplink::PermissionDenied(String::from(msg)))
}

fn constant_time_eq(a: &Tail, b: &Tail) -> bool {
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
