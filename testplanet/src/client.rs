//! Clients of a planet.

use crate::satellite::Satellite;

use parking_lot::Mutex;
use uplink::access::Grant;
use uplink::macaroon::ApiKey;
use uplink::transport::NodeId;
use uplink::{backcomp, error, Config, Context, Error, Project, Result};

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// Passphrase of the access grants derived by the clients.
const PASSPHRASE: &str = "testplanet-uplink";

/// A client of a planet which owns a project in each satellite.
#[derive(Debug)]
pub struct Uplink {
    api_keys: HashMap<NodeId, ApiKey>,
    grants: Mutex<HashMap<NodeId, Grant>>,
}

impl Uplink {
    pub(crate) fn new(satellites: &[Arc<Satellite>]) -> Self {
        Self {
            api_keys: satellites
                .iter()
                .map(|s| (s.id(), s.create_project()))
                .collect(),
            grants: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the API key of the client's project in the satellite with `id`.
    pub fn api_key(&self, id: &NodeId) -> Option<&ApiKey> {
        self.api_keys.get(id)
    }

    /// Returns the access grant of the client's project in `satellite` with all the permissions.
    ///
    /// The access grant is derived from a fixed passphrase the first time that it's requested.
    pub fn access(&self, satellite: &Satellite) -> Result<Grant> {
        if let Some(grant) = self.grants.lock().get(&satellite.id()) {
            return Ok(grant.clone());
        }

        let api_key = self.api_key(&satellite.id()).ok_or_else(|| {
            Error::Uplink(error::Uplink::PermissionDenied(format!(
                "client doesn't have a project in the satellite {}",
                satellite.id()
            )))
        })?;

        let grant = backcomp::request_access_with_passphrase_and_concurrency(
            &Context::background(),
            &Config::default(),
            &satellite.url().to_string(),
            &api_key.serialize(),
            PASSPHRASE,
            1,
        )?;

        self.grants.lock().insert(satellite.id(), grant.clone());
        Ok(grant)
    }

    /// Creates `bucket` in the client's project of `satellite` if it doesn't exist.
    pub fn create_bucket(&self, satellite: &Satellite, bucket: &str) -> Result<()> {
        let project = Project::open(&self.access(satellite)?)?;
        project.ensure_bucket(bucket)?;
        project.close()
    }

    /// Uploads `data` to the object of `bucket` with `key`, creating the bucket if it doesn't
    /// exist.
    pub fn upload(&self, satellite: &Satellite, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let project = Project::open(&self.access(satellite)?)?;
        project.ensure_bucket(bucket)?;

        let mut upload = project.upload_object(bucket, key, None)?;
        upload.write_all(data)?;
        upload.commit()?;

        project.close()
    }

    /// Downloads the whole content of the object of `bucket` with `key`.
    pub fn download(&self, satellite: &Satellite, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let project = Project::open(&self.access(satellite)?)?;

        let mut download = project.download_object(bucket, key, None)?;
        let mut data = Vec::new();
        download.read_to_end(&mut data)?;
        download.close()?;

        project.close()?;
        Ok(data)
    }
}
