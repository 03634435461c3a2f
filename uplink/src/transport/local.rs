//! Process-local network where in-process satellites are reachable by their address.

use super::{Dialer, NodeId, NodeUrl, Satellite};
use crate::{error, Context, Error, Result};

use parking_lot::RwLock;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Registry of the satellites running in the current process, indexed by their addresses.
///
/// [`Network::global`] is the instance used by the default [`Config`](crate::Config).
#[derive(Default)]
pub struct Network {
    satellites: RwLock<HashMap<String, Node>>,
}

struct Node {
    id: NodeId,
    satellite: Arc<dyn Satellite>,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the network shared by the whole process.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<Network>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Network::new())))
    }

    /// Makes `satellite` reachable at the address of `url` until the returned registration is
    /// dropped.
    ///
    /// It fails if another satellite is registered at the same address.
    pub fn register(
        self: &Arc<Self>,
        url: &NodeUrl,
        satellite: Arc<dyn Satellite>,
    ) -> Result<Registration> {
        let mut satellites = self.satellites.write();
        if satellites.contains_key(&url.address) {
            return Err(Error::new_invalid_arguments(
                "url",
                "address is already in use by another satellite",
            ));
        }

        satellites.insert(
            url.address.clone(),
            Node {
                id: url.id,
                satellite,
            },
        );

        tracing::debug!(url = %url, "satellite registered in the local network");
        Ok(Registration {
            network: Arc::clone(self),
            address: url.address.clone(),
        })
    }

    /// Returns the satellite of `url`.
    pub fn lookup(&self, url: &NodeUrl) -> Result<Arc<dyn Satellite>> {
        let satellites = self.satellites.read();
        match satellites.get(&url.address) {
            Some(node) if node.id == url.id => Ok(Arc::clone(&node.satellite)),
            Some(node) => Err(Error::new_uplink(error::Uplink::DialFailed(format!(
                "node ID mismatch at '{}': expected {}, found {}",
                url.address, url.id, node.id
            )))),
            None => Err(Error::new_uplink(error::Uplink::DialFailed(format!(
                "no satellite listening at '{}'",
                url.address
            )))),
        }
    }

    fn unregister(&self, address: &str) {
        self.satellites.write().remove(address);
        tracing::debug!(address, "satellite unregistered from the local network");
    }
}

impl Dialer for Network {
    fn dial(&self, ctx: &Context, url: &NodeUrl) -> Result<Arc<dyn Satellite>> {
        ctx.check()?;
        self.lookup(url)
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("satellites", &self.satellites.read().len())
            .finish()
    }
}

/// Keeps a satellite registered in a [`Network`]; the satellite is unregistered when it's
/// dropped.
#[derive(Debug)]
pub struct Registration {
    network: Arc<Network>,
    address: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.network.unregister(&self.address);
    }
}
