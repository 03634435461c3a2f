//! In-process simulated cluster of satellites and storage nodes for testing the uplink crate.
//!
//! A [`Planet`] runs a configurable number of satellites, which register themselves in the
//! process-local network that the default [`uplink::Config`] dials, and of storage nodes, which
//! keep the remote segments. Each [`client::Uplink`] of the planet holds an API key of its own
//! project in every satellite.
//!
//! ```ignore
//! testplanet::run(testplanet::Config::default(), |planet| {
//!     let satellite = &planet.satellites()[0];
//!     let access = planet.uplinks()[0].access(satellite).unwrap();
//!     let project = uplink::Project::open(&access).unwrap();
//!     // ...
//! });
//! ```

#![deny(missing_docs)]

mod metainfo;

pub mod client;
pub mod satellite;
pub mod storagenode;

pub use client::Uplink;
pub use satellite::Satellite;
pub use storagenode::StorageNode;

use uplink::transport::local::{Network, Registration};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Port of the first satellite's address; each satellite gets the next one, so the planets of
/// the same process never share addresses.
static NEXT_PORT: AtomicU32 = AtomicU32::new(10000);

/// Configuration of a planet.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of satellites.
    pub satellite_count: usize,
    /// Number of storage nodes shared by all the satellites.
    pub storage_node_count: usize,
    /// Number of clients.
    pub uplink_count: usize,
    /// Maximum number of plain bytes of each segment.
    pub max_segment_size: usize,
    /// Time that the satellites take for answering each call.
    pub latency: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            satellite_count: 1,
            storage_node_count: 4,
            uplink_count: 1,
            max_segment_size: 64 * 1024 * 1024,
            latency: Duration::ZERO,
        }
    }
}

/// A running simulated cluster.
///
/// Its satellites are unregistered from the process-local network when it's dropped.
#[derive(Debug)]
pub struct Planet {
    // Declared first for unregistering the satellites before releasing them.
    registrations: Vec<Registration>,
    satellites: Vec<Arc<Satellite>>,
    storage_nodes: Vec<Arc<StorageNode>>,
    uplinks: Vec<Uplink>,
}

impl Planet {
    /// Starts a planet with `config`.
    ///
    /// It returns an error if a satellite cannot be registered in the process-local network.
    pub fn new(config: Config) -> uplink::Result<Self> {
        let storage_nodes: Vec<Arc<StorageNode>> = (0..config.storage_node_count)
            .map(|i| Arc::new(StorageNode::new(i)))
            .collect();

        let network = Network::global();
        let mut satellites = Vec::with_capacity(config.satellite_count);
        let mut registrations = Vec::with_capacity(config.satellite_count);
        for _ in 0..config.satellite_count {
            let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
            let satellite = Arc::new(Satellite::new(
                format!("127.0.0.1:{}", port),
                &config,
                storage_nodes.clone(),
            ));

            registrations.push(network.register(satellite.url(), satellite.clone())?);
            satellites.push(satellite);
        }

        let uplinks = (0..config.uplink_count)
            .map(|_| Uplink::new(&satellites))
            .collect();

        tracing::debug!(
            satellites = config.satellite_count,
            storage_nodes = config.storage_node_count,
            uplinks = config.uplink_count,
            "planet started"
        );

        Ok(Self {
            registrations,
            satellites,
            storage_nodes,
            uplinks,
        })
    }

    /// Returns the satellites.
    pub fn satellites(&self) -> &[Arc<Satellite>] {
        &self.satellites
    }

    /// Returns the storage nodes.
    pub fn storage_nodes(&self) -> &[Arc<StorageNode>] {
        &self.storage_nodes
    }

    /// Returns the clients.
    pub fn uplinks(&self) -> &[Uplink] {
        &self.uplinks
    }
}

impl Drop for Planet {
    fn drop(&mut self) {
        self.registrations.clear();
        tracing::debug!("planet stopped");
    }
}

/// Starts a planet with `config`, calls `f` with it and stops it.
///
/// It panics if the planet cannot be started.
pub fn run<F: FnOnce(&Planet)>(config: Config, f: F) {
    init_logging();
    let planet = Planet::new(config).expect("BUG: planet's satellites must have unique addresses");
    f(&planet);
}

/// Installs a global tracing subscriber which writes to the test output, filtered by the
/// `RUST_LOG` environment variable and logging warnings by default.
///
/// It does nothing if a global subscriber is already installed.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}
