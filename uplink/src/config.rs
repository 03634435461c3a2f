//! Uplink configuration.

use crate::transport::local::Network;
use crate::transport::Dialer;
use crate::{Error, Result};

use std::sync::Arc;
use std::time::Duration;

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "uplink-rust";
/// Default time to wait for establishing a connection to a satellite.
const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of items requested to the satellite on each listing page.
const DEFAULT_LIST_PAGE_SIZE: usize = 100;

/// Defines configuration for using Uplink library.
#[derive(Clone)]
pub struct Config {
    /// Identifies the application how is contacting with the satellite.
    /// The user agent is used for statistics and for identifying the usage coming from associated
    /// partners.
    user_agent: String,
    /// Defines how long the client should wait for establishing a connection to  peers.
    dial_timeout: Duration,
    /// Number of items requested to the satellite on each page when listing buckets or objects.
    list_page_size: usize,
    /// Establishes the connections with the satellites.
    dialer: Arc<dyn Dialer>,
}

impl Config {
    /// Creates a configuration with the specific user agent and dial timeout, which dials the
    /// satellites registered in the process-local network.
    ///
    /// The user agent cannot be empty nor contain control characters.
    pub fn new(user_agent: &str, dial_timeout: Duration) -> Result<Self> {
        if user_agent.is_empty() {
            return Err(Error::new_invalid_arguments("user_agent", "cannot be empty"));
        }

        if let Some(i) = user_agent.find(char::is_control) {
            return Err(Error::new_invalid_arguments(
                "user_agent",
                &format!("cannot contain control characters. Control character found at {}", i),
            ));
        }

        Ok(Self {
            user_agent: String::from(user_agent),
            dial_timeout,
            ..Default::default()
        })
    }

    /// Returns the same configuration but dialing the satellites through `dialer`.
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Returns the same configuration but requesting `size` items on each listing page.
    ///
    /// `size` must be greater than 0.
    pub fn with_list_page_size(mut self, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::new_invalid_arguments(
                "size",
                "must be greater than 0",
            ));
        }

        self.list_page_size = size;
        Ok(self)
    }

    /// Returns the configured dial timeout.
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    /// Returns the configured user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the configured number of items of each listing page.
    pub fn list_page_size(&self) -> usize {
        self.list_page_size
    }

    /// Returns the dialer.
    pub(crate) fn dialer(&self) -> &Arc<dyn Dialer> {
        &self.dialer
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: String::from(DEFAULT_USER_AGENT),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            dialer: Network::global(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("dial_timeout", &self.dial_timeout)
            .field("list_page_size", &self.list_page_size)
            .finish_non_exhaustive()
    }
}
