//! State shared by a project and the uploads, downloads and iterators created from it.

use crate::config::Config;
use crate::encryption::Store;
use crate::macaroon::ApiKey;
use crate::transport::Satellite;
use crate::{Context, Result};

use std::sync::Arc;

/// An open connection to the satellite of an access grant, with the credentials needed for
/// issuing calls to it and for encrypting and decrypting the object's paths.
pub(crate) struct Session {
    satellite: Arc<dyn Satellite>,
    api_key: ApiKey,
    encryption: Store,
    ctx: Context,
    config: Config,
}

impl Session {
    pub(crate) fn new(
        satellite: Arc<dyn Satellite>,
        api_key: ApiKey,
        encryption: Store,
        ctx: Context,
        config: Config,
    ) -> Self {
        Self {
            satellite,
            api_key,
            encryption,
            ctx,
            config,
        }
    }

    /// Issues a call to the satellite checking the session's context before and after it.
    pub(crate) fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Satellite, &Context, &ApiKey) -> Result<T>,
    {
        self.ctx.check()?;
        let res = f(self.satellite.as_ref(), &self.ctx, &self.api_key)?;
        self.ctx.check()?;
        Ok(res)
    }

    pub(crate) fn encryption(&self) -> &Store {
        &self.encryption
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_key", &self.api_key)
            .field("bypass", &self.encryption.is_bypass())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
