//! Eiger Connection Management
//!
//! Discovers the server API version, builds the resource provider for
//! (address, version) and owns it exclusively for the lifetime of the
//! detector. All resource access goes through the typed helpers here so the
//! resource key ends up in every error message.

use crate::components::resource::{
    CommandResource, FileResource, FromResourceValue, ResourceProvider, ResourceProviderFactory,
    ResourceValue, ValueResource,
};
use anyhow::{Context, Result};

/// API version assumed when the server cannot be asked.
pub const DEFAULT_API_VERSION: &str = "0.8.1";

/// Exclusive handle on one detector server.
pub struct EigerConnection {
    address: String,
    api_version: String,
    provider: Box<dyn ResourceProvider>,
}

impl EigerConnection {
    /// Connect to the server at `address`.
    ///
    /// `api_version` overrides discovery; with `None` the factory is asked
    /// and [`DEFAULT_API_VERSION`] is used if it cannot tell.
    pub fn open(
        factory: &dyn ResourceProviderFactory,
        address: &str,
        api_version: Option<&str>,
    ) -> Result<Self> {
        let api_version = match api_version {
            Some(v) => v.to_string(),
            None => Self::query_api_version(factory, address)?,
        };
        tracing::info!("Eiger API version = {} ({})", api_version, address);

        let provider = factory
            .connect(address, &api_version)
            .with_context(|| format!("Failed to connect to Eiger server at {}", address))?;

        Ok(Self {
            address: address.to_string(),
            api_version,
            provider,
        })
    }

    /// Ask the factory for the server's API version, falling back to
    /// [`DEFAULT_API_VERSION`].
    pub fn query_api_version(
        factory: &dyn ResourceProviderFactory,
        address: &str,
    ) -> Result<String> {
        let reported = factory
            .api_version(address)
            .with_context(|| format!("Failed to query API version from {}", address))?;
        Ok(reported.unwrap_or_else(|| {
            tracing::debug!(
                "Server did not report an API version, assuming {}",
                DEFAULT_API_VERSION
            );
            DEFAULT_API_VERSION.to_string()
        }))
    }

    /// Server address this connection is bound to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// API version the provider was built for.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Resolve a value resource.
    pub fn value(&self, key: &str) -> Result<Box<dyn ValueResource>> {
        self.provider
            .resource(key)
            .and_then(|r| r.into_value())
            .with_context(|| format!("Failed to resolve value resource '{}'", key))
    }

    /// Resolve a command resource.
    pub fn command(&self, key: &str) -> Result<Box<dyn CommandResource>> {
        self.provider
            .resource(key)
            .and_then(|r| r.into_command())
            .with_context(|| format!("Failed to resolve command resource '{}'", key))
    }

    /// Resolve a file resource.
    pub fn file(&self, key: &str) -> Result<Box<dyn FileResource>> {
        self.provider
            .resource(key)
            .and_then(|r| r.into_file())
            .with_context(|| format!("Failed to resolve file resource '{}'", key))
    }

    /// Read a value resource as `T`.
    pub fn get<T: FromResourceValue>(&self, key: &str) -> Result<T> {
        let handle = self.value(key)?;
        let value = handle
            .get()
            .with_context(|| format!("Failed to read '{}'", key))?;
        tracing::debug!("get {} -> {}", key, value);
        value
            .extract(key)
            .with_context(|| format!("Unexpected value type for '{}'", key))
    }

    /// Write a value resource.
    pub fn set(&self, key: &str, value: impl Into<ResourceValue>) -> Result<()> {
        let value = value.into();
        tracing::debug!("set {} <- {}", key, value);
        self.value(key)?
            .set(value)
            .with_context(|| format!("Failed to write '{}'", key))
    }

    /// Run a command resource.
    pub fn execute(&self, key: &str) -> Result<()> {
        tracing::debug!("execute {}", key);
        self.command(key)?
            .execute()
            .with_context(|| format!("Command '{}' failed", key))
    }
}

impl std::fmt::Debug for EigerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EigerConnection")
            .field("address", &self.address)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}
