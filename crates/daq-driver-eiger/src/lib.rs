//! Dectris Eiger Detector Driver
//!
//! Control-plane driver for Eiger X-ray detectors. Every detector feature is
//! a named resource on the detector server; this crate maps typed getters,
//! setters and commands onto those resources and manages the downloaded
//! image file.
//!
//! Component layout:
//! - Resource: the value/command/file resource model and provider traits
//! - Tables: trigger mode and subsystem state encodings
//! - Connection: API version discovery and provider ownership
//! - Features: one accessor per detector feature
//! - Session: the single open image file
//!
//! [`EigerDetector`] is the synchronous facade; [`EigerDriver`] adapts it to
//! the async `daq-core` capabilities. The HTTP transport is supplied by the
//! caller as a [`ResourceProviderFactory`]; the `mock` feature provides an
//! in-memory server.

pub mod components;
pub mod config;
pub mod detector;
pub mod driver;
#[cfg(feature = "mock")]
pub mod mock;

pub use crate::components::connection::{EigerConnection, DEFAULT_API_VERSION};
pub use crate::components::features::{EigerFeatures, PixelSize};
pub use crate::components::resource::{
    CommandResource, FileResource, FromResourceValue, Resource, ResourceError, ResourceKind,
    ResourceProvider, ResourceProviderFactory, ResourceValue, ValueResource,
};
pub use crate::components::session::{FileSession, ImageFile, ImageFileOpener};
pub use crate::components::tables::{DetectorState, Subsystem, TriggerMode};
pub use crate::config::{ConfigLoadError, EigerConfig};
pub use crate::detector::{EigerDetector, LastError};
pub use crate::driver::{EigerDriver, EigerDriverFactory, DRIVER_TYPE};
