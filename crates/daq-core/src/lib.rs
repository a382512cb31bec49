//! `daq-core`
//!
//! Shared building blocks for detector drivers:
//!
//! - [`capabilities`]: async capability traits (`Triggerable`, `ExposureControl`,
//!   `Readable`, `Commandable`) a driver implements for the features it has.
//! - [`driver`]: the registry plugin surface (`DriverFactory`,
//!   `DeviceComponents`, `Capability`).
//! - [`error`]: `DaqError` and the structured `DriverError`.

pub mod capabilities;
pub mod driver;
pub mod error;

// Re-export commonly used types
pub use anyhow::{anyhow, Result};
pub use error::{DaqError, DriverError, DriverErrorKind};
