//! Error types shared by the detector driver crates.
//!
//! Two layers are defined here:
//!
//! - [`DriverError`] carries a [`DriverErrorKind`] so callers can tell a
//!   communication failure apart from a rejected parameter without parsing
//!   message strings. Resource layers wrap it when the device server refuses
//!   or fails an operation.
//! - [`DaqError`] is the application-level enum. It absorbs `DriverError`
//!   and `std::io::Error` via `#[from]` so `?` works across layers.
//!
//! Driver entry points themselves return `anyhow::Result` and attach context;
//! the typed errors stay reachable through `anyhow::Error::downcast_ref`.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Broad category of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Failure while bringing the device up (version discovery, seeding).
    Initialization,
    /// The supplied configuration was rejected.
    Configuration,
    /// The device server could not be reached or answered garbage.
    Communication,
    /// Failure while restoring device state on teardown.
    Shutdown,
    /// The device reported a fault.
    Hardware,
    /// A parameter was out of range or of the wrong type.
    InvalidParameter,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Shutdown => "shutdown",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Structured driver failure: which driver, what kind, and a message.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver type identifier, e.g. `"eiger"`.
    pub driver_type: String,
    /// Failure category.
    pub kind: DriverErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl DriverError {
    /// Build a new driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Primary error type for detector control.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration values parsed but failed semantic validation
    /// (empty address, negative latency, missing table keys).
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File or network I/O failed (download destinations, config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured driver error with category.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// A capability was requested that the device does not offer.
    #[error("Module does not support operation: {0}")]
    ModuleOperationNotSupported(String),
}
