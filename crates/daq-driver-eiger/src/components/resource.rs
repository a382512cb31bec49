//! Detector Server Resource Model
//!
//! Every detector feature lives behind a named resource on the detector
//! server. A resource is exactly one of three kinds, resolved once when the
//! provider looks it up:
//!
//! - **Value**: readable/writable scalar (`exposure`, `trigger_mode`, ...)
//! - **Command**: invokable action (`arm`, `trigger`, ...)
//! - **File**: downloadable/erasable data file (`datafile`)
//!
//! Callers match on [`Resource`] (or use `into_value`/`into_command`/
//! `into_file`) instead of casting. Handles are cheap and acquired per call;
//! nothing here caches them.
//!
//! The HTTP transport behind a provider is not part of this crate. Anything
//! implementing [`ResourceProviderFactory`] can back the detector, including
//! the in-memory server in [`crate::mock`].

use daq_core::error::DriverError;
use std::fmt;
use std::path::Path;
use thiserror::Error;

// =============================================================================
// Values
// =============================================================================

/// A typed scalar carried by a value resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    /// Boolean flag (`compression`, `pixel_mask`, ...)
    Bool(bool),
    /// Integer (`nimages`, `bit_depth_readout`, ...)
    Int(i64),
    /// Floating point (`exposure`, `temp`, ...)
    Double(f64),
    /// String (`trigger_mode`, `description`, ...)
    Str(String),
}

impl ResourceValue {
    /// Name of the carried type, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceValue::Bool(_) => "bool",
            ResourceValue::Int(_) => "int",
            ResourceValue::Double(_) => "double",
            ResourceValue::Str(_) => "string",
        }
    }

    /// Convert into a concrete Rust type, naming `resource` on mismatch.
    pub fn extract<T: FromResourceValue>(self, resource: &str) -> Result<T, ResourceError> {
        let actual = self.type_name();
        T::from_resource_value(self).ok_or_else(|| ResourceError::TypeMismatch {
            name: resource.to_string(),
            expected: T::TYPE_NAME,
            actual,
        })
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::Bool(v) => write!(f, "{}", v),
            ResourceValue::Int(v) => write!(f, "{}", v),
            ResourceValue::Double(v) => write!(f, "{}", v),
            ResourceValue::Str(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<bool> for ResourceValue {
    fn from(v: bool) -> Self {
        ResourceValue::Bool(v)
    }
}

impl From<i64> for ResourceValue {
    fn from(v: i64) -> Self {
        ResourceValue::Int(v)
    }
}

impl From<i32> for ResourceValue {
    fn from(v: i32) -> Self {
        ResourceValue::Int(i64::from(v))
    }
}

impl From<u32> for ResourceValue {
    fn from(v: u32) -> Self {
        ResourceValue::Int(i64::from(v))
    }
}

impl From<f64> for ResourceValue {
    fn from(v: f64) -> Self {
        ResourceValue::Double(v)
    }
}

impl From<String> for ResourceValue {
    fn from(v: String) -> Self {
        ResourceValue::Str(v)
    }
}

impl From<&str> for ResourceValue {
    fn from(v: &str) -> Self {
        ResourceValue::Str(v.to_string())
    }
}

/// Types a [`ResourceValue`] can be read back as.
///
/// Integers widen to `f64`; every other cross-type read is a mismatch.
pub trait FromResourceValue: Sized {
    /// Type name reported in mismatch errors.
    const TYPE_NAME: &'static str;

    /// Convert, or `None` if the value holds another type.
    fn from_resource_value(value: ResourceValue) -> Option<Self>;
}

impl FromResourceValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_resource_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl FromResourceValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_resource_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl FromResourceValue for i32 {
    const TYPE_NAME: &'static str = "int";

    fn from_resource_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Int(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromResourceValue for f64 {
    const TYPE_NAME: &'static str = "double";

    #[allow(clippy::cast_precision_loss)]
    fn from_resource_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Double(v) => Some(v),
            ResourceValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FromResourceValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_resource_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Kind of a resource, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Readable/writable scalar
    Value,
    /// Invokable action
    Command,
    /// Downloadable/erasable file
    File,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Value => "value",
            ResourceKind::Command => "command",
            ResourceKind::File => "file",
        };
        write!(f, "{}", label)
    }
}

/// Failures raised by the resource layer.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// No resource with this name exists on the server.
    #[error("Resource '{0}' not found on detector server")]
    NotFound(String),

    /// The resource exists but is of another kind.
    #[error("Resource '{name}' is a {actual} resource, expected {expected}")]
    WrongKind {
        /// Resource key
        name: String,
        /// Kind the caller asked for
        expected: ResourceKind,
        /// Kind the server reported
        actual: ResourceKind,
    },

    /// The value held by the resource has another type than requested.
    #[error("Resource '{name}' holds a {actual} value, expected {expected}")]
    TypeMismatch {
        /// Resource key
        name: String,
        /// Requested type
        expected: &'static str,
        /// Type actually held
        actual: &'static str,
    },

    /// The device server rejected or failed the operation.
    #[error(transparent)]
    Device(#[from] DriverError),

    /// Local file system failure (download destination).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Handles
// =============================================================================

/// Readable/writable scalar resource.
pub trait ValueResource: Send {
    /// Resource key
    fn name(&self) -> &str;

    /// Read the current value from the device.
    fn get(&self) -> Result<ResourceValue, ResourceError>;

    /// Write a new value to the device.
    fn set(&self, value: ResourceValue) -> Result<(), ResourceError>;
}

/// Invokable action resource.
pub trait CommandResource: Send {
    /// Resource key
    fn name(&self) -> &str;

    /// Run the command on the device.
    fn execute(&self) -> Result<(), ResourceError>;
}

/// Remote data file resource.
pub trait FileResource: Send {
    /// Resource key
    fn name(&self) -> &str;

    /// Copy the remote file to `destination` (full path including file name).
    fn download(&self, destination: &Path) -> Result<(), ResourceError>;

    /// Delete the remote file.
    fn erase(&self) -> Result<(), ResourceError>;
}

/// A resolved resource handle.
pub enum Resource {
    /// Scalar value
    Value(Box<dyn ValueResource>),
    /// Command
    Command(Box<dyn CommandResource>),
    /// Data file
    File(Box<dyn FileResource>),
}

impl Resource {
    /// Kind of this handle.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Value(_) => ResourceKind::Value,
            Resource::Command(_) => ResourceKind::Command,
            Resource::File(_) => ResourceKind::File,
        }
    }

    /// Resource key.
    pub fn name(&self) -> &str {
        match self {
            Resource::Value(r) => r.name(),
            Resource::Command(r) => r.name(),
            Resource::File(r) => r.name(),
        }
    }

    fn wrong_kind(self, expected: ResourceKind) -> ResourceError {
        ResourceError::WrongKind {
            name: self.name().to_string(),
            expected,
            actual: self.kind(),
        }
    }

    /// Unwrap a value handle, or fail with [`ResourceError::WrongKind`].
    pub fn into_value(self) -> Result<Box<dyn ValueResource>, ResourceError> {
        match self {
            Resource::Value(r) => Ok(r),
            other => Err(other.wrong_kind(ResourceKind::Value)),
        }
    }

    /// Unwrap a command handle, or fail with [`ResourceError::WrongKind`].
    pub fn into_command(self) -> Result<Box<dyn CommandResource>, ResourceError> {
        match self {
            Resource::Command(r) => Ok(r),
            other => Err(other.wrong_kind(ResourceKind::Command)),
        }
    }

    /// Unwrap a file handle, or fail with [`ResourceError::WrongKind`].
    pub fn into_file(self) -> Result<Box<dyn FileResource>, ResourceError> {
        match self {
            Resource::File(r) => Ok(r),
            other => Err(other.wrong_kind(ResourceKind::File)),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Resolves resource names to handles for one detector server.
pub trait ResourceProvider: Send {
    /// Look up `name`. Unknown names fail with [`ResourceError::NotFound`].
    fn resource(&self, name: &str) -> Result<Resource, ResourceError>;
}

/// Builds providers for a (address, API version) pair.
pub trait ResourceProviderFactory: Send + Sync {
    /// Ask the server which API version it runs.
    ///
    /// `Ok(None)` means the factory cannot tell; the caller falls back to
    /// its built-in default.
    fn api_version(&self, _address: &str) -> Result<Option<String>, ResourceError> {
        Ok(None)
    }

    /// Create a provider bound to `address` speaking `api_version`.
    fn connect(
        &self,
        address: &str,
        api_version: &str,
    ) -> Result<Box<dyn ResourceProvider>, ResourceError>;
}
