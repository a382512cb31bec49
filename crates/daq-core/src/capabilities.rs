//! Atomic Hardware Capabilities
//!
//! Fine-grained capability traits that a detector driver implements instead of
//! one monolithic `Detector` trait:
//!
//! - An X-ray detector implements `Triggerable + ExposureControl + Readable + Commandable`
//! - A bare temperature probe would implement only `Readable`
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! # Example
//!
//! ```rust,ignore
//! async fn triggered_series<T>(device: &T) -> Result<()>
//! where
//!     T: Triggerable + ExposureControl,
//! {
//!     device.set_exposure(0.1).await?;
//!     device.arm().await?;
//!     device.trigger().await?;
//!     device.disarm().await?;
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Device Category
// =============================================================================

/// Device category for classification and UI grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceCategory {
    /// Cameras and imaging devices
    Camera,
    /// Counting/integrating detectors (X-ray, photon counting)
    Detector,
    /// Devices that don't fit other categories
    #[default]
    Other,
}

impl DeviceCategory {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Camera => "Cameras",
            Self::Detector => "Detectors",
            Self::Other => "Other",
        }
    }
}

// =============================================================================
// Capability Traits
// =============================================================================

/// Capability: Arm / Trigger
///
/// # Contract
/// - `arm()` prepares the device for a trigger series
/// - `trigger()` starts acquisition (software trigger)
/// - `disarm()` ends the series and lets the device flush its data
#[async_trait]
pub trait Triggerable: Send + Sync {
    /// Arm device for trigger
    async fn arm(&self) -> Result<()>;

    /// Send software trigger
    async fn trigger(&self) -> Result<()>;

    /// Disarm the device, closing the current series.
    ///
    /// # Default Implementation
    /// Returns an error indicating disarm is not supported.
    async fn disarm(&self) -> Result<()> {
        anyhow::bail!("Disarm not supported by this device")
    }

    /// Check if device is currently armed
    ///
    /// # Default Implementation
    /// Returns an error indicating state query is not supported.
    async fn is_armed(&self) -> Result<bool> {
        anyhow::bail!("Armed state query not supported by this device")
    }
}

/// Capability: Exposure Time Control
///
/// # Contract
/// - Exposure is in seconds (not milliseconds)
/// - Setting exposure does not start acquisition
#[async_trait]
pub trait ExposureControl: Send + Sync {
    /// Set exposure/integration time in seconds
    async fn set_exposure(&self, seconds: f64) -> Result<()>;

    /// Get current exposure setting in seconds
    async fn get_exposure(&self) -> Result<f64>;
}

/// Capability: Scalar Readout
///
/// Devices that produce a single scalar value on demand. Units are
/// device-specific and documented by the implementation.
#[async_trait]
pub trait Readable: Send + Sync {
    /// Read current value
    async fn read(&self) -> Result<f64>;
}

/// Capability: Generic Command Execution
///
/// # Contract
/// - `execute_command()` takes a command name and JSON arguments.
/// - Returns a JSON object with results.
#[async_trait]
pub trait Commandable: Send + Sync {
    /// Execute a specialized command
    ///
    /// # Returns
    /// - Ok(JSON object) with results
    /// - Err if command unknown or execution failed
    async fn execute_command(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value>;
}
