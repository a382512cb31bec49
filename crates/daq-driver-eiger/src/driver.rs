//! Async capability adapter and registry factory.
//!
//! [`EigerDriver`] owns an [`EigerDetector`] behind a mutex and runs every
//! detector round trip on tokio's blocking pool, so it can be driven from
//! async code through the `daq-core` capability traits.
//!
//! ## Commands
//!
//! | command            | args                      | result                              |
//! |--------------------|---------------------------|-------------------------------------|
//! | `initialize`       |                           | `{success}`                         |
//! | `arm` / `disarm`   |                           | `{success}`                         |
//! | `trigger`          |                           | `{success}`                         |
//! | `set_trigger_mode` | `{mode}`                  | `{success, mode}`                   |
//! | `get_trigger_mode` |                           | `{mode}`                            |
//! | `set_latency`      | `{seconds}`               | `{success, frame_time}`             |
//! | `get_state`        | `{subsystem}`             | `{subsystem, state}`                |
//! | `download`         | `{destination}`           | `{success, path}`                   |
//! | `delete_file`      |                           | `{success}`                         |
//! | `next_frame`       |                           | `{available, len}`                  |
//! | `status`           |                           | temperature, humidity, mode, states |

use crate::components::resource::ResourceProviderFactory;
use crate::components::session::ImageFileOpener;
use crate::components::tables::{DetectorState, Subsystem, TriggerMode};
use crate::config::EigerConfig;
use crate::detector::EigerDetector;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use daq_core::capabilities::{
    Commandable, DeviceCategory, ExposureControl, Readable, Triggerable,
};
use daq_core::driver::{Capability, DeviceComponents, DeviceMetadata, DriverFactory};
use daq_core::error::{DaqError, DriverError, DriverErrorKind};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Driver type name used in registry TOML.
pub const DRIVER_TYPE: &str = "eiger";

/// Async adapter over [`EigerDetector`].
pub struct EigerDriver {
    /// `None` after [`EigerDriver::shutdown`]
    detector: Arc<Mutex<Option<EigerDetector>>>,
    address: String,
}

impl EigerDriver {
    /// Open the detector on a blocking thread.
    pub async fn new_async(
        config: EigerConfig,
        factory: Arc<dyn ResourceProviderFactory>,
        opener: Arc<dyn ImageFileOpener>,
    ) -> Result<Self> {
        tracing::info!("EigerDriver::new_async called for {}", config.address);
        let detector = tokio::task::spawn_blocking(move || {
            EigerDetector::open(&config, factory.as_ref(), opener)
        })
        .await??;
        Ok(Self::from_detector(detector))
    }

    /// Wrap an already opened detector.
    pub fn from_detector(detector: EigerDetector) -> Self {
        let address = detector.address().to_string();
        Self {
            detector: Arc::new(Mutex::new(Some(detector))),
            address,
        }
    }

    /// Detector server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run `op` against the detector on the blocking pool.
    async fn with_detector<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut EigerDetector) -> Result<T> + Send + 'static,
    {
        let detector = self.detector.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = detector.lock();
            let det = guard.as_mut().ok_or_else(|| {
                DriverError::new(
                    DRIVER_TYPE,
                    DriverErrorKind::Shutdown,
                    "detector has been shut down",
                )
            })?;
            op(det)
        })
        .await?
    }

    /// Close the detector: restore compression and release open files.
    ///
    /// Later calls on this driver fail.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down Eiger driver ({})", self.address);
        let detector = self.detector.clone();
        tokio::task::spawn_blocking(move || match detector.lock().take() {
            Some(det) => det.close(),
            None => Ok(()),
        })
        .await?
    }

    /// Whether [`EigerDriver::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.detector.lock().is_none()
    }

    /// Set the latency term and push the new frame time. Returns the frame time.
    pub async fn set_latency(&self, seconds: f64) -> Result<f64> {
        self.with_detector(move |det| {
            det.set_latency_time(seconds)?;
            Ok(det.frame_time())
        })
        .await
    }

    /// Trigger mode through the blocking pool.
    pub async fn trigger_mode(&self) -> Result<TriggerMode> {
        self.with_detector(|det| det.trigger_mode()).await
    }

    /// Set the trigger mode.
    pub async fn set_trigger_mode(&self, mode: TriggerMode) -> Result<()> {
        self.with_detector(move |det| det.set_trigger_mode(mode)).await
    }

    /// State of one subsystem.
    pub async fn state(&self, subsystem: Subsystem) -> Result<DetectorState> {
        self.with_detector(move |det| det.state(subsystem)).await
    }

    /// Download the acquired file to `destination` and open it.
    pub async fn download(&self, destination: PathBuf) -> Result<()> {
        self.with_detector(move |det| det.download_acquired_file(&destination))
            .await
    }

    /// Copy of the next frame, `None` when no file is open or it is exhausted.
    pub async fn next_frame(&self) -> Result<Option<Vec<u8>>> {
        self.with_detector(|det| Ok(det.get_frame()?.map(<[u8]>::to_vec)))
            .await
    }

    /// Release the local file and erase the remote one.
    pub async fn delete_file(&self) -> Result<()> {
        self.with_detector(|det| det.delete_acquired_file()).await
    }

    async fn metadata(&self) -> Result<DeviceMetadata> {
        self.with_detector(|det| {
            Ok(DeviceMetadata {
                category: Some(DeviceCategory::Detector),
                measurement_units: Some("C".to_string()),
                bits_per_pixel: u32::try_from(det.bit_depth_readout()?).ok(),
                serial_number: Some(det.detector_number()?),
                description: Some(det.description()?),
            })
        })
        .await
    }
}

/// Closes a detector that was never shut down.
///
/// Inside a tokio runtime the close runs on the blocking pool so the worker
/// thread never waits on the detector server. Outside a runtime it runs
/// inline through [`EigerDetector`]'s own `Drop`.
impl Drop for EigerDriver {
    fn drop(&mut self) {
        if Arc::strong_count(&self.detector) != 1 {
            return;
        }
        let Some(detector) = self.detector.lock().take() else {
            return;
        };
        tracing::warn!(
            "EigerDriver ({}) dropped without shutdown(); closing detector",
            self.address
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let address = self.address.clone();
                handle.spawn_blocking(move || {
                    if let Err(e) = detector.close() {
                        tracing::warn!("Eiger close after drop failed ({}): {:#}", address, e);
                    }
                });
            }
            Err(_) => drop(detector),
        }
    }
}

// =============================================================================
// Capability Implementations
// =============================================================================

#[async_trait]
impl ExposureControl for EigerDriver {
    async fn set_exposure(&self, seconds: f64) -> Result<()> {
        self.with_detector(move |det| det.set_exposure_time(seconds))
            .await
    }

    async fn get_exposure(&self) -> Result<f64> {
        self.with_detector(|det| det.exposure_time()).await
    }
}

#[async_trait]
impl Triggerable for EigerDriver {
    async fn arm(&self) -> Result<()> {
        self.with_detector(|det| det.arm()).await
    }

    async fn trigger(&self) -> Result<()> {
        self.with_detector(|det| det.trigger()).await
    }

    async fn disarm(&self) -> Result<()> {
        self.with_detector(|det| det.disarm()).await
    }

    async fn is_armed(&self) -> Result<bool> {
        Ok(self.state(Subsystem::Detector).await? == DetectorState::Acquire)
    }
}

/// Reads the detector temperature in degrees Celsius.
#[async_trait]
impl Readable for EigerDriver {
    async fn read(&self) -> Result<f64> {
        self.with_detector(|det| det.temperature()).await
    }
}

#[async_trait]
impl Commandable for EigerDriver {
    async fn execute_command(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        match command {
            "initialize" => {
                self.with_detector(|det| det.initialize()).await?;
                Ok(json!({ "success": true }))
            }
            "arm" => {
                Triggerable::arm(self).await?;
                Ok(json!({ "success": true }))
            }
            "disarm" => {
                Triggerable::disarm(self).await?;
                Ok(json!({ "success": true }))
            }
            "trigger" => {
                Triggerable::trigger(self).await?;
                Ok(json!({ "success": true }))
            }
            "set_trigger_mode" => {
                let raw = args
                    .get("mode")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("Missing 'mode' string argument"))?;
                let mode = TriggerMode::from_str(raw);
                if mode == TriggerMode::Unknown {
                    bail!(
                        "Invalid trigger mode '{}'. Valid: {:?}",
                        raw,
                        TriggerMode::all_choices()
                    );
                }
                self.set_trigger_mode(mode).await?;
                Ok(json!({ "success": true, "mode": mode.as_str() }))
            }
            "get_trigger_mode" => {
                let mode = self.trigger_mode().await?;
                Ok(json!({ "mode": mode.as_str() }))
            }
            "set_latency" => {
                let seconds = args
                    .get("seconds")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| anyhow!("Missing 'seconds' number argument"))?;
                let frame_time = self.set_latency(seconds).await?;
                Ok(json!({ "success": true, "frame_time": frame_time }))
            }
            "get_state" => {
                let raw = args
                    .get("subsystem")
                    .and_then(|v| v.as_str())
                    .unwrap_or("detector");
                let subsystem = Subsystem::from_str(raw)
                    .ok_or_else(|| anyhow!("Unknown subsystem '{}'", raw))?;
                let state = self.state(subsystem).await?;
                Ok(json!({ "subsystem": subsystem.as_str(), "state": state.as_str() }))
            }
            "download" => {
                let destination = args
                    .get("destination")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("Missing 'destination' path argument"))?;
                self.download(PathBuf::from(destination)).await?;
                Ok(json!({ "success": true, "path": destination }))
            }
            "delete_file" => {
                self.delete_file().await?;
                Ok(json!({ "success": true }))
            }
            "next_frame" => {
                let frame = self.next_frame().await?;
                Ok(json!({
                    "available": frame.is_some(),
                    "len": frame.map_or(0, |f| f.len()),
                }))
            }
            "status" => {
                self.with_detector(|det| {
                    Ok(json!({
                        "temperature": det.temperature()?,
                        "humidity": det.humidity()?,
                        "trigger_mode": det.trigger_mode()?.as_str(),
                        "detector_state": det.state(Subsystem::Detector)?.as_str(),
                        "filewriter_state": det.state(Subsystem::FileWriter)?.as_str(),
                        "frame_time": det.frame_time(),
                    }))
                })
                .await
            }
            _ => Err(DaqError::ModuleOperationNotSupported(format!(
                "Unknown command: {}",
                command
            ))
            .into()),
        }
    }
}

// =============================================================================
// EigerDriverFactory
// =============================================================================

/// Factory for creating Eiger drivers from registry TOML.
///
/// ```toml
/// [[devices]]
/// type = "eiger"
/// address = "10.42.0.12"
/// ```
pub struct EigerDriverFactory {
    provider_factory: Arc<dyn ResourceProviderFactory>,
    opener: Arc<dyn ImageFileOpener>,
}

static EIGER_CAPABILITIES: &[Capability] = &[
    Capability::Readable,
    Capability::Triggerable,
    Capability::ExposureControl,
    Capability::Commandable,
];

impl EigerDriverFactory {
    /// Factory building detectors through `provider_factory`, decoding
    /// downloaded files with `opener`.
    pub fn new(
        provider_factory: Arc<dyn ResourceProviderFactory>,
        opener: Arc<dyn ImageFileOpener>,
    ) -> Self {
        Self {
            provider_factory,
            opener,
        }
    }

    /// Factory backed by an in-memory server.
    #[cfg(feature = "mock")]
    pub fn mock(server: crate::mock::MockEigerServer, frame_len: usize) -> Self {
        Self::new(
            Arc::new(server),
            Arc::new(crate::mock::RawFrameOpener::new(frame_len)),
        )
    }
}

impl DriverFactory for EigerDriverFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn name(&self) -> &'static str {
        "Dectris Eiger X-ray Detector"
    }

    fn capabilities(&self) -> &'static [Capability] {
        EIGER_CAPABILITIES
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        match config.get("address") {
            Some(toml::Value::String(_)) => {}
            Some(_) => {
                return Err(
                    DaqError::Configuration("'address' field must be a string".into()).into(),
                )
            }
            None => return Err(DaqError::Configuration("'address' field is required".into()).into()),
        }
        EigerConfig::from_toml(config).context("Invalid Eiger config")?;
        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>> {
        let provider_factory = self.provider_factory.clone();
        let opener = self.opener.clone();
        Box::pin(async move {
            let cfg = EigerConfig::from_toml(&config).context("Invalid Eiger config")?;
            let driver = Arc::new(EigerDriver::new_async(cfg, provider_factory, opener).await?);
            let metadata = driver.metadata().await?;
            let category = DeviceCategory::Detector;
            let capability_names: Vec<&str> =
                EIGER_CAPABILITIES.iter().map(Capability::name).collect();
            tracing::info!(
                "Built Eiger driver at {} [{}]: {}",
                driver.address(),
                category.label(),
                capability_names.join(", ")
            );

            Ok(DeviceComponents::new()
                .with_category(category)
                .with_readable(driver.clone())
                .with_triggerable(driver.clone())
                .with_exposure_control(driver.clone())
                .with_commandable(driver)
                .with_metadata(metadata))
        })
    }
}
