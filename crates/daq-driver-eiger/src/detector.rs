//! Eiger detector control facade.
//!
//! [`EigerDetector`] maps each detector feature onto one named resource
//! operation on the detector server. Calls are synchronous round trips; the
//! async adapter in [`crate::driver`] moves them onto blocking threads.
//!
//! # Lifecycle
//!
//! Opening the detector seeds the file writer name pattern, turns
//! compression and auto summation off and remembers the previous
//! compression flag. [`EigerDetector::close`] (or `Drop`, best effort)
//! restores that flag and releases the open image file.
//!
//! # Frame time
//!
//! `frame_time = exposure + readout + latency` is pushed to the server
//! whenever exposure or latency is set. Readout and exposure are mirrored
//! locally and refreshed by their getters; latency exists only locally.

use crate::components::connection::EigerConnection;
use crate::components::features::{keys, EigerFeatures, PixelSize};
use crate::components::resource::ResourceProviderFactory;
use crate::components::session::{FileSession, ImageFileOpener};
use crate::components::tables::{DetectorState, Subsystem, TriggerMode};
use crate::config::EigerConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`EigerDetector::last_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    /// Always `-1`
    pub code: i32,
    /// Always empty
    pub message: String,
}

/// Synchronous control facade for one Eiger detector.
pub struct EigerDetector {
    conn: EigerConnection,
    session: FileSession,
    exposure_s: f64,
    readout_s: f64,
    latency_s: f64,
    /// Compression flag to restore on close; `None` once restored or if
    /// compression was never touched.
    saved_compression: Option<bool>,
    closed: bool,
}

impl EigerDetector {
    /// Connect to the detector described by `config` and seed defaults.
    ///
    /// Frames of downloaded files are decoded with `opener`.
    pub fn open(
        config: &EigerConfig,
        factory: &dyn ResourceProviderFactory,
        opener: Arc<dyn ImageFileOpener>,
    ) -> Result<Self> {
        config.validate()?;
        info!("Opening Eiger detector at {}", config.address);

        let conn = EigerConnection::open(factory, &config.address, config.api_version.as_deref())?;
        let readout_s = EigerFeatures::get_readout_time(&conn)?;
        let exposure_s = EigerFeatures::get_exposure(&conn)?;

        let mut detector = Self {
            conn,
            session: FileSession::new(opener),
            exposure_s,
            readout_s,
            latency_s: config.latency_s,
            saved_compression: None,
            closed: false,
        };

        // Failures past this point drop `detector`, which restores compression.
        EigerFeatures::set_name_pattern(&detector.conn, &config.name_pattern)?;
        if config.disable_compression {
            let previous = EigerFeatures::get_compression(&detector.conn)?;
            detector.saved_compression = Some(previous);
            EigerFeatures::set_compression(&detector.conn, false)?;
        }
        if config.disable_auto_summation {
            EigerFeatures::set_auto_summation(&detector.conn, false)?;
        }

        info!(
            "Eiger ready (api {}, exposure {} s, readout {} s)",
            detector.conn.api_version(),
            detector.exposure_s,
            detector.readout_s
        );
        Ok(detector)
    }

    /// Server address.
    pub fn address(&self) -> &str {
        self.conn.address()
    }

    /// API version in use.
    pub fn api_version(&self) -> &str {
        self.conn.api_version()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Run the detector's `initialize` command.
    pub fn initialize(&self) -> Result<()> {
        info!("Initializing detector");
        self.conn.execute(keys::INITIALIZE)
    }

    /// Arm for acquisition.
    pub fn arm(&self) -> Result<()> {
        info!("Arming detector");
        self.conn.execute(keys::ARM)
    }

    /// Disarm, closing the current series.
    pub fn disarm(&self) -> Result<()> {
        info!("Disarming detector");
        self.conn.execute(keys::DISARM)
    }

    /// Software trigger.
    pub fn trigger(&self) -> Result<()> {
        debug!("Triggering detector");
        self.conn.execute(keys::TRIGGER)
    }

    // =========================================================================
    // File session
    // =========================================================================

    /// Download the acquired data file to `destination` and open it,
    /// releasing any previously opened file first.
    pub fn download_acquired_file(&mut self, destination: &Path) -> Result<()> {
        info!("Downloading acquired file to {}", destination.display());
        self.session.release();
        self.conn
            .file(keys::DATAFILE)?
            .download(destination)
            .with_context(|| format!("Failed to download data file to {}", destination.display()))?;
        self.session.replace(destination)
    }

    /// Next frame of the downloaded file, `None` if no file is open or the
    /// file is exhausted. The frame borrows the detector.
    pub fn get_frame(&mut self) -> Result<Option<&[u8]>> {
        self.session.next_frame()
    }

    /// Release the local file and erase the remote data file.
    pub fn delete_acquired_file(&mut self) -> Result<()> {
        info!("Deleting acquired file");
        self.session.release();
        self.conn
            .file(keys::DATAFILE)?
            .erase()
            .context("Failed to erase data file on detector")
    }

    /// Whether a downloaded file is open for frame reads.
    pub fn has_open_file(&self) -> bool {
        self.session.is_open()
    }

    // =========================================================================
    // Triggering and timing
    // =========================================================================

    /// Write the trigger mode.
    pub fn set_trigger_mode(&self, mode: TriggerMode) -> Result<()> {
        info!("Setting trigger mode to {}", mode);
        EigerFeatures::set_trigger_mode(&self.conn, mode)
    }

    /// Current trigger mode; unrecognized strings yield [`TriggerMode::Unknown`].
    pub fn trigger_mode(&self) -> Result<TriggerMode> {
        EigerFeatures::get_trigger_mode(&self.conn)
    }

    /// Set the exposure and push the derived frame time.
    pub fn set_exposure_time(&mut self, seconds: f64) -> Result<()> {
        EigerFeatures::set_exposure(&self.conn, seconds)?;
        self.exposure_s = seconds;
        self.push_frame_time()
    }

    /// Read the exposure from the server and refresh the local copy.
    pub fn exposure_time(&mut self) -> Result<f64> {
        self.exposure_s = EigerFeatures::get_exposure(&self.conn)?;
        Ok(self.exposure_s)
    }

    /// Read the readout time from the server and refresh the local copy.
    pub fn readout_time(&mut self) -> Result<f64> {
        self.readout_s = EigerFeatures::get_readout_time(&self.conn)?;
        Ok(self.readout_s)
    }

    /// Set the latency and push the derived frame time.
    pub fn set_latency_time(&mut self, seconds: f64) -> Result<()> {
        self.latency_s = seconds;
        self.push_frame_time()
    }

    /// Locally held latency; the server has no latency resource.
    pub fn latency_time(&self) -> f64 {
        self.latency_s
    }

    /// `exposure + readout + latency` from the local copies.
    pub fn frame_time(&self) -> f64 {
        self.exposure_s + self.readout_s + self.latency_s
    }

    fn push_frame_time(&self) -> Result<()> {
        let frame_time = self.frame_time();
        debug!(
            "frame_time = {} (exposure {} + readout {} + latency {})",
            frame_time, self.exposure_s, self.readout_s, self.latency_s
        );
        EigerFeatures::set_frame_time(&self.conn, frame_time)
    }

    /// Number of images per data file.
    pub fn set_images_per_file(&self, count: i32) -> Result<()> {
        EigerFeatures::set_nimages_per_file(&self.conn, count)
    }

    /// Number of images in the next series.
    pub fn set_nb_images_to_acquire(&self, count: i32) -> Result<()> {
        EigerFeatures::set_nimages(&self.conn, count)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// State of `subsystem`; unrecognized strings yield
    /// [`DetectorState::Unknown`].
    pub fn state(&self, subsystem: Subsystem) -> Result<DetectorState> {
        EigerFeatures::get_state(&self.conn, subsystem)
    }

    /// Board temperature in degrees Celsius.
    pub fn temperature(&self) -> Result<f64> {
        EigerFeatures::get_temperature(&self.conn)
    }

    /// Relative humidity in percent.
    pub fn humidity(&self) -> Result<f64> {
        EigerFeatures::get_humidity(&self.conn)
    }

    /// Readout bit depth.
    pub fn bit_depth_readout(&self) -> Result<i32> {
        EigerFeatures::get_bit_depth(&self.conn)
    }

    /// Fixed placeholder; errors are reported through `Result`.
    pub fn last_error(&self) -> LastError {
        LastError {
            code: -1,
            message: String::new(),
        }
    }

    // =========================================================================
    // Corrections
    // =========================================================================

    /// Whether countrate correction is enabled.
    pub fn countrate_correction(&self) -> Result<bool> {
        EigerFeatures::get_countrate_correction(&self.conn)
    }

    /// Enable or disable countrate correction.
    pub fn set_countrate_correction(&self, enabled: bool) -> Result<()> {
        EigerFeatures::set_countrate_correction(&self.conn, enabled)
    }

    /// Whether flatfield correction is enabled.
    pub fn flatfield_correction(&self) -> Result<bool> {
        EigerFeatures::get_flatfield_correction(&self.conn)
    }

    /// Enable or disable flatfield correction.
    pub fn set_flatfield_correction(&self, enabled: bool) -> Result<()> {
        EigerFeatures::set_flatfield_correction(&self.conn, enabled)
    }

    /// Whether pixel mask is enabled.
    pub fn pixel_mask(&self) -> Result<bool> {
        EigerFeatures::get_pixel_mask(&self.conn)
    }

    /// Enable or disable pixel mask.
    pub fn set_pixel_mask(&self, enabled: bool) -> Result<()> {
        EigerFeatures::set_pixel_mask(&self.conn, enabled)
    }

    /// Whether virtual pixel correction is enabled.
    pub fn virtual_pixel_correction(&self) -> Result<bool> {
        EigerFeatures::get_virtual_pixel_correction(&self.conn)
    }

    /// Enable or disable virtual pixel correction.
    pub fn set_virtual_pixel_correction(&self, enabled: bool) -> Result<()> {
        EigerFeatures::set_virtual_pixel_correction(&self.conn, enabled)
    }

    /// Whether efficiency correction is enabled.
    pub fn efficiency_correction(&self) -> Result<bool> {
        EigerFeatures::get_efficiency_correction(&self.conn)
    }

    /// Enable or disable efficiency correction.
    pub fn set_efficiency_correction(&self, enabled: bool) -> Result<()> {
        EigerFeatures::set_efficiency_correction(&self.conn, enabled)
    }

    // =========================================================================
    // Energies and identity
    // =========================================================================

    /// Threshold energy in eV.
    pub fn threshold_energy(&self) -> Result<f64> {
        EigerFeatures::get_threshold_energy(&self.conn)
    }

    /// Write the threshold energy in eV.
    pub fn set_threshold_energy(&self, ev: f64) -> Result<()> {
        EigerFeatures::set_threshold_energy(&self.conn, ev)
    }

    /// Photon energy in eV.
    pub fn photon_energy(&self) -> Result<f64> {
        EigerFeatures::get_photon_energy(&self.conn)
    }

    /// Write the photon energy in eV.
    pub fn set_photon_energy(&self, ev: f64) -> Result<()> {
        EigerFeatures::set_photon_energy(&self.conn, ev)
    }

    /// Model description.
    pub fn description(&self) -> Result<String> {
        EigerFeatures::get_description(&self.conn)
    }

    /// Serial number.
    pub fn detector_number(&self) -> Result<String> {
        EigerFeatures::get_detector_number(&self.conn)
    }

    /// Pixel pitch in meters.
    pub fn pixel_size(&self) -> Result<PixelSize> {
        EigerFeatures::get_pixel_size(&self.conn)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Restore the compression flag and release the open file.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session.release();
        if let Some(previous) = self.saved_compression.take() {
            info!("Restoring compression = {}", previous);
            EigerFeatures::set_compression(&self.conn, previous)?;
        }
        info!("Eiger detector at {} closed", self.conn.address());
        Ok(())
    }
}

impl Drop for EigerDetector {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Eiger teardown failed: {:#}", e);
        }
    }
}

impl std::fmt::Debug for EigerDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EigerDetector")
            .field("conn", &self.conn)
            .field("session", &self.session)
            .field("exposure_s", &self.exposure_s)
            .field("readout_s", &self.readout_s)
            .field("latency_s", &self.latency_s)
            .finish_non_exhaustive()
    }
}
