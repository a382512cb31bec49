//! Eiger Feature Control
//!
//! Getters and setters for the detector's value resources, one function per
//! feature, each bound to its fixed resource key. Functions take the
//! connection explicitly and hold no state; caching (readout, exposure,
//! latency) belongs to [`crate::detector::EigerDetector`].
//!
//! - **Timing**: exposure, frame time, readout time
//! - **Triggering**: trigger mode, image counts
//! - **Environment**: temperature, humidity
//! - **Corrections**: countrate, flatfield, pixel mask, virtual pixel, efficiency
//! - **Energies**: threshold, photon
//! - **Identity**: description, detector number, pixel size, bit depth
//! - **File writer**: name pattern, compression
//! - **Processing**: auto summation

use crate::components::connection::EigerConnection;
use crate::components::tables::{DetectorState, Subsystem, TriggerMode};
use anyhow::{anyhow, Result};

/// Resource keys used by the facade.
#[allow(missing_docs)]
pub mod keys {
    pub const EXPOSURE: &str = "exposure";
    pub const FRAME_TIME: &str = "frame_time";
    pub const READOUT_TIME: &str = "detector_readout_time";
    pub const TRIGGER_MODE: &str = "trigger_mode";
    pub const NIMAGES: &str = "nimages";
    pub const NIMAGES_PER_FILE: &str = "nimages_per_file";
    pub const TEMPERATURE: &str = "temp";
    pub const HUMIDITY: &str = "humidity";
    pub const BIT_DEPTH: &str = "bit_depth_readout";
    pub const COUNTRATE_CORRECTION: &str = "countrate_correction";
    pub const FLATFIELD_CORRECTION: &str = "flatfield_correction";
    pub const PIXEL_MASK: &str = "pixel_mask";
    pub const VIRTUAL_PIXEL_CORRECTION: &str = "virtual_pixel_correction";
    pub const EFFICIENCY_CORRECTION: &str = "efficiency_correction";
    pub const THRESHOLD_ENERGY: &str = "threshold_energy";
    pub const PHOTON_ENERGY: &str = "photon_energy";
    pub const DESCRIPTION: &str = "description";
    pub const DETECTOR_NUMBER: &str = "detector_number";
    pub const X_PIXEL_SIZE: &str = "x_pixel_size";
    pub const Y_PIXEL_SIZE: &str = "y_pixel_size";
    pub const NAME_PATTERN: &str = "name_pattern";
    pub const COMPRESSION: &str = "compression";
    pub const AUTO_SUMMATION: &str = "auto_summation";
    pub const DATAFILE: &str = "datafile";

    pub const INITIALIZE: &str = "initialize";
    pub const ARM: &str = "arm";
    pub const DISARM: &str = "disarm";
    pub const TRIGGER: &str = "trigger";
}

/// Physical pixel pitch in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSize {
    /// Horizontal pitch
    pub x: f64,
    /// Vertical pitch
    pub y: f64,
}

/// Stateless accessors for detector features.
pub struct EigerFeatures;

impl EigerFeatures {
    // =========================================================================
    // Timing
    // =========================================================================

    /// Exposure time in seconds.
    pub fn get_exposure(conn: &EigerConnection) -> Result<f64> {
        conn.get(keys::EXPOSURE)
    }

    /// Write the exposure time in seconds.
    pub fn set_exposure(conn: &EigerConnection, seconds: f64) -> Result<()> {
        conn.set(keys::EXPOSURE, seconds)
    }

    /// Frame period in seconds.
    pub fn set_frame_time(conn: &EigerConnection, seconds: f64) -> Result<()> {
        conn.set(keys::FRAME_TIME, seconds)
    }

    /// Sensor readout time in seconds (read-only on the server).
    pub fn get_readout_time(conn: &EigerConnection) -> Result<f64> {
        conn.get(keys::READOUT_TIME)
    }

    // =========================================================================
    // Triggering
    // =========================================================================

    /// Current trigger mode. Strings outside the table decode to
    /// [`TriggerMode::Unknown`].
    pub fn get_trigger_mode(conn: &EigerConnection) -> Result<TriggerMode> {
        let raw: String = conn.get(keys::TRIGGER_MODE)?;
        let mode = TriggerMode::from_str(&raw);
        if mode == TriggerMode::Unknown {
            tracing::warn!("Detector reported unknown trigger mode '{}'", raw);
        }
        Ok(mode)
    }

    /// Write the trigger mode. [`TriggerMode::Unknown`] is rejected locally.
    pub fn set_trigger_mode(conn: &EigerConnection, mode: TriggerMode) -> Result<()> {
        let raw = mode
            .as_resource_str()
            .ok_or_else(|| anyhow!("Trigger mode '{}' cannot be sent to the detector", mode))?;
        conn.set(keys::TRIGGER_MODE, raw)
    }

    /// Number of images in the next series.
    pub fn set_nimages(conn: &EigerConnection, count: i32) -> Result<()> {
        conn.set(keys::NIMAGES, count)
    }

    /// Number of images per data file.
    pub fn set_nimages_per_file(conn: &EigerConnection, count: i32) -> Result<()> {
        conn.set(keys::NIMAGES_PER_FILE, count)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// State of one subsystem, read from that subsystem's own status key.
    pub fn get_state(conn: &EigerConnection, subsystem: Subsystem) -> Result<DetectorState> {
        let raw: String = conn.get(subsystem.status_key())?;
        let state = DetectorState::from_str(&raw);
        if state == DetectorState::Unknown {
            tracing::warn!("{} reported unknown state '{}'", subsystem.as_str(), raw);
        }
        Ok(state)
    }

    /// Board temperature in degrees Celsius.
    pub fn get_temperature(conn: &EigerConnection) -> Result<f64> {
        conn.get(keys::TEMPERATURE)
    }

    /// Relative humidity in percent.
    pub fn get_humidity(conn: &EigerConnection) -> Result<f64> {
        conn.get(keys::HUMIDITY)
    }

    // =========================================================================
    // Corrections
    // =========================================================================

    /// Whether countrate correction is applied.
    pub fn get_countrate_correction(conn: &EigerConnection) -> Result<bool> {
        conn.get(keys::COUNTRATE_CORRECTION)
    }

    /// Enable or disable countrate correction.
    pub fn set_countrate_correction(conn: &EigerConnection, enabled: bool) -> Result<()> {
        conn.set(keys::COUNTRATE_CORRECTION, enabled)
    }

    /// Whether flatfield correction is applied.
    pub fn get_flatfield_correction(conn: &EigerConnection) -> Result<bool> {
        conn.get(keys::FLATFIELD_CORRECTION)
    }

    /// Enable or disable flatfield correction.
    pub fn set_flatfield_correction(conn: &EigerConnection, enabled: bool) -> Result<()> {
        conn.set(keys::FLATFIELD_CORRECTION, enabled)
    }

    /// Whether the pixel mask is applied.
    pub fn get_pixel_mask(conn: &EigerConnection) -> Result<bool> {
        conn.get(keys::PIXEL_MASK)
    }

    /// Enable or disable the pixel mask.
    pub fn set_pixel_mask(conn: &EigerConnection, enabled: bool) -> Result<()> {
        tracing::info!("Pixel mask {}", if enabled { "enabled" } else { "disabled" });
        conn.set(keys::PIXEL_MASK, enabled)
    }

    /// Whether virtual pixel correction is applied.
    pub fn get_virtual_pixel_correction(conn: &EigerConnection) -> Result<bool> {
        conn.get(keys::VIRTUAL_PIXEL_CORRECTION)
    }

    /// Enable or disable virtual pixel correction.
    pub fn set_virtual_pixel_correction(conn: &EigerConnection, enabled: bool) -> Result<()> {
        conn.set(keys::VIRTUAL_PIXEL_CORRECTION, enabled)
    }

    /// Whether efficiency correction is applied.
    pub fn get_efficiency_correction(conn: &EigerConnection) -> Result<bool> {
        conn.get(keys::EFFICIENCY_CORRECTION)
    }

    /// Enable or disable efficiency correction.
    pub fn set_efficiency_correction(conn: &EigerConnection, enabled: bool) -> Result<()> {
        conn.set(keys::EFFICIENCY_CORRECTION, enabled)
    }

    // =========================================================================
    // Energies (eV)
    // =========================================================================

    /// Comparator threshold energy.
    pub fn get_threshold_energy(conn: &EigerConnection) -> Result<f64> {
        conn.get(keys::THRESHOLD_ENERGY)
    }

    /// Write the threshold energy.
    pub fn set_threshold_energy(conn: &EigerConnection, ev: f64) -> Result<()> {
        conn.set(keys::THRESHOLD_ENERGY, ev)
    }

    /// Incident photon energy.
    pub fn get_photon_energy(conn: &EigerConnection) -> Result<f64> {
        conn.get(keys::PHOTON_ENERGY)
    }

    /// Write the photon energy.
    pub fn set_photon_energy(conn: &EigerConnection, ev: f64) -> Result<()> {
        conn.set(keys::PHOTON_ENERGY, ev)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Model description, e.g. "Dectris Eiger 1M".
    pub fn get_description(conn: &EigerConnection) -> Result<String> {
        conn.get(keys::DESCRIPTION)
    }

    /// Serial number string.
    pub fn get_detector_number(conn: &EigerConnection) -> Result<String> {
        conn.get(keys::DETECTOR_NUMBER)
    }

    /// Pixel pitch along both axes.
    pub fn get_pixel_size(conn: &EigerConnection) -> Result<PixelSize> {
        Ok(PixelSize {
            x: conn.get(keys::X_PIXEL_SIZE)?,
            y: conn.get(keys::Y_PIXEL_SIZE)?,
        })
    }

    /// Readout bit depth.
    pub fn get_bit_depth(conn: &EigerConnection) -> Result<i32> {
        conn.get(keys::BIT_DEPTH)
    }

    // =========================================================================
    // File writer / processing
    // =========================================================================

    /// File writer name pattern; `$id` expands to the series number.
    pub fn set_name_pattern(conn: &EigerConnection, pattern: &str) -> Result<()> {
        conn.set(keys::NAME_PATTERN, pattern)
    }

    /// Whether the file writer compresses data.
    pub fn get_compression(conn: &EigerConnection) -> Result<bool> {
        conn.get(keys::COMPRESSION)
    }

    /// Enable or disable file writer compression.
    pub fn set_compression(conn: &EigerConnection, enabled: bool) -> Result<()> {
        conn.set(keys::COMPRESSION, enabled)
    }

    /// Enable or disable auto summation.
    pub fn set_auto_summation(conn: &EigerConnection, enabled: bool) -> Result<()> {
        conn.set(keys::AUTO_SUMMATION, enabled)
    }
}

#[cfg(all(test, feature = "mock"))]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::components::resource::ResourceValue;
    use crate::mock::MockEigerServer;

    fn connect(server: &MockEigerServer) -> EigerConnection {
        EigerConnection::open(server, "eiger", None).unwrap()
    }

    #[test]
    fn trigger_mode_writes_table_string() {
        let server = MockEigerServer::new();
        let conn = connect(&server);
        EigerFeatures::set_trigger_mode(&conn, TriggerMode::Extm).unwrap();
        assert_eq!(
            server.value(keys::TRIGGER_MODE),
            Some(ResourceValue::from("extm"))
        );
        assert_eq!(
            EigerFeatures::get_trigger_mode(&conn).unwrap(),
            TriggerMode::Extm
        );
    }

    #[test]
    fn unknown_trigger_mode_is_not_sent() {
        let server = MockEigerServer::new();
        let conn = connect(&server);
        assert!(EigerFeatures::set_trigger_mode(&conn, TriggerMode::Unknown).is_err());
        assert!(server.sets_of(keys::TRIGGER_MODE).is_empty());
    }

    #[test]
    fn unexpected_mode_string_decodes_to_unknown() {
        let server = MockEigerServer::new();
        server.put_value(keys::TRIGGER_MODE, "ints");
        let conn = connect(&server);
        assert_eq!(
            EigerFeatures::get_trigger_mode(&conn).unwrap(),
            TriggerMode::Unknown
        );
    }

    #[test]
    fn state_reads_subsystem_key() {
        let server = MockEigerServer::new();
        server.put_value("detector_status", "acquire");
        server.put_value("filewriter_status", "disabled");
        let conn = connect(&server);
        assert_eq!(
            EigerFeatures::get_state(&conn, Subsystem::Detector).unwrap(),
            DetectorState::Acquire
        );
        assert_eq!(
            EigerFeatures::get_state(&conn, Subsystem::FileWriter).unwrap(),
            DetectorState::Disabled
        );
    }

    #[test]
    fn pixel_size_reads_both_axes() {
        let server = MockEigerServer::new();
        server.put_value(keys::X_PIXEL_SIZE, 75e-6);
        server.put_value(keys::Y_PIXEL_SIZE, 76e-6);
        let conn = connect(&server);
        assert_eq!(
            EigerFeatures::get_pixel_size(&conn).unwrap(),
            PixelSize { x: 75e-6, y: 76e-6 }
        );
    }

    #[test]
    fn correction_getters_read_own_keys() {
        let server = MockEigerServer::new();
        server.put_value(keys::FLATFIELD_CORRECTION, false);
        let conn = connect(&server);
        server.clear_calls();

        assert!(EigerFeatures::get_countrate_correction(&conn).unwrap());
        assert!(!EigerFeatures::get_flatfield_correction(&conn).unwrap());
        assert!(EigerFeatures::get_pixel_mask(&conn).unwrap());
        assert!(EigerFeatures::get_virtual_pixel_correction(&conn).unwrap());
        assert!(EigerFeatures::get_efficiency_correction(&conn).unwrap());

        assert_eq!(server.gets_of(keys::FLATFIELD_CORRECTION), 1);
        assert_eq!(server.gets_of(keys::EFFICIENCY_CORRECTION), 1);
    }
}
