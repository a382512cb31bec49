//! Integration tests for EigerDetector
//!
//! Drives the synchronous facade against the in-memory detector server:
//! - Construction seeding and teardown restore
//! - Trigger mode and state encodings
//! - Derived frame time
//! - File session lifecycle
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p daq-driver-eiger --test detector_test
//! RUST_LOG=daq_driver_eiger=debug cargo test -p daq-driver-eiger --test detector_test -- --nocapture
//! ```

#![cfg(feature = "mock")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp,
    missing_docs
)]

mod common;

use common::{as_f64, frame_bytes, open, open_with, FRAME_LEN};
use daq_driver_eiger::mock::{MockCall, MockEigerServer};
use daq_driver_eiger::{
    DetectorState, EigerConfig, EigerDetector, LastError, PixelSize, ResourceError,
    ResourceValue, Subsystem, TriggerMode, DEFAULT_API_VERSION,
};
use std::sync::Arc;

// =============================================================================
// Construction and teardown
// =============================================================================

mod lifecycle {
    use super::*;
    use daq_driver_eiger::mock::RawFrameOpener;

    #[test]
    fn open_seeds_defaults_in_order() {
        let server = MockEigerServer::new();
        let (_det, _) = open(&server);

        assert_eq!(
            server.calls(),
            vec![
                MockCall::Get("detector_readout_time".into()),
                MockCall::Get("exposure".into()),
                MockCall::Set("name_pattern".into(), ResourceValue::from("series_$id")),
                MockCall::Get("compression".into()),
                MockCall::Set("compression".into(), ResourceValue::from(false)),
                MockCall::Set("auto_summation".into(), ResourceValue::from(false)),
            ]
        );
        assert_eq!(
            server.connections(),
            vec![("mock-eiger".to_string(), DEFAULT_API_VERSION.to_string())]
        );
    }

    #[test]
    fn open_uses_configured_name_pattern_and_version() {
        let server = MockEigerServer::new().with_api_version("1.6.0");
        let config = EigerConfig {
            name_pattern: "scan_$id".to_string(),
            api_version: Some("1.8.0".to_string()),
            ..EigerConfig::with_address("10.0.0.2")
        };
        let (det, _) = open_with(&server, config);

        assert_eq!(det.api_version(), "1.8.0");
        assert_eq!(det.address(), "10.0.0.2");
        assert_eq!(
            server.value("name_pattern"),
            Some(ResourceValue::from("scan_$id"))
        );
    }

    #[test]
    fn compression_untouched_when_not_disabled() {
        let server = MockEigerServer::new();
        let config = EigerConfig {
            disable_compression: false,
            disable_auto_summation: false,
            ..EigerConfig::with_address("mock-eiger")
        };
        let (det, _) = open_with(&server, config);
        drop(det);

        assert!(server.sets_of("compression").is_empty());
        assert!(server.sets_of("auto_summation").is_empty());
        assert_eq!(server.value("compression"), Some(ResourceValue::from(true)));
    }

    #[test]
    fn drop_restores_compression() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        assert_eq!(server.value("compression"), Some(ResourceValue::from(false)));

        drop(det);
        assert_eq!(server.value("compression"), Some(ResourceValue::from(true)));
    }

    #[test]
    fn drop_restores_compression_changed_in_between() {
        let server = MockEigerServer::new().with_value("compression", false);
        let (det, _) = open(&server);

        // Another client flips it while the session is open.
        server.put_value("compression", true);
        drop(det);

        assert_eq!(server.value("compression"), Some(ResourceValue::from(false)));
        assert_eq!(
            server.sets_of("compression"),
            vec![ResourceValue::from(false), ResourceValue::from(false)]
        );
    }

    #[test]
    fn close_restores_once() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        det.close().unwrap();

        assert_eq!(
            server.sets_of("compression"),
            vec![ResourceValue::from(false), ResourceValue::from(true)]
        );
    }

    #[test]
    fn close_reports_restore_failure() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        server.fail_on("compression");

        let err = det.close().unwrap_err();
        assert!(format!("{err:#}").contains("compression"));
    }

    #[test]
    fn drop_survives_lost_server() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        server.lose_communication();
        drop(det);
    }

    #[test]
    fn failed_open_still_restores_compression() {
        let server = MockEigerServer::new();
        server.fail_on("auto_summation");

        let result = EigerDetector::open(
            &EigerConfig::with_address("mock-eiger"),
            &server,
            Arc::new(RawFrameOpener::new(FRAME_LEN)),
        );
        assert!(result.is_err());
        assert_eq!(server.value("compression"), Some(ResourceValue::from(true)));
    }

    #[test]
    fn open_rejects_invalid_config() {
        let server = MockEigerServer::new();
        let config = EigerConfig {
            latency_s: -1.0,
            ..EigerConfig::default()
        };
        let result = EigerDetector::open(
            &config,
            &server,
            Arc::new(RawFrameOpener::new(FRAME_LEN)),
        );
        assert!(result.is_err());
        assert!(server.connections().is_empty());
    }
}

// =============================================================================
// Commands
// =============================================================================

mod commands {
    use super::*;

    #[test]
    fn each_command_executes_once() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);

        det.initialize().unwrap();
        det.arm().unwrap();
        det.trigger().unwrap();
        det.disarm().unwrap();

        for cmd in ["initialize", "arm", "trigger", "disarm"] {
            assert_eq!(server.executions_of(cmd), 1, "{cmd}");
        }
    }

    #[test]
    fn command_failure_names_resource() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        server.fail_on("arm");

        let err = det.arm().unwrap_err();
        assert!(err.to_string().contains("arm"));
        assert!(err.downcast_ref::<ResourceError>().is_some());
    }
}

// =============================================================================
// Trigger mode and state
// =============================================================================

mod encodings {
    use super::*;

    #[test]
    fn trigger_mode_round_trip() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);

        for mode in TriggerMode::ALL {
            det.set_trigger_mode(mode).unwrap();
            assert_eq!(det.trigger_mode().unwrap(), mode);
        }
    }

    #[test]
    fn unknown_trigger_mode_string() {
        let server = MockEigerServer::new().with_value("trigger_mode", "ints");
        let (det, _) = open(&server);
        assert_eq!(det.trigger_mode().unwrap(), TriggerMode::Unknown);
    }

    #[test]
    fn state_uses_distinct_keys() {
        let server = MockEigerServer::new()
            .with_value("detector_status", "ready")
            .with_value("filewriter_status", "error");
        let (det, _) = open(&server);
        server.clear_calls();

        assert_eq!(det.state(Subsystem::Detector).unwrap(), DetectorState::Ready);
        assert_eq!(det.state(Subsystem::FileWriter).unwrap(), DetectorState::Error);
        assert_eq!(
            server.calls(),
            vec![
                MockCall::Get("detector_status".into()),
                MockCall::Get("filewriter_status".into()),
            ]
        );
    }

    #[test]
    fn unknown_state_string() {
        let server = MockEigerServer::new().with_value("detector_status", "idle");
        let (det, _) = open(&server);
        assert_eq!(
            det.state(Subsystem::Detector).unwrap(),
            DetectorState::Unknown
        );
    }
}

// =============================================================================
// Timing
// =============================================================================

mod timing {
    use super::*;

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn frame_time_follows_exposure_and_latency() {
        let server = MockEigerServer::new().with_value("detector_readout_time", 0.1);
        let config = EigerConfig {
            latency_s: 0.2,
            ..EigerConfig::with_address("mock-eiger")
        };
        let (mut det, _) = open_with(&server, config);

        det.set_exposure_time(5.0).unwrap();
        let pushed = server.sets_of("frame_time");
        assert_eq!(pushed.len(), 1);
        assert!(close_to(as_f64(&pushed[0]), 5.3), "{:?}", pushed);

        det.set_latency_time(0.5).unwrap();
        let pushed = server.sets_of("frame_time");
        assert_eq!(pushed.len(), 2);
        assert!(close_to(as_f64(&pushed[1]), 5.6), "{:?}", pushed);

        assert_eq!(server.sets_of("exposure"), vec![ResourceValue::from(5.0)]);
        assert_eq!(det.latency_time(), 0.5);
        assert!(close_to(det.frame_time(), 5.6));
    }

    #[test]
    fn readout_getter_refreshes_frame_time_term() {
        let server = MockEigerServer::new().with_value("detector_readout_time", 0.1);
        let (mut det, _) = open(&server);

        server.put_value("detector_readout_time", 0.3);
        assert!(close_to(det.readout_time().unwrap(), 0.3));

        det.set_exposure_time(1.0).unwrap();
        assert!(close_to(as_f64(&server.sets_of("frame_time")[0]), 1.3));
    }

    #[test]
    fn exposure_getter_reads_server() {
        let server = MockEigerServer::new();
        let (mut det, _) = open(&server);

        server.put_value("exposure", 0.25);
        assert_eq!(det.exposure_time().unwrap(), 0.25);
    }

    #[test]
    fn failed_exposure_write_pushes_nothing() {
        let server = MockEigerServer::new();
        let (mut det, _) = open(&server);
        server.fail_on("exposure");

        assert!(det.set_exposure_time(2.0).is_err());
        assert!(server.sets_of("frame_time").is_empty());
    }

    #[test]
    fn image_counts() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);

        det.set_images_per_file(50).unwrap();
        det.set_nb_images_to_acquire(200).unwrap();
        assert_eq!(server.value("nimages_per_file"), Some(ResourceValue::from(50)));
        assert_eq!(server.value("nimages"), Some(ResourceValue::from(200)));
    }
}

// =============================================================================
// File session
// =============================================================================

mod file_session {
    use super::*;

    #[test]
    fn no_frame_after_construction() {
        let server = MockEigerServer::new().with_datafile(frame_bytes(2));
        let (mut det, opener) = open(&server);

        assert!(!det.has_open_file());
        assert!(det.get_frame().unwrap().is_none());
        assert_eq!(opener.opened(), 0);
    }

    #[test]
    fn download_then_frames() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockEigerServer::new().with_datafile(frame_bytes(2));
        let (mut det, _) = open(&server);

        let path = dir.path().join("series_1_master.h5");
        det.download_acquired_file(&path).unwrap();

        assert_eq!(det.get_frame().unwrap(), Some(&[0u8; FRAME_LEN][..]));
        assert_eq!(det.get_frame().unwrap(), Some(&[1u8; FRAME_LEN][..]));
        assert!(det.get_frame().unwrap().is_none());
        assert!(server
            .calls()
            .contains(&MockCall::Download("datafile".into(), path)));
    }

    #[test]
    fn second_download_releases_first_handle() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockEigerServer::new().with_datafile(frame_bytes(3));
        let (mut det, opener) = open(&server);

        det.download_acquired_file(&dir.path().join("a.raw")).unwrap();
        det.get_frame().unwrap();
        det.download_acquired_file(&dir.path().join("b.raw")).unwrap();

        assert_eq!(opener.opened(), 2);
        assert_eq!(opener.live_handles(), 1);
        // Fresh handle starts at the first frame.
        assert_eq!(det.get_frame().unwrap(), Some(&[0u8; FRAME_LEN][..]));

        drop(det);
        assert_eq!(opener.live_handles(), 0);
    }

    #[test]
    fn delete_erases_remote_and_closes_local() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockEigerServer::new().with_datafile(frame_bytes(2));
        let (mut det, opener) = open(&server);

        det.download_acquired_file(&dir.path().join("a.raw")).unwrap();
        det.delete_acquired_file().unwrap();

        assert!(!server.has_datafile());
        assert_eq!(opener.live_handles(), 0);
        assert!(det.get_frame().unwrap().is_none());
    }

    #[test]
    fn failed_download_leaves_no_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockEigerServer::new().with_datafile(frame_bytes(2));
        let (mut det, opener) = open(&server);

        det.download_acquired_file(&dir.path().join("a.raw")).unwrap();
        server.fail_on("datafile");
        assert!(det
            .download_acquired_file(&dir.path().join("b.raw"))
            .is_err());

        assert!(!det.has_open_file());
        assert_eq!(opener.live_handles(), 0);
        assert!(det.get_frame().unwrap().is_none());
    }

    #[test]
    fn download_after_delete_fails() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockEigerServer::new().with_datafile(frame_bytes(1));
        let (mut det, _) = open(&server);

        det.delete_acquired_file().unwrap();
        assert!(det
            .download_acquired_file(&dir.path().join("a.raw"))
            .is_err());
    }
}

// =============================================================================
// Scalar accessors
// =============================================================================

mod accessors {
    use super::*;

    #[test]
    fn status_readings() {
        let server = MockEigerServer::new()
            .with_value("temp", 31.5)
            .with_value("humidity", 12.0)
            .with_value("bit_depth_readout", 12);
        let (det, _) = open(&server);

        assert_eq!(det.temperature().unwrap(), 31.5);
        assert_eq!(det.humidity().unwrap(), 12.0);
        assert_eq!(det.bit_depth_readout().unwrap(), 12);
    }

    #[test]
    fn bit_depth_does_not_read_humidity() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        server.clear_calls();

        det.bit_depth_readout().unwrap();
        assert_eq!(server.calls(), vec![MockCall::Get("bit_depth_readout".into())]);
    }

    #[test]
    fn correction_flags() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);

        assert!(det.countrate_correction().unwrap());
        assert!(det.flatfield_correction().unwrap());
        assert!(det.pixel_mask().unwrap());
        assert!(det.virtual_pixel_correction().unwrap());
        assert!(det.efficiency_correction().unwrap());

        det.set_countrate_correction(false).unwrap();
        det.set_flatfield_correction(false).unwrap();
        det.set_pixel_mask(false).unwrap();
        det.set_virtual_pixel_correction(false).unwrap();
        det.set_efficiency_correction(false).unwrap();

        for key in [
            "countrate_correction",
            "flatfield_correction",
            "pixel_mask",
            "virtual_pixel_correction",
            "efficiency_correction",
        ] {
            assert_eq!(server.sets_of(key), vec![ResourceValue::from(false)], "{key}");
            assert_eq!(server.gets_of(key), 1, "{key}");
        }

        assert!(!det.countrate_correction().unwrap());
        assert!(!det.flatfield_correction().unwrap());
        assert!(!det.pixel_mask().unwrap());
        assert!(!det.virtual_pixel_correction().unwrap());
        assert!(!det.efficiency_correction().unwrap());
    }

    #[test]
    fn energies() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);

        det.set_photon_energy(12_400.0).unwrap();
        det.set_threshold_energy(6_200.0).unwrap();
        assert_eq!(det.photon_energy().unwrap(), 12_400.0);
        assert_eq!(det.threshold_energy().unwrap(), 6_200.0);
    }

    #[test]
    fn identity() {
        let server = MockEigerServer::new()
            .with_value("x_pixel_size", 75e-6)
            .with_value("y_pixel_size", 75e-6);
        let (det, _) = open(&server);

        assert_eq!(det.description().unwrap(), "Dectris Eiger 1M");
        assert_eq!(det.detector_number().unwrap(), "E-08-0106");
        assert_eq!(
            det.pixel_size().unwrap(),
            PixelSize { x: 75e-6, y: 75e-6 }
        );
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let server = MockEigerServer::new().with_value("temp", "hot");
        let (det, _) = open(&server);

        let err = det.temperature().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResourceError>(),
            Some(ResourceError::TypeMismatch { name, .. }) if name == "temp"
        ));
    }

    #[test]
    fn last_error_is_fixed_placeholder() {
        let server = MockEigerServer::new();
        let (det, _) = open(&server);
        assert_eq!(
            det.last_error(),
            LastError {
                code: -1,
                message: String::new()
            }
        );
    }
}
