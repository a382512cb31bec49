//! Shared helpers for the Eiger integration tests.
//!
//! - `init_tracing`: opt-in log output via `RUST_LOG`
//! - `open`: detector over a mock server with a raw frame decoder
//! - `frame_bytes`: a data file of numbered frames

#![allow(dead_code)] // Not every test file uses every helper
#![allow(clippy::expect_used, clippy::panic)]

use daq_driver_eiger::mock::{MockEigerServer, RawFrameOpener};
use daq_driver_eiger::{EigerConfig, EigerDetector, ResourceValue};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Bytes per frame in test data files.
pub const FRAME_LEN: usize = 4;

/// Install a test subscriber once; output follows `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Open a detector on `server` with default config.
pub fn open(server: &MockEigerServer) -> (EigerDetector, RawFrameOpener) {
    open_with(server, EigerConfig::with_address("mock-eiger"))
}

/// Open a detector on `server` with `config`.
pub fn open_with(server: &MockEigerServer, config: EigerConfig) -> (EigerDetector, RawFrameOpener) {
    init_tracing();
    let opener = RawFrameOpener::new(FRAME_LEN);
    let detector = EigerDetector::open(&config, server, Arc::new(opener.clone()))
        .expect("mock detector should open");
    (detector, opener)
}

/// `count` frames, frame `i` filled with byte `i`.
pub fn frame_bytes(count: u8) -> Vec<u8> {
    (0..count)
        .flat_map(|i| std::iter::repeat(i).take(FRAME_LEN))
        .collect()
}

/// Unwrap a recorded double.
pub fn as_f64(value: &ResourceValue) -> f64 {
    match value {
        ResourceValue::Double(v) => *v,
        other => panic!("expected a double, got {other:?}"),
    }
}
