//! In-memory detector server and raw frame decoder.
//!
//! [`MockEigerServer`] implements [`ResourceProviderFactory`] over a shared
//! resource table seeded with the keys the detector uses. Every handle
//! operation is recorded as a [`MockCall`], so tests can assert exactly what
//! reached the "device". Failures are injected per resource name or for
//! the whole server.
//!
//! [`RawFrameOpener`] treats a downloaded file as a flat sequence of
//! fixed-size frames and counts live handles.
//!
//! ```rust,ignore
//! let server = MockEigerServer::new().with_value("detector_readout_time", 0.1);
//! let mut det = EigerDetector::open(&config, &server, Arc::new(RawFrameOpener::new(4)))?;
//! det.set_exposure_time(5.0)?;
//! assert_eq!(server.sets_of("frame_time").len(), 1);
//! ```

use crate::components::resource::{
    CommandResource, FileResource, Resource, ResourceError, ResourceKind, ResourceProvider,
    ResourceProviderFactory, ResourceValue, ValueResource,
};
use crate::components::session::{ImageFile, ImageFileOpener};
use anyhow::{bail, Context, Result};
use daq_core::error::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DRIVER_TYPE: &str = "eiger";

/// One operation observed by the mock server.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// Value read
    Get(String),
    /// Value write
    Set(String, ResourceValue),
    /// Command run
    Execute(String),
    /// File download to a local path
    Download(String, PathBuf),
    /// Remote file erase
    Erase(String),
}

#[derive(Debug)]
struct ServerState {
    kinds: HashMap<String, ResourceKind>,
    values: HashMap<String, ResourceValue>,
    calls: Vec<MockCall>,
    failing: HashSet<String>,
    communication_lost: bool,
    api_version: Option<String>,
    connections: Vec<(String, String)>,
    datafile: Option<Vec<u8>>,
}

impl ServerState {
    fn seeded() -> Self {
        let values: HashMap<String, ResourceValue> = [
            ("exposure", ResourceValue::from(1.0)),
            ("frame_time", ResourceValue::from(1.0)),
            ("detector_readout_time", ResourceValue::from(1e-5)),
            ("trigger_mode", ResourceValue::from("expo")),
            ("detector_status", ResourceValue::from("ready")),
            ("filewriter_status", ResourceValue::from("disabled")),
            ("temp", ResourceValue::from(24.5)),
            ("humidity", ResourceValue::from(8.0)),
            ("bit_depth_readout", ResourceValue::from(16)),
            ("countrate_correction", ResourceValue::from(true)),
            ("flatfield_correction", ResourceValue::from(true)),
            ("pixel_mask", ResourceValue::from(true)),
            ("virtual_pixel_correction", ResourceValue::from(true)),
            ("efficiency_correction", ResourceValue::from(true)),
            ("threshold_energy", ResourceValue::from(4020.5)),
            ("photon_energy", ResourceValue::from(8041.0)),
            ("description", ResourceValue::from("Dectris Eiger 1M")),
            ("detector_number", ResourceValue::from("E-08-0106")),
            ("x_pixel_size", ResourceValue::from(75e-6)),
            ("y_pixel_size", ResourceValue::from(75e-6)),
            ("nimages_per_file", ResourceValue::from(1000)),
            ("nimages", ResourceValue::from(1)),
            ("name_pattern", ResourceValue::from("series_$id")),
            ("compression", ResourceValue::from(true)),
            ("auto_summation", ResourceValue::from(true)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut kinds: HashMap<String, ResourceKind> = values
            .keys()
            .map(|k| (k.clone(), ResourceKind::Value))
            .collect();
        for command in ["initialize", "arm", "disarm", "trigger"] {
            kinds.insert(command.to_string(), ResourceKind::Command);
        }
        kinds.insert("datafile".to_string(), ResourceKind::File);

        Self {
            kinds,
            values,
            calls: Vec::new(),
            failing: HashSet::new(),
            communication_lost: false,
            api_version: None,
            connections: Vec::new(),
            datafile: Some(Vec::new()),
        }
    }

    fn check(&self, name: &str) -> Result<(), ResourceError> {
        if self.communication_lost {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Communication,
                "Communication lost",
            )
            .into());
        }
        if self.failing.contains(name) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Hardware,
                format!("Injected failure on '{}'", name),
            )
            .into());
        }
        Ok(())
    }

    fn set_status(&mut self, status: &str) {
        self.values
            .insert("detector_status".to_string(), ResourceValue::from(status));
    }
}

/// Shared in-memory detector server.
///
/// Clones share state: keep one clone for assertions and hand another to
/// the detector.
#[derive(Debug, Clone)]
pub struct MockEigerServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for MockEigerServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEigerServer {
    /// Server with every detector resource at a plausible idle value.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState::seeded())),
        }
    }

    /// Report `version` from API version discovery.
    pub fn with_api_version(self, version: &str) -> Self {
        self.state.lock().api_version = Some(version.to_string());
        self
    }

    /// Seed a value resource (added if not yet known).
    pub fn with_value(self, key: &str, value: impl Into<ResourceValue>) -> Self {
        self.put_value(key, value);
        self
    }

    /// Contents written to the destination on `datafile` download.
    pub fn with_datafile(self, bytes: Vec<u8>) -> Self {
        self.state.lock().datafile = Some(bytes);
        self
    }

    /// Change a value behind the detector's back. Not recorded as a call.
    pub fn put_value(&self, key: &str, value: impl Into<ResourceValue>) {
        let mut state = self.state.lock();
        state.kinds.insert(key.to_string(), ResourceKind::Value);
        state.values.insert(key.to_string(), value.into());
    }

    /// Current value of `key`.
    pub fn value(&self, key: &str) -> Option<ResourceValue> {
        self.state.lock().values.get(key).cloned()
    }

    /// Make every operation on `name` fail with a hardware error.
    pub fn fail_on(&self, name: &str) {
        self.state.lock().failing.insert(name.to_string());
    }

    /// Make every operation fail with a communication error.
    pub fn lose_communication(&self) {
        self.state.lock().communication_lost = true;
    }

    /// Undo [`fail_on`](Self::fail_on) and
    /// [`lose_communication`](Self::lose_communication).
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing.clear();
        state.communication_lost = false;
    }

    /// Whether the remote data file still exists.
    pub fn has_datafile(&self) -> bool {
        self.state.lock().datafile.is_some()
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Values written to `key`, oldest first.
    pub fn sets_of(&self, key: &str) -> Vec<ResourceValue> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Set(k, v) if k == key => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of reads of `key`.
    pub fn gets_of(&self, key: &str) -> usize {
        self.count(|call| matches!(call, MockCall::Get(k) if k == key))
    }

    /// Number of runs of command `key`.
    pub fn executions_of(&self, key: &str) -> usize {
        self.count(|call| matches!(call, MockCall::Execute(k) if k == key))
    }

    /// `(address, api_version)` of every provider built so far.
    pub fn connections(&self) -> Vec<(String, String)> {
        self.state.lock().connections.clone()
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(*c)).count()
    }
}

impl ResourceProviderFactory for MockEigerServer {
    fn api_version(&self, _address: &str) -> Result<Option<String>, ResourceError> {
        let state = self.state.lock();
        if state.communication_lost {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Communication,
                "Communication lost",
            )
            .into());
        }
        Ok(state.api_version.clone())
    }

    fn connect(
        &self,
        address: &str,
        api_version: &str,
    ) -> Result<Box<dyn ResourceProvider>, ResourceError> {
        self.state
            .lock()
            .connections
            .push((address.to_string(), api_version.to_string()));
        Ok(Box::new(MockProvider {
            state: self.state.clone(),
        }))
    }
}

// =============================================================================
// Provider and handles
// =============================================================================

struct MockProvider {
    state: Arc<Mutex<ServerState>>,
}

impl ResourceProvider for MockProvider {
    fn resource(&self, name: &str) -> Result<Resource, ResourceError> {
        let kind = self
            .state
            .lock()
            .kinds
            .get(name)
            .copied()
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))?;
        let handle = MockHandle {
            name: name.to_string(),
            state: self.state.clone(),
        };
        Ok(match kind {
            ResourceKind::Value => Resource::Value(Box::new(handle)),
            ResourceKind::Command => Resource::Command(Box::new(handle)),
            ResourceKind::File => Resource::File(Box::new(handle)),
        })
    }
}

struct MockHandle {
    name: String,
    state: Arc<Mutex<ServerState>>,
}

impl ValueResource for MockHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self) -> Result<ResourceValue, ResourceError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Get(self.name.clone()));
        state.check(&self.name)?;
        state
            .values
            .get(&self.name)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(self.name.clone()))
    }

    fn set(&self, value: ResourceValue) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(MockCall::Set(self.name.clone(), value.clone()));
        state.check(&self.name)?;
        state.values.insert(self.name.clone(), value);
        Ok(())
    }
}

impl CommandResource for MockHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Execute(self.name.clone()));
        state.check(&self.name)?;
        match self.name.as_str() {
            "initialize" | "disarm" => state.set_status("ready"),
            "arm" => state.set_status("acquire"),
            _ => {}
        }
        Ok(())
    }
}

impl FileResource for MockHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn download(&self, destination: &Path) -> Result<(), ResourceError> {
        let bytes = {
            let mut state = self.state.lock();
            state.calls.push(MockCall::Download(
                self.name.clone(),
                destination.to_path_buf(),
            ));
            state.check(&self.name)?;
            state.datafile.clone().ok_or_else(|| {
                DriverError::new(
                    DRIVER_TYPE,
                    DriverErrorKind::Hardware,
                    format!("No acquired data behind '{}'", self.name),
                )
            })?
        };
        std::fs::write(destination, bytes)?;
        Ok(())
    }

    fn erase(&self) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Erase(self.name.clone()));
        state.check(&self.name)?;
        state.datafile = None;
        Ok(())
    }
}

// =============================================================================
// Raw frame decoder
// =============================================================================

/// Opens files as back-to-back frames of `frame_len` bytes.
#[derive(Debug, Clone)]
pub struct RawFrameOpener {
    frame_len: usize,
    live: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl RawFrameOpener {
    /// Decoder for frames of `frame_len` bytes.
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            live: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handles opened and not yet dropped.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Handles opened in total.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ImageFileOpener for RawFrameOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ImageFile>> {
        if self.frame_len == 0 {
            bail!("Frame length must be non-zero");
        }
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RawFrameFile {
            data,
            frame_len: self.frame_len,
            cursor: 0,
            live: self.live.clone(),
        }))
    }
}

/// Open raw frame file; trailing bytes shorter than a frame are ignored.
#[derive(Debug)]
pub struct RawFrameFile {
    data: Vec<u8>,
    frame_len: usize,
    cursor: usize,
    live: Arc<AtomicUsize>,
}

impl ImageFile for RawFrameFile {
    fn next_image(&mut self) -> Result<Option<&[u8]>> {
        let end = self.cursor + self.frame_len;
        if end > self.data.len() {
            return Ok(None);
        }
        let start = self.cursor;
        self.cursor = end;
        Ok(Some(&self.data[start..end]))
    }
}

impl Drop for RawFrameFile {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
