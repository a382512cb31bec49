//! Enum ↔ resource-string encodings
//!
//! The detector server speaks plain strings for trigger modes and subsystem
//! states. Both encodings are fixed, ordered tables; the enum discriminant
//! is the table index. Strings the tables do not know decode to an explicit
//! `Unknown` variant instead of failing.

/// Trigger mode strings, indexed by [`TriggerMode`] order.
pub const TRIGGER_MODE_NAMES: [&str; 4] = ["expo", "extt", "extm", "extte"];

/// Subsystem state strings, indexed by [`DetectorState`] order.
pub const STATE_NAMES: [&str; 8] = [
    "na",
    "disabled",
    "ready",
    "acquire",
    "error",
    "initialize",
    "configure",
    "test",
];

/// First-match linear search; `None` when `needle` is not in `table`.
pub fn index_of(table: &[&str], needle: &str) -> Option<usize> {
    table.iter().position(|entry| *entry == needle)
}

// =============================================================================
// Trigger Mode
// =============================================================================

/// Detector trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    /// Internal trigger, exposure timed by the detector (`expo`)
    Expo,
    /// External trigger starts a timed series (`extt`)
    Extt,
    /// One external trigger per image (`extm`)
    Extm,
    /// External gate defines the exposure (`extte`)
    Extte,
    /// The server reported a string outside the table
    Unknown,
}

impl TriggerMode {
    /// Every mode that has a wire encoding, in table order.
    pub const ALL: [TriggerMode; 4] = [
        TriggerMode::Expo,
        TriggerMode::Extt,
        TriggerMode::Extm,
        TriggerMode::Extte,
    ];

    /// Table index, `None` for [`TriggerMode::Unknown`].
    pub fn index(self) -> Option<usize> {
        match self {
            TriggerMode::Expo => Some(0),
            TriggerMode::Extt => Some(1),
            TriggerMode::Extm => Some(2),
            TriggerMode::Extte => Some(3),
            TriggerMode::Unknown => None,
        }
    }

    /// Inverse of [`TriggerMode::index`]; out-of-range maps to `Unknown`.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(TriggerMode::Unknown)
    }

    /// Wire string, `None` for [`TriggerMode::Unknown`].
    pub fn as_resource_str(self) -> Option<&'static str> {
        self.index().map(|i| TRIGGER_MODE_NAMES[i])
    }

    /// Decode a wire string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        index_of(&TRIGGER_MODE_NAMES, s).map_or(TriggerMode::Unknown, Self::from_index)
    }

    /// Display label (wire string, or `"unknown"`).
    pub fn as_str(self) -> &'static str {
        self.as_resource_str().unwrap_or("unknown")
    }

    /// Valid choices for UIs and command validation.
    pub fn all_choices() -> Vec<String> {
        TRIGGER_MODE_NAMES.iter().map(|s| s.to_string()).collect()
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Subsystem State
// =============================================================================

/// State reported by a detector subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorState {
    /// Not available (`na`)
    Na,
    /// Disabled (`disabled`)
    Disabled,
    /// Idle and ready (`ready`)
    Ready,
    /// Armed or acquiring (`acquire`)
    Acquire,
    /// Error (`error`)
    Error,
    /// Initializing (`initialize`)
    Initialize,
    /// Applying configuration (`configure`)
    Configure,
    /// Test mode (`test`)
    Test,
    /// The server reported a string outside the table
    Unknown,
}

impl DetectorState {
    /// Every state that has a wire encoding, in table order.
    pub const ALL: [DetectorState; 8] = [
        DetectorState::Na,
        DetectorState::Disabled,
        DetectorState::Ready,
        DetectorState::Acquire,
        DetectorState::Error,
        DetectorState::Initialize,
        DetectorState::Configure,
        DetectorState::Test,
    ];

    /// Inverse of the table index; out-of-range maps to `Unknown`.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(DetectorState::Unknown)
    }

    /// Decode a wire string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        index_of(&STATE_NAMES, s).map_or(DetectorState::Unknown, Self::from_index)
    }

    /// Display label (wire string, or `"unknown"`).
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .map_or("unknown", |i| STATE_NAMES[i])
    }
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Subsystem
// =============================================================================

/// Detector subsystem with its own status resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// The sensor/readout electronics
    Detector,
    /// The on-server HDF5/NeXus file writer
    FileWriter,
}

impl Subsystem {
    /// Key of the status resource for this subsystem.
    pub fn status_key(self) -> &'static str {
        match self {
            Subsystem::Detector => "detector_status",
            Subsystem::FileWriter => "filewriter_status",
        }
    }

    /// Parse a subsystem name as used in command arguments.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "detector" => Some(Subsystem::Detector),
            "filewriter" | "file_writer" => Some(Subsystem::FileWriter),
            _ => None,
        }
    }

    /// Short name
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Detector => "detector",
            Subsystem::FileWriter => "filewriter",
        }
    }
}
