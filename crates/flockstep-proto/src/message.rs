//! JSON wire schema for the operator messaging transport.
//!
//! Every message is an object discriminated by its `type` field. The core
//! builds and consumes these types only; the transport that carries them
//! (TCP, websocket, ...) is an adapter concern.

use serde::{Deserialize, Serialize};

/// Version stamped into every status snapshot.
pub const STATUS_SCHEMA_VERSION: u32 = 1;

/// An operator intent received from a remote console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Prepare,
    Play,
    Pause,
    Stop,
    Land,
    Reset,
    /// Request the list of show files available to load.
    List,
    /// Load a show file by name from the data directory.
    Load { file: String },
    /// Set or clear the kill interlock.
    Kill { enabled: bool },
}

/// A message sent from the orchestrator to remote consoles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Periodic fleet status.
    Status(StatusSnapshot),

    /// Reply to `list`.
    ListReply { files: Vec<String> },

    /// A request could not be honoured.
    Error { message: String },
}

/// Fleet-wide status record emitted at a fixed tick interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub version: u32,

    /// Show clock in seconds.
    pub time: f64,

    pub vehicles: Vec<VehicleStatus>,

    pub global: GlobalStatus,
}

/// Per-vehicle entry of a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    /// Network id of the vehicle.
    pub id: u32,

    /// Choreography role flown by this vehicle, `null` when unassigned.
    pub role: Option<usize>,

    pub connected: bool,
    pub armed: bool,
    pub tracking: bool,
    pub position: [f64; 3],
    pub battery: BatteryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub voltage: f64,
    pub percent: f64,
}

/// Fleet-level flags of a status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStatus {
    pub playing: bool,
    pub ready: bool,
    /// Current show mode name, e.g. `"paused"`.
    pub mode: String,
}
