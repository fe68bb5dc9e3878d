//! # flockstep-core
//!
//! Orchestration core for the flockstep drone-show controller.
//!
//! This crate provides:
//! - The show state machine that moves a fleet between idle, preparing,
//!   ready, playing, paused, stopping and killed
//! - Choreography loading and the per-vehicle controllers that follow it
//! - The shared request flags every operator surface writes to
//! - Intent parsing and routing for console, messaging and OSC input
//! - Hover-thrust calibration and parameter persistence
//! - The fixed-rate stepping loop and a simulated vehicle backend

mod calibration;
mod choreography;
mod clock;
mod config;
mod controller;
mod intent;
mod orchestrator;
mod params;
mod requests;
mod roster;
mod router;
mod show_loop;
mod sim;
mod telemetry;
pub mod testing;

pub use calibration::{CalibrationError, CalibrationOutcome, Calibrator};
pub use choreography::{Choreography, ChoreographyError, Keyframe, Role, Trajectory};
pub use clock::ShowClock;
pub use config::{
    CalibrationConfig, ConfigError, ConfigWarning, HardwareConfig, ReadinessConfig, ShowConfig,
    StoppingConfig, VehicleEntry, VehicleLink,
};
pub use controller::{Control, Controller, HoldController, LandController, TrajectoryController};
pub use intent::{Cue, Intent, IntentError};
pub use orchestrator::{Orchestrator, OrchestratorSettings, ShowMode, StopKind};
pub use params::ParamStore;
pub use requests::{ModeRequest, ModeRequests, ParamUpdate};
pub use roster::{FleetMember, FleetRoster, RosterError};
pub use router::{IntentRouter, LoadError};
pub use show_loop::ShowLoop;
pub use sim::SimVehicle;
pub use telemetry::{FleetTelemetry, MemberTelemetry};
