//! The vehicle contract.
//!
//! A `Vehicle` is a stateful handle to one aircraft, real or simulated. The
//! orchestrator only ever pushes setpoints and termination commands through
//! it and reads back telemetry. Every call is expected to return
//! immediately; transport I/O lives behind the implementation.

use crate::params::VehicleParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A position in the show frame, in meters.
pub type Point = nalgebra::Vector3<f64>;

/// Live kinematic state of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub position: Point,
    pub velocity: Point,
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            position: Point::zeros(),
            velocity: Point::zeros(),
        }
    }
}

/// Battery readings as last reported by the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    /// Pack voltage in volts.
    pub voltage: f64,
    /// Remaining charge, 0-100.
    pub percent: f64,
}

/// Point-in-time copy of everything the core reads from a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleTelemetry {
    pub connected: bool,
    pub armed: bool,
    /// True while the positioning backend has a fix on the vehicle.
    pub tracking: bool,
    pub state: KinematicState,
    pub battery: Battery,
    /// Last raw control input sent to the motors; `z` is collective thrust.
    pub last_raw_control_input: Point,
}

impl Default for VehicleTelemetry {
    fn default() -> Self {
        Self {
            connected: false,
            armed: false,
            tracking: false,
            state: KinematicState::default(),
            battery: Battery::default(),
            last_raw_control_input: Point::zeros(),
        }
    }
}

/// Errors raised while bringing a vehicle link up.
#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("failed to connect on ports {local_port}/{remote_port}: {reason}")]
    Connect {
        local_port: u16,
        remote_port: u16,
        reason: String,
    },
}

/// Proxy for one aircraft.
///
/// Implementations must absorb their own I/O faults: a lost link shows up
/// as `connected == false` in telemetry, never as a panic or a blocking call
/// on the stepping thread.
pub trait Vehicle: Send {
    /// Opens the command/telemetry link.
    fn connect(&mut self, local_port: u16, remote_port: u16) -> Result<(), VehicleError>;

    /// Closes the link. Safe to call more than once.
    fn disconnect(&mut self);

    /// Pushes a position setpoint to the vehicle's own position loop.
    fn setpoint_pos(&mut self, point: Point);

    /// Cuts the motors immediately.
    fn terminate(&mut self);

    /// Returns the latest telemetry.
    fn telemetry(&self) -> VehicleTelemetry;

    /// Returns the vehicle's parameter set.
    fn params(&self) -> &VehicleParams;

    /// Returns the vehicle's parameter set for modification.
    fn params_mut(&mut self) -> &mut VehicleParams;

    /// Overlays parameters from a JSON file.
    ///
    /// Returns `false` if the file is missing or unreadable; the current
    /// parameters are left untouched in that case.
    fn read_params(&mut self, path: &Path) -> bool {
        match self.params_mut().overlay_file(path) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Parameters not loaded");
                false
            }
        }
    }
}
