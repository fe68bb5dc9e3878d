//! Mock vehicle for deterministic fleet tests.
//!
//! `MockVehicle` records every command it receives. Clones share the same
//! log and telemetry, so a test can keep one clone as a handle after moving
//! the other into a roster.

use flockstep_proto::{
    Battery, KinematicState, Point, Vehicle, VehicleError, VehicleParams, VehicleTelemetry,
};
use std::sync::{Arc, Mutex, PoisonError};

/// A command received by a mock vehicle.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Connect { local_port: u16, remote_port: u16 },
    Disconnect,
    Setpoint(Point),
    Terminate,
}

#[derive(Debug)]
struct Inner {
    commands: Vec<VehicleCommand>,
    telemetry: VehicleTelemetry,
    follow_setpoints: bool,
    fail_connect: bool,
}

/// Scriptable in-memory vehicle.
#[derive(Debug, Clone)]
pub struct MockVehicle {
    inner: Arc<Mutex<Inner>>,
    params: VehicleParams,
}

impl Default for MockVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVehicle {
    /// Creates a connected, tracked, disarmed vehicle at the origin.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                commands: Vec::new(),
                telemetry: VehicleTelemetry {
                    connected: true,
                    tracking: true,
                    battery: Battery {
                        voltage: 12.4,
                        percent: 90.0,
                    },
                    ..VehicleTelemetry::default()
                },
                follow_setpoints: false,
                fail_connect: false,
            })),
            params: VehicleParams::default(),
        }
    }

    /// Makes the vehicle jump to (and rest at) every setpoint it receives.
    pub fn following_setpoints(self) -> Self {
        self.lock().follow_setpoints = true;
        self
    }

    /// Makes `connect` fail.
    pub fn failing_connect(self) -> Self {
        self.lock().fail_connect = true;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All commands received so far.
    pub fn commands(&self) -> Vec<VehicleCommand> {
        self.lock().commands.clone()
    }

    /// Returns and clears the command log.
    pub fn take_commands(&self) -> Vec<VehicleCommand> {
        std::mem::take(&mut self.lock().commands)
    }

    /// Setpoints received so far, in order.
    pub fn setpoints(&self) -> Vec<Point> {
        self.lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                VehicleCommand::Setpoint(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn terminate_count(&self) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|c| matches!(c, VehicleCommand::Terminate))
            .count()
    }

    pub fn set_state(&self, state: KinematicState) {
        self.lock().telemetry.state = state;
    }

    pub fn set_armed(&self, armed: bool) {
        self.lock().telemetry.armed = armed;
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().telemetry.connected = connected;
    }

    /// Simulates the vehicle dropping out of (or back into) motion capture.
    pub fn set_tracking(&self, tracking: bool) {
        self.lock().telemetry.tracking = tracking;
    }

    pub fn set_raw_control_input(&self, input: Point) {
        self.lock().telemetry.last_raw_control_input = input;
    }
}

impl Vehicle for MockVehicle {
    fn connect(&mut self, local_port: u16, remote_port: u16) -> Result<(), VehicleError> {
        let mut inner = self.lock();
        inner.commands.push(VehicleCommand::Connect {
            local_port,
            remote_port,
        });
        if inner.fail_connect {
            return Err(VehicleError::Connect {
                local_port,
                remote_port,
                reason: "mock refused".to_string(),
            });
        }
        inner.telemetry.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut inner = self.lock();
        inner.commands.push(VehicleCommand::Disconnect);
        inner.telemetry.connected = false;
    }

    fn setpoint_pos(&mut self, point: Point) {
        let mut inner = self.lock();
        inner.commands.push(VehicleCommand::Setpoint(point));
        if inner.follow_setpoints {
            inner.telemetry.armed = point.z > 0.0;
            inner.telemetry.state = KinematicState {
                position: point,
                velocity: Point::zeros(),
            };
        }
    }

    fn terminate(&mut self) {
        let mut inner = self.lock();
        inner.commands.push(VehicleCommand::Terminate);
        inner.telemetry.armed = false;
    }

    fn telemetry(&self) -> VehicleTelemetry {
        self.lock().telemetry.clone()
    }

    fn params(&self) -> &VehicleParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut VehicleParams {
        &mut self.params
    }
}
