//! Kinematic simulated vehicle.
//!
//! A first-order point mass that closes on its setpoint with a proportional
//! velocity command under a speed limit. Good enough to rehearse a show
//! without aircraft; it models no attitude, wind or battery sag.

use flockstep_proto::{
    Battery, KinematicState, Point, Vehicle, VehicleError, VehicleParams, VehicleTelemetry,
};
use std::time::Instant;
use tracing::{debug, info};

/// Velocity command per meter of position error (1/s).
const POSITION_GAIN: f64 = 3.0;
/// Maximum speed in m/s.
const MAX_SPEED: f64 = 2.0;
/// Collective thrust added per meter of vertical error.
const THRUST_GAIN: f64 = 0.1;
/// Longest step integrated at once, so a stalled caller does not teleport.
const MAX_STEP: f64 = 0.1;
/// Height under which a vehicle with a ground setpoint has touched down.
const GROUND_CONTACT: f64 = 0.02;
/// Battery percent drained per second while armed.
const DRAIN_PER_SEC: f64 = 0.05;
const EMPTY_VOLTS: f64 = 10.5;
const FULL_VOLTS: f64 = 12.6;

/// In-process simulated vehicle.
#[derive(Debug, Clone)]
pub struct SimVehicle {
    state: KinematicState,
    connected: bool,
    armed: bool,
    target: Option<Point>,
    battery_percent: f64,
    raw_control_input: Point,
    params: VehicleParams,
    last_update: Option<Instant>,
}

impl SimVehicle {
    /// Creates a disconnected vehicle resting at `spawn`.
    pub fn new(spawn: Point) -> Self {
        Self {
            state: KinematicState {
                position: spawn,
                velocity: Point::zeros(),
            },
            connected: false,
            armed: false,
            target: None,
            battery_percent: 100.0,
            raw_control_input: Point::zeros(),
            params: VehicleParams::default(),
            last_update: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Integrates `dt` seconds of motion toward the current setpoint.
    pub fn advance(&mut self, dt: f64) {
        let Some(target) = self.target else {
            return;
        };
        if !self.armed || dt <= 0.0 {
            return;
        }

        let error = target - self.state.position;
        let mut velocity = error * POSITION_GAIN;
        let speed = velocity.norm();
        if speed > MAX_SPEED {
            velocity *= MAX_SPEED / speed;
        }

        let mut position = self.state.position + velocity * dt;
        if position.z < 0.0 {
            position.z = 0.0;
            velocity.z = 0.0;
        }
        self.state = KinematicState { position, velocity };

        let thrust = self.params.hover_point + THRUST_GAIN * error.z;
        self.raw_control_input = Point::new(0.0, 0.0, thrust.clamp(0.0, 1.0));
        self.battery_percent = (self.battery_percent - DRAIN_PER_SEC * dt).max(0.0);

        if target.z <= GROUND_CONTACT && position.z <= GROUND_CONTACT {
            debug!("Simulated vehicle touched down, disarming");
            self.disarm();
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
        self.state.velocity = Point::zeros();
        self.raw_control_input = Point::zeros();
    }
}

impl Vehicle for SimVehicle {
    fn connect(&mut self, local_port: u16, remote_port: u16) -> Result<(), VehicleError> {
        debug!(local_port, remote_port, "Simulated vehicle connected");
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.disarm();
    }

    fn setpoint_pos(&mut self, point: Point) {
        let now = Instant::now();
        let dt = self
            .last_update
            .map_or(0.0, |t| now.duration_since(t).as_secs_f64().min(MAX_STEP));
        self.last_update = Some(now);
        self.target = Some(point);

        if self.connected && !self.armed && point.z > GROUND_CONTACT {
            info!("Simulated vehicle armed");
            self.armed = true;
        }
        self.advance(dt);
    }

    fn terminate(&mut self) {
        if self.armed || self.state.position.z > 0.0 {
            debug!("Simulated vehicle terminated, dropping");
        }
        self.state.position.z = 0.0;
        self.target = None;
        self.disarm();
    }

    fn telemetry(&self) -> VehicleTelemetry {
        VehicleTelemetry {
            connected: self.connected,
            armed: self.armed,
            tracking: self.connected,
            state: self.state,
            battery: Battery {
                voltage: EMPTY_VOLTS + (FULL_VOLTS - EMPTY_VOLTS) * self.battery_percent / 100.0,
                percent: self.battery_percent,
            },
            last_raw_control_input: self.raw_control_input,
        }
    }

    fn params(&self) -> &VehicleParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut VehicleParams {
        &mut self.params
    }
}
