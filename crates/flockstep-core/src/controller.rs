//! Per-vehicle controllers.
//!
//! A controller turns a time into a setpoint for one vehicle and reports
//! how far that vehicle's live state is from where the controller wants it.
//! The orchestrator uses `distance` as a uniform readiness metric no
//! matter which variant is bound.

use crate::choreography::{ChoreographyError, Trajectory};
use flockstep_proto::{KinematicState, Point};
use nalgebra::Vector6;
use std::sync::Arc;

/// Capability shared by every controller variant.
pub trait Control {
    /// Returns the setpoint for time `t`.
    fn control(&mut self, t: f64) -> Point;

    /// Position-and-velocity error between `state` and the intended state.
    fn distance(&self, state: &KinematicState) -> f64;
}

/// Norm of the 6-vector (position error, velocity error).
fn tracking_error(
    target_pos: &Point,
    target_vel: &Point,
    state: &KinematicState,
) -> f64 {
    let p = target_pos - state.position;
    let v = target_vel - state.velocity;
    Vector6::new(p.x, p.y, p.z, v.x, v.y, v.z).norm()
}

/// Holds a fixed point.
///
/// Velocity regulation is left to the vehicle's own position loop; no
/// feedforward is computed here.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldController {
    point: Point,
}

impl HoldController {
    pub fn new(point: Point) -> Self {
        Self { point }
    }

    pub fn point(&self) -> Point {
        self.point
    }
}

impl Control for HoldController {
    fn control(&mut self, _t: f64) -> Point {
        self.point
    }

    fn distance(&self, state: &KinematicState) -> f64 {
        tracking_error(&self.point, &Point::zeros(), state)
    }
}

/// Follows a choreography path on the show clock.
#[derive(Debug, Clone)]
pub struct TrajectoryController {
    trajectory: Arc<Trajectory>,
    last_t: f64,
}

impl TrajectoryController {
    pub fn new(trajectory: Arc<Trajectory>) -> Self {
        let last_t = trajectory.start_time();
        Self { trajectory, last_t }
    }
}

impl Control for TrajectoryController {
    fn control(&mut self, t: f64) -> Point {
        self.last_t = t;
        self.trajectory.position(t)
    }

    fn distance(&self, state: &KinematicState) -> f64 {
        tracking_error(
            &self.trajectory.position(self.last_t),
            &self.trajectory.velocity(self.last_t),
            state,
        )
    }
}

/// Brings a vehicle down: an optional level leg over a target, then a
/// vertical descent to the ground. Driven by time since binding.
#[derive(Debug, Clone)]
pub struct LandController {
    path: Trajectory,
    last_t: f64,
}

impl LandController {
    /// Plans a landing from `from` to the ground below `over`.
    pub fn new(
        from: Point,
        over: Point,
        approach_speed: f64,
        descent_rate: f64,
    ) -> Result<Self, ChoreographyError> {
        let altitude = from.z.max(0.0);
        let above_target = Point::new(over.x, over.y, altitude);
        let touchdown = Point::new(over.x, over.y, 0.0);

        let mut samples = vec![(0.0, from)];
        let mut t = 0.0;

        let level = (above_target - from).norm();
        if level > f64::EPSILON && approach_speed > 0.0 {
            t += level / approach_speed;
            samples.push((t, above_target));
        }

        if altitude > f64::EPSILON && descent_rate > 0.0 {
            t += altitude / descent_rate;
            samples.push((t, touchdown));
        }

        Ok(Self {
            path: Trajectory::new(samples)?,
            last_t: 0.0,
        })
    }

    /// Time at which the planned path reaches the ground.
    pub fn duration(&self) -> f64 {
        self.path.end_time()
    }
}

impl Control for LandController {
    fn control(&mut self, t: f64) -> Point {
        self.last_t = t;
        self.path.position(t)
    }

    fn distance(&self, state: &KinematicState) -> f64 {
        tracking_error(
            &self.path.position(self.last_t),
            &self.path.velocity(self.last_t),
            state,
        )
    }
}

/// The controller bound to one vehicle.
#[derive(Debug, Clone)]
pub enum Controller {
    Hold(HoldController),
    Trajectory(TrajectoryController),
    Land(LandController),
}

impl Controller {
    pub fn kind(&self) -> &'static str {
        match self {
            Controller::Hold(_) => "hold",
            Controller::Trajectory(_) => "trajectory",
            Controller::Land(_) => "land",
        }
    }

    /// True for controllers driven by the show clock rather than phase time.
    pub fn follows_show_clock(&self) -> bool {
        matches!(self, Controller::Trajectory(_))
    }
}

impl Control for Controller {
    fn control(&mut self, t: f64) -> Point {
        match self {
            Controller::Hold(c) => c.control(t),
            Controller::Trajectory(c) => c.control(t),
            Controller::Land(c) => c.control(t),
        }
    }

    fn distance(&self, state: &KinematicState) -> f64 {
        match self {
            Controller::Hold(c) => c.distance(state),
            Controller::Trajectory(c) => c.distance(state),
            Controller::Land(c) => c.distance(state),
        }
    }
}
