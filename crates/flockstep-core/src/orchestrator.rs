//! Fleet playback orchestration.
//!
//! The orchestrator owns the show state machine, the roster and the show
//! clock. It is driven by one call to [`Orchestrator::step`] per tick from
//! a single thread; everything other threads want from it goes through the
//! shared [`ModeRequests`].

use crate::choreography::Choreography;
use crate::clock::ShowClock;
use crate::config::ShowConfig;
use crate::controller::{Control, Controller, HoldController, LandController, TrajectoryController};
use crate::requests::{ModeRequest, ModeRequests};
use crate::roster::{FleetRoster, RosterError};
use crate::telemetry::{FleetTelemetry, MemberTelemetry};
use flockstep_proto::{Point, VehicleTelemetry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fleet-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShowMode {
    Idle,
    /// Flying to home points and waiting for the fleet to settle.
    Preparing,
    /// Holding at home points, steady.
    Ready,
    Playing,
    Paused,
    /// Landing and waiting for touchdown.
    Stopping,
    /// Kill interlock engaged.
    Killed,
}

impl ShowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ShowMode::Idle => "idle",
            ShowMode::Preparing => "preparing",
            ShowMode::Ready => "ready",
            ShowMode::Playing => "playing",
            ShowMode::Paused => "paused",
            ShowMode::Stopping => "stopping",
            ShowMode::Killed => "killed",
        }
    }
}

impl std::fmt::Display for ShowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the fleet comes down when Stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// Fly back over each home point, then descend.
    ReturnHome,
    /// Descend where each vehicle is.
    LandInPlace,
}

/// Thresholds and rates used by the state machine.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub readiness_threshold: f64,
    pub readiness_ticks: u32,
    /// Seconds to wait for touchdown before giving up and going Idle.
    pub stopping_timeout: f64,
    pub descent_rate: f64,
    pub approach_speed: f64,
    pub landed_height: f64,
    /// Speed under which a low vehicle counts as landed.
    pub landed_speed: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            readiness_threshold: 0.15,
            readiness_ticks: 50,
            stopping_timeout: 20.0,
            descent_rate: 0.5,
            approach_speed: 1.0,
            landed_height: 0.1,
            landed_speed: 0.2,
        }
    }
}

impl From<&ShowConfig> for OrchestratorSettings {
    fn from(config: &ShowConfig) -> Self {
        Self {
            readiness_threshold: config.readiness.threshold,
            readiness_ticks: config.readiness.ticks,
            stopping_timeout: config.stopping.timeout_secs,
            descent_rate: config.stopping.descent_rate,
            approach_speed: config.stopping.approach_speed,
            landed_height: config.stopping.landed_height,
            ..Self::default()
        }
    }
}

/// The fleet playback orchestrator.
#[derive(Debug)]
pub struct Orchestrator {
    roster: FleetRoster,
    show: Choreography,
    requests: Arc<ModeRequests>,
    settings: OrchestratorSettings,
    mode: ShowMode,
    clock: ShowClock,
    /// Seconds since entering Stopping; drives the landing controllers.
    phase_time: f64,
    /// Consecutive ticks the whole fleet has been within the readiness threshold.
    steady_ticks: u32,
    stop_kind: Option<StopKind>,
    ticks: u64,
}

impl Orchestrator {
    /// Creates an idle orchestrator.
    ///
    /// Fails if a roster role is not defined by the choreography.
    pub fn new(
        roster: FleetRoster,
        show: Choreography,
        requests: Arc<ModeRequests>,
        settings: OrchestratorSettings,
    ) -> Result<Self, RosterError> {
        if let Some(role) = roster.max_role() {
            if role >= show.role_count() {
                return Err(RosterError::UnknownRole {
                    role,
                    role_count: show.role_count(),
                });
            }
        }

        debug!(
            vehicles = roster.len(),
            show = show.name(),
            duration = show.duration(),
            "Orchestrator initialized"
        );

        Ok(Self {
            roster,
            show,
            requests,
            settings,
            mode: ShowMode::Idle,
            clock: ShowClock::new(),
            phase_time: 0.0,
            steady_ticks: 0,
            stop_kind: None,
            ticks: 0,
        })
    }

    pub fn mode(&self) -> ShowMode {
        self.mode
    }

    /// Current show clock in seconds.
    pub fn show_time(&self) -> f64 {
        self.clock.time()
    }

    pub fn stop_kind(&self) -> Option<StopKind> {
        self.stop_kind
    }

    pub fn roster(&self) -> &FleetRoster {
        &self.roster
    }

    pub fn show(&self) -> &Choreography {
        &self.show
    }

    pub fn requests(&self) -> &Arc<ModeRequests> {
        &self.requests
    }

    /// Number of ticks stepped so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advances the fleet by one tick of `dt` seconds.
    ///
    /// Never fails: vehicle faults surface only through telemetry.
    pub fn step(&mut self, dt: f64) {
        self.ticks += 1;

        if self.requests.is_killed() {
            self.hold_kill();
            return;
        }

        if self.mode == ShowMode::Killed {
            info!("Kill interlock cleared, fleet idle");
            self.enter_idle();
        }

        self.apply_param_updates();
        self.apply_staged_show();

        let previous = self.mode;
        if let Some(request) = self.requests.take() {
            self.apply(request);
        }

        // Clocks only run in a mode that was already active at tick start, so
        // the entry tick of Playing emits the setpoint for the entry time.
        if self.mode == previous {
            match self.mode {
                ShowMode::Playing => {
                    self.clock.advance(dt);
                    if self.clock.time() >= self.show.duration() {
                        info!(time = self.clock.time(), "Show finished, landing");
                        self.enter_stopping(StopKind::LandInPlace);
                    }
                }
                ShowMode::Stopping => self.phase_time += dt,
                _ => {}
            }
        }

        self.push_setpoints();

        match self.mode {
            ShowMode::Preparing => self.check_readiness(),
            ShowMode::Stopping => self.check_landed(),
            _ => {}
        }
    }

    /// Snapshot of mode, clock and every vehicle's telemetry.
    pub fn telemetry(&self) -> FleetTelemetry {
        FleetTelemetry {
            mode: self.mode,
            time: self.clock.time(),
            members: self
                .roster
                .iter()
                .map(|m| MemberTelemetry {
                    net_id: m.net_id(),
                    role: m.role(),
                    telemetry: m.telemetry(),
                })
                .collect(),
        }
    }

    /// Disconnects every vehicle.
    pub fn shutdown(&mut self) {
        info!(vehicles = self.roster.len(), "Disconnecting fleet");
        self.roster.disconnect_all();
    }

    fn hold_kill(&mut self) {
        if self.mode != ShowMode::Killed {
            warn!(previous = %self.mode, "Kill interlock engaged, terminating every vehicle");
            for member in self.roster.iter_mut() {
                member.controller = None;
            }
            self.clock.freeze();
            self.mode = ShowMode::Killed;
        }

        if let Some(request) = self.requests.take() {
            warn!(request = %request, "Request discarded while killed");
        }

        for member in self.roster.iter_mut() {
            member.vehicle_mut().terminate();
        }
    }

    fn apply_param_updates(&mut self) {
        for update in self.requests.take_param_updates() {
            match self.roster.member_mut(update.member) {
                Some(member) => {
                    member.vehicle_mut().params_mut().hover_point = update.hover_point;
                    info!(
                        vehicle = member.net_id(),
                        hover_point = update.hover_point,
                        "Hover point updated"
                    );
                }
                None => warn!(member = update.member, "Parameter update for unknown vehicle"),
            }
        }
    }

    fn apply_staged_show(&mut self) {
        if self.mode != ShowMode::Idle {
            return;
        }
        let Some(show) = self.requests.take_staged_show() else {
            return;
        };

        match self.roster.max_role() {
            Some(role) if role >= show.role_count() => {
                warn!(
                    show = show.name(),
                    roles = show.role_count(),
                    required = role + 1,
                    "Staged show has too few roles for this roster, not loaded"
                );
            }
            _ => {
                info!(show = show.name(), duration = show.duration(), "Show loaded");
                self.show = show;
            }
        }
    }

    fn apply(&mut self, request: ModeRequest) {
        use ModeRequest as R;
        use ShowMode as M;

        match (self.mode, request) {
            (M::Idle, R::Prepare) => self.enter_preparing(),
            (M::Ready | M::Paused, R::Play) => self.enter_playing(),
            (M::Playing, R::Pause) => self.enter_paused(),
            (M::Preparing | M::Ready | M::Playing | M::Paused, R::Stop) => {
                self.enter_stopping(StopKind::ReturnHome);
            }
            (M::Preparing | M::Ready | M::Playing | M::Paused, R::Land) => {
                self.enter_stopping(StopKind::LandInPlace);
            }
            (M::Preparing | M::Ready, R::Prepare)
            | (M::Playing, R::Play)
            | (M::Paused, R::Pause)
            | (M::Idle | M::Stopping, R::Stop | R::Land) => {
                debug!(mode = %self.mode, request = %request, "Request already satisfied");
            }
            (mode, request) => {
                warn!(mode = %mode, request = %request, "Request not valid in current mode, ignored");
            }
        }
    }

    fn enter_idle(&mut self) {
        for member in self.roster.iter_mut() {
            member.controller = None;
        }
        self.clock.reset();
        self.phase_time = 0.0;
        self.steady_ticks = 0;
        self.stop_kind = None;
        self.mode = ShowMode::Idle;
    }

    fn enter_preparing(&mut self) {
        for member in self.roster.iter_mut() {
            let Some(role) = member.role() else {
                continue;
            };
            if let Some(role) = self.show.role(role) {
                member.controller = Some(Controller::Hold(HoldController::new(role.home)));
            }
        }
        self.clock.reset();
        self.steady_ticks = 0;
        self.mode = ShowMode::Preparing;
        info!(show = self.show.name(), "Preparing, holding fleet at home points");
    }

    fn enter_playing(&mut self) {
        for member in self.roster.iter_mut() {
            let Some(role) = member.role() else {
                continue;
            };
            if let Some(role) = self.show.role(role) {
                member.controller = Some(Controller::Trajectory(TrajectoryController::new(
                    Arc::clone(&role.trajectory),
                )));
            }
        }
        self.clock.resume();
        self.mode = ShowMode::Playing;
        info!(time = self.clock.time(), "Playing");
    }

    fn enter_paused(&mut self) {
        self.clock.freeze();
        for member in self.roster.iter_mut() {
            if member.controller.is_none() {
                continue;
            }
            let point = member
                .last_setpoint
                .unwrap_or_else(|| member.telemetry().state.position);
            member.controller = Some(Controller::Hold(HoldController::new(point)));
        }
        self.mode = ShowMode::Paused;
        info!(time = self.clock.time(), "Paused");
    }

    fn enter_stopping(&mut self, kind: StopKind) {
        let settings = &self.settings;
        for member in self.roster.iter_mut() {
            let Some(role) = member.role() else {
                continue;
            };
            let telemetry = member.telemetry();
            let from = if telemetry.tracking {
                telemetry.state.position
            } else {
                member.last_setpoint.unwrap_or(telemetry.state.position)
            };
            let over = match (kind, self.show.role(role)) {
                (StopKind::ReturnHome, Some(role)) => role.home,
                _ => from,
            };

            let controller = match LandController::new(
                from,
                over,
                settings.approach_speed,
                settings.descent_rate,
            ) {
                Ok(land) => Controller::Land(land),
                Err(e) => {
                    warn!(vehicle = member.net_id(), error = %e, "Cannot plan landing, holding at ground level");
                    Controller::Hold(HoldController::new(Point::new(from.x, from.y, 0.0)))
                }
            };
            member.controller = Some(controller);
        }

        self.clock.reset();
        self.phase_time = 0.0;
        self.stop_kind = Some(kind);
        self.mode = ShowMode::Stopping;
        info!(kind = ?kind, "Stopping, landing fleet");
    }

    fn push_setpoints(&mut self) {
        let show_time = self.clock.time();
        let phase_time = self.phase_time;

        for member in self.roster.iter_mut() {
            let Some(controller) = member.controller.as_mut() else {
                continue;
            };
            let t = if controller.follows_show_clock() {
                show_time
            } else {
                phase_time
            };
            let setpoint = controller.control(t);
            member.vehicle_mut().setpoint_pos(setpoint);
            member.last_setpoint = Some(setpoint);
        }
    }

    fn check_readiness(&mut self) {
        let threshold = self.settings.readiness_threshold;
        let steady = self.roster.iter().all(|m| match &m.controller {
            Some(controller) => controller.distance(&m.telemetry().state) < threshold,
            None => true,
        });

        if steady {
            self.steady_ticks = self.steady_ticks.saturating_add(1);
        } else {
            self.steady_ticks = 0;
        }

        if self.steady_ticks >= self.settings.readiness_ticks {
            self.mode = ShowMode::Ready;
            info!(ticks = self.steady_ticks, "Fleet holding steady, ready to play");
        }
    }

    fn check_landed(&mut self) {
        let height = self.settings.landed_height;
        let speed = self.settings.landed_speed;
        let all_down = self
            .roster
            .iter()
            .filter(|m| m.role().is_some())
            .all(|m| is_landed(&m.telemetry(), height, speed));

        if all_down {
            info!("Fleet landed");
            self.enter_idle();
        } else if self.phase_time >= self.settings.stopping_timeout {
            warn!(
                timeout = self.settings.stopping_timeout,
                "Timed out waiting for touchdown, going idle"
            );
            self.enter_idle();
        }
    }
}

fn is_landed(telemetry: &VehicleTelemetry, height: f64, speed: f64) -> bool {
    !telemetry.armed
        || (telemetry.state.position.z <= height && telemetry.state.velocity.norm() <= speed)
}
