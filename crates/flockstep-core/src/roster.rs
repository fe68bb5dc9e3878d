//! Fleet roster: the fixed, ordered set of vehicles in a session and the
//! choreography role each one flies.

use crate::controller::Controller;
use flockstep_proto::{Point, Vehicle, VehicleParams, VehicleTelemetry};

/// One vehicle in the roster together with its bound controller.
pub struct FleetMember {
    net_id: u32,
    role: Option<usize>,
    vehicle: Box<dyn Vehicle>,
    pub(crate) controller: Option<Controller>,
    pub(crate) last_setpoint: Option<Point>,
}

impl FleetMember {
    pub fn net_id(&self) -> u32 {
        self.net_id
    }

    /// Choreography role, `None` for vehicles beyond the active role list.
    pub fn role(&self) -> Option<usize> {
        self.role
    }

    pub fn telemetry(&self) -> VehicleTelemetry {
        self.vehicle.telemetry()
    }

    pub fn params(&self) -> &VehicleParams {
        self.vehicle.params()
    }

    /// Kind of the bound controller, if any.
    pub fn controller_kind(&self) -> Option<&'static str> {
        self.controller.as_ref().map(Controller::kind)
    }

    /// The most recent setpoint pushed to this vehicle.
    pub fn last_setpoint(&self) -> Option<Point> {
        self.last_setpoint
    }

    pub(crate) fn vehicle_mut(&mut self) -> &mut dyn Vehicle {
        self.vehicle.as_mut()
    }
}

impl std::fmt::Debug for FleetMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetMember")
            .field("net_id", &self.net_id)
            .field("role", &self.role)
            .field("controller", &self.controller_kind())
            .finish_non_exhaustive()
    }
}

/// Ordered vehicles of a session. Size and role assignment are fixed.
#[derive(Debug)]
pub struct FleetRoster {
    members: Vec<FleetMember>,
}

impl FleetRoster {
    /// Assigns `active_ids[i]` to the `i`-th vehicle.
    ///
    /// Vehicles beyond the active list stay unassigned. Fails if there are
    /// fewer vehicles than active roles or an active role is not in the
    /// choreography.
    pub fn new(
        vehicles: Vec<(u32, Box<dyn Vehicle>)>,
        active_ids: &[usize],
        role_count: usize,
    ) -> Result<Self, RosterError> {
        if vehicles.len() < active_ids.len() {
            return Err(RosterError::InsufficientVehicles {
                required: active_ids.len(),
                available: vehicles.len(),
            });
        }

        if let Some(&role) = active_ids.iter().find(|&&id| id >= role_count) {
            return Err(RosterError::UnknownRole { role, role_count });
        }

        let members = vehicles
            .into_iter()
            .enumerate()
            .map(|(i, (net_id, vehicle))| FleetMember {
                net_id,
                role: active_ids.get(i).copied(),
                vehicle,
                controller: None,
                last_setpoint: None,
            })
            .collect();

        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, index: usize) -> Option<&FleetMember> {
        self.members.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FleetMember> {
        self.members.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut FleetMember> {
        self.members.iter_mut()
    }

    pub(crate) fn member_mut(&mut self, index: usize) -> Option<&mut FleetMember> {
        self.members.get_mut(index)
    }

    /// Highest role index in use, if any vehicle is assigned.
    pub fn max_role(&self) -> Option<usize> {
        self.members.iter().filter_map(|m| m.role).max()
    }

    /// Disconnects every vehicle.
    pub fn disconnect_all(&mut self) {
        for member in &mut self.members {
            member.vehicle.disconnect();
        }
    }
}

/// Errors building a roster.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("not enough vehicles on the network: {required} required, {available} available")]
    InsufficientVehicles { required: usize, available: usize },

    #[error("active role {role} does not exist (choreography has {role_count} roles)")]
    UnknownRole { role: usize, role_count: usize },
}
