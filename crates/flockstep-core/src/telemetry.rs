//! Fleet telemetry snapshots and status assembly.

use crate::orchestrator::ShowMode;
use flockstep_proto::{
    BatteryStatus, GlobalStatus, STATUS_SCHEMA_VERSION, StatusSnapshot, VehicleStatus,
    VehicleTelemetry,
};

/// Telemetry of one roster member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberTelemetry {
    pub net_id: u32,
    pub role: Option<usize>,
    pub telemetry: VehicleTelemetry,
}

/// Whole-fleet snapshot published by the stepping thread after every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetTelemetry {
    pub mode: ShowMode,
    /// Show clock in seconds.
    pub time: f64,
    pub members: Vec<MemberTelemetry>,
}

impl Default for FleetTelemetry {
    fn default() -> Self {
        Self {
            mode: ShowMode::Idle,
            time: 0.0,
            members: Vec::new(),
        }
    }
}

impl FleetTelemetry {
    pub fn is_ready(&self) -> bool {
        self.mode == ShowMode::Ready
    }

    /// Builds the wire status record.
    pub fn status(&self) -> StatusSnapshot {
        let vehicles = self
            .members
            .iter()
            .map(|m| {
                let p = m.telemetry.state.position;
                VehicleStatus {
                    id: m.net_id,
                    role: m.role,
                    connected: m.telemetry.connected,
                    armed: m.telemetry.armed,
                    tracking: m.telemetry.tracking,
                    position: [p.x, p.y, p.z],
                    battery: BatteryStatus {
                        voltage: m.telemetry.battery.voltage,
                        percent: m.telemetry.battery.percent,
                    },
                }
            })
            .collect();

        StatusSnapshot {
            version: STATUS_SCHEMA_VERSION,
            time: self.time,
            vehicles,
            global: GlobalStatus {
                playing: self.mode == ShowMode::Playing,
                ready: self.is_ready(),
                mode: self.mode.as_str().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flockstep_proto::{Battery, KinematicState, Point};

    #[test]
    fn test_status_reports_every_member() {
        let telemetry = FleetTelemetry {
            mode: ShowMode::Paused,
            time: 5.0,
            members: vec![
                MemberTelemetry {
                    net_id: 4,
                    role: Some(1),
                    telemetry: VehicleTelemetry {
                        connected: true,
                        armed: true,
                        tracking: true,
                        state: KinematicState {
                            position: Point::new(1.0, 2.0, 3.0),
                            velocity: Point::zeros(),
                        },
                        battery: Battery {
                            voltage: 11.8,
                            percent: 64.0,
                        },
                        last_raw_control_input: Point::zeros(),
                    },
                },
                MemberTelemetry {
                    net_id: 5,
                    role: None,
                    telemetry: VehicleTelemetry::default(),
                },
            ],
        };

        let status = telemetry.status();
        assert_eq!(status.version, STATUS_SCHEMA_VERSION);
        assert_eq!(status.time, 5.0);
        assert_eq!(status.vehicles.len(), 2);
        assert_eq!(status.vehicles[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(status.vehicles[0].role, Some(1));
        assert_eq!(status.vehicles[1].role, None);
        assert!(!status.global.playing);
        assert!(!status.global.ready);
        assert_eq!(status.global.mode, "paused");
    }
}
