//! Hover-thrust calibration.
//!
//! With a single vehicle holding steady, the collective thrust it needs to
//! hover is the average of its raw control input. The procedure samples
//! that value from the published telemetry, writes it to the vehicle's
//! calibration file and queues the new hover point for the stepping thread.
//!
//! Sampling blocks the calling thread; never run it on the stepping thread.

use crate::config::CalibrationConfig;
use crate::orchestrator::ShowMode;
use crate::params::ParamStore;
use crate::requests::{ModeRequests, ParamUpdate};
use crate::telemetry::FleetTelemetry;
use flockstep_proto::ParamsError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Result of a completed calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub hover_point: f64,
    pub samples: u32,
    pub path: PathBuf,
}

/// Runs the calibration procedure against live fleet telemetry.
#[derive(Debug, Clone)]
pub struct Calibrator {
    telemetry: watch::Receiver<FleetTelemetry>,
    requests: Arc<ModeRequests>,
    store: ParamStore,
    key: String,
    samples: u32,
    period: Duration,
}

impl Calibrator {
    /// `key` names the calibration file: the vehicle's net id, or `sim`.
    pub fn new(
        telemetry: watch::Receiver<FleetTelemetry>,
        requests: Arc<ModeRequests>,
        store: ParamStore,
        key: impl Into<String>,
        config: &CalibrationConfig,
    ) -> Self {
        let period = Duration::try_from_secs_f64(1.0 / config.rate_hz).unwrap_or_else(|_| {
            warn!(rate_hz = config.rate_hz, "Unusable calibration rate, sampling at 10 Hz");
            DEFAULT_SAMPLE_PERIOD
        });
        Self {
            telemetry,
            requests,
            store,
            key: key.into(),
            samples: config.samples.max(1),
            period,
        }
    }

    /// Samples at the configured rate using real sleeps.
    pub fn run(&self) -> Result<CalibrationOutcome, CalibrationError> {
        self.run_with(std::thread::sleep)
    }

    /// Samples with an injectable sleep between samples.
    pub fn run_with<S>(&self, mut sleep_fn: S) -> Result<CalibrationOutcome, CalibrationError>
    where
        S: FnMut(Duration),
    {
        {
            let snapshot = self.telemetry.borrow();
            if snapshot.members.len() != 1 {
                return Err(CalibrationError::WrongVehicleCount {
                    count: snapshot.members.len(),
                });
            }
            if !snapshot.is_ready() {
                return Err(CalibrationError::NotReady {
                    mode: snapshot.mode,
                });
            }
        }

        info!(key = %self.key, samples = self.samples, "Calibrating");

        let mut sum = 0.0;
        for i in 0..self.samples {
            let (mode, thrust) = {
                let snapshot = self.telemetry.borrow();
                (
                    snapshot.mode,
                    snapshot
                        .members
                        .first()
                        .map(|m| m.telemetry.last_raw_control_input.z),
                )
            };

            if mode != ShowMode::Ready {
                return Err(CalibrationError::Interrupted { mode });
            }
            let Some(thrust) = thrust else {
                return Err(CalibrationError::WrongVehicleCount { count: 0 });
            };

            sum += thrust;
            if i + 1 < self.samples {
                sleep_fn(self.period);
            }
        }

        let hover_point = sum / f64::from(self.samples);
        let path = self.store.save_calibration(&self.key, hover_point)?;
        self.requests.queue_param_update(ParamUpdate {
            member: 0,
            hover_point,
        });

        info!(hover_point, "Calibration done");
        Ok(CalibrationOutcome {
            hover_point,
            samples: self.samples,
            path,
        })
    }
}

/// Reasons calibration was refused or abandoned.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("can only calibrate one vehicle at a time ({count} present)")]
    WrongVehicleCount { count: usize },

    #[error("must be holding to start calibration (fleet is {mode})")]
    NotReady { mode: ShowMode },

    #[error("fleet left ready while sampling (now {mode}), nothing saved")]
    Interrupted { mode: ShowMode },

    #[error("failed to save calibration: {0}")]
    Params(#[from] ParamsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemberTelemetry;
    use flockstep_proto::{Point, VehicleTelemetry};
    use tempfile::TempDir;

    fn member(thrust: f64) -> MemberTelemetry {
        MemberTelemetry {
            net_id: 3,
            role: Some(0),
            telemetry: VehicleTelemetry {
                last_raw_control_input: Point::new(0.0, 0.0, thrust),
                ..VehicleTelemetry::default()
            },
        }
    }

    fn fleet(mode: ShowMode, members: Vec<MemberTelemetry>) -> FleetTelemetry {
        FleetTelemetry {
            mode,
            time: 0.0,
            members,
        }
    }

    fn calibrator(
        rx: watch::Receiver<FleetTelemetry>,
        dir: &TempDir,
    ) -> (Calibrator, Arc<ModeRequests>) {
        let requests = Arc::new(ModeRequests::new());
        let config = CalibrationConfig {
            samples: 4,
            rate_hz: 10.0,
        };
        let cal = Calibrator::new(
            rx,
            Arc::clone(&requests),
            ParamStore::new(dir.path()),
            "3",
            &config,
        );
        (cal, requests)
    }

    #[test]
    fn test_refuses_more_than_one_vehicle() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = watch::channel(fleet(ShowMode::Ready, vec![member(0.5), member(0.5)]));
        let (cal, requests) = calibrator(rx, &dir);

        let err = cal.run_with(|_| {}).unwrap_err();
        assert!(matches!(err, CalibrationError::WrongVehicleCount { count: 2 }));
        assert!(requests.take_param_updates().is_empty());
        assert!(!ParamStore::new(dir.path()).calibration_path("3").exists());
    }

    #[test]
    fn test_refuses_when_not_ready() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = watch::channel(fleet(ShowMode::Preparing, vec![member(0.5)]));
        let (cal, _requests) = calibrator(rx, &dir);

        let err = cal.run_with(|_| {}).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::NotReady {
                mode: ShowMode::Preparing
            }
        ));
    }

    #[test]
    fn test_averages_samples_and_queues_update() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(fleet(ShowMode::Ready, vec![member(0.40)]));
        let (cal, requests) = calibrator(rx, &dir);

        let thrusts = [0.50, 0.60, 0.70];
        let mut next = 0;
        let mut sleeps = Vec::new();
        let outcome = cal
            .run_with(|d| {
                sleeps.push(d);
                tx.send_replace(fleet(ShowMode::Ready, vec![member(thrusts[next])]));
                next += 1;
            })
            .unwrap();

        assert_eq!(sleeps.len(), 3);
        assert_eq!(sleeps[0], Duration::from_millis(100));
        assert!((outcome.hover_point - 0.55).abs() < 1e-12);
        assert!(outcome.path.ends_with("3.calib.json"));
        assert!(outcome.path.exists());

        let updates = requests.take_param_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].member, 0);
        assert!((updates[0].hover_point - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_leaving_ready_aborts_without_saving() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(fleet(ShowMode::Ready, vec![member(0.5)]));
        let (cal, requests) = calibrator(rx, &dir);

        let err = cal
            .run_with(|_| {
                tx.send_replace(fleet(ShowMode::Stopping, vec![member(0.5)]));
            })
            .unwrap_err();

        assert!(matches!(
            err,
            CalibrationError::Interrupted {
                mode: ShowMode::Stopping
            }
        ));
        assert!(requests.take_param_updates().is_empty());
        assert!(!ParamStore::new(dir.path()).calibration_path("3").exists());
    }

    #[test]
    fn test_unusable_rate_falls_back_to_default_period() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(fleet(ShowMode::Ready, vec![member(0.5)]));
        let config = CalibrationConfig {
            samples: 2,
            rate_hz: f64::NAN,
        };
        let cal = Calibrator::new(
            rx,
            Arc::new(ModeRequests::new()),
            ParamStore::new(dir.path()),
            "3",
            &config,
        );

        let mut sleeps = Vec::new();
        cal.run_with(|d| {
            sleeps.push(d);
            tx.send_replace(fleet(ShowMode::Ready, vec![member(0.5)]));
        })
        .unwrap();
        assert_eq!(sleeps, vec![DEFAULT_SAMPLE_PERIOD]);
    }
}
