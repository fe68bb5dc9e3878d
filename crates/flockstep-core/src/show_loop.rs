//! The fixed-rate stepping loop.
//!
//! Runs on a dedicated OS thread. Each tick it steps the orchestrator, emits
//! a status snapshot of the result when one is due, and publishes fresh
//! telemetry for readers on other threads.

use crate::orchestrator::Orchestrator;
use crate::telemetry::FleetTelemetry;
use flockstep_proto::StatusSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

type StatusSink = Box<dyn FnMut(StatusSnapshot) + Send>;

/// Drives an [`Orchestrator`] at a fixed tick period.
pub struct ShowLoop {
    orchestrator: Orchestrator,
    period: Duration,
    /// Emit status every this many ticks; 0 disables status.
    status_every: u32,
    telemetry: watch::Sender<FleetTelemetry>,
    status_sink: Option<StatusSink>,
    ticks: u64,
}

impl ShowLoop {
    /// Creates the loop and the receiver side of its telemetry channel.
    pub fn new(
        orchestrator: Orchestrator,
        period: Duration,
        status_every: u32,
    ) -> (Self, watch::Receiver<FleetTelemetry>) {
        let (telemetry, rx) = watch::channel(orchestrator.telemetry());
        let show_loop = Self {
            orchestrator,
            period,
            status_every,
            telemetry,
            status_sink: None,
            ticks: 0,
        };
        (show_loop, rx)
    }

    /// Sends periodic status snapshots to `sink`.
    #[must_use]
    pub fn with_status_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(StatusSnapshot) + Send + 'static,
    {
        self.status_sink = Some(Box::new(sink));
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Runs one tick.
    pub fn tick(&mut self) {
        self.orchestrator.step(self.period.as_secs_f64());
        let telemetry = self.orchestrator.telemetry();

        if self.status_every > 0 && self.ticks % u64::from(self.status_every) == 0 {
            if let Some(sink) = self.status_sink.as_mut() {
                sink(telemetry.status());
            }
        }

        self.ticks += 1;
        self.telemetry.send_replace(telemetry);
    }

    /// Ticks until `running` is cleared, then hands the orchestrator back.
    ///
    /// Sleeps to absolute deadlines so the rate does not drift. A tick that
    /// overruns its slot resets the schedule rather than bursting to catch up.
    pub fn run(mut self, running: &AtomicBool) -> Orchestrator {
        info!(
            period_ms = self.period.as_millis(),
            status_every = self.status_every,
            "Stepping loop started"
        );

        let mut deadline = Instant::now();
        while running.load(Ordering::Acquire) {
            self.tick();

            deadline += self.period;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else {
                debug!(behind_us = (now - deadline).as_micros(), "Tick overran its slot");
                deadline = now;
            }
        }

        info!(ticks = self.ticks, "Stepping loop stopped");
        self.orchestrator
    }
}

impl std::fmt::Debug for ShowLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShowLoop")
            .field("period", &self.period)
            .field("status_every", &self.status_every)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}
