//! Show clock.

/// Monotonic show time, advanced only while running.
///
/// The clock is stepped explicitly by the orchestrator with the tick period
/// so playback stays deterministic under test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowClock {
    time: f64,
    running: bool,
}

impl ShowClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current show time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts or resumes advancing from the current time.
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Freezes the clock at its current time.
    pub fn freeze(&mut self) {
        self.running = false;
    }

    /// Stops the clock and rewinds it to zero.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.running = false;
    }

    /// Advances by `dt` seconds if running; negative steps are ignored.
    pub fn advance(&mut self, dt: f64) {
        if self.running && dt > 0.0 {
            self.time += dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_clock_does_not_advance() {
        let mut clock = ShowClock::new();
        clock.advance(1.0);
        assert_eq!(clock.time(), 0.0);

        clock.resume();
        clock.advance(0.5);
        clock.freeze();
        clock.advance(10.0);
        assert_eq!(clock.time(), 0.5);
    }

    #[test]
    fn test_reset_rewinds_and_stops() {
        let mut clock = ShowClock::new();
        clock.resume();
        clock.advance(2.0);
        clock.reset();
        assert_eq!(clock.time(), 0.0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_negative_step_ignored() {
        let mut clock = ShowClock::new();
        clock.resume();
        clock.advance(-1.0);
        assert_eq!(clock.time(), 0.0);
    }
}
