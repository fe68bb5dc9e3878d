//! Mode-change requests shared between producer threads and the stepping
//! thread.
//!
//! Producers (console, remote messaging, OSC) only ever set flags or stage
//! data here. The stepping thread is the single consumer: once per tick it
//! swaps every edge flag back to `false` and acts on at most one request.
//! The kill flag is level-triggered and is never cleared by the consumer.

use crate::choreography::Choreography;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// A fleet mode-change request.
///
/// Variants are ordered by precedence: when several are pending in the same
/// tick the greatest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModeRequest {
    Prepare,
    Play,
    Pause,
    Land,
    Stop,
}

impl ModeRequest {
    /// All requests from highest to lowest precedence.
    pub const BY_PRECEDENCE: [ModeRequest; 5] = [
        ModeRequest::Stop,
        ModeRequest::Land,
        ModeRequest::Pause,
        ModeRequest::Play,
        ModeRequest::Prepare,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModeRequest::Prepare => "prepare",
            ModeRequest::Play => "play",
            ModeRequest::Pause => "pause",
            ModeRequest::Land => "land",
            ModeRequest::Stop => "stop",
        }
    }
}

impl std::fmt::Display for ModeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hover-point change to apply to one roster member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamUpdate {
    /// Roster index of the vehicle.
    pub member: usize,
    pub hover_point: f64,
}

/// Edge-triggered request flags plus the kill interlock.
#[derive(Debug, Default)]
pub struct ModeRequests {
    prepare: AtomicBool,
    play: AtomicBool,
    pause: AtomicBool,
    land: AtomicBool,
    stop: AtomicBool,
    kill: AtomicBool,
    staged_show: Mutex<Option<Choreography>>,
    param_updates: Mutex<Vec<ParamUpdate>>,
}

impl ModeRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, request: ModeRequest) -> &AtomicBool {
        match request {
            ModeRequest::Prepare => &self.prepare,
            ModeRequest::Play => &self.play,
            ModeRequest::Pause => &self.pause,
            ModeRequest::Land => &self.land,
            ModeRequest::Stop => &self.stop,
        }
    }

    /// Raises a request flag. Raising an already-raised flag is a no-op.
    pub fn request(&self, request: ModeRequest) {
        self.flag(request).store(true, Ordering::Release);
    }

    /// Returns true if `request` is raised and not yet consumed.
    pub fn is_pending(&self, request: ModeRequest) -> bool {
        self.flag(request).load(Ordering::Acquire)
    }

    /// Consumes every raised flag and returns the highest-precedence one.
    ///
    /// Lower-precedence requests raised in the same tick are discarded.
    pub fn take(&self) -> Option<ModeRequest> {
        let mut winner = None;
        for request in ModeRequest::BY_PRECEDENCE {
            if self.flag(request).swap(false, Ordering::AcqRel) && winner.is_none() {
                winner = Some(request);
            }
        }
        winner
    }

    /// Sets or clears the kill interlock.
    pub fn set_kill(&self, enabled: bool) {
        self.kill.store(enabled, Ordering::SeqCst);
    }

    pub fn is_killed(&self) -> bool {
        self.kill.load(Ordering::SeqCst)
    }

    /// Stages a show to replace the current one the next time the fleet is
    /// Idle. A later stage replaces an earlier one.
    pub fn stage_show(&self, show: Choreography) {
        *self
            .staged_show
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(show);
    }

    pub fn take_staged_show(&self) -> Option<Choreography> {
        self.staged_show
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn queue_param_update(&self, update: ParamUpdate) {
        self.param_updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }

    pub fn take_param_updates(&self) -> Vec<ParamUpdate> {
        std::mem::take(
            &mut *self
                .param_updates
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_returns_none_when_idle() {
        let requests = ModeRequests::new();
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_take_consumes_once() {
        let requests = ModeRequests::new();
        requests.request(ModeRequest::Play);
        requests.request(ModeRequest::Play);
        assert_eq!(requests.take(), Some(ModeRequest::Play));
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_stop_beats_play_and_play_is_discarded() {
        let requests = ModeRequests::new();
        requests.request(ModeRequest::Play);
        requests.request(ModeRequest::Stop);
        assert_eq!(requests.take(), Some(ModeRequest::Stop));
        assert!(!requests.is_pending(ModeRequest::Play));
        assert_eq!(requests.take(), None);
    }

    #[test]
    fn test_full_precedence_order() {
        let requests = ModeRequests::new();
        requests.request(ModeRequest::Prepare);
        requests.request(ModeRequest::Play);
        assert_eq!(requests.take(), Some(ModeRequest::Play));

        requests.request(ModeRequest::Play);
        requests.request(ModeRequest::Pause);
        assert_eq!(requests.take(), Some(ModeRequest::Pause));

        requests.request(ModeRequest::Pause);
        requests.request(ModeRequest::Land);
        assert_eq!(requests.take(), Some(ModeRequest::Land));
    }

    #[test]
    fn test_kill_is_level_triggered() {
        let requests = ModeRequests::new();
        requests.set_kill(true);
        assert!(requests.is_killed());
        let _ = requests.take();
        assert!(requests.is_killed());
        requests.set_kill(false);
        assert!(!requests.is_killed());
    }

    #[test]
    fn test_param_updates_drain() {
        let requests = ModeRequests::new();
        requests.queue_param_update(ParamUpdate {
            member: 0,
            hover_point: 0.55,
        });
        assert_eq!(requests.take_param_updates().len(), 1);
        assert!(requests.take_param_updates().is_empty());
    }
}
