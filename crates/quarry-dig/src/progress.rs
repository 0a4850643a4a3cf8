//! Tick-driven excavation progress.
//!
//! The completion-time estimate is re-evaluated every tick (submersion, tool
//! swaps, and status effects change the rate mid-dig), so progress is
//! accumulated as a fraction of the current estimate rather than against a
//! fixed deadline. A wall-clock stall bound forces a restart when the server
//! never confirms completion.

use std::time::{Duration, Instant};

use quarry_core::DigDuration;

/// Fixed logical tick length (20 Hz). Progress treats a tick as atomic,
/// independent of wall-clock jitter.
pub const TICK_DURATION: Duration = Duration::from_millis(50);

/// Grace period added to the stall deadline on top of twice the estimate.
pub const STALL_GRACE: Duration = Duration::from_millis(150);

/// What the controller must do after one progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    /// The attempt is unrecoverable as-is (infeasible estimate or stall):
    /// cancel and begin again.
    Restart,
    /// Progress accumulated normally.
    Advancing,
    /// Accumulated progress reached 1: send (or resend) the finish packet.
    Finish,
}

/// Progress state of the current attempt within a session.
#[derive(Debug, Clone)]
pub struct AttemptProgress {
    /// When the current attempt began (restamped on restart).
    started_at: Instant,
    /// Accumulated fractional completion, `[0, ∞)`.
    accumulated: f64,
    /// True once a finish packet has been requested at least once.
    finishing: bool,
    /// Number of forced restarts. Diagnostic only.
    restarts: u32,
}

impl AttemptProgress {
    /// Starts tracking a fresh attempt at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            accumulated: 0.0,
            finishing: false,
            restarts: 0,
        }
    }

    /// Advances by one tick under the current completion-time estimate.
    pub fn advance(&mut self, now: Instant, estimate: DigDuration) -> ProgressStep {
        let DigDuration::Finite(estimate) = estimate else {
            // Cannot dig under current conditions; recover by restarting
            // rather than failing the session.
            return ProgressStep::Restart;
        };

        self.accumulated += TICK_DURATION.as_secs_f64() / estimate.as_secs_f64();

        // Once finishing, the world's confirmation is the only thing left to
        // wait for; the stall bound no longer applies.
        let deadline = estimate * 2 + STALL_GRACE;
        if !self.finishing && now.duration_since(self.started_at) > deadline {
            return ProgressStep::Restart;
        }

        if self.accumulated >= 1.0 {
            self.finishing = true;
            return ProgressStep::Finish;
        }
        ProgressStep::Advancing
    }

    /// Resets the attempt after a forced restart: progress and the attempt
    /// clock start over, the restart counter advances.
    pub fn reset(&mut self, now: Instant) {
        self.started_at = now;
        self.accumulated = 0.0;
        self.finishing = false;
        self.restarts += 1;
    }

    /// Accumulated fractional completion.
    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    /// Whether a finish packet has been requested for this attempt.
    pub fn finishing(&self) -> bool {
        self.finishing
    }

    /// Forced restarts so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}
