use core::time::Duration;

use crate::config::GainSet;

/// How a closed-loop motion ended. Neither case is an error: a motion that times
/// out simply leaves the robot wherever it got to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionOutcome {
    Settled,
    TimedOut,
}

/// PID controller with settle and timeout tracking, built fresh for every motion.
#[derive(Copy, Clone, Debug)]
pub struct Pid {
    pub gains: GainSet,
    pub max_output: f64,
    prev_error: Option<f64>,
    integral: f64,
    in_band: bool,
    settled_for: Duration,
    elapsed: Duration,
}

impl Pid {
    pub fn new(gains: GainSet, max_output: f64) -> Self {
        Self {
            gains,
            max_output,
            prev_error: None,
            integral: 0.0,
            in_band: false,
            settled_for: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Feeds one error sample taken `dt` after the previous one and returns the
    /// clamped output. Also advances the settle and timeout counters.
    pub fn next(&mut self, error: f64, dt: Duration) -> f64 {
        let dt_secs = dt.as_secs_f64();
        let in_band = error.abs() < self.gains.settle_error;

        // zero crossing: whatever was integrated now pushes the wrong way
        if let Some(prev) = self.prev_error
            && prev.signum() != error.signum()
        {
            self.integral = 0.0;
        }
        if !in_band {
            self.integral += error * dt_secs;
            if self.gains.integral_limit > 0.0 {
                self.integral = self
                    .integral
                    .clamp(-self.gains.integral_limit, self.gains.integral_limit);
            }
        }

        let derivative = match self.prev_error {
            Some(prev) if dt_secs > 0.0 => (error - prev) / dt_secs,
            _ => 0.0,
        };
        self.prev_error = Some(error);

        self.elapsed += dt;
        self.in_band = in_band;
        if in_band {
            self.settled_for += dt;
        } else {
            self.settled_for = Duration::ZERO;
        }

        let integral_term = if in_band { 0.0 } else { self.gains.ki * self.integral };
        let output = self.gains.kp * error + integral_term + self.gains.kd * derivative;
        output.clamp(-self.max_output, self.max_output)
    }

    /// True once the error has stayed inside the band for the settle time. With
    /// a zero settle time one in-band sample is enough.
    pub fn is_settled(&self) -> bool {
        self.in_band && self.settled_for >= self.gains.settle_time
    }

    pub fn is_timed_out(&self) -> bool {
        self.elapsed >= self.gains.timeout
    }

    /// `None` while the motion should keep running. A timeout wins over a
    /// simultaneous settle.
    pub fn outcome(&self) -> Option<MotionOutcome> {
        if self.is_timed_out() {
            Some(MotionOutcome::TimedOut)
        } else if self.is_settled() {
            Some(MotionOutcome::Settled)
        } else {
            None
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.prev_error = None;
        self.integral = 0.0;
        self.in_band = false;
        self.settled_for = Duration::ZERO;
        self.elapsed = Duration::ZERO;
    }
}
