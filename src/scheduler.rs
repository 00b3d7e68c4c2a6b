//! Fixed-rate cadence for periodic-task listeners.
//!
//! The host publishes the periodic task as often as its main loop spins.
//! A listener that must run at a configured sample rate wraps its work in
//! a [`Cadence`], which fires once every `1000 / rate_hz` milliseconds
//! and reports the real elapsed time to the control step.
//!
//! ```text
//!  host loop ──▶ Tick{now_ms} ──▶ Cadence::poll ──▶ Some(dt_ms) ──▶ step
//!                                        │
//!                                        └──▶ None (not due yet)
//! ```

use log::info;

/// Sample-rate divider driven by the host's millisecond clock.
#[derive(Debug, Clone)]
pub struct Cadence {
    period_ms: u32,
    last_ms: Option<u32>,
}

impl Cadence {
    /// `rate_hz` of zero is treated as 1 Hz.
    pub fn from_rate(rate_hz: u16) -> Self {
        Self {
            period_ms: period_ms(rate_hz),
            last_ms: None,
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Change the rate; the next poll starts a fresh period.
    pub fn set_rate(&mut self, rate_hz: u16) {
        let period = period_ms(rate_hz);
        if period != self.period_ms {
            info!("Cadence: period {} ms -> {} ms", self.period_ms, period);
            self.period_ms = period;
        }
        self.last_ms = None;
    }

    /// Returns the elapsed milliseconds when a step is due.
    ///
    /// The first poll after construction or [`restart`](Self::restart)
    /// only arms the cadence.  Clock wrap-around is handled.
    pub fn poll(&mut self, now_ms: u32) -> Option<u32> {
        match self.last_ms {
            None => {
                self.last_ms = Some(now_ms);
                None
            }
            Some(last) => {
                let elapsed = now_ms.wrapping_sub(last);
                if elapsed >= self.period_ms {
                    self.last_ms = Some(now_ms);
                    Some(elapsed)
                } else {
                    None
                }
            }
        }
    }

    pub fn restart(&mut self) {
        self.last_ms = None;
    }
}

/// `1000 / rate_hz`, at least 1 ms.
pub fn period_ms(rate_hz: u16) -> u32 {
    (1000 / u32::from(rate_hz.max(1))).max(1)
}
