//! Timers of the policy engine.
//!
//! All timers are countdowns in units of the policy tick. [`Timers::tick`] is the only place where
//! wall-clock time enters the state machines.
use core::future::Future;

/// The period of the policy tick in microseconds.
pub const TICK_PERIOD_US: u32 = 100;

/// Number of policy ticks per millisecond.
pub const TICK_SCALE_TO_MS: u32 = 1000 / TICK_PERIOD_US;

/// Value of the no-response timer while it is disabled.
pub const NO_RESPONSE_DISABLED: u32 = u32::MAX;

/// A timer that async runners use for pacing the policy tick.
pub trait Timer {
    /// Expire after the specified number of microseconds.
    fn after_micros(microseconds: u64) -> impl Future<Output = ()>;
}

/// Types of timers that are used by the policy engine.
///
/// See [6.6], [Table 6.68]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum TimerType {
    BISTContMode,
    HardResetComplete,
    NoResponse,
    PRSwapBailout,
    PSHardReset,
    PSSourceOff,
    PSSourceOn,
    PSTransition,
    Safe0V,
    SenderResponse,
    SinkWaitCap,
    SrcRecover,
    SrcTransition,
    SrcTurnOn,
    SwapSourceStart,
    TypeCSendSourceCap,
    VCONNOn,
    VCONNSourceOn,
}

impl TimerType {
    /// The timer duration in milliseconds.
    pub const fn millis(self) -> u32 {
        match self {
            TimerType::BISTContMode => 45,
            TimerType::HardResetComplete => 5,
            TimerType::NoResponse => 5000,
            TimerType::PRSwapBailout => 5000,
            TimerType::PSHardReset => 30,
            TimerType::PSSourceOff => 835,
            TimerType::PSSourceOn => 435,
            TimerType::PSTransition => 500,
            TimerType::Safe0V => 650,
            TimerType::SenderResponse => 30,
            TimerType::SinkWaitCap => 465,
            TimerType::SrcRecover => 800,
            TimerType::SrcTransition => 30,
            TimerType::SrcTurnOn => 275,
            TimerType::SwapSourceStart => 20,
            TimerType::TypeCSendSourceCap => 150,
            TimerType::VCONNOn => 50,
            TimerType::VCONNSourceOn => 100,
        }
    }

    /// The timer duration in policy ticks.
    pub const fn ticks(self) -> u32 {
        self.millis() * TICK_SCALE_TO_MS
    }
}

/// A countdown timer. A value of zero means expired, or never started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Countdown(u32);

impl Countdown {
    /// Start the countdown for a given timer type.
    pub fn start(&mut self, timer_type: TimerType) {
        self.0 = timer_type.ticks();
    }

    /// Start the countdown for a number of milliseconds.
    pub fn start_millis(&mut self, milliseconds: u32) {
        self.0 = milliseconds.saturating_mul(TICK_SCALE_TO_MS);
    }

    /// Stop the countdown. It reads as expired afterwards.
    pub fn stop(&mut self) {
        self.0 = 0;
    }

    /// Whether the countdown reached zero.
    pub fn expired(&self) -> bool {
        self.0 == 0
    }

    /// Remaining policy ticks.
    pub fn remaining(&self) -> u32 {
        self.0
    }

    fn tick(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }
}

/// The no-response timer, which can be disabled.
///
/// While disabled, it holds [`NO_RESPONSE_DISABLED`] and is skipped by the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoResponseTimer(u32);

impl Default for NoResponseTimer {
    fn default() -> Self {
        Self(NO_RESPONSE_DISABLED)
    }
}

impl NoResponseTimer {
    /// Start the timer with `tNoResponse`.
    pub fn start(&mut self) {
        self.0 = TimerType::NoResponse.ticks();
    }

    /// Disable the timer.
    pub fn disable(&mut self) {
        self.0 = NO_RESPONSE_DISABLED;
    }

    /// Whether the timer is disabled.
    pub fn is_disabled(&self) -> bool {
        self.0 == NO_RESPONSE_DISABLED
    }

    /// Whether the timer ran out.
    pub fn expired(&self) -> bool {
        self.0 == 0
    }

    /// Raw timer value in ticks.
    pub fn raw(&self) -> u32 {
        self.0
    }

    fn tick(&mut self) {
        if self.0 != NO_RESPONSE_DISABLED {
            self.0 = self.0.saturating_sub(1);
        }
    }
}

/// All timers of one port.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timers {
    /// Timer for the waits of the current policy state.
    pub policy: Countdown,
    /// Time without response from the port partner, bounding hard reset attempts.
    pub no_response: NoResponseTimer,
    /// Covers the whole power role swap sequence.
    pub pr_swap_bailout: Countdown,
    /// Free-running tick counter, for timestamps.
    pub timestamp: u32,
}

impl Timers {
    /// Advance all timers by one policy tick.
    pub fn tick(&mut self) {
        self.policy.tick();
        self.no_response.tick();
        self.pr_swap_bailout.tick();
        self.timestamp = self.timestamp.wrapping_add(1);
    }

    /// Stop all timers, except the no-response timer.
    pub fn reset(&mut self) {
        self.policy.stop();
        self.pr_swap_bailout.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::{Countdown, NO_RESPONSE_DISABLED, TimerType, Timers};

    #[test]
    fn countdown_expires_after_its_ticks() {
        let mut timers = Timers::default();
        timers.policy.start(TimerType::SenderResponse);
        assert_eq!(timers.policy.remaining(), 300);

        for _ in 0..299 {
            timers.tick();
        }
        assert!(!timers.policy.expired());

        timers.tick();
        assert!(timers.policy.expired());

        // Stays expired.
        timers.tick();
        assert!(timers.policy.expired());
        assert_eq!(timers.timestamp, 301);
    }

    #[test]
    fn disabled_no_response_timer_is_skipped() {
        let mut timers = Timers::default();
        assert!(timers.no_response.is_disabled());

        timers.tick();
        assert_eq!(timers.no_response.raw(), NO_RESPONSE_DISABLED);
        assert!(!timers.no_response.expired());

        timers.no_response.start();
        for _ in 0..TimerType::NoResponse.ticks() {
            timers.tick();
        }
        assert!(timers.no_response.expired());
    }

    #[test]
    fn unstarted_countdown_reads_expired() {
        let mut countdown = Countdown::default();
        assert!(countdown.expired());

        countdown.start_millis(2);
        assert_eq!(countdown.remaining(), 20);
        countdown.stop();
        assert!(countdown.expired());
    }
}
