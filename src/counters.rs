//! Definition of counters, used for retry attempts, and message IDs.
//!
//! See [6.6.2], [Table 6.70]

/// Counter errors.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The counter exceeded its maximum value.
    #[error("counter exceeded its maximum value")]
    Exceeded,
}

/// Counter types, with their respective maximum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterType {
    /// Number of source capability messages, sent without response (nCapsCount).
    Caps,
    /// Number of hard resets without successful negotiation (nHardResetCount).
    HardReset,
    /// Message ID, rolls over after 7.
    MessageId,
    /// Number of transmit collisions before escalating to a hard reset (nRetryCount).
    Collision,
}

impl CounterType {
    const fn max_value(self) -> u8 {
        match self {
            CounterType::Caps => 50,
            CounterType::HardReset => 2,
            CounterType::MessageId => 7,
            CounterType::Collision => 3,
        }
    }
}

/// A counter, which either rolls over (message IDs) or saturates (limits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counter {
    value: u8,
    max_value: u8,
    rolls_over: bool,
}

impl Counter {
    /// Create a new counter at zero.
    pub const fn new(counter_type: CounterType) -> Self {
        Self {
            value: 0,
            max_value: counter_type.max_value(),
            rolls_over: matches!(counter_type, CounterType::MessageId),
        }
    }

    /// Create a new counter with a given value.
    pub fn new_from_value(counter_type: CounterType, value: u8) -> Self {
        let mut counter = Self::new(counter_type);
        counter.set(value);
        counter
    }

    /// Set the counter value.
    ///
    /// Rolling counters wrap the value, limit counters saturate one above their maximum.
    pub fn set(&mut self, value: u8) {
        self.value = if self.rolls_over {
            value % (self.max_value + 1)
        } else {
            value.min(self.max_value + 1)
        };
    }

    /// The current counter value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Increment the counter.
    ///
    /// Fails once a limit counter passes its maximum, or when a message ID rolls over to zero.
    pub fn increment(&mut self) -> Result<(), Error> {
        self.set(self.value.saturating_add(1));

        if (self.rolls_over && self.value == 0) || self.exceeded() {
            Err(Error::Exceeded)
        } else {
            Ok(())
        }
    }

    /// Whether a limit counter is above its maximum value.
    pub fn exceeded(&self) -> bool {
        !self.rolls_over && self.value > self.max_value
    }

    /// Reset the counter to zero.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}
