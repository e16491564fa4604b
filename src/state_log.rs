//! Logs of policy state transitions and PD messages, for offline analysis by a host tool.
//!
//! Both logs are fixed-size rings that evict their oldest entries when full.
use heapless::Deque;

use crate::policy_engine::State;
use crate::protocol_layer::message::{MAX_MESSAGE_SIZE, Message};

/// Number of state transitions that are kept.
pub const STATE_LOG_DEPTH: usize = 16;

/// Size of the message log in bytes.
pub const MESSAGE_LOG_SIZE: usize = 256;

/// Bytes of a message record before the message: length and direction.
const RECORD_HEAD_SIZE: usize = 2;

/// A state transition, with the policy tick at which it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateLogEntry {
    /// The state that was entered.
    pub state: State,
    /// Policy tick timestamp.
    pub timestamp: u32,
}

/// Ring of recent state transitions.
#[derive(Debug, Default)]
pub struct StateLog {
    entries: Deque<StateLogEntry, STATE_LOG_DEPTH>,
}

impl StateLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self { entries: Deque::new() }
    }

    /// Record a transition. Evicts the oldest entry if the log is full.
    pub fn record(&mut self, state: State, timestamp: u32) {
        if self.entries.is_full() {
            self.entries.pop_front();
        }

        // Cannot fail, space was made above.
        let _ = self.entries.push_back(StateLogEntry { state, timestamp });
    }

    /// Take the oldest entry.
    pub fn pop(&mut self) -> Option<StateLogEntry> {
        self.entries.pop_front()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Received from the port partner.
    Rx,
    /// Transmitted to the port partner, and acknowledged.
    Tx,
}

/// A message, as taken from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoggedMessage {
    /// Whether the message was received or transmitted.
    pub direction: Direction,
    /// The message.
    pub message: Message,
}

/// Byte ring of PD messages.
///
/// Each record is `[length, direction, header, data objects]`, where `length` counts the bytes after it.
#[derive(Debug, Default)]
pub struct MessageLog {
    buffer: Deque<u8, MESSAGE_LOG_SIZE>,
    overflow: bool,
}

impl MessageLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            buffer: Deque::new(),
            overflow: false,
        }
    }

    /// Record a message. Evicts whole old records if space runs out.
    pub fn record(&mut self, direction: Direction, message: &Message) {
        let mut bytes = [0u8; MAX_MESSAGE_SIZE];
        let size = message.to_bytes(&mut bytes);

        self.claim_space(RECORD_HEAD_SIZE + size);

        // Cannot fail, space was claimed above.
        let _ = self.buffer.push_back((size + 1) as u8);
        let _ = self.buffer.push_back(match direction {
            Direction::Rx => 0,
            Direction::Tx => 1,
        });
        for byte in &bytes[..size] {
            let _ = self.buffer.push_back(*byte);
        }
    }

    fn claim_space(&mut self, size: usize) {
        while MESSAGE_LOG_SIZE - self.buffer.len() < size {
            let Some(length) = self.buffer.pop_front() else {
                return;
            };

            for _ in 0..length {
                self.buffer.pop_front();
            }
            self.overflow = true;
        }
    }

    /// Take the oldest message.
    pub fn pop(&mut self) -> Option<LoggedMessage> {
        loop {
            let length = usize::from(self.buffer.pop_front()?);
            let mut record = [0u8; MAX_MESSAGE_SIZE + 1];

            for byte in record.iter_mut().take(length) {
                *byte = self.buffer.pop_front()?;
            }

            let direction = if record[0] == 0 { Direction::Rx } else { Direction::Tx };
            match Message::from_bytes(&record[1..length.max(1)]) {
                Ok(message) => return Some(LoggedMessage { direction, message }),
                // Skip corrupt records.
                Err(_) => continue,
            }
        }
    }

    /// Whether records were evicted since the last call. Clears the flag.
    pub fn take_overflow(&mut self) -> bool {
        core::mem::take(&mut self.overflow)
    }

    /// Number of used bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
