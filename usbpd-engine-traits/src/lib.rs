//! USB PD engine driver traits.
//!
//! Provides a driver trait that allows to add support for various FUSB302-style USB PD PHYs.
//! The PHY handles BMC coding, CRC generation and hardware retries. Frames are exchanged with
//! the protocol layer as token streams through the PHY's FIFOs.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
use core::future::Future;

/// Events, reported by the PHY.
///
/// The driver is the only producer; the protocol layer consumes at most one event per dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyEvent {
    /// A frame with a valid CRC was received and acknowledged by the PHY.
    MessageReceived,
    /// A transmitted frame was acknowledged by the port partner.
    TxSent,
    /// Transmission was aborted due to activity on the CC line.
    TxCollision,
    /// The PHY exhausted its retries without receiving a GoodCRC.
    TxRetryFailed,
    /// Hard reset signalling was transmitted.
    HardResetSent,
    /// Hard reset signalling was received from the port partner.
    HardResetReceived,
}

/// Errors that a driver can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// The FIFO cannot hold the data, or does not contain enough data.
    Fifo,
    /// Register access to the PHY failed.
    Bus,
}

/// Driver trait, through which the protocol layer talks to the PHY.
///
/// All methods are synchronous and must not block. Waiting is expressed by the policy engine
/// through its timers.
pub trait Driver {
    /// Take the oldest pending PHY event, if any.
    fn poll_event(&mut self) -> Option<PhyEvent>;

    /// Write a token stream to the transmit FIFO, which starts transmission.
    fn write_tx_fifo(&mut self, data: &[u8]) -> Result<(), DriverError>;

    /// Read exactly `buffer.len()` bytes from the receive FIFO.
    fn read_rx_fifo(&mut self, buffer: &mut [u8]) -> Result<(), DriverError>;

    /// Discard all data in the receive FIFO.
    fn flush_rx_fifo(&mut self);

    /// Discard all data in the transmit FIFO.
    fn flush_tx_fifo(&mut self);

    /// Start hard reset signalling.
    fn transmit_hard_reset(&mut self) -> Result<(), DriverError>;

    /// Enable or disable the BIST carrier mode 2 test pattern.
    fn set_bist_carrier_mode2(&mut self, enable: bool);

    /// Configure the roles that the PHY uses for automatic GoodCRC replies.
    fn set_port_roles(&mut self, is_source: bool, is_dfp: bool);

    /// Enable or disable PD signalling (automatic GoodCRC, retries, interrupts).
    fn enable_pd(&mut self, enable: bool);

    /// Wait for the PHY interrupt line.
    ///
    /// Used by async runners to wake up before the next timer tick. Defaults to never resolving,
    /// in which case the runner only wakes up on timer ticks.
    fn wait_for_interrupt(&mut self) -> impl Future<Output = ()> {
        core::future::pending()
    }
}
