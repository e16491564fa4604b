//! The protocol layer is controlled by the policy engine, and commands the PHY layer.
//!
//! Handles
//! - construction and framing of messages,
//! - message ID bookkeeping and retransmission detection,
//! - GoodCRC verification,
//! - hard reset signalling,
//! - classification of transmission outcomes into a [`TxStatus`].
//!
//! The protocol layer holds exactly one message in flight. It is advanced by [`ProtocolLayer::run`],
//! which consumes at most one PHY event per call and never blocks.
//!
//! Extended messages are not supported.

pub mod codec;
pub mod message;

use message::header::{ControlMessageType, Header, MessageType};
use message::{DataObjects, Message, ParseError};
use usbpd_engine_traits::{Driver, DriverError, PhyEvent};

use crate::counters::{Counter, CounterType};
#[cfg(feature = "state-log")]
use crate::state_log::{Direction, MessageLog};
use crate::{DataRole, PowerRole};

/// States of the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum State {
    Disabled,
    Idle,
    Reset,
    ResetWait,
    RxWait,
    TxSendingMessage,
    TxVerifyGoodCrc,
}

/// Outcome of the most recent transmission request.
///
/// Only the protocol layer advances this status. The policy engine requests transmissions, and
/// acknowledges terminal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxStatus {
    /// Nothing to do.
    Idle,
    /// Hard reset signalling was requested.
    Reset,
    /// A message was queued for transmission.
    Send,
    /// A message is being transmitted.
    Busy,
    /// Waiting for hard reset signalling to complete.
    Wait,
    /// The message was acknowledged, or hard reset signalling completed.
    Success,
    /// Transmission failed after retries, or the acknowledgement did not match.
    Error,
    /// Transmission collided with an incoming frame.
    Collision,
}

impl TxStatus {
    /// Whether the status is an outcome that the policy engine has to act upon.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Error | TxStatus::Collision)
    }
}

/// Errors when requesting a transmission.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The protocol layer is disabled.
    #[error("protocol layer is disabled")]
    Disabled,
    /// Another transmission is in progress.
    #[error("transmission in progress")]
    Busy,
    /// More than seven data objects were given.
    #[error("too many data objects `{0}`")]
    TooManyObjects(usize),
}

/// Errors while reading a frame from the RX FIFO.
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum RxError {
    #[error("driver error `{0:?}`")]
    Driver(DriverError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<DriverError> for RxError {
    fn from(value: DriverError) -> Self {
        RxError::Driver(value)
    }
}

#[derive(Debug, Clone)]
struct Counters {
    /// ID of the last received message. `None` after reset, or after a soft reset was received.
    rx_message: Option<Counter>,
    tx_message: Counter,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            rx_message: None,
            tx_message: Counter::new(CounterType::MessageId),
        }
    }
}

/// A message, waiting for transmission. The header is built when it is sent.
#[derive(Debug, Clone)]
struct Outgoing {
    message_type: MessageType,
    objects: DataObjects,
}

/// The USB PD protocol layer.
#[derive(Debug)]
pub struct ProtocolLayer<DRIVER: Driver> {
    driver: DRIVER,
    state: State,
    tx_status: TxStatus,
    counters: Counters,
    header_template: Header,
    outgoing: Option<Outgoing>,
    in_flight: Option<Message>,
    rx_pending: usize,
    received: Option<Message>,
    hard_reset_received: bool,
    #[cfg(feature = "state-log")]
    message_log: MessageLog,
}

impl<DRIVER: Driver> ProtocolLayer<DRIVER> {
    /// Create a new, disabled protocol layer from a driver and header template.
    pub fn new(driver: DRIVER, header_template: Header) -> Self {
        Self {
            driver,
            state: State::Disabled,
            tx_status: TxStatus::Idle,
            counters: Default::default(),
            header_template,
            outgoing: None,
            in_flight: None,
            rx_pending: 0,
            received: None,
            hard_reset_received: false,
            #[cfg(feature = "state-log")]
            message_log: MessageLog::new(),
        }
    }

    /// Enable the protocol layer with the given roles.
    pub fn enable(&mut self, power_role: PowerRole, data_role: DataRole) {
        self.set_roles(power_role, data_role);
        self.driver.enable_pd(true);
        self.reset();
        self.state = State::Idle;
    }

    /// Disable the protocol layer. Pending messages and PHY events are dropped.
    pub fn disable(&mut self) {
        self.driver.enable_pd(false);
        self.reset();
        self.state = State::Disabled;
    }

    /// Reset the protocol layer: counters, transmission status, and FIFOs.
    pub fn reset(&mut self) {
        self.driver.flush_rx_fifo();
        self.driver.flush_tx_fifo();
        self.counters = Default::default();
        self.tx_status = TxStatus::Idle;
        self.outgoing = None;
        self.in_flight = None;
        self.rx_pending = 0;
        self.received = None;
        self.hard_reset_received = false;

        if self.state != State::Disabled {
            self.state = State::Idle;
        }
    }

    /// Update the roles that are announced in transmitted headers.
    pub fn set_roles(&mut self, power_role: PowerRole, data_role: DataRole) {
        self.header_template = self
            .header_template
            .with_port_power_role(power_role)
            .with_port_data_role(data_role);
        self.driver.set_port_roles(power_role.into(), data_role.into());
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The outcome of the most recent transmission request.
    pub fn tx_status(&self) -> TxStatus {
        self.tx_status
    }

    /// The header template for transmitted messages.
    pub fn header_template(&self) -> Header {
        self.header_template
    }

    /// The ID that the next transmitted message will carry.
    pub fn tx_message_id(&self) -> u8 {
        self.counters.tx_message.value()
    }

    /// Access the driver.
    pub fn driver(&mut self) -> &mut DRIVER {
        &mut self.driver
    }

    /// The log of transmitted and received messages.
    #[cfg(feature = "state-log")]
    pub fn message_log(&mut self) -> &mut MessageLog {
        &mut self.message_log
    }

    /// Queue a message for transmission.
    ///
    /// The message ID and roles are filled in by the protocol layer.
    pub fn transmit(&mut self, message_type: MessageType, objects: &[u32]) -> Result<(), Error> {
        if self.state == State::Disabled {
            return Err(Error::Disabled);
        }

        if matches!(
            self.tx_status,
            TxStatus::Send | TxStatus::Busy | TxStatus::Reset | TxStatus::Wait
        ) {
            return Err(Error::Busy);
        }

        let objects = DataObjects::from_slice(objects).map_err(|_| Error::TooManyObjects(objects.len()))?;

        self.outgoing = Some(Outgoing { message_type, objects });
        self.tx_status = TxStatus::Send;
        Ok(())
    }

    /// Request hard reset signalling. Replaces any queued message.
    pub fn hard_reset(&mut self) -> Result<(), Error> {
        if self.state == State::Disabled {
            return Err(Error::Disabled);
        }

        self.outgoing = None;
        self.tx_status = TxStatus::Reset;
        Ok(())
    }

    /// Acknowledge a terminal transmission outcome, which returns the status to idle.
    pub fn acknowledge_tx(&mut self) {
        if self.tx_status.is_terminal() {
            self.tx_status = TxStatus::Idle;
        }
    }

    /// Drop the queued or in-flight transmission, including hard reset signalling.
    ///
    /// Both FIFOs are flushed, since the outcome of an in-flight frame can no longer be attributed.
    pub fn cancel_transmit(&mut self) {
        if matches!(
            self.state,
            State::TxSendingMessage | State::TxVerifyGoodCrc | State::RxWait | State::Reset | State::ResetWait
        ) {
            self.driver.flush_tx_fifo();
            self.driver.flush_rx_fifo();
            self.rx_pending = 0;
            self.state = State::Idle;
        }

        self.outgoing = None;
        self.in_flight = None;
        self.tx_status = TxStatus::Idle;
    }

    /// The message that was delivered to the policy engine, if any.
    pub fn peek_received(&self) -> Option<&Message> {
        self.received.as_ref()
    }

    /// Take the message that was delivered to the policy engine, if any.
    pub fn take_received(&mut self) -> Option<Message> {
        self.received.take()
    }

    /// Whether the port partner signalled a hard reset since the last call.
    pub fn take_hard_reset_received(&mut self) -> bool {
        core::mem::take(&mut self.hard_reset_received)
    }

    /// Advance the protocol layer by consuming at most one PHY event.
    pub fn run(&mut self) {
        let event = self.driver.poll_event();

        if self.state == State::Disabled {
            return;
        }

        match event {
            Some(PhyEvent::HardResetReceived) => {
                self.on_hard_reset_received();
                return;
            }
            Some(PhyEvent::MessageReceived) => self.rx_pending += 1,
            _ => (),
        }

        match self.state {
            State::Disabled => (),
            State::Idle => self.idle(),
            State::Reset => self.signal_hard_reset(),
            State::ResetWait => {
                if event == Some(PhyEvent::HardResetSent) {
                    trace!("Hard reset sent");
                    self.counters = Default::default();
                    self.driver.flush_rx_fifo();
                    self.rx_pending = 0;
                    self.tx_status = TxStatus::Success;
                    self.state = State::Idle;
                }
            }
            State::TxSendingMessage => match event {
                Some(PhyEvent::TxSent) => {
                    self.state = State::TxVerifyGoodCrc;
                    self.verify_good_crc();
                }
                Some(PhyEvent::TxCollision) => {
                    debug!("Transmit collision");
                    self.in_flight = None;
                    self.tx_status = TxStatus::Collision;
                    self.state = State::RxWait;
                }
                Some(PhyEvent::TxRetryFailed) => {
                    warn!("Transmit retries exhausted");
                    self.driver.flush_rx_fifo();
                    self.rx_pending = 0;
                    self.in_flight = None;
                    self.tx_status = TxStatus::Error;
                    self.state = State::Idle;
                }
                _ => (),
            },
            State::TxVerifyGoodCrc => self.verify_good_crc(),
            State::RxWait => {
                if self.rx_pending > 0 {
                    self.rx_pending -= 1;
                    self.receive();
                }
                self.state = State::Idle;
            }
        }
    }

    fn idle(&mut self) {
        if self.tx_status == TxStatus::Reset {
            self.state = State::Reset;
            self.signal_hard_reset();
        } else if self.rx_pending > 0 {
            self.rx_pending -= 1;
            self.receive();
        } else if self.tx_status == TxStatus::Send {
            self.send();
        }
    }

    fn signal_hard_reset(&mut self) {
        match self.driver.transmit_hard_reset() {
            Ok(()) => {
                self.tx_status = TxStatus::Wait;
                self.state = State::ResetWait;
            }
            Err(error) => {
                error!("Hard reset signalling failed: {:?}", error);
                self.tx_status = TxStatus::Error;
                self.state = State::Idle;
            }
        }
    }

    fn on_hard_reset_received(&mut self) {
        debug!("Hard reset received");
        self.reset();
        self.state = State::Idle;
        self.hard_reset_received = true;
    }

    fn send(&mut self) {
        let Some(outgoing) = self.outgoing.take() else {
            self.tx_status = TxStatus::Idle;
            return;
        };

        let header = Header::new(
            self.header_template,
            self.counters.tx_message,
            outgoing.message_type,
            outgoing.objects.len() as u8,
        );

        let mut buffer = [0u8; codec::MAX_TX_FRAME_SIZE];
        let result = codec::encode(header, &outgoing.objects, &mut buffer)
            .map_err(|_| DriverError::Fifo)
            .and_then(|size| self.driver.write_tx_fifo(&buffer[..size]));

        match result {
            Ok(()) => {
                trace!(
                    "Transmit {:?} with ID {}",
                    outgoing.message_type,
                    self.counters.tx_message.value()
                );
                self.in_flight = Some(Message {
                    header,
                    objects: outgoing.objects,
                });
                self.tx_status = TxStatus::Busy;
                self.state = State::TxSendingMessage;
            }
            Err(error) => {
                error!("Transmit of {:?} failed: {:?}", outgoing.message_type, error);
                self.tx_status = TxStatus::Error;
            }
        }
    }

    fn verify_good_crc(&mut self) {
        self.state = State::Idle;

        let frame = match self.read_frame() {
            Ok(frame) => frame,
            Err(error) => {
                warn!("No readable GoodCrc: {:?}", error);
                self.driver.flush_rx_fifo();
                self.in_flight = None;
                self.tx_status = TxStatus::Error;
                return;
            }
        };

        let message = frame.message;
        if frame.sop == codec::SopType::Sop && message.is_control(ControlMessageType::GoodCRC) {
            if message.header.message_id() == self.counters.tx_message.value() {
                trace!("Received GoodCrc for ID {}", message.header.message_id());
                // Rolls over after 7.
                let _ = self.counters.tx_message.increment();
                self.tx_status = TxStatus::Success;

                #[cfg(feature = "state-log")]
                if let Some(sent) = self.in_flight.as_ref() {
                    self.message_log.record(Direction::Tx, sent);
                }
            } else {
                warn!(
                    "GoodCrc ID mismatch: received {}, expected {}",
                    message.header.message_id(),
                    self.counters.tx_message.value()
                );
                self.tx_status = TxStatus::Error;
            }
        } else {
            // The partner sent a message instead. It still has to reach the policy engine.
            self.tx_status = TxStatus::Error;
            if frame.sop == codec::SopType::Sop {
                self.accept(message);
            }
        }

        self.in_flight = None;
    }

    fn receive(&mut self) {
        match self.read_frame() {
            Ok(frame) if frame.sop == codec::SopType::Sop => self.accept(frame.message),
            Ok(frame) => trace!("Dropped {:?} frame", frame.sop),
            Err(error) => {
                warn!("Dropped unreadable frame: {:?}", error);
                self.driver.flush_rx_fifo();
                self.rx_pending = 0;
            }
        }
    }

    fn read_frame(&mut self) -> Result<codec::Frame, RxError> {
        let mut buffer = [0u8; codec::MAX_RX_FRAME_SIZE];

        self.driver.read_rx_fifo(&mut buffer[..codec::RX_HEAD_SIZE])?;
        let header = Header::from_bytes(&buffer[1..codec::RX_HEAD_SIZE])?;

        let size = codec::RX_HEAD_SIZE + codec::tail_size(header);
        self.driver.read_rx_fifo(&mut buffer[codec::RX_HEAD_SIZE..size])?;

        let (frame, _) = codec::decode(&buffer[..size])?;
        Ok(frame)
    }

    /// Filter a received SOP message, and deliver it to the policy engine.
    fn accept(&mut self, message: Message) {
        if message.header.extended() {
            warn!("Dropped extended message");
            return;
        }

        match message.message_type() {
            MessageType::Control(ControlMessageType::GoodCRC) => {
                trace!("Dropped unexpected GoodCrc");
                return;
            }
            MessageType::Control(ControlMessageType::SoftReset) => {
                debug!("Soft reset received");
                self.counters.tx_message.reset();
                self.counters.rx_message = None;
            }
            _ => {
                let id = message.header.message_id();
                if let Some(counter) = self.counters.rx_message
                    && counter.value() == id
                {
                    trace!("Dropped retransmission of ID {}", id);
                    return;
                }
                self.counters.rx_message = Some(Counter::new_from_value(CounterType::MessageId, id));
            }
        }

        if let Ok(revision) = message.header.spec_revision() {
            self.header_template = self.header_template.with_spec_revision(revision);
        }

        trace!("Received {:?}", message.message_type());

        #[cfg(feature = "state-log")]
        self.message_log.record(Direction::Rx, &message);

        if self.received.is_some() {
            debug!("Replaced unread message");
        }
        self.received = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::message::header::{ControlMessageType, DataMessageType, MessageType};
    use super::{ProtocolLayer, State, TxStatus};
    use crate::dummy::{DummyDriver, SOURCE_CAPABILITIES_5V_12V, partner_template};
    use crate::{DataRole, PhyEvent, PowerRole};

    fn get_protocol_layer() -> ProtocolLayer<DummyDriver> {
        let mut protocol_layer = ProtocolLayer::new(DummyDriver::new(), partner_template(PowerRole::Sink));
        protocol_layer.enable(PowerRole::Source, DataRole::Dfp);
        protocol_layer
    }

    /// Send a control message, and let the partner acknowledge it.
    fn send_acknowledged(protocol_layer: &mut ProtocolLayer<DummyDriver>, message_type: ControlMessageType) {
        protocol_layer
            .transmit(MessageType::Control(message_type), &[])
            .unwrap();
        protocol_layer.run();
        assert_eq!(protocol_layer.tx_status(), TxStatus::Busy);

        let id = protocol_layer.driver().probe_transmitted_message().header.message_id();
        protocol_layer.driver().inject_good_crc(PowerRole::Sink, id);
        protocol_layer.run();
        assert_eq!(protocol_layer.tx_status(), TxStatus::Success);
        protocol_layer.acknowledge_tx();
    }

    #[test]
    fn message_id_increments_on_success() {
        let mut protocol_layer = get_protocol_layer();

        for expected in [0, 1, 2, 3, 4, 5, 6, 7, 0, 1] {
            assert_eq!(protocol_layer.tx_message_id(), expected);
            send_acknowledged(&mut protocol_layer, ControlMessageType::Ping);
        }
    }

    #[test]
    fn good_crc_id_mismatch_is_error() {
        let mut protocol_layer = get_protocol_layer();

        protocol_layer
            .transmit(MessageType::Control(ControlMessageType::Accept), &[])
            .unwrap();
        protocol_layer.run();
        protocol_layer.driver().probe_transmitted_message();

        protocol_layer.driver().inject_good_crc(PowerRole::Sink, 5);
        protocol_layer.run();

        assert_eq!(protocol_layer.tx_status(), TxStatus::Error);
        assert_eq!(protocol_layer.state(), State::Idle);
        assert_eq!(protocol_layer.tx_message_id(), 0);
    }

    #[test]
    fn duplicate_message_is_dropped() {
        let mut protocol_layer = get_protocol_layer();

        for _ in 0..2 {
            protocol_layer
                .driver()
                .inject_received_control(PowerRole::Sink, ControlMessageType::GetSourceCap, 3);
        }

        protocol_layer.run();
        assert!(
            protocol_layer
                .take_received()
                .is_some_and(|message| message.is_control(ControlMessageType::GetSourceCap))
        );

        protocol_layer.run();
        assert!(protocol_layer.take_received().is_none());

        protocol_layer
            .driver()
            .inject_received_control(PowerRole::Sink, ControlMessageType::GetSinkCap, 4);
        protocol_layer.run();
        assert!(protocol_layer.take_received().is_some());
    }

    #[test]
    fn soft_reset_is_always_delivered() {
        let mut protocol_layer = get_protocol_layer();
        send_acknowledged(&mut protocol_layer, ControlMessageType::Ping);
        assert_eq!(protocol_layer.tx_message_id(), 1);

        protocol_layer
            .driver()
            .inject_received_control(PowerRole::Sink, ControlMessageType::Ping, 0);
        protocol_layer.run();
        protocol_layer.take_received();

        // Same ID as the last message, but a soft reset.
        protocol_layer
            .driver()
            .inject_received_control(PowerRole::Sink, ControlMessageType::SoftReset, 0);
        protocol_layer.run();

        assert!(
            protocol_layer
                .take_received()
                .is_some_and(|message| message.is_control(ControlMessageType::SoftReset))
        );
        assert_eq!(protocol_layer.tx_message_id(), 0);

        // The cached ID was cleared, so ID 0 is accepted again.
        protocol_layer
            .driver()
            .inject_received_control(PowerRole::Sink, ControlMessageType::Accept, 0);
        protocol_layer.run();
        assert!(protocol_layer.take_received().is_some());
    }

    #[test]
    fn message_instead_of_good_crc_is_delivered() {
        let mut protocol_layer = get_protocol_layer();

        protocol_layer
            .transmit(MessageType::Control(ControlMessageType::Ping), &[])
            .unwrap();
        protocol_layer.run();

        // Partner answers with a soft reset, instead of a GoodCrc.
        protocol_layer
            .driver()
            .inject_tx_sent_with(PowerRole::Sink, ControlMessageType::SoftReset, 2);
        protocol_layer.run();

        assert_eq!(protocol_layer.tx_status(), TxStatus::Error);
        assert!(
            protocol_layer
                .take_received()
                .is_some_and(|message| message.is_control(ControlMessageType::SoftReset))
        );
    }

    #[test]
    fn collision_and_retry_failure() {
        let mut protocol_layer = get_protocol_layer();

        protocol_layer
            .transmit(MessageType::Control(ControlMessageType::Ping), &[])
            .unwrap();
        protocol_layer.run();
        protocol_layer.driver().inject_event(PhyEvent::TxCollision);
        protocol_layer.run();
        assert_eq!(protocol_layer.tx_status(), TxStatus::Collision);
        assert_eq!(protocol_layer.state(), State::RxWait);

        protocol_layer.run();
        assert_eq!(protocol_layer.state(), State::Idle);
        protocol_layer.acknowledge_tx();

        protocol_layer
            .transmit(MessageType::Control(ControlMessageType::Ping), &[])
            .unwrap();
        protocol_layer.run();
        protocol_layer.driver().inject_event(PhyEvent::TxRetryFailed);
        protocol_layer.run();
        assert_eq!(protocol_layer.tx_status(), TxStatus::Error);
        assert_eq!(protocol_layer.state(), State::Idle);
        assert_eq!(protocol_layer.tx_message_id(), 0);
    }

    #[test]
    fn hard_reset_signalling() {
        let mut protocol_layer = get_protocol_layer();
        send_acknowledged(&mut protocol_layer, ControlMessageType::Ping);

        protocol_layer.hard_reset().unwrap();
        protocol_layer.run();
        assert_eq!(protocol_layer.tx_status(), TxStatus::Wait);
        assert_eq!(protocol_layer.state(), State::ResetWait);
        assert_eq!(protocol_layer.driver().hard_resets_sent(), 1);

        // The dummy PHY reports completion right away.
        protocol_layer.run();
        assert_eq!(protocol_layer.tx_status(), TxStatus::Success);
        assert_eq!(protocol_layer.state(), State::Idle);
        assert_eq!(protocol_layer.tx_message_id(), 0);
    }

    #[test]
    fn hard_reset_received() {
        let mut protocol_layer = get_protocol_layer();
        protocol_layer.driver().inject_event(PhyEvent::HardResetReceived);
        protocol_layer.run();

        assert!(protocol_layer.take_hard_reset_received());
        assert!(!protocol_layer.take_hard_reset_received());
    }

    #[test]
    fn data_message_is_framed_with_template_roles() {
        let mut protocol_layer = get_protocol_layer();

        protocol_layer
            .transmit(
                MessageType::Data(DataMessageType::SourceCapabilities),
                &SOURCE_CAPABILITIES_5V_12V,
            )
            .unwrap();
        protocol_layer.run();

        let sent = protocol_layer.driver().probe_transmitted_message();
        assert_eq!(sent.header.num_objects(), 2);
        assert_eq!(sent.header.port_power_role(), PowerRole::Source);
        assert_eq!(sent.header.port_data_role(), DataRole::Dfp);
        assert_eq!(&sent.objects[..], &SOURCE_CAPABILITIES_5V_12V);
    }

    #[test]
    fn rejects_eight_objects_and_busy() {
        let mut protocol_layer = get_protocol_layer();

        assert_eq!(
            protocol_layer.transmit(MessageType::Data(DataMessageType::SinkCapabilities), &[0; 8]),
            Err(super::Error::TooManyObjects(8))
        );

        protocol_layer
            .transmit(MessageType::Control(ControlMessageType::Ping), &[])
            .unwrap();
        assert_eq!(
            protocol_layer.transmit(MessageType::Control(ControlMessageType::Ping), &[]),
            Err(super::Error::Busy)
        );
    }

    #[test]
    fn disabled_layer_ignores_events() {
        let mut protocol_layer = get_protocol_layer();
        protocol_layer.disable();

        protocol_layer
            .driver()
            .inject_received_control(PowerRole::Sink, ControlMessageType::Ping, 0);
        protocol_layer.run();

        assert!(protocol_layer.take_received().is_none());
        assert_eq!(
            protocol_layer.transmit(MessageType::Control(ControlMessageType::Ping), &[]),
            Err(super::Error::Disabled)
        );
    }

    #[test]
    fn receive_errors_are_displayed() {
        use super::RxError;
        use super::message::ParseError;
        use crate::DriverError;

        assert_eq!(RxError::from(DriverError::Fifo).to_string(), "driver error `Fifo`");
        assert_eq!(
            RxError::from(ParseError::InvalidSop(0x40)).to_string(),
            "invalid SOP token `64`"
        );
    }
}
