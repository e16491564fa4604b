//! Implements a dummy driver, platform, device and timer for testing.
use std::collections::VecDeque;
use std::future::ready;
use std::vec::Vec;

use usbpd_engine_traits::{Driver, DriverError, PhyEvent};

use crate::counters::{Counter, CounterType};
use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
use crate::protocol_layer::codec::{self, MAX_TX_FRAME_SIZE, PACKSYM, SopType};
use crate::protocol_layer::message::header::{
    ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision,
};
use crate::protocol_layer::message::request::RawRequest;
use crate::protocol_layer::message::{MAX_MESSAGE_SIZE, Message};
use crate::timers::Timer;
use crate::{DataRole, PowerRole};

/// Fixed 5 V at 500 mA, and fixed 12 V at 500 mA.
pub const SOURCE_CAPABILITIES_5V_12V: [u32; 2] = [0x0001_9032, 0x0003_C032];

/// A header template for messages of a port partner with the given power role.
pub fn partner_template(power_role: PowerRole) -> Header {
    let data_role = match power_role {
        PowerRole::Source => DataRole::Dfp,
        PowerRole::Sink => DataRole::Ufp,
    };
    Header::new_template(data_role, power_role, SpecificationRevision::R2_0)
}

/// A dummy timer for testing. Expires immediately.
pub struct DummyTimer {}

impl Timer for DummyTimer {
    fn after_micros(_microseconds: u64) -> impl Future<Output = ()> {
        ready(())
    }
}

/// A dummy PHY driver for testing.
///
/// Received frames are injected as token streams into the receive FIFO. Transmitted frames are
/// kept for probing. With automatic GoodCRC, every transmitted frame is acknowledged by the
/// simulated port partner.
#[derive(Debug, Default)]
pub struct DummyDriver {
    events: VecDeque<PhyEvent>,
    rx_fifo: VecDeque<u8>,
    tx_frames: VecDeque<heapless::Vec<u8, MAX_TX_FRAME_SIZE>>,
    auto_good_crc: bool,
    unresponsive: bool,
    hard_resets_sent: usize,
    bist_carrier_mode2: bool,
    pd_enabled: bool,
    is_source: bool,
    is_dfp: bool,
    partner_message_id: u8,
}

impl DummyDriver {
    /// Create a new dummy driver, which does not acknowledge transmissions by itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new dummy driver, which acknowledges all transmissions.
    pub fn auto_acknowledging() -> Self {
        Self {
            auto_good_crc: true,
            ..Self::default()
        }
    }

    /// Enable or disable automatic acknowledgement of transmissions.
    pub fn set_auto_good_crc(&mut self, enable: bool) {
        self.auto_good_crc = enable;
    }

    /// Simulate a port partner that never acknowledges, so that every transmission fails.
    pub fn set_unresponsive(&mut self, unresponsive: bool) {
        self.unresponsive = unresponsive;
    }

    /// Inject a PHY event.
    pub fn inject_event(&mut self, event: PhyEvent) {
        self.events.push_back(event);
    }

    fn push_frame(&mut self, sop: SopType, message: &Message) {
        let mut bytes = [0u8; MAX_MESSAGE_SIZE];
        let size = message.to_bytes(&mut bytes);

        self.rx_fifo.push_back(sop.token());
        self.rx_fifo.extend(&bytes[..size]);
        // CRC
        self.rx_fifo.extend([0x12, 0x34, 0x56, 0x78]);
    }

    /// Inject a received frame of any SOP type.
    pub fn inject_frame(&mut self, sop: SopType, message: &Message) {
        self.push_frame(sop, message);
        self.events.push_back(PhyEvent::MessageReceived);
    }

    /// Inject a received control message with a given ID.
    pub fn inject_received_control(&mut self, partner_role: PowerRole, message_type: ControlMessageType, id: u8) {
        let header = Header::new_control(
            partner_template(partner_role),
            Counter::new_from_value(CounterType::MessageId, id),
            message_type,
        );
        self.inject_frame(SopType::Sop, &Message::new(header));
    }

    /// Inject a received data message with a given ID.
    pub fn inject_received_data(
        &mut self,
        partner_role: PowerRole,
        message_type: DataMessageType,
        objects: &[u32],
        id: u8,
    ) {
        let header = Header::new_data(
            partner_template(partner_role),
            Counter::new_from_value(CounterType::MessageId, id),
            message_type,
            0,
        );
        let message = Message::new_with_objects(header, objects).unwrap();
        self.inject_frame(SopType::Sop, &message);
    }

    fn partner_role(&self) -> PowerRole {
        (!self.is_source).into()
    }

    fn next_partner_message_id(&mut self) -> u8 {
        let id = self.partner_message_id;
        self.partner_message_id = (id + 1) % 8;
        id
    }

    /// Inject a control message from the port partner, with roles opposite to ours and a fresh ID.
    pub fn inject_from_partner_control(&mut self, message_type: ControlMessageType) {
        let id = self.next_partner_message_id();
        self.inject_received_control(self.partner_role(), message_type, id);
    }

    /// Inject a data message from the port partner, with roles opposite to ours and a fresh ID.
    pub fn inject_from_partner_data(&mut self, message_type: DataMessageType, objects: &[u32]) {
        let id = self.next_partner_message_id();
        self.inject_received_data(self.partner_role(), message_type, objects, id);
    }

    /// Acknowledge a transmission with a GoodCRC of the given ID.
    pub fn inject_good_crc(&mut self, partner_role: PowerRole, id: u8) {
        let header = Header::new_control(
            partner_template(partner_role),
            Counter::new_from_value(CounterType::MessageId, id),
            ControlMessageType::GoodCRC,
        );
        self.push_frame(SopType::Sop, &Message::new(header));
        self.events.push_back(PhyEvent::TxSent);
    }

    /// Complete a transmission, but with another message in place of the GoodCRC.
    pub fn inject_tx_sent_with(&mut self, partner_role: PowerRole, message_type: ControlMessageType, id: u8) {
        let header = Header::new_control(
            partner_template(partner_role),
            Counter::new_from_value(CounterType::MessageId, id),
            message_type,
        );
        self.push_frame(SopType::Sop, &Message::new(header));
        self.events.push_back(PhyEvent::TxSent);
    }

    /// Probe the oldest transmitted message.
    pub fn probe_transmitted_message(&mut self) -> Message {
        let frame = self.tx_frames.pop_front().expect("no transmitted frame");
        Self::parse_tx_frame(&frame)
    }

    /// Take all transmitted messages.
    pub fn take_transmitted(&mut self) -> Vec<Message> {
        self.tx_frames.drain(..).map(|frame| Self::parse_tx_frame(&frame)).collect()
    }

    /// Take all transmitted message types.
    pub fn take_transmitted_types(&mut self) -> Vec<MessageType> {
        self.take_transmitted()
            .iter()
            .map(|message| message.message_type())
            .collect()
    }

    fn parse_tx_frame(frame: &[u8]) -> Message {
        assert_eq!(&frame[..4], &[codec::SOP1, codec::SOP1, codec::SOP1, codec::SOP2]);
        let size = usize::from(frame[4] & !PACKSYM);
        assert_eq!(frame.len(), 5 + size + 4);
        Message::from_bytes(&frame[5..5 + size]).unwrap()
    }

    /// Number of hard reset signals sent.
    pub fn hard_resets_sent(&self) -> usize {
        self.hard_resets_sent
    }

    /// Whether the BIST carrier mode 2 pattern is active.
    pub fn bist_carrier_mode2(&self) -> bool {
        self.bist_carrier_mode2
    }

    /// Whether PD signalling is enabled.
    pub fn pd_enabled(&self) -> bool {
        self.pd_enabled
    }
}

impl Driver for DummyDriver {
    fn poll_event(&mut self) -> Option<PhyEvent> {
        self.events.pop_front()
    }

    fn write_tx_fifo(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let frame = heapless::Vec::from_slice(data).map_err(|_| DriverError::Fifo)?;
        self.tx_frames.push_back(frame);

        if self.unresponsive {
            self.events.push_back(PhyEvent::TxRetryFailed);
        } else if self.auto_good_crc {
            let id = Header::from_bytes(&data[5..7]).unwrap().message_id();
            self.inject_good_crc(self.partner_role(), id);
        }

        Ok(())
    }

    fn read_rx_fifo(&mut self, buffer: &mut [u8]) -> Result<(), DriverError> {
        if self.rx_fifo.len() < buffer.len() {
            return Err(DriverError::Fifo);
        }

        for byte in buffer.iter_mut() {
            *byte = self.rx_fifo.pop_front().unwrap();
        }
        Ok(())
    }

    fn flush_rx_fifo(&mut self) {
        self.rx_fifo.clear();
    }

    fn flush_tx_fifo(&mut self) {}

    fn transmit_hard_reset(&mut self) -> Result<(), DriverError> {
        self.hard_resets_sent += 1;
        self.partner_message_id = 0;
        self.events.push_back(PhyEvent::HardResetSent);
        Ok(())
    }

    fn set_bist_carrier_mode2(&mut self, enable: bool) {
        self.bist_carrier_mode2 = enable;
    }

    fn set_port_roles(&mut self, is_source: bool, is_dfp: bool) {
        self.is_source = is_source;
        self.is_dfp = is_dfp;
    }

    fn enable_pd(&mut self, enable: bool) {
        self.pd_enabled = enable;
    }
}

/// A dummy platform with switchable supplies.
#[derive(Debug, Default)]
pub struct DummyPlatform {
    /// 5 V supply state.
    pub vbus_5v: bool,
    /// Higher voltage supply state.
    pub vbus_lvl1: bool,
    /// VCONN supply state.
    pub vconn: bool,
    /// The port partner provides VBUS.
    pub partner_vbus: bool,
    /// Type-C role after the last power role swap.
    pub attached_as: Option<PowerRole>,
    /// Number of error recoveries.
    pub error_recoveries: usize,
    /// Whether the policy tick is running.
    pub timer_enabled: bool,
    /// Whether CC monitoring is suspended.
    pub type_c_disabled: bool,
}

impl DummyPlatform {
    fn vbus_present(&self) -> bool {
        self.vbus_5v || self.vbus_lvl1 || self.partner_vbus
    }
}

impl Platform for DummyPlatform {
    fn set_vbus_5v_enable(&mut self, enable: bool) {
        self.vbus_5v = enable;
    }

    fn set_vbus_lvl1_enable(&mut self, enable: bool) {
        self.vbus_lvl1 = enable;
    }

    fn vbus_vsafe0v(&mut self) -> bool {
        !self.vbus_present()
    }

    fn vbus_under_5v(&mut self) -> bool {
        !self.vbus_present()
    }

    fn set_vconn_enable(&mut self, enable: bool) {
        self.vconn = enable;
    }

    fn enable_timer(&mut self, enable: bool) {
        self.timer_enabled = enable;
    }

    fn enable_type_c_state_machine(&mut self) {
        self.type_c_disabled = false;
    }

    fn disable_type_c_state_machine(&mut self) {
        self.type_c_disabled = true;
    }

    fn role_swap_to_attached_source(&mut self) {
        self.attached_as = Some(PowerRole::Source);
    }

    fn role_swap_to_attached_sink(&mut self) {
        self.attached_as = Some(PowerRole::Sink);
    }

    fn error_recovery(&mut self) {
        self.error_recoveries += 1;
    }
}

/// A dummy device that implements the device policy manager.
#[derive(Debug)]
pub struct DummyDevice {
    /// Accept swap requests of the port partner.
    pub accept_swaps: bool,
    /// Established contracts.
    pub contracts: Vec<RawRequest>,
    /// Number of hard resets.
    pub hard_resets: usize,
    /// Number of received vendor defined messages.
    pub vdms: usize,
    /// Number of ready state entries.
    pub ready: usize,
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self {
            accept_swaps: true,
            contracts: Vec::new(),
            hard_resets: 0,
            vdms: 0,
            ready: 0,
        }
    }
}

impl DevicePolicyManager for DummyDevice {
    fn evaluate_dr_swap(&mut self, _current: DataRole) -> bool {
        self.accept_swaps
    }

    fn evaluate_pr_swap(&mut self, _current: PowerRole) -> bool {
        self.accept_swaps
    }

    fn evaluate_vconn_swap(&mut self, _is_vconn_source: bool) -> bool {
        self.accept_swaps
    }

    fn contract_established(&mut self, request: RawRequest) {
        self.contracts.push(request);
    }

    fn hard_reset(&mut self) {
        self.hard_resets += 1;
    }

    fn vdm_received(&mut self, _message: &Message) {
        self.vdms += 1;
    }

    fn ready(&mut self, _power_role: PowerRole, _data_role: DataRole) {
        self.ready += 1;
    }
}

#[cfg(test)]
mod tests {
    use usbpd_engine_traits::{Driver, PhyEvent};

    use super::{DummyDriver, SOURCE_CAPABILITIES_5V_12V};
    use crate::protocol_layer::codec;
    use crate::protocol_layer::message::header::DataMessageType;
    use crate::PowerRole;

    #[test]
    fn test_receive() {
        let mut driver = DummyDriver::new();
        driver.inject_received_data(PowerRole::Source, DataMessageType::SourceCapabilities, &SOURCE_CAPABILITIES_5V_12V, 2);

        assert_eq!(driver.poll_event(), Some(PhyEvent::MessageReceived));
        assert_eq!(driver.poll_event(), None);

        let mut buf = [0u8; codec::MAX_RX_FRAME_SIZE];
        driver.read_rx_fifo(&mut buf[..3 + 8 + 4]).unwrap();
        let (frame, consumed) = codec::decode(&buf).unwrap();
        assert_eq!(consumed, 15);
        assert_eq!(frame.message.header.message_id(), 2);
        assert_eq!(&frame.message.objects[..], &SOURCE_CAPABILITIES_5V_12V);

        // The FIFO is empty now.
        assert!(driver.read_rx_fifo(&mut buf[..1]).is_err());
    }
}
