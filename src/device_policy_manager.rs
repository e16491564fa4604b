//! The device policy manager (DPM) allows a device to control the policy engine, and be informed about status changes.
//!
//! For example, through the DPM, a device decides on role swap requests of the port partner,
//! and handles vendor defined messages.
use crate::protocol_layer::message::Message;
use crate::protocol_layer::message::pdo::Capabilities;
use crate::protocol_layer::message::request::RawRequest;
use crate::{DataRole, PowerRole};

/// Trait for the device policy manager.
///
/// This entity enforces device policy. All methods are called from within a policy engine
/// dispatch pass, and must not block.
pub trait DevicePolicyManager {
    /// Decide on a data role swap, requested by the port partner.
    fn evaluate_dr_swap(&mut self, _current: DataRole) -> bool {
        true
    }

    /// Decide on a power role swap, requested by the port partner.
    fn evaluate_pr_swap(&mut self, _current: PowerRole) -> bool {
        true
    }

    /// Decide on a VCONN swap, requested by the port partner.
    fn evaluate_vconn_swap(&mut self, _is_vconn_source: bool) -> bool {
        true
    }

    /// An explicit contract was established.
    fn contract_established(&mut self, _request: RawRequest) {}

    /// The contract was cleared, e.g. by a hard reset.
    fn contract_cleared(&mut self) {}

    /// The port partner advertised its source capabilities.
    fn source_capabilities_received(&mut self, _capabilities: &Capabilities) {}

    /// The port partner advertised its sink capabilities.
    fn sink_capabilities_received(&mut self, _capabilities: &Capabilities) {}

    /// A hard reset was sent or received.
    fn hard_reset(&mut self) {}

    /// A vendor defined message was received in a ready state.
    ///
    /// This is the entry point for structured VDM handling, such as alternate modes.
    fn vdm_received(&mut self, _message: &Message) {}

    /// The policy engine entered a ready state.
    ///
    /// Devices may start VDM discovery from here.
    fn ready(&mut self, _power_role: PowerRole, _data_role: DataRole) {}
}
