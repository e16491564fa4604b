//! Configuration of a PD port.
//!
//! Power values are given in units of 0.5 mW, so that dividing by a voltage in 50 mV units
//! yields a current in 10 mA units, as used by request data objects.
use crate::PowerRole;
use crate::protocol_layer::message::pdo::{Capabilities, FixedSupply, SinkFixedSupply};

/// Configuration of a PD port.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortConfig {
    /// The port can act as a source.
    pub can_source: bool,
    /// The port can act as a sink.
    pub can_sink: bool,
    /// The port accepts and initiates power role swaps.
    pub can_swap_power_role: bool,
    /// The port accepts and initiates data role swaps.
    pub can_swap_data_role: bool,
    /// The port can source VCONN.
    pub can_source_vconn: bool,
    /// Highest voltage that the sink requests, in 50 mV units.
    pub sink_request_max_voltage: u16,
    /// Maximum power that the sink requests, in 0.5 mW units.
    pub sink_request_max_power: u32,
    /// Operating power that the sink requests, in 0.5 mW units.
    pub sink_request_op_power: u32,
    /// The sink supports GotoMin.
    pub sink_goto_min_compatible: bool,
    /// The sink suspends while USB is suspended.
    pub sink_usb_suspend_operation: bool,
    /// The sink communicates over USB.
    pub sink_usb_comm_capable: bool,
    /// Settling time after switching the source supply, in milliseconds.
    pub vbus_transition_time_ms: u32,
    /// Capabilities advertised as a source.
    pub source_capabilities: Capabilities,
    /// Capabilities advertised as a sink.
    pub sink_capabilities: Capabilities,
}

impl Default for PortConfig {
    fn default() -> Self {
        // 5 V at 1.5 A, dual-role.
        let source = FixedSupply::new(100, 150)
            .with_dual_role_power(true)
            .with_dual_role_data(true)
            .with_usb_communications_capable(true);
        // 5 V at 900 mA, dual-role.
        let sink = SinkFixedSupply::new(100, 90)
            .with_dual_role_power(true)
            .with_dual_role_data(true)
            .with_usb_communications_capable(true);

        let mut source_capabilities = Capabilities::new(PowerRole::Source);
        let _ = source_capabilities.objects.push(source.0);
        let mut sink_capabilities = Capabilities::new(PowerRole::Sink);
        let _ = sink_capabilities.objects.push(sink.0);

        Self {
            can_source: true,
            can_sink: true,
            can_swap_power_role: true,
            can_swap_data_role: true,
            can_source_vconn: true,
            sink_request_max_voltage: 240,
            sink_request_max_power: 72_000,
            sink_request_op_power: 36_000,
            sink_goto_min_compatible: false,
            sink_usb_suspend_operation: false,
            sink_usb_comm_capable: true,
            vbus_transition_time_ms: 20,
            source_capabilities,
            sink_capabilities,
        }
    }
}

impl PortConfig {
    /// A source-only port.
    pub fn source_only() -> Self {
        Self {
            can_sink: false,
            can_swap_power_role: false,
            ..Default::default()
        }
    }

    /// A sink-only port.
    pub fn sink_only() -> Self {
        Self {
            can_source: false,
            can_swap_power_role: false,
            can_source_vconn: false,
            ..Default::default()
        }
    }

    /// Whether the port can take both power roles.
    pub fn is_dual_role(&self) -> bool {
        self.can_source && self.can_sink
    }

    /// Set the source capabilities.
    pub fn with_source_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.source_capabilities = capabilities;
        self
    }

    /// Set the sink capabilities.
    pub fn with_sink_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.sink_capabilities = capabilities;
        self
    }

    /// Set the sink request limits: voltage in 50 mV units, power values in 0.5 mW units.
    pub fn with_sink_request(mut self, max_voltage: u16, max_power: u32, op_power: u32) -> Self {
        self.sink_request_max_voltage = max_voltage;
        self.sink_request_max_power = max_power;
        self.sink_request_op_power = op_power;
        self
    }

    /// Set GotoMin support of the sink.
    pub fn with_sink_goto_min(mut self, compatible: bool) -> Self {
        self.sink_goto_min_compatible = compatible;
        self
    }

    /// Set the source settling time after switching the supply.
    pub fn with_vbus_transition_time_ms(mut self, milliseconds: u32) -> Self {
        self.vbus_transition_time_ms = milliseconds;
        self
    }
}
