//! Sink states, see [8.3.3.3].
use super::{ExchangeStep, OnError, PolicyEngine, PortRequest, SendStatus, SinkDefaultStep, State, TimedStep};
use crate::config::PortConfig;
use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
use crate::protocol_layer::message::header::{ControlMessageType, DataMessageType, MessageType};
use crate::protocol_layer::message::pdo::{Capabilities, PowerDataObject};
use crate::protocol_layer::message::request::FixedVariableRequest;
use crate::timers::TimerType;
use crate::{DataRole, Driver, PowerRole};

/// Maximum value of a 10-bit current field in a request data object.
const CURRENT_FIELD_MASK: u32 = 0x3FF;

/// Select the highest-power fixed or variable supply within the configured voltage limit.
///
/// Candidates are compared by the power they offer at their (minimum) voltage. On equal power,
/// the lower object position wins. Battery and unknown objects are skipped.
///
/// Returns `None`, if no object is within the voltage limit.
pub fn select_capability(capabilities: &Capabilities, config: &PortConfig) -> Option<FixedVariableRequest> {
    let max_voltage = u32::from(config.sink_request_max_voltage);

    let mut best: Option<(u8, u32)> = None;
    let mut best_power = 0;

    for (index, object) in capabilities.iter().enumerate() {
        let (voltage, max_current) = match object {
            PowerDataObject::FixedSupply(supply) => (u32::from(supply.raw_voltage()), supply.raw_max_current()),
            PowerDataObject::VariableSupply(supply) if u32::from(supply.raw_max_voltage()) <= max_voltage => {
                (u32::from(supply.raw_min_voltage()), supply.raw_max_current())
            }
            _ => continue,
        };

        if voltage == 0 || voltage > max_voltage {
            continue;
        }

        // In units of 0.5 mW, the same as the configured power values.
        let power = voltage * u32::from(max_current);
        if power > best_power {
            best_power = power;
            best = Some((index as u8 + 1, voltage));
        }
    }

    let (position, voltage) = best?;
    let operating_current = (config.sink_request_op_power / voltage) & CURRENT_FIELD_MASK;
    let max_operating_current = (config.sink_request_max_power / voltage) & CURRENT_FIELD_MASK;

    Some(
        FixedVariableRequest(0)
            .with_object_position(position)
            .with_giveback_flag(config.sink_goto_min_compatible)
            .with_capability_mismatch(!config.sink_goto_min_compatible && best_power < config.sink_request_max_power)
            .with_usb_communications_capable(config.sink_usb_comm_capable)
            .with_no_usb_suspend(!config.sink_usb_suspend_operation)
            .with_raw_operating_current(operating_current as u16)
            .with_raw_max_operating_current(max_operating_current as u16),
    )
}

impl<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager> PolicyEngine<DRIVER, PLATFORM, DPM> {
    pub(super) fn sink_startup(&mut self) -> State {
        self.power_role = PowerRole::Sink;
        self.caps_counter.reset();
        self.collision_counter.reset();
        self.clear_contract();
        self.sink_request = None;

        self.protocol_layer.reset();
        self.protocol_layer.set_roles(self.power_role, self.data_role);

        State::SinkDiscovery
    }

    pub(super) fn sink_discovery(&mut self) -> State {
        if self.platform.vbus_under_5v() {
            State::SinkDiscovery
        } else {
            State::SinkWaitCaps(TimedStep::Arm)
        }
    }

    pub(super) fn sink_wait_caps(&mut self, step: TimedStep) -> State {
        match step {
            TimedStep::Arm => {
                self.timers.policy.start(TimerType::SinkWaitCap);
                State::SinkWaitCaps(TimedStep::Wait)
            }
            TimedStep::Wait => {
                if let Some(message) = self.protocol_layer.take_received() {
                    if message.is_data(DataMessageType::SourceCapabilities) {
                        self.store_received_capabilities(PowerRole::Source, &message);
                        return State::SinkEvaluateCaps;
                    }
                    trace!("Ignored {:?} while waiting for capabilities", message.message_type());
                }

                if !self.timers.policy.expired() {
                    self.state
                } else if !self.hard_reset_counter.exceeded() {
                    info!("No source capabilities received");
                    self.send_hard_reset()
                } else if self.timers.no_response.expired() && self.had_contract {
                    State::ErrorRecovery
                } else {
                    self.state
                }
            }
        }
    }

    pub(super) fn sink_evaluate_caps(&mut self) -> State {
        self.timers.no_response.disable();
        self.hard_reset_counter.reset();

        match select_capability(&self.received_capabilities, &self.config) {
            Some(request) => {
                debug!("Selected object position {}", request.object_position());
                self.sink_request = Some(request);
                State::SinkSelectCapability(ExchangeStep::Send)
            }
            None => {
                warn!("No suitable source capability");
                State::SinkWaitCaps(TimedStep::Arm)
            }
        }
    }

    pub(super) fn sink_select_capability(&mut self, step: ExchangeStep) -> State {
        match step {
            ExchangeStep::Send => {
                let Some(request) = self.sink_request else {
                    return State::SinkWaitCaps(TimedStep::Arm);
                };

                match self.send_data(DataMessageType::Request, &[request.0], OnError::SoftReset) {
                    SendStatus::Busy => self.state,
                    SendStatus::Success => {
                        self.timers.policy.start(TimerType::SenderResponse);
                        State::SinkSelectCapability(ExchangeStep::WaitResponse)
                    }
                    SendStatus::Error(state) => state,
                }
            }
            ExchangeStep::WaitResponse => {
                let Some(message) = self.protocol_layer.take_received() else {
                    return if self.timers.policy.expired() {
                        warn!("No response to request");
                        self.send_hard_reset()
                    } else {
                        self.state
                    };
                };

                match message.message_type() {
                    MessageType::Control(ControlMessageType::Accept) => {
                        if let Some(request) = self.sink_request {
                            self.set_contract(request.into());
                        }
                        self.timers.policy.start(TimerType::PSTransition);
                        State::SinkTransitionSink
                    }
                    MessageType::Control(ControlMessageType::Wait | ControlMessageType::Reject) => {
                        if self.contract.is_some() {
                            State::SinkReady
                        } else {
                            State::SinkWaitCaps(TimedStep::Arm)
                        }
                    }
                    message_type => {
                        debug!("Unexpected {:?} in response to request", message_type);
                        self.send_soft_reset()
                    }
                }
            }
        }
    }

    pub(super) fn sink_transition_sink(&mut self) -> State {
        match self.protocol_layer.take_received() {
            Some(message) if message.is_control(ControlMessageType::PsRdy) => State::SinkReady,
            Some(message) => {
                warn!("Unexpected {:?} during power transition", message.message_type());
                self.send_hard_reset()
            }
            None if self.timers.policy.expired() => {
                warn!("No PS_RDY from source");
                self.send_hard_reset()
            }
            None => State::SinkTransitionSink,
        }
    }

    pub(super) fn sink_ready(&mut self) -> State {
        if let Some(message) = self.protocol_layer.take_received() {
            return match message.message_type() {
                MessageType::Data(DataMessageType::SourceCapabilities) => {
                    self.store_received_capabilities(PowerRole::Source, &message);
                    State::SinkEvaluateCaps
                }
                MessageType::Control(ControlMessageType::GotoMin) => {
                    if self.sink_request.is_some_and(|request| request.giveback_flag()) {
                        self.timers.policy.start(TimerType::PSTransition);
                        State::SinkTransitionSink
                    } else {
                        debug!("Ignored GotoMin without giveback");
                        State::SinkReady
                    }
                }
                MessageType::Control(ControlMessageType::GetSinkCap) => State::SinkGiveSinkCap,
                MessageType::Control(ControlMessageType::GetSourceCap) if self.config.is_dual_role() => {
                    State::SinkGiveSourceCap
                }
                MessageType::Control(ControlMessageType::GetSourceCap) => State::SendReject,
                _ => self.ready_message(&message),
            };
        }

        match self.pending_request {
            None => State::SinkReady,
            Some(PortRequest::RequestPower) if !self.received_capabilities.is_empty() => State::SinkEvaluateCaps,
            Some(PortRequest::GetSourceCapabilities) => State::SinkGetSourceCap(ExchangeStep::Send),
            Some(PortRequest::GetSinkCapabilities) => State::SinkGetSinkCap(ExchangeStep::Send),
            Some(request) => self.ready_request(request),
        }
    }

    pub(super) fn sink_transition_default(&mut self, step: SinkDefaultStep) -> State {
        match step {
            SinkDefaultStep::Arm => {
                self.clear_contract();
                self.sink_request = None;

                self.data_role = DataRole::Ufp;
                self.protocol_layer.set_roles(self.power_role, self.data_role);

                self.is_vconn_source = false;
                self.platform.set_vconn_enable(false);

                self.timers.no_response.start();
                State::SinkTransitionDefault(SinkDefaultStep::WaitVSafe0V)
            }
            SinkDefaultStep::WaitVSafe0V => {
                if self.platform.vbus_vsafe0v() || self.timers.no_response.expired() {
                    State::SinkTransitionDefault(SinkDefaultStep::WaitVbus)
                } else {
                    self.state
                }
            }
            SinkDefaultStep::WaitVbus => {
                if !self.platform.vbus_under_5v() || self.timers.no_response.expired() {
                    State::SinkStartup
                } else {
                    self.state
                }
            }
        }
    }
}
