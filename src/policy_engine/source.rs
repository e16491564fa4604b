//! Source states, see [8.3.3.2].
use super::{
    ExchangeStep, GotoMinStep, OnError, PolicyEngine, PortRequest, SendCapsStep, SendStatus, SourceDefaultStep,
    StartupStep, State, TimedStep, TransitionSupplyStep,
};
use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
use crate::protocol_layer::message::header::{ControlMessageType, DataMessageType, MessageType};
use crate::protocol_layer::message::pdo::{Capabilities, PowerDataObject};
use crate::protocol_layer::message::request::{BatteryRequest, FixedVariableRequest, RawRequest};
use crate::timers::TimerType;
use crate::{DataRole, Driver, PowerRole};

/// Fixed supply voltage of vSafe5V, in 50 mV units.
const VSAFE5V_RAW: u16 = 100;

/// Whether a source can satisfy the request with its capabilities.
///
/// The object at the requested position must exist, and the requested operating current (or
/// power, for batteries) must not exceed what it offers.
pub(super) fn request_is_valid(capabilities: &Capabilities, request: RawRequest) -> bool {
    match capabilities.at_position(request.object_position()) {
        Some(PowerDataObject::FixedSupply(supply)) => {
            FixedVariableRequest(request.0).raw_operating_current() <= supply.raw_max_current()
        }
        Some(PowerDataObject::VariableSupply(supply)) => {
            FixedVariableRequest(request.0).raw_operating_current() <= supply.raw_max_current()
        }
        Some(PowerDataObject::Battery(supply)) => {
            BatteryRequest(request.0).raw_operating_power() <= supply.raw_max_power()
        }
        Some(PowerDataObject::Unknown(_)) | None => false,
    }
}

impl<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager> PolicyEngine<DRIVER, PLATFORM, DPM> {
    pub(super) fn source_startup(&mut self, step: StartupStep) -> State {
        match step {
            StartupStep::Reset => {
                self.caps_counter.reset();
                self.collision_counter.reset();
                self.clear_contract();
                self.protocol_layer.reset();
                self.protocol_layer.set_roles(self.power_role, self.data_role);
                self.timers.policy.stop();

                self.enter_source_send_caps()
            }
            StartupStep::WaitSwapSourceStart => {
                if self.timers.policy.expired() {
                    State::SourceStartup(StartupStep::Reset)
                } else {
                    self.state
                }
            }
        }
    }

    /// Give up on a port partner that does not respond to hard resets, see [8.3.3.2.2].
    fn source_give_up(&self) -> Option<State> {
        if self.hard_reset_counter.exceeded() && self.timers.no_response.expired() {
            Some(if self.had_contract {
                State::ErrorRecovery
            } else {
                State::SourceDisabled
            })
        } else {
            None
        }
    }

    pub(super) fn enter_source_send_caps(&mut self) -> State {
        if let Some(state) = self.source_give_up() {
            return state;
        }

        if self.caps_counter.increment().is_err() {
            info!("No response to source capabilities");
            return State::SourceDisabled;
        }

        State::SourceSendCaps(SendCapsStep::Send)
    }

    pub(super) fn source_discovery(&mut self, step: TimedStep) -> State {
        match step {
            TimedStep::Arm => {
                self.timers.policy.start(TimerType::TypeCSendSourceCap);
                State::SourceDiscovery(TimedStep::Wait)
            }
            TimedStep::Wait => {
                if let Some(state) = self.source_give_up() {
                    state
                } else if self.timers.no_response.expired() && !self.hard_reset_counter.exceeded() {
                    self.send_hard_reset()
                } else if self.timers.policy.expired() {
                    self.enter_source_send_caps()
                } else {
                    self.state
                }
            }
        }
    }

    pub(super) fn source_send_caps(&mut self, step: SendCapsStep) -> State {
        match step {
            SendCapsStep::Send => {
                let on_error = if self.contract.is_some() {
                    OnError::SoftReset
                } else {
                    OnError::Goto(State::SourceDiscovery(TimedStep::Arm))
                };
                let objects = self.config.source_capabilities.objects.clone();

                match self.send_data(DataMessageType::SourceCapabilities, &objects, on_error) {
                    SendStatus::Busy => self.state,
                    SendStatus::Success => {
                        self.hard_reset_counter.reset();
                        self.caps_counter.reset();
                        self.timers.no_response.disable();
                        self.timers.policy.start(TimerType::SenderResponse);
                        State::SourceSendCaps(SendCapsStep::WaitRequest)
                    }
                    SendStatus::Error(state) => state,
                }
            }
            SendCapsStep::WaitRequest => match self.protocol_layer.take_received() {
                Some(message) if message.is_data(DataMessageType::Request) => match message.objects.first() {
                    Some(object) => State::SourceNegotiateCap(RawRequest(*object)),
                    None => self.send_soft_reset(),
                },
                Some(message) => {
                    debug!("Expected request, got {:?}", message.message_type());
                    self.send_soft_reset()
                }
                None if self.timers.policy.expired() => {
                    warn!("No request from sink");
                    self.send_hard_reset()
                }
                None => self.state,
            },
        }
    }

    pub(super) fn source_negotiate_cap(&mut self, request: RawRequest) -> State {
        if request_is_valid(&self.config.source_capabilities, request) {
            State::SourceTransitionSupply(TransitionSupplyStep::SendAccept(request))
        } else {
            info!("Reject request for position {}", request.object_position());
            State::SourceCapabilityResponse
        }
    }

    pub(super) fn source_transition_supply(&mut self, step: TransitionSupplyStep) -> State {
        match step {
            TransitionSupplyStep::SendAccept(request) => {
                match self.send_control(ControlMessageType::Accept, OnError::SoftReset) {
                    SendStatus::Busy => self.state,
                    SendStatus::Success => State::SourceTransitionSupply(TransitionSupplyStep::ArmTransition(request)),
                    SendStatus::Error(state) => state,
                }
            }
            TransitionSupplyStep::ArmTransition(request) => {
                self.timers.policy.start(TimerType::SrcTransition);
                State::SourceTransitionSupply(TransitionSupplyStep::WaitTransition(request))
            }
            TransitionSupplyStep::WaitTransition(request) => {
                if self.timers.policy.expired() {
                    State::SourceTransitionSupply(TransitionSupplyStep::ChangeSupply(request))
                } else {
                    self.state
                }
            }
            TransitionSupplyStep::ChangeSupply(request) => {
                self.set_contract(request);

                let is_vsafe5v = matches!(
                    self.config.source_capabilities.at_position(request.object_position()),
                    Some(PowerDataObject::FixedSupply(supply)) if supply.raw_voltage() == VSAFE5V_RAW
                );

                // Make before break.
                if is_vsafe5v {
                    self.platform.set_vbus_5v_enable(true);
                    self.platform.set_vbus_lvl1_enable(false);
                } else {
                    self.platform.set_vbus_lvl1_enable(true);
                    self.platform.set_vbus_5v_enable(false);
                }

                self.timers.policy.start_millis(self.config.vbus_transition_time_ms);
                State::SourceTransitionSupply(TransitionSupplyStep::WaitVbusSettle)
            }
            TransitionSupplyStep::WaitVbusSettle => {
                if self.timers.policy.expired() {
                    State::SourceTransitionSupply(TransitionSupplyStep::SendPsRdy)
                } else {
                    self.state
                }
            }
            TransitionSupplyStep::SendPsRdy => match self.send_control(ControlMessageType::PsRdy, OnError::HardReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => State::SourceReady,
                SendStatus::Error(state) => state,
            },
        }
    }

    pub(super) fn source_capability_response(&mut self) -> State {
        match self.send_control(ControlMessageType::Reject, OnError::SoftReset) {
            SendStatus::Busy => self.state,
            SendStatus::Success if self.contract.is_some() => State::SourceReady,
            // Without a contract, a rejected request cannot fall back to anything.
            SendStatus::Success => self.send_hard_reset(),
            SendStatus::Error(state) => state,
        }
    }

    pub(super) fn source_ready(&mut self) -> State {
        if let Some(message) = self.protocol_layer.take_received() {
            return match message.message_type() {
                MessageType::Control(ControlMessageType::GetSourceCap) => State::SourceGiveSourceCaps,
                MessageType::Control(ControlMessageType::GetSinkCap) if self.config.is_dual_role() => {
                    State::SourceGiveSinkCaps
                }
                MessageType::Control(ControlMessageType::GetSinkCap) => State::SendReject,
                MessageType::Data(DataMessageType::Request) => match message.objects.first() {
                    Some(object) => State::SourceNegotiateCap(RawRequest(*object)),
                    None => self.send_soft_reset(),
                },
                MessageType::Data(DataMessageType::SinkCapabilities) => {
                    self.store_received_capabilities(PowerRole::Sink, &message);
                    State::SourceReady
                }
                _ => self.ready_message(&message),
            };
        }

        if core::mem::take(&mut self.readvertise) {
            return self.enter_source_send_caps();
        }

        match self.pending_request {
            None => State::SourceReady,
            Some(PortRequest::SendSourceCapabilities) => self.enter_source_send_caps(),
            Some(PortRequest::GetSinkCapabilities) => State::SourceGetSinkCaps(ExchangeStep::Send),
            Some(PortRequest::GetSourceCapabilities) if self.config.is_dual_role() => {
                State::SourceGetSourceCaps(ExchangeStep::Send)
            }
            Some(PortRequest::Ping) => State::SourceSendPing,
            Some(PortRequest::GotoMin) => State::SourceGotoMin(GotoMinStep::Send),
            Some(request) => self.ready_request(request),
        }
    }

    pub(super) fn source_send_ping(&mut self) -> State {
        match self.send_control(ControlMessageType::Ping, OnError::SoftReset) {
            SendStatus::Busy => self.state,
            SendStatus::Success => State::SourceReady,
            SendStatus::Error(state) => state,
        }
    }

    pub(super) fn source_goto_min(&mut self, step: GotoMinStep) -> State {
        match step {
            GotoMinStep::Send => match self.send_control(ControlMessageType::GotoMin, OnError::SoftReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    self.timers.policy.start(TimerType::SrcTransition);
                    State::SourceGotoMin(GotoMinStep::WaitSettle)
                }
                SendStatus::Error(state) => state,
            },
            GotoMinStep::WaitSettle => {
                if self.timers.policy.expired() {
                    State::SourceGotoMin(GotoMinStep::SendPsRdy)
                } else {
                    self.state
                }
            }
            GotoMinStep::SendPsRdy => match self.send_control(ControlMessageType::PsRdy, OnError::HardReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => State::SourceReady,
                SendStatus::Error(state) => state,
            },
        }
    }

    pub(super) fn source_transition_default(&mut self, step: SourceDefaultStep) -> State {
        match step {
            SourceDefaultStep::WaitHardReset => {
                if !self.timers.policy.expired() {
                    return self.state;
                }

                self.clear_contract();
                self.platform.set_vbus_5v_enable(false);
                self.platform.set_vbus_lvl1_enable(false);

                self.data_role = DataRole::Dfp;
                self.protocol_layer.set_roles(self.power_role, self.data_role);

                self.is_vconn_source = self.config.can_source_vconn;
                self.platform.set_vconn_enable(self.is_vconn_source);

                self.timers.policy.start(TimerType::Safe0V);
                State::SourceTransitionDefault(SourceDefaultStep::WaitVSafe0V)
            }
            SourceDefaultStep::WaitVSafe0V => {
                if self.platform.vbus_vsafe0v() || self.timers.policy.expired() {
                    self.timers.policy.start(TimerType::SrcRecover);
                    State::SourceTransitionDefault(SourceDefaultStep::WaitRecover)
                } else {
                    self.state
                }
            }
            SourceDefaultStep::WaitRecover => {
                if self.timers.policy.expired() {
                    State::SourceTransitionDefault(SourceDefaultStep::PowerOn)
                } else {
                    self.state
                }
            }
            SourceDefaultStep::PowerOn => {
                self.platform.set_vbus_5v_enable(true);
                self.timers.no_response.start();

                State::SourceStartup(StartupStep::Reset)
            }
        }
    }
}
