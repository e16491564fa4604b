//! Data role, power role and VCONN swaps, see [8.3.3.19] to [8.3.3.21].
//!
//! Each swap is run by one handler for both the initiating and the responding side. The
//! handlers receive a constructor for their state, so that a sequence stays within the
//! state it was started from.
use super::{ExchangeStep, OnError, PolicyEngine, PrSwapStep, ReplyStep, SendStatus, StartupStep, State, VconnSwapStep};
use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
use crate::protocol_layer::message::header::{ControlMessageType, MessageType};
use crate::timers::TimerType;
use crate::{Driver, PowerRole};

/// Outcome of a swap request, as answered by the port partner.
enum Response {
    Accept,
    Decline,
    Unexpected,
    Pending,
}

impl<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager> PolicyEngine<DRIVER, PLATFORM, DPM> {
    fn take_swap_response(&mut self) -> Response {
        match self.protocol_layer.take_received() {
            Some(message) => match message.message_type() {
                MessageType::Control(ControlMessageType::Accept) => Response::Accept,
                MessageType::Control(ControlMessageType::Reject | ControlMessageType::Wait) => Response::Decline,
                message_type => {
                    debug!("Unexpected {:?} in response to swap", message_type);
                    Response::Unexpected
                }
            },
            None if self.timers.policy.expired() => Response::Decline,
            None => Response::Pending,
        }
    }

    /// Send a swap request, and wait for the response.
    ///
    /// Returns the state to continue with, if any.
    fn request_swap(
        &mut self,
        message_type: ControlMessageType,
        waiting: bool,
        wait_response: State,
        on_accept: impl FnOnce(&mut Self) -> State,
    ) -> State {
        if !waiting {
            return match self.send_control(message_type, OnError::HardReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    self.timers.policy.start(TimerType::SenderResponse);
                    wait_response
                }
                SendStatus::Error(state) => state,
            };
        }

        match self.take_swap_response() {
            Response::Accept => on_accept(self),
            Response::Decline => self.ready_state(),
            Response::Unexpected => self.send_soft_reset(),
            Response::Pending => self.state,
        }
    }

    /// Answer a swap request with accept or reject.
    fn answer_swap(&mut self, accept: bool, on_accept: impl FnOnce(&mut Self) -> State) -> State {
        let message_type = if accept {
            ControlMessageType::Accept
        } else {
            ControlMessageType::Reject
        };

        match self.send_control(message_type, OnError::HardReset) {
            SendStatus::Busy => self.state,
            SendStatus::Success if accept => on_accept(self),
            SendStatus::Success => self.ready_state(),
            SendStatus::Error(state) => state,
        }
    }

    fn swap_data_role(&mut self) -> State {
        self.data_role = self.data_role.swapped();
        info!("Data role is now {:?}", self.data_role);
        self.protocol_layer.set_roles(self.power_role, self.data_role);

        self.ready_state()
    }

    pub(super) fn send_dr_swap(&mut self, step: ExchangeStep) -> State {
        self.request_swap(
            ControlMessageType::DrSwap,
            step == ExchangeStep::WaitResponse,
            State::SendDrSwap(ExchangeStep::WaitResponse),
            Self::swap_data_role,
        )
    }

    pub(super) fn evaluate_dr_swap(&mut self, step: ReplyStep) -> State {
        match step {
            ReplyStep::Evaluate => {
                if self.config.can_swap_data_role && self.device_policy_manager.evaluate_dr_swap(self.data_role) {
                    State::EvaluateDrSwap(ReplyStep::SendAccept)
                } else {
                    State::EvaluateDrSwap(ReplyStep::SendReject)
                }
            }
            ReplyStep::SendAccept => self.answer_swap(true, Self::swap_data_role),
            ReplyStep::SendReject => self.answer_swap(false, Self::swap_data_role),
        }
    }

    fn begin_power_role_swap(&mut self, wrap: fn(PrSwapStep) -> State) -> State {
        info!("Power role swap as {:?}", self.power_role);
        self.timers.pr_swap_bailout.start(TimerType::PRSwapBailout);
        self.platform.disable_type_c_state_machine();

        match self.power_role {
            PowerRole::Source => {
                self.timers.policy.start(TimerType::SrcTransition);
                wrap(PrSwapStep::WaitSrcTransition)
            }
            PowerRole::Sink => {
                self.timers.policy.start(TimerType::PSSourceOff);
                wrap(PrSwapStep::WaitSourceOff)
            }
        }
    }

    /// Resume CC monitoring, however the swap ended.
    pub(super) fn end_power_role_swap(&mut self) {
        self.timers.pr_swap_bailout.stop();
        self.platform.enable_type_c_state_machine();
    }

    /// Run a power role swap step, see [8.3.3.19.3] and [8.3.3.19.5].
    pub(super) fn pr_swap(&mut self, step: PrSwapStep, wrap: fn(PrSwapStep) -> State) -> State {
        match step {
            PrSwapStep::Send | PrSwapStep::WaitResponse => self.request_swap(
                ControlMessageType::PrSwap,
                step == PrSwapStep::WaitResponse,
                wrap(PrSwapStep::WaitResponse),
                |engine| engine.begin_power_role_swap(wrap),
            ),
            PrSwapStep::Evaluate => {
                let can_take_other_role = match self.power_role {
                    PowerRole::Source => self.config.can_sink,
                    PowerRole::Sink => self.config.can_source,
                };

                if self.config.can_swap_power_role
                    && can_take_other_role
                    && self.device_policy_manager.evaluate_pr_swap(self.power_role)
                {
                    wrap(PrSwapStep::SendAccept)
                } else {
                    wrap(PrSwapStep::SendReject)
                }
            }
            PrSwapStep::SendAccept => self.answer_swap(true, |engine| engine.begin_power_role_swap(wrap)),
            PrSwapStep::SendReject => self.answer_swap(false, |engine| engine.ready_state()),

            // Source to sink
            PrSwapStep::WaitSrcTransition => {
                if !self.timers.policy.expired() {
                    return self.state;
                }

                self.platform.set_vbus_5v_enable(false);
                self.platform.set_vbus_lvl1_enable(false);
                self.clear_contract();
                self.platform.role_swap_to_attached_sink();

                self.power_role = PowerRole::Sink;
                self.protocol_layer.set_roles(self.power_role, self.data_role);

                self.timers.policy.start(TimerType::Safe0V);
                wrap(PrSwapStep::WaitVSafe0V)
            }
            PrSwapStep::WaitVSafe0V => {
                if self.platform.vbus_vsafe0v() || self.timers.policy.expired() {
                    wrap(PrSwapStep::SendPsRdyAsSink)
                } else {
                    self.state
                }
            }
            PrSwapStep::SendPsRdyAsSink => match self.send_control(ControlMessageType::PsRdy, OnError::ErrorRecovery) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    self.timers.policy.start(TimerType::PSSourceOn);
                    wrap(PrSwapStep::WaitSourceOn)
                }
                SendStatus::Error(state) => state,
            },
            PrSwapStep::WaitSourceOn => match self.protocol_layer.take_received() {
                Some(message) if message.is_control(ControlMessageType::PsRdy) => State::SinkStartup,
                Some(message) => {
                    debug!("Ignored {:?} while waiting for new source", message.message_type());
                    self.state
                }
                None if self.timers.policy.expired() => {
                    warn!("New source did not turn on");
                    State::ErrorRecovery
                }
                None => self.state,
            },

            // Sink to source
            PrSwapStep::WaitSourceOff => match self.protocol_layer.take_received() {
                Some(message) if message.is_control(ControlMessageType::PsRdy) => {
                    self.clear_contract();
                    self.platform.role_swap_to_attached_source();

                    self.power_role = PowerRole::Source;
                    self.protocol_layer.set_roles(self.power_role, self.data_role);

                    self.platform.set_vbus_5v_enable(true);
                    self.timers.policy.start(TimerType::SrcTurnOn);
                    wrap(PrSwapStep::WaitVbusOn)
                }
                Some(message) => {
                    debug!("Ignored {:?} while waiting for old source", message.message_type());
                    self.state
                }
                None if self.timers.policy.expired() => {
                    warn!("Old source did not turn off");
                    State::ErrorRecovery
                }
                None => self.state,
            },
            PrSwapStep::WaitVbusOn => {
                if !self.platform.vbus_under_5v() {
                    wrap(PrSwapStep::SendPsRdyAsSource)
                } else if self.timers.policy.expired() {
                    warn!("VBUS did not turn on");
                    State::ErrorRecovery
                } else {
                    self.state
                }
            }
            PrSwapStep::SendPsRdyAsSource => {
                match self.send_control(ControlMessageType::PsRdy, OnError::ErrorRecovery) {
                    SendStatus::Busy => self.state,
                    SendStatus::Success => {
                        self.timers.policy.start(TimerType::SwapSourceStart);
                        State::SourceStartup(StartupStep::WaitSwapSourceStart)
                    }
                    SendStatus::Error(state) => state,
                }
            }
        }
    }

    fn begin_vconn_swap(&mut self, wrap: fn(VconnSwapStep) -> State) -> State {
        if self.is_vconn_source {
            self.timers.policy.start(TimerType::VCONNSourceOn);
            wrap(VconnSwapStep::WaitPartnerVconn)
        } else {
            self.platform.set_vconn_enable(true);
            self.is_vconn_source = true;
            self.timers.policy.start(TimerType::VCONNOn);
            wrap(VconnSwapStep::WaitVconnOn)
        }
    }

    /// Run a VCONN swap step, see [8.3.3.19.6] and [8.3.3.19.7].
    pub(super) fn vconn_swap(&mut self, step: VconnSwapStep, wrap: fn(VconnSwapStep) -> State) -> State {
        match step {
            VconnSwapStep::Send | VconnSwapStep::WaitResponse => self.request_swap(
                ControlMessageType::VconnSwap,
                step == VconnSwapStep::WaitResponse,
                wrap(VconnSwapStep::WaitResponse),
                |engine| engine.begin_vconn_swap(wrap),
            ),
            VconnSwapStep::Evaluate => {
                if (self.is_vconn_source || self.config.can_source_vconn)
                    && self.device_policy_manager.evaluate_vconn_swap(self.is_vconn_source)
                {
                    wrap(VconnSwapStep::SendAccept)
                } else {
                    wrap(VconnSwapStep::SendReject)
                }
            }
            VconnSwapStep::SendAccept => self.answer_swap(true, |engine| engine.begin_vconn_swap(wrap)),
            VconnSwapStep::SendReject => self.answer_swap(false, |engine| engine.ready_state()),
            VconnSwapStep::WaitPartnerVconn => match self.protocol_layer.take_received() {
                Some(message) if message.is_control(ControlMessageType::PsRdy) => {
                    self.platform.set_vconn_enable(false);
                    self.is_vconn_source = false;
                    info!("VCONN handed over");
                    self.ready_state()
                }
                Some(message) => {
                    debug!("Ignored {:?} during VCONN swap", message.message_type());
                    self.state
                }
                None if self.timers.policy.expired() => {
                    warn!("Port partner did not turn on VCONN");
                    self.send_hard_reset()
                }
                None => self.state,
            },
            VconnSwapStep::WaitVconnOn => {
                if self.timers.policy.expired() {
                    wrap(VconnSwapStep::SendPsRdy)
                } else {
                    self.state
                }
            }
            VconnSwapStep::SendPsRdy => match self.send_control(ControlMessageType::PsRdy, OnError::HardReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    info!("VCONN taken over");
                    self.ready_state()
                }
                SendStatus::Error(state) => state,
            },
        }
    }
}
