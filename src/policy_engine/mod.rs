//! The policy engine drives a port through contract negotiation, role swaps, BIST, and the
//! soft reset, hard reset and error recovery ladder.
//!
//! It is a non-blocking state machine. Every call of [`PolicyEngine::run_policy`] runs exactly
//! one state handler, and all waiting is expressed through the policy [`Timers`].
//!
//! See [8.3].
mod bist;
mod sink;
mod source;
mod swap;


use embassy_futures::select::{Either, select};
pub use sink::select_capability;

use crate::config::PortConfig;
use crate::counters::{Counter, CounterType};
use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
use crate::protocol_layer::message::Message;
use crate::protocol_layer::message::header::{
    ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision,
};
use crate::protocol_layer::message::pdo::Capabilities;
use crate::protocol_layer::message::request::{FixedVariableRequest, RawRequest};
use crate::protocol_layer::{self, Error as ProtocolError, ProtocolLayer, TxStatus};
#[cfg(feature = "state-log")]
use crate::state_log::{LoggedMessage, StateLog, StateLogEntry};
use crate::timers::{TICK_PERIOD_US, Timer, TimerType, Timers};
use crate::{DataRole, Driver, PowerRole};

/// Steps of a state that waits for a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimedStep {
    /// Start the timer.
    Arm,
    /// Wait for the timer, or an event.
    Wait,
}

/// Steps of a state that sends a message, and waits for the port partner's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExchangeStep {
    /// Send the message.
    Send,
    /// Wait for the response, bounded by `tSenderResponse`.
    WaitResponse,
}

/// Steps of answering a request of the port partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum ReplyStep {
    Evaluate,
    SendAccept,
    SendReject,
}

/// Steps of the source startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StartupStep {
    /// Reset counters and the protocol layer.
    Reset,
    /// Wait `tSwapSourceStart` after becoming source by a power role swap.
    WaitSwapSourceStart,
}

/// Steps of sending source capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum SendCapsStep {
    Send,
    WaitRequest,
}

/// Steps of a source's supply transition, after accepting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum TransitionSupplyStep {
    SendAccept(RawRequest),
    ArmTransition(RawRequest),
    WaitTransition(RawRequest),
    ChangeSupply(RawRequest),
    WaitVbusSettle,
    SendPsRdy,
}

/// Steps of a source's GotoMin sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum GotoMinStep {
    Send,
    WaitSettle,
    SendPsRdy,
}

/// Steps of sending a soft reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum SoftResetStep {
    Send,
    WaitAccept,
}

/// Steps of a source's return to default power after a hard reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum SourceDefaultStep {
    WaitHardReset,
    WaitVSafe0V,
    WaitRecover,
    PowerOn,
}

/// Steps of a sink's return to default power after a hard reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum SinkDefaultStep {
    Arm,
    WaitVSafe0V,
    WaitVbus,
}

/// Steps of a power role swap.
///
/// After acceptance, a source runs the `*AsSink` sequence towards becoming sink, and a sink the
/// `*AsSource` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum PrSwapStep {
    Send,
    WaitResponse,
    Evaluate,
    SendAccept,
    SendReject,
    // Source to sink
    WaitSrcTransition,
    WaitVSafe0V,
    SendPsRdyAsSink,
    WaitSourceOn,
    // Sink to source
    WaitSourceOff,
    WaitVbusOn,
    SendPsRdyAsSource,
}

impl PrSwapStep {
    /// Whether the power supply changes hands in this step.
    pub fn in_transition(self) -> bool {
        !matches!(
            self,
            Self::Send | Self::WaitResponse | Self::Evaluate | Self::SendAccept | Self::SendReject
        )
    }
}

/// Steps of a VCONN swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum VconnSwapStep {
    Send,
    WaitResponse,
    Evaluate,
    SendAccept,
    SendReject,
    WaitPartnerVconn,
    WaitVconnOn,
    SendPsRdy,
}

/// Policy engine states.
///
/// States with multiple steps carry their step, so that only valid combinations exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum State {
    Disabled,
    ErrorRecovery,
    /// Reject a request of the port partner, then return to the ready state.
    SendReject,

    // Source states, see [8.3.3.2]
    SourceStartup(StartupStep),
    SourceDiscovery(TimedStep),
    SourceSendCaps(SendCapsStep),
    SourceDisabled,
    SourceNegotiateCap(RawRequest),
    SourceTransitionSupply(TransitionSupplyStep),
    SourceCapabilityResponse,
    SourceReady,
    SourceGiveSourceCaps,
    SourceGetSinkCaps(ExchangeStep),
    SourceGiveSinkCaps,
    SourceGetSourceCaps(ExchangeStep),
    SourceSendPing,
    SourceGotoMin(GotoMinStep),
    SourceSendSoftReset(SoftResetStep),
    SourceSoftReset,
    SourceSendHardReset,
    SourceTransitionDefault(SourceDefaultStep),

    // Sink states, see [8.3.3.3]
    SinkStartup,
    SinkDiscovery,
    SinkWaitCaps(TimedStep),
    SinkEvaluateCaps,
    SinkSelectCapability(ExchangeStep),
    SinkTransitionSink,
    SinkReady,
    SinkGiveSinkCap,
    SinkGetSourceCap(ExchangeStep),
    SinkGetSinkCap(ExchangeStep),
    SinkGiveSourceCap,
    SinkSendSoftReset(SoftResetStep),
    SinkSoftReset,
    SinkSendHardReset,
    SinkTransitionDefault(SinkDefaultStep),

    // Swaps, for both power roles
    SendDrSwap(ExchangeStep),
    EvaluateDrSwap(ReplyStep),
    SendPrSwap(PrSwapStep),
    EvaluatePrSwap(PrSwapStep),
    SendVconnSwap(VconnSwapStep),
    EvaluateVconnSwap(VconnSwapStep),

    // BIST
    BistCarrierMode2(TimedStep),
    BistTestData,
}

impl State {
    /// Whether the state is part of a power role swap, after it was accepted.
    pub fn in_power_role_swap(self) -> bool {
        matches!(self, State::SendPrSwap(step) | State::EvaluatePrSwap(step) if step.in_transition())
    }

    /// Whether VBUS is changing in this state.
    ///
    /// A soft reset cannot recover from protocol errors here, see [6.8.1].
    fn in_power_transition(self) -> bool {
        self.in_power_role_swap()
            || matches!(
                self,
                State::SourceTransitionSupply(_)
                    | State::SinkTransitionSink
                    | State::SourceGotoMin(GotoMinStep::WaitSettle | GotoMinStep::SendPsRdy)
            )
    }

    /// Whether a received soft reset applies in this state.
    fn accepts_soft_reset(self) -> bool {
        !matches!(
            self,
            State::Disabled
                | State::ErrorRecovery
                | State::SourceStartup(_)
                | State::SourceDisabled
                | State::SourceSendHardReset
                | State::SourceTransitionDefault(_)
                | State::SinkStartup
                | State::SinkDiscovery
                | State::SinkSendHardReset
                | State::SinkTransitionDefault(_)
                | State::BistCarrierMode2(_)
                | State::BistTestData
        )
    }

    fn is_sending_soft_reset(self) -> bool {
        matches!(
            self,
            State::SourceSendSoftReset(_) | State::SourceSoftReset | State::SinkSendSoftReset(_) | State::SinkSoftReset
        )
    }
}

/// Requests of the host or the device policy manager, served in ready states.
///
/// A request is only valid for the dispatch pass that follows it. It is dropped, if the policy
/// engine is not ready, or if it does not apply to the current role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortRequest {
    /// Advertise the source capabilities again (source).
    SendSourceCapabilities,
    /// Ask the port partner for its sink capabilities.
    GetSinkCapabilities,
    /// Ask the port partner for its source capabilities.
    GetSourceCapabilities,
    /// Initiate a data role swap.
    DrSwap,
    /// Initiate a power role swap.
    PrSwap,
    /// Initiate a VCONN swap.
    VconnSwap,
    /// Send a ping (source).
    Ping,
    /// Ask the sink to reduce its current to the minimum (source).
    GotoMin,
    /// Evaluate the last source capabilities again, and request power (sink).
    RequestPower,
    /// Send a soft reset.
    SoftReset,
    /// Send a hard reset.
    HardReset,
    /// Transmit the BIST carrier mode 2 pattern.
    BistCarrierMode2,
}

/// Reasons for aborting the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AbortReason {
    /// The port partner signalled a hard reset.
    HardResetReceived,
    /// The port partner sent a soft reset.
    SoftResetReceived,
    /// The power role swap did not complete within `tPRSwapBailout`.
    PrSwapBailout,
    /// PD is being disabled.
    Disable,
}

/// Outcome of a send helper call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendStatus {
    /// Not done yet, call again in the next pass.
    Busy,
    /// The port partner acknowledged the message.
    Success,
    /// Sending failed. Holds the escalation state.
    Error(State),
}

/// How to escalate a failed transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnError {
    SoftReset,
    HardReset,
    ErrorRecovery,
    Goto(State),
}

/// Errors when replacing the local capabilities.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteCapabilitiesError {
    /// A capability set needs at least one object.
    #[error("no power data objects")]
    Empty,
    /// The capability set is for the other power role.
    #[error("capabilities are for the wrong power role")]
    WrongRole,
    /// Source capabilities must start with a vSafe5V fixed supply.
    #[error("first source capability is not vSafe5V")]
    NoVSafe5V,
}

/// A snapshot of the port status.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortStatus {
    /// PD is enabled.
    pub enabled: bool,
    /// The policy state.
    pub state: State,
    /// The protocol layer state.
    pub protocol_state: protocol_layer::State,
    /// The outcome of the last transmission request.
    pub tx_status: TxStatus,
    /// The power role.
    pub power_role: PowerRole,
    /// The data role.
    pub data_role: DataRole,
    /// The port supplies VCONN.
    pub is_vconn_source: bool,
    /// The contract's request data object, or zero.
    pub contract_object: u32,
    /// The number of source capability messages sent without response.
    pub caps_counter: u8,
    /// The number of hard resets without successful negotiation.
    pub hard_reset_counter: u8,
    /// The local source capabilities.
    pub source_capabilities: Capabilities,
    /// The local sink capabilities.
    pub sink_capabilities: Capabilities,
    /// The capabilities that the port partner advertised last.
    pub received_capabilities: Capabilities,
}

impl PortStatus {
    /// Whether an explicit contract exists.
    pub fn has_contract(&self) -> bool {
        self.contract_object != 0
    }
}

/// The policy engine of one PD port.
#[derive(Debug)]
pub struct PolicyEngine<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager> {
    protocol_layer: ProtocolLayer<DRIVER>,
    platform: PLATFORM,
    device_policy_manager: DPM,
    config: PortConfig,

    enabled: bool,
    state: State,
    last_state: State,

    power_role: PowerRole,
    data_role: DataRole,
    is_vconn_source: bool,

    contract: Option<RawRequest>,
    /// A contract existed since PD was enabled, even if a hard reset cleared it.
    had_contract: bool,
    sink_request: Option<FixedVariableRequest>,
    received_capabilities: Capabilities,
    readvertise: bool,
    pending_request: Option<PortRequest>,

    timers: Timers,
    caps_counter: Counter,
    hard_reset_counter: Counter,
    collision_counter: Counter,
    bist_frames: u32,

    #[cfg(feature = "state-log")]
    state_log: StateLog,
}

impl<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager> PolicyEngine<DRIVER, PLATFORM, DPM> {
    /// Create a new, disabled policy engine.
    pub fn new(driver: DRIVER, platform: PLATFORM, device_policy_manager: DPM, config: PortConfig) -> Self {
        let header = Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R2_0);

        Self {
            protocol_layer: ProtocolLayer::new(driver, header),
            platform,
            device_policy_manager,
            config,

            enabled: false,
            state: State::Disabled,
            last_state: State::Disabled,

            power_role: PowerRole::Sink,
            data_role: DataRole::Ufp,
            is_vconn_source: false,

            contract: None,
            had_contract: false,
            sink_request: None,
            received_capabilities: Capabilities::new(PowerRole::Source),
            readvertise: false,
            pending_request: None,

            timers: Timers::default(),
            caps_counter: Counter::new(CounterType::Caps),
            hard_reset_counter: Counter::new(CounterType::HardReset),
            collision_counter: Counter::new(CounterType::Collision),
            bist_frames: 0,

            #[cfg(feature = "state-log")]
            state_log: StateLog::new(),
        }
    }

    /// Enable PD on an attached port, as source or sink.
    ///
    /// Called by the Type-C state machine on attach. All policy variables are initialized.
    pub fn enable(&mut self, is_source: bool) {
        self.power_role = is_source.into();
        self.data_role = is_source.into();
        info!("Enable PD as {:?}", self.power_role);

        self.is_vconn_source = is_source && self.config.can_source_vconn;
        self.contract = None;
        self.had_contract = false;
        self.sink_request = None;
        self.received_capabilities = Capabilities::new(self.partner_role());
        self.readvertise = false;
        self.pending_request = None;

        self.timers = Timers::default();
        self.caps_counter.reset();
        self.hard_reset_counter.reset();
        self.collision_counter.reset();
        self.bist_frames = 0;

        self.protocol_layer.enable(self.power_role, self.data_role);
        self.platform.enable_timer(true);
        self.enabled = true;

        self.state = match self.power_role {
            PowerRole::Source => State::SourceStartup(StartupStep::Reset),
            PowerRole::Sink => State::SinkStartup,
        };
        self.log_transition();
    }

    /// Disable PD, e.g. on detach.
    pub fn disable(&mut self) {
        if self.enabled {
            self.abort(AbortReason::Disable);
        }

        info!("Disable PD");
        self.clear_contract();
        self.shut_down();
        self.log_transition();
    }

    fn shut_down(&mut self) {
        self.protocol_layer.disable();
        self.platform.enable_timer(false);
        self.enabled = false;
    }

    /// Advance all timers by one tick. Must be called every 100 µs while PD is enabled.
    pub fn tick(&mut self) {
        self.timers.tick();
    }

    /// Run the protocol layer for one pass.
    pub fn run_protocol(&mut self) {
        self.protocol_layer.run();
    }

    /// Run the policy engine for one pass.
    pub fn run_policy(&mut self) {
        if !self.enabled {
            self.pending_request = None;
            return;
        }

        if self.protocol_layer.take_hard_reset_received() {
            self.abort(AbortReason::HardResetReceived);
        } else if self.take_soft_reset() {
            self.abort(AbortReason::SoftResetReceived);
        } else if self.state.in_power_role_swap() && self.timers.pr_swap_bailout.expired() {
            self.abort(AbortReason::PrSwapBailout);
        } else {
            let swapping_power_role = self.state.in_power_role_swap();
            self.state = self.update_state();

            if swapping_power_role && !self.state.in_power_role_swap() {
                self.end_power_role_swap();
            }
        }

        self.log_transition();
        self.pending_request = None;
    }

    /// Tick the timers, then run the protocol layer and the policy engine.
    pub fn step(&mut self) {
        self.tick();
        self.run_protocol();
        self.run_policy();
    }

    /// Wait for the next tick or PHY interrupt, and run one pass.
    pub async fn run_once<TIMER: Timer>(&mut self) {
        let tick = TIMER::after_micros(TICK_PERIOD_US.into());
        let interrupt = self.protocol_layer.driver().wait_for_interrupt();

        if let Either::First(()) = select(tick, interrupt).await {
            self.tick();
        }

        self.run_protocol();
        self.run_policy();
    }

    /// Run the port forever.
    pub async fn run<TIMER: Timer>(&mut self) -> ! {
        loop {
            self.run_once::<TIMER>().await;
        }
    }

    /// Abort the current state.
    ///
    /// Clears the in-flight transmission and the pending request, and enters the state that
    /// handles `reason`.
    pub fn abort(&mut self, reason: AbortReason) {
        debug!("Abort {:?} in {:?}", reason, self.state);

        if self.state.in_power_role_swap() {
            self.end_power_role_swap();
        }

        self.protocol_layer.cancel_transmit();
        self.pending_request = None;
        self.timers.reset();

        if matches!(self.state, State::BistCarrierMode2(_)) {
            self.protocol_layer.driver().set_bist_carrier_mode2(false);
        }

        self.state = match reason {
            AbortReason::HardResetReceived => {
                self.device_policy_manager.hard_reset();
                self.transition_default()
            }
            AbortReason::SoftResetReceived if self.state.in_power_transition() => self.send_hard_reset(),
            AbortReason::SoftResetReceived => match self.power_role {
                PowerRole::Source => State::SourceSoftReset,
                PowerRole::Sink => State::SinkSoftReset,
            },
            AbortReason::PrSwapBailout => {
                warn!("Power role swap bailout");
                State::ErrorRecovery
            }
            AbortReason::Disable => State::Disabled,
        };
    }

    /// Queue a request for the next dispatch pass.
    pub fn request(&mut self, request: PortRequest) {
        self.pending_request = Some(request);
    }

    /// Replace the source capabilities.
    ///
    /// If the port is a ready source, the new capabilities are advertised right away.
    pub fn write_source_capabilities(&mut self, capabilities: Capabilities) -> Result<(), WriteCapabilitiesError> {
        Self::validate_capabilities(&capabilities, PowerRole::Source)?;
        if !capabilities.starts_with_vsafe5v() {
            return Err(WriteCapabilitiesError::NoVSafe5V);
        }

        self.config.source_capabilities = capabilities;
        self.readvertise = self.enabled && self.power_role == PowerRole::Source;
        Ok(())
    }

    /// Replace the sink capabilities. They are sent on the next request of the port partner.
    pub fn write_sink_capabilities(&mut self, capabilities: Capabilities) -> Result<(), WriteCapabilitiesError> {
        Self::validate_capabilities(&capabilities, PowerRole::Sink)?;
        self.config.sink_capabilities = capabilities;
        Ok(())
    }

    fn validate_capabilities(capabilities: &Capabilities, role: PowerRole) -> Result<(), WriteCapabilitiesError> {
        if capabilities.is_empty() {
            Err(WriteCapabilitiesError::Empty)
        } else if capabilities.role != role {
            Err(WriteCapabilitiesError::WrongRole)
        } else {
            Ok(())
        }
    }

    /// A snapshot of the port status.
    pub fn status(&self) -> PortStatus {
        PortStatus {
            enabled: self.enabled,
            state: self.state,
            protocol_state: self.protocol_layer.state(),
            tx_status: self.protocol_layer.tx_status(),
            power_role: self.power_role,
            data_role: self.data_role,
            is_vconn_source: self.is_vconn_source,
            contract_object: self.contract_object(),
            caps_counter: self.caps_counter.value(),
            hard_reset_counter: self.hard_reset_counter.value(),
            source_capabilities: self.config.source_capabilities.clone(),
            sink_capabilities: self.config.sink_capabilities.clone(),
            received_capabilities: self.received_capabilities.clone(),
        }
    }

    /// Take all logged state transitions, oldest first.
    #[cfg(feature = "state-log")]
    pub fn drain_state_log(&mut self) -> impl Iterator<Item = StateLogEntry> + '_ {
        core::iter::from_fn(move || self.state_log.pop())
    }

    /// Take all logged messages, oldest first.
    #[cfg(feature = "state-log")]
    pub fn drain_message_log(&mut self) -> impl Iterator<Item = LoggedMessage> + '_ {
        core::iter::from_fn(move || self.protocol_layer.message_log().pop())
    }

    /// Whether logged messages were lost since the last call.
    #[cfg(feature = "state-log")]
    pub fn take_message_log_overflow(&mut self) -> bool {
        self.protocol_layer.message_log().take_overflow()
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether PD is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The power role.
    pub fn power_role(&self) -> PowerRole {
        self.power_role
    }

    /// The data role.
    pub fn data_role(&self) -> DataRole {
        self.data_role
    }

    /// Whether the port supplies VCONN.
    pub fn is_vconn_source(&self) -> bool {
        self.is_vconn_source
    }

    /// The explicit contract, if any.
    pub fn contract(&self) -> Option<RawRequest> {
        self.contract
    }

    /// Whether an explicit contract exists.
    pub fn has_contract(&self) -> bool {
        self.contract.is_some()
    }

    /// The raw request data object of the contract, or zero.
    pub fn contract_object(&self) -> u32 {
        self.contract.map_or(0, |contract| contract.0)
    }

    /// The capabilities that the port partner advertised last.
    pub fn received_capabilities(&self) -> &Capabilities {
        &self.received_capabilities
    }

    /// The port configuration.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Number of frames that were discarded in BIST test data mode.
    pub fn bist_frames(&self) -> u32 {
        self.bist_frames
    }

    /// Access the platform.
    pub fn platform(&mut self) -> &mut PLATFORM {
        &mut self.platform
    }

    /// Access the device policy manager.
    pub fn device_policy_manager(&mut self) -> &mut DPM {
        &mut self.device_policy_manager
    }

    /// Access the driver.
    pub fn driver(&mut self) -> &mut DRIVER {
        self.protocol_layer.driver()
    }

    fn update_state(&mut self) -> State {
        match self.state {
            State::Disabled => State::Disabled,
            State::ErrorRecovery => self.error_recovery(),
            State::SendReject => self.send_reject(),

            State::SourceStartup(step) => self.source_startup(step),
            State::SourceDiscovery(step) => self.source_discovery(step),
            State::SourceSendCaps(step) => self.source_send_caps(step),
            State::SourceDisabled => State::SourceDisabled,
            State::SourceNegotiateCap(request) => self.source_negotiate_cap(request),
            State::SourceTransitionSupply(step) => self.source_transition_supply(step),
            State::SourceCapabilityResponse => self.source_capability_response(),
            State::SourceReady => self.source_ready(),
            State::SourceGiveSourceCaps => self.give_source_capabilities(),
            State::SourceGetSinkCaps(step) => self.get_sink_capabilities(step),
            State::SourceGiveSinkCaps => self.give_sink_capabilities(),
            State::SourceGetSourceCaps(step) => self.get_source_capabilities(step),
            State::SourceSendPing => self.source_send_ping(),
            State::SourceGotoMin(step) => self.source_goto_min(step),
            State::SourceSendSoftReset(step) | State::SinkSendSoftReset(step) => self.soft_reset_sent(step),
            State::SourceSoftReset | State::SinkSoftReset => self.soft_reset_received(),
            State::SourceSendHardReset | State::SinkSendHardReset => self.hard_reset_sent(),
            State::SourceTransitionDefault(step) => self.source_transition_default(step),

            State::SinkStartup => self.sink_startup(),
            State::SinkDiscovery => self.sink_discovery(),
            State::SinkWaitCaps(step) => self.sink_wait_caps(step),
            State::SinkEvaluateCaps => self.sink_evaluate_caps(),
            State::SinkSelectCapability(step) => self.sink_select_capability(step),
            State::SinkTransitionSink => self.sink_transition_sink(),
            State::SinkReady => self.sink_ready(),
            State::SinkGiveSinkCap => self.give_sink_capabilities(),
            State::SinkGetSourceCap(step) => self.get_source_capabilities(step),
            State::SinkGetSinkCap(step) => self.get_sink_capabilities(step),
            State::SinkGiveSourceCap => self.give_source_capabilities(),
            State::SinkTransitionDefault(step) => self.sink_transition_default(step),

            State::SendDrSwap(step) => self.send_dr_swap(step),
            State::EvaluateDrSwap(step) => self.evaluate_dr_swap(step),
            State::SendPrSwap(step) => self.pr_swap(step, State::SendPrSwap),
            State::EvaluatePrSwap(step) => self.pr_swap(step, State::EvaluatePrSwap),
            State::SendVconnSwap(step) => self.vconn_swap(step, State::SendVconnSwap),
            State::EvaluateVconnSwap(step) => self.vconn_swap(step, State::EvaluateVconnSwap),

            State::BistCarrierMode2(step) => self.bist_carrier_mode2(step),
            State::BistTestData => self.bist_test_data(),
        }
    }

    fn log_transition(&mut self) {
        if self.state == self.last_state {
            return;
        }

        debug!("Policy state {:?} -> {:?}", self.last_state, self.state);

        #[cfg(feature = "state-log")]
        self.state_log.record(self.state, self.timers.timestamp);

        if matches!(self.state, State::SourceReady | State::SinkReady) {
            self.device_policy_manager.ready(self.power_role, self.data_role);
        }

        self.last_state = self.state;
    }

    /// Take a received soft reset, if it applies in the current state.
    fn take_soft_reset(&mut self) -> bool {
        let is_soft_reset = self.state.accepts_soft_reset()
            && self
                .protocol_layer
                .peek_received()
                .is_some_and(|message| message.is_control(ControlMessageType::SoftReset));

        if is_soft_reset {
            self.protocol_layer.take_received();
        }
        is_soft_reset
    }

    fn partner_role(&self) -> PowerRole {
        match self.power_role {
            PowerRole::Source => PowerRole::Sink,
            PowerRole::Sink => PowerRole::Source,
        }
    }

    fn ready_state(&self) -> State {
        match self.power_role {
            PowerRole::Source => State::SourceReady,
            PowerRole::Sink => State::SinkReady,
        }
    }

    fn set_contract(&mut self, request: RawRequest) {
        info!("Contract for object position {}", request.object_position());
        self.contract = Some(request);
        self.had_contract = true;
        self.device_policy_manager.contract_established(request);
    }

    fn clear_contract(&mut self) {
        if self.contract.take().is_some() {
            self.device_policy_manager.contract_cleared();
        }
    }

    fn store_received_capabilities(&mut self, role: PowerRole, message: &Message) {
        self.received_capabilities = Capabilities {
            role,
            objects: message.objects.clone(),
        };

        match role {
            PowerRole::Source => self
                .device_policy_manager
                .source_capabilities_received(&self.received_capabilities),
            PowerRole::Sink => self
                .device_policy_manager
                .sink_capabilities_received(&self.received_capabilities),
        }
    }

    fn send_control(&mut self, message_type: ControlMessageType, on_error: OnError) -> SendStatus {
        self.send(MessageType::Control(message_type), &[], on_error)
    }

    fn send_data(&mut self, message_type: DataMessageType, objects: &[u32], on_error: OnError) -> SendStatus {
        self.send(MessageType::Data(message_type), objects, on_error)
    }

    /// Drive a transmission. Must be called in every pass, until it is no longer busy.
    fn send(&mut self, message_type: MessageType, objects: &[u32], on_error: OnError) -> SendStatus {
        match self.protocol_layer.tx_status() {
            TxStatus::Idle => self.queue(message_type, objects, on_error),
            TxStatus::Success => {
                self.protocol_layer.acknowledge_tx();
                self.collision_counter.reset();
                SendStatus::Success
            }
            TxStatus::Collision => {
                self.protocol_layer.acknowledge_tx();

                if self.collision_counter.increment().is_err() {
                    warn!("Collision retries exhausted for {:?}", message_type);
                    self.collision_counter.reset();
                    SendStatus::Error(self.send_hard_reset())
                } else {
                    self.queue(message_type, objects, on_error)
                }
            }
            TxStatus::Error => {
                self.protocol_layer.acknowledge_tx();
                self.collision_counter.reset();
                SendStatus::Error(self.escalate(on_error))
            }
            TxStatus::Send | TxStatus::Busy | TxStatus::Reset | TxStatus::Wait => SendStatus::Busy,
        }
    }

    fn queue(&mut self, message_type: MessageType, objects: &[u32], on_error: OnError) -> SendStatus {
        match self.protocol_layer.transmit(message_type, objects) {
            Ok(()) | Err(ProtocolError::Busy) => SendStatus::Busy,
            Err(error) => {
                error!("Cannot send {:?}: {}", message_type, error);
                SendStatus::Error(self.escalate(on_error))
            }
        }
    }

    fn escalate(&mut self, on_error: OnError) -> State {
        match on_error {
            OnError::SoftReset if self.state.is_sending_soft_reset() => self.send_hard_reset(),
            OnError::SoftReset => self.send_soft_reset(),
            OnError::HardReset => self.send_hard_reset(),
            OnError::ErrorRecovery => State::ErrorRecovery,
            OnError::Goto(state) => state,
        }
    }

    /// Reset the protocol layer, and enter the role's soft reset state.
    fn send_soft_reset(&mut self) -> State {
        self.protocol_layer.reset();

        match self.power_role {
            PowerRole::Source => State::SourceSendSoftReset(SoftResetStep::Send),
            PowerRole::Sink => State::SinkSendSoftReset(SoftResetStep::Send),
        }
    }

    /// Start hard reset signalling, and enter the role's hard reset state.
    fn send_hard_reset(&mut self) -> State {
        self.protocol_layer.cancel_transmit();
        if let Err(error) = self.protocol_layer.hard_reset() {
            error!("Cannot signal hard reset: {}", error);
        }
        self.timers.policy.start(TimerType::HardResetComplete);

        match self.power_role {
            PowerRole::Source => State::SourceSendHardReset,
            PowerRole::Sink => State::SinkSendHardReset,
        }
    }

    fn transition_default(&mut self) -> State {
        self.timers.reset();

        match self.power_role {
            PowerRole::Source => {
                self.timers.policy.start(TimerType::PSHardReset);
                State::SourceTransitionDefault(SourceDefaultStep::WaitHardReset)
            }
            PowerRole::Sink => State::SinkTransitionDefault(SinkDefaultStep::Arm),
        }
    }

    fn error_recovery(&mut self) -> State {
        warn!("Error recovery");
        self.clear_contract();
        self.had_contract = false;
        self.platform.error_recovery();
        self.shut_down();

        State::Disabled
    }

    fn send_reject(&mut self) -> State {
        match self.send_control(ControlMessageType::Reject, OnError::SoftReset) {
            SendStatus::Busy => State::SendReject,
            SendStatus::Success => self.ready_state(),
            SendStatus::Error(state) => state,
        }
    }

    fn hard_reset_sent(&mut self) -> State {
        match self.protocol_layer.tx_status() {
            TxStatus::Success | TxStatus::Error => self.protocol_layer.acknowledge_tx(),
            _ if self.timers.policy.expired() => {
                warn!("Hard reset signalling did not complete");
                self.protocol_layer.cancel_transmit();
            }
            _ => return self.state,
        }

        let _ = self.hard_reset_counter.increment();
        self.device_policy_manager.hard_reset();
        self.transition_default()
    }

    fn soft_reset_sent(&mut self, step: SoftResetStep) -> State {
        match step {
            SoftResetStep::Send => match self.send_control(ControlMessageType::SoftReset, OnError::HardReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    self.timers.policy.start(TimerType::SenderResponse);
                    self.with_soft_reset_step(SoftResetStep::WaitAccept)
                }
                SendStatus::Error(state) => state,
            },
            SoftResetStep::WaitAccept => {
                if self
                    .protocol_layer
                    .take_received()
                    .is_some_and(|message| message.is_control(ControlMessageType::Accept))
                {
                    self.after_soft_reset()
                } else if self.timers.policy.expired() {
                    self.send_hard_reset()
                } else {
                    self.state
                }
            }
        }
    }

    fn with_soft_reset_step(&self, step: SoftResetStep) -> State {
        match self.power_role {
            PowerRole::Source => State::SourceSendSoftReset(step),
            PowerRole::Sink => State::SinkSendSoftReset(step),
        }
    }

    fn soft_reset_received(&mut self) -> State {
        match self.send_control(ControlMessageType::Accept, OnError::HardReset) {
            SendStatus::Busy => self.state,
            SendStatus::Success => self.after_soft_reset(),
            SendStatus::Error(state) => state,
        }
    }

    /// Restart negotiation after a soft reset, see [6.8.1].
    fn after_soft_reset(&mut self) -> State {
        match self.power_role {
            PowerRole::Source => self.enter_source_send_caps(),
            PowerRole::Sink => State::SinkWaitCaps(TimedStep::Arm),
        }
    }

    fn give_source_capabilities(&mut self) -> State {
        let objects = self.config.source_capabilities.objects.clone();

        match self.send_data(DataMessageType::SourceCapabilities, &objects, OnError::SoftReset) {
            SendStatus::Busy => self.state,
            SendStatus::Success => self.ready_state(),
            SendStatus::Error(state) => state,
        }
    }

    fn give_sink_capabilities(&mut self) -> State {
        let objects = self.config.sink_capabilities.objects.clone();

        match self.send_data(DataMessageType::SinkCapabilities, &objects, OnError::SoftReset) {
            SendStatus::Busy => self.state,
            SendStatus::Success => self.ready_state(),
            SendStatus::Error(state) => state,
        }
    }

    fn get_sink_capabilities(&mut self, step: ExchangeStep) -> State {
        let with_step = match self.power_role {
            PowerRole::Source => State::SourceGetSinkCaps,
            PowerRole::Sink => State::SinkGetSinkCap,
        };

        match step {
            ExchangeStep::Send => match self.send_control(ControlMessageType::GetSinkCap, OnError::SoftReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    self.timers.policy.start(TimerType::SenderResponse);
                    with_step(ExchangeStep::WaitResponse)
                }
                SendStatus::Error(state) => state,
            },
            ExchangeStep::WaitResponse => match self.protocol_layer.take_received() {
                Some(message) if message.is_data(DataMessageType::SinkCapabilities) => {
                    self.store_received_capabilities(PowerRole::Sink, &message);
                    self.ready_state()
                }
                Some(message) => {
                    debug!("Expected sink capabilities, got {:?}", message.message_type());
                    self.ready_state()
                }
                None if self.timers.policy.expired() => self.ready_state(),
                None => self.state,
            },
        }
    }

    fn get_source_capabilities(&mut self, step: ExchangeStep) -> State {
        let with_step = match self.power_role {
            PowerRole::Source => State::SourceGetSourceCaps,
            PowerRole::Sink => State::SinkGetSourceCap,
        };

        match step {
            ExchangeStep::Send => match self.send_control(ControlMessageType::GetSourceCap, OnError::SoftReset) {
                SendStatus::Busy => self.state,
                SendStatus::Success => {
                    self.timers.policy.start(TimerType::SenderResponse);
                    with_step(ExchangeStep::WaitResponse)
                }
                SendStatus::Error(state) => state,
            },
            ExchangeStep::WaitResponse => match self.protocol_layer.take_received() {
                Some(message) if message.is_data(DataMessageType::SourceCapabilities) => {
                    self.store_received_capabilities(PowerRole::Source, &message);

                    match self.power_role {
                        // A sink evaluates new source capabilities right away.
                        PowerRole::Sink => State::SinkEvaluateCaps,
                        PowerRole::Source => State::SourceReady,
                    }
                }
                Some(message) => {
                    debug!("Expected source capabilities, got {:?}", message.message_type());
                    self.ready_state()
                }
                None if self.timers.policy.expired() => self.ready_state(),
                None => self.state,
            },
        }
    }

    /// Handle messages that are treated alike by a ready source and sink.
    fn ready_message(&mut self, message: &Message) -> State {
        match message.message_type() {
            MessageType::Control(ControlMessageType::DrSwap) => State::EvaluateDrSwap(ReplyStep::Evaluate),
            MessageType::Control(ControlMessageType::PrSwap) => State::EvaluatePrSwap(PrSwapStep::Evaluate),
            MessageType::Control(ControlMessageType::VconnSwap) => State::EvaluateVconnSwap(VconnSwapStep::Evaluate),
            MessageType::Data(DataMessageType::VendorDefined) => {
                self.device_policy_manager.vdm_received(message);
                self.ready_state()
            }
            MessageType::Data(DataMessageType::Bist) => self.bist_requested(message),
            message_type => {
                trace!("Ignored {:?} in ready state", message_type);
                self.ready_state()
            }
        }
    }

    /// Handle requests that are treated alike by a ready source and sink.
    fn ready_request(&mut self, request: PortRequest) -> State {
        match request {
            PortRequest::DrSwap if self.config.can_swap_data_role => State::SendDrSwap(ExchangeStep::Send),
            PortRequest::PrSwap if self.config.can_swap_power_role && self.config.is_dual_role() => {
                State::SendPrSwap(PrSwapStep::Send)
            }
            PortRequest::VconnSwap if self.is_vconn_source || self.config.can_source_vconn => {
                State::SendVconnSwap(VconnSwapStep::Send)
            }
            PortRequest::SoftReset => self.send_soft_reset(),
            PortRequest::HardReset => self.send_hard_reset(),
            PortRequest::BistCarrierMode2 => State::BistCarrierMode2(TimedStep::Arm),
            request => {
                warn!("Dropped request {:?} as {:?}", request, self.power_role);
                self.ready_state()
            }
        }
    }
}
