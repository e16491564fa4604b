//! Typed requests of a host tool, e.g. over a debug link.
//!
//! A host can read the port status and logs, queue requests, and replace the local capabilities.
//! Transport and encoding are up to the application, e.g. with the `serde` feature.
use heapless::Vec;

use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
pub use crate::policy_engine::{PortStatus, WriteCapabilitiesError};
use crate::policy_engine::{PolicyEngine, PortRequest};
use crate::protocol_layer::message::pdo::Capabilities;
use crate::state_log::{LoggedMessage, STATE_LOG_DEPTH, StateLogEntry};
use crate::Driver;

/// Number of logged messages that are returned per request.
pub const MESSAGE_LOG_BATCH: usize = 16;

/// A request of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostRequest {
    /// Read the port status.
    GetStatus,
    /// Take the logged state transitions.
    GetStateLog,
    /// Take up to [`MESSAGE_LOG_BATCH`] logged messages.
    GetMessageLog,
    /// Queue a request for the policy engine.
    SendMessage(PortRequest),
    /// Replace the source capabilities.
    WriteSourceCapabilities(Capabilities),
    /// Replace the sink capabilities.
    WriteSinkCapabilities(Capabilities),
}

/// The answer to a [`HostRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostResponse {
    /// The port status.
    Status(PortStatus),
    /// Logged state transitions, oldest first.
    StateLog(Vec<StateLogEntry, STATE_LOG_DEPTH>),
    /// Logged messages, oldest first.
    MessageLog {
        /// The messages.
        messages: Vec<LoggedMessage, MESSAGE_LOG_BATCH>,
        /// Messages were lost, since the log was full.
        overflow: bool,
    },
    /// The request was accepted.
    Accepted,
    /// The capabilities were rejected.
    Rejected(WriteCapabilitiesError),
}

/// Answer a host request.
pub fn handle_host_request<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager>(
    policy_engine: &mut PolicyEngine<DRIVER, PLATFORM, DPM>,
    request: HostRequest,
) -> HostResponse {
    trace!("Host request {:?}", request);

    match request {
        HostRequest::GetStatus => HostResponse::Status(policy_engine.status()),
        HostRequest::GetStateLog => HostResponse::StateLog(policy_engine.drain_state_log().collect()),
        HostRequest::GetMessageLog => {
            let overflow = policy_engine.take_message_log_overflow();
            let messages = policy_engine.drain_message_log().take(MESSAGE_LOG_BATCH).collect();

            HostResponse::MessageLog { messages, overflow }
        }
        HostRequest::SendMessage(request) => {
            policy_engine.request(request);
            HostResponse::Accepted
        }
        HostRequest::WriteSourceCapabilities(capabilities) => {
            match policy_engine.write_source_capabilities(capabilities) {
                Ok(()) => HostResponse::Accepted,
                Err(error) => HostResponse::Rejected(error),
            }
        }
        HostRequest::WriteSinkCapabilities(capabilities) => match policy_engine.write_sink_capabilities(capabilities) {
            Ok(()) => HostResponse::Accepted,
            Err(error) => HostResponse::Rejected(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{HostRequest, HostResponse, WriteCapabilitiesError, handle_host_request};
    use crate::PowerRole;
    use crate::config::PortConfig;
    use crate::dummy::{DummyDevice, DummyDriver, DummyPlatform, SOURCE_CAPABILITIES_5V_12V};
    use crate::policy_engine::{PolicyEngine, PortRequest, SendCapsStep, State};
    use crate::protocol_layer::message::header::{DataMessageType, MessageType};
    use crate::protocol_layer::message::pdo::Capabilities;
    use crate::state_log::Direction;

    type TestEngine = PolicyEngine<DummyDriver, DummyPlatform, DummyDevice>;

    fn enabled_source() -> TestEngine {
        let mut engine = PolicyEngine::new(
            DummyDriver::auto_acknowledging(),
            DummyPlatform::default(),
            DummyDevice::default(),
            PortConfig::default(),
        );
        engine.enable(true);

        for _ in 0..10 {
            if engine.state() == State::SourceSendCaps(SendCapsStep::WaitRequest) {
                break;
            }
            engine.step();
        }
        assert_eq!(engine.state(), State::SourceSendCaps(SendCapsStep::WaitRequest));

        engine
    }

    #[test]
    fn status_reflects_port() {
        let mut engine = enabled_source();

        let HostResponse::Status(status) = handle_host_request(&mut engine, HostRequest::GetStatus) else {
            panic!("expected status");
        };
        assert!(status.enabled);
        assert_eq!(status.power_role, PowerRole::Source);
        assert_eq!(status.state, State::SourceSendCaps(SendCapsStep::WaitRequest));
        assert!(!status.has_contract());
    }

    #[test]
    fn logs_are_drained() {
        let mut engine = enabled_source();

        let HostResponse::StateLog(entries) = handle_host_request(&mut engine, HostRequest::GetStateLog) else {
            panic!("expected state log");
        };
        assert!(!entries.is_empty());
        assert_eq!(
            entries.last().map(|entry| entry.state),
            Some(State::SourceSendCaps(SendCapsStep::WaitRequest))
        );

        let HostResponse::StateLog(entries) = handle_host_request(&mut engine, HostRequest::GetStateLog) else {
            panic!("expected state log");
        };
        assert!(entries.is_empty());

        let HostResponse::MessageLog { messages, overflow } =
            handle_host_request(&mut engine, HostRequest::GetMessageLog)
        else {
            panic!("expected message log");
        };
        assert!(!overflow);
        assert_eq!(messages[0].direction, Direction::Tx);
        assert_eq!(
            messages[0].message.message_type(),
            MessageType::Data(DataMessageType::SourceCapabilities)
        );
    }

    #[test]
    fn requests_are_queued() {
        let mut engine = enabled_source();

        assert_eq!(
            handle_host_request(&mut engine, HostRequest::SendMessage(PortRequest::HardReset)),
            HostResponse::Accepted
        );
    }

    #[test]
    fn capabilities_are_validated() {
        let mut engine = enabled_source();
        let source = Capabilities::from_objects(PowerRole::Source, &SOURCE_CAPABILITIES_5V_12V).unwrap();

        assert_eq!(
            handle_host_request(&mut engine, HostRequest::WriteSinkCapabilities(source.clone())),
            HostResponse::Rejected(WriteCapabilitiesError::WrongRole)
        );
        assert_eq!(
            handle_host_request(
                &mut engine,
                HostRequest::WriteSourceCapabilities(Capabilities::new(PowerRole::Source))
            ),
            HostResponse::Rejected(WriteCapabilitiesError::Empty)
        );
        assert_eq!(
            handle_host_request(&mut engine, HostRequest::WriteSourceCapabilities(source)),
            HostResponse::Accepted
        );
    }
}
