//! Built-in self test, see [6.4.3] and [8.3.3.25].
use super::{PolicyEngine, State, TimedStep};
use crate::device_policy_manager::DevicePolicyManager;
use crate::platform::Platform;
use crate::protocol_layer::message::Message;
use crate::protocol_layer::message::bist::{BistDataObject, BistMode};
use crate::timers::TimerType;
use crate::Driver;

impl<DRIVER: Driver, PLATFORM: Platform, DPM: DevicePolicyManager> PolicyEngine<DRIVER, PLATFORM, DPM> {
    /// Handle a BIST message of the port partner.
    ///
    /// Carrier mode requires vSafe5V, so it is only entered without a contract or with a
    /// contract for the first object.
    pub(super) fn bist_requested(&mut self, message: &Message) -> State {
        let Some(object) = message.objects.first() else {
            return self.ready_state();
        };

        match BistDataObject(*object).mode() {
            BistMode::CarrierMode2 if self.contract.is_none_or(|contract| contract.object_position() == 1) => {
                State::BistCarrierMode2(TimedStep::Arm)
            }
            BistMode::TestData => {
                info!("Enter BIST test data mode");
                self.bist_frames = 0;
                State::BistTestData
            }
            mode => {
                debug!("Ignored BIST mode {:?}", mode);
                self.ready_state()
            }
        }
    }

    pub(super) fn bist_carrier_mode2(&mut self, step: TimedStep) -> State {
        match step {
            TimedStep::Arm => {
                self.protocol_layer.driver().set_bist_carrier_mode2(true);
                self.timers.policy.start(TimerType::BISTContMode);
                State::BistCarrierMode2(TimedStep::Wait)
            }
            TimedStep::Wait => {
                if !self.timers.policy.expired() {
                    return self.state;
                }

                self.protocol_layer.driver().set_bist_carrier_mode2(false);
                self.transition_default()
            }
        }
    }

    /// Discard all received frames, until a hard reset ends the test.
    pub(super) fn bist_test_data(&mut self) -> State {
        if self.protocol_layer.take_received().is_some() {
            self.bist_frames = self.bist_frames.wrapping_add(1);
        }

        State::BistTestData
    }
}
