//! Request data objects, sent by a sink to select one of the source's capabilities.
//!
//! See [6.4.2].
use proc_bitfield::bitfield;
use uom::si::electric_current::centiampere;

use crate::_250milliwatts_mod::_250milliwatts;
use crate::units::{ElectricCurrent, Power};

bitfield! {
    /// A request data object of unknown shape.
    ///
    /// The shape is given by the power data object at the requested position.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct RawRequest(pub u32): Debug, FromStorage, IntoStorage {
        /// Valid range 1..=7
        pub object_position: u8 @ 28..=31,
    }
}

bitfield! {
    /// Request for a fixed or variable supply.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FixedVariableRequest(pub u32): Debug, FromStorage, IntoStorage {
        /// Valid range 1..=7
        pub object_position: u8 @ 28..=31,
        /// The sink supports GotoMin, and the maximum current is a minimum current instead.
        pub giveback_flag: bool @ 27,
        /// The sink needs more power than the selected object provides.
        pub capability_mismatch: bool @ 26,
        /// USB communications capable
        pub usb_communications_capable: bool @ 25,
        /// No USB Suspend
        pub no_usb_suspend: bool @ 24,
        /// Operating current in 10 mA units
        pub raw_operating_current: u16 @ 10..=19,
        /// Maximum (or minimum, with giveback) operating current in 10 mA units
        pub raw_max_operating_current: u16 @ 0..=9,
    }
}

impl FixedVariableRequest {
    /// The operating current.
    pub fn operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_operating_current().into())
    }

    /// The maximum operating current.
    pub fn max_operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_operating_current().into())
    }
}

bitfield! {
    /// Request for a battery supply.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct BatteryRequest(pub u32): Debug, FromStorage, IntoStorage {
        /// Object position (0000b and 1110b…1111b are Reserved and Shall Not be used)
        pub object_position: u8 @ 28..=31,
        /// GiveBackFlag
        pub giveback_flag: bool @ 27,
        /// Capability mismatch
        pub capability_mismatch: bool @ 26,
        /// USB communications capable
        pub usb_communications_capable: bool @ 25,
        /// No USB Suspend
        pub no_usb_suspend: bool @ 24,
        /// Operating power in 250mW units
        pub raw_operating_power: u16 @ 10..=19,
        /// Maximum operating power in 250mW units
        pub raw_max_operating_power: u16 @ 0..=9,
    }
}

impl BatteryRequest {
    /// The operating power.
    pub fn operating_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_operating_power().into())
    }

    /// The maximum operating power.
    pub fn max_operating_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_max_operating_power().into())
    }
}

impl From<FixedVariableRequest> for RawRequest {
    fn from(value: FixedVariableRequest) -> Self {
        Self(value.0)
    }
}

impl From<BatteryRequest> for RawRequest {
    fn from(value: BatteryRequest) -> Self {
        Self(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{FixedVariableRequest, RawRequest};

    #[test]
    fn request_fields() {
        // Position 2, 500 mA operating and maximum current, no USB suspend, USB communications capable.
        let request = FixedVariableRequest(0)
            .with_object_position(2)
            .with_no_usb_suspend(true)
            .with_usb_communications_capable(true)
            .with_raw_operating_current(50)
            .with_raw_max_operating_current(50);

        assert_eq!(request.0, 0x2300_C832);
        assert_eq!(RawRequest::from(request).object_position(), 2);
    }
}
