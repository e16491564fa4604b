//! Power data objects, and the capability sets that hold them.
//!
//! See [6.4.1].
use heapless::Vec;
use proc_bitfield::bitfield;
use uom::si::electric_current::centiampere;

use super::MAX_DATA_OBJECTS;
use crate::PowerRole;
use crate::_50millivolts_mod::_50millivolts;
use crate::_250milliwatts_mod::_250milliwatts;
use crate::units::{ElectricCurrent, ElectricPotential, Power};

/// The supply type of a power data object, shared by all shapes in bits 30..=31.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    /// Fixed voltage supply.
    FixedSupply,
    /// Battery supply.
    Battery,
    /// Variable voltage supply.
    VariableSupply,
    /// Augmented power data object, not supported.
    Augmented,
}

impl From<u8> for Kind {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::FixedSupply,
            0b01 => Self::Battery,
            0b10 => Self::VariableSupply,
            _ => Self::Augmented,
        }
    }
}

impl From<Kind> for u8 {
    fn from(value: Kind) -> Self {
        match value {
            Kind::FixedSupply => 0b00,
            Kind::Battery => 0b01,
            Kind::VariableSupply => 0b10,
            Kind::Augmented => 0b11,
        }
    }
}

bitfield! {
    /// A power data object of unknown shape.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct RawPowerDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// The supply type.
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
    }
}

bitfield! {
    /// A fixed voltage supply PDO, as advertised by a source.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Fixed supply
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
        /// Dual-role power
        pub dual_role_power: bool @ 29,
        /// USB suspend supported
        pub usb_suspend_supported: bool @ 28,
        /// Unconstrained power
        pub unconstrained_power: bool @ 27,
        /// USB communications capable
        pub usb_communications_capable: bool @ 26,
        /// Dual-role data
        pub dual_role_data: bool @ 25,
        /// Peak current
        pub peak_current: u8 @ 20..=21,
        /// Voltage in 50 mV units
        pub raw_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl Default for FixedSupply {
    fn default() -> Self {
        Self(0)
    }
}

impl FixedSupply {
    /// Create a fixed supply PDO from raw voltage (50 mV) and current (10 mA) values.
    pub fn new(raw_voltage: u16, raw_max_current: u16) -> Self {
        Self::default()
            .with_raw_voltage(raw_voltage)
            .with_raw_max_current(raw_max_current)
    }

    /// The fixed voltage.
    pub fn voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_voltage().into())
    }

    /// The maximum current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_current().into())
    }
}

bitfield! {
    /// A battery supply PDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        /// Battery
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
        /// Maximum Voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum Voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum Allowable Power in 250 mW units
        pub raw_max_power: u16 @ 0..=9,
    }
}

impl Battery {
    /// The maximum voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_max_voltage().into())
    }

    /// The minimum voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_min_voltage().into())
    }

    /// The maximum power.
    pub fn max_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_max_power().into())
    }
}

bitfield! {
    /// A variable supply (non-battery) PDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Variable supply (non-battery)
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
        /// Maximum Voltage in 50mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum Voltage in 50mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum current in 10mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl VariableSupply {
    /// The maximum voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_max_voltage().into())
    }

    /// The minimum voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_min_voltage().into())
    }

    /// The maximum current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_current().into())
    }
}

bitfield! {
    /// A fixed supply PDO, as advertised by a sink.
    ///
    /// See [6.4.1.3.1]
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct SinkFixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Fixed supply
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
        /// Dual-role power
        pub dual_role_power: bool @ 29,
        /// Higher capability
        pub higher_capability: bool @ 28,
        /// Unconstrained power
        pub unconstrained_power: bool @ 27,
        /// USB communications capable
        pub usb_communications_capable: bool @ 26,
        /// Dual-role data
        pub dual_role_data: bool @ 25,
        /// Voltage in 50 mV units
        pub raw_voltage: u16 @ 10..=19,
        /// Operational current in 10 mA units
        pub raw_operational_current: u16 @ 0..=9,
    }
}

impl SinkFixedSupply {
    /// Create a sink fixed supply PDO from raw voltage (50 mV) and current (10 mA) values.
    pub fn new(raw_voltage: u16, raw_operational_current: u16) -> Self {
        Self(0)
            .with_raw_voltage(raw_voltage)
            .with_raw_operational_current(raw_operational_current)
    }

    /// The fixed voltage.
    pub fn voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_voltage().into())
    }

    /// The operational current.
    pub fn operational_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_operational_current().into())
    }
}

bitfield! {
    /// A variable supply (non-battery) PDO, as advertised by a sink.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct SinkVariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Variable supply (non-battery)
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
        /// Maximum Voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum Voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Operational current in 10 mA units
        pub raw_operational_current: u16 @ 0..=9,
    }
}

impl SinkVariableSupply {
    /// The maximum voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_max_voltage().into())
    }

    /// The minimum voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_min_voltage().into())
    }

    /// The operational current.
    pub fn operational_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_operational_current().into())
    }
}

bitfield! {
    /// A battery supply PDO, as advertised by a sink.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct SinkBattery(pub u32): Debug, FromStorage, IntoStorage {
        /// Battery
        pub kind: u8 [get Kind, set Kind] @ 30..=31,
        /// Maximum Voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum Voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Operational power in 250 mW units
        pub raw_operational_power: u16 @ 0..=9,
    }
}

impl SinkBattery {
    /// The maximum voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_max_voltage().into())
    }

    /// The minimum voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_min_voltage().into())
    }

    /// The operational power.
    pub fn operational_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_operational_power().into())
    }
}

/// A typed view on a raw power data object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDataObject {
    /// Fixed voltage supply.
    FixedSupply(FixedSupply),
    /// Battery supply.
    Battery(Battery),
    /// Variable voltage supply.
    VariableSupply(VariableSupply),
    /// Unsupported kind of power data object.
    Unknown(RawPowerDataObject),
}

impl PowerDataObject {
    /// Select the shape of a raw object by its supply type.
    pub fn from_raw(raw: u32) -> Self {
        match RawPowerDataObject(raw).kind() {
            Kind::FixedSupply => Self::FixedSupply(FixedSupply(raw)),
            Kind::Battery => Self::Battery(Battery(raw)),
            Kind::VariableSupply => Self::VariableSupply(VariableSupply(raw)),
            Kind::Augmented => Self::Unknown(RawPowerDataObject(raw)),
        }
    }
}

/// A set of power data objects, advertised by one side of the link.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities {
    /// The power role of the advertising side.
    pub role: PowerRole,
    /// Raw power data objects, at most seven.
    pub objects: Vec<u32, MAX_DATA_OBJECTS>,
}

impl Capabilities {
    /// An empty capability set.
    pub const fn new(role: PowerRole) -> Self {
        Self {
            role,
            objects: Vec::new(),
        }
    }

    /// Create a capability set from raw objects. Extra objects beyond seven are rejected.
    pub fn from_objects(role: PowerRole, objects: &[u32]) -> Option<Self> {
        Some(Self {
            role,
            objects: Vec::from_slice(objects).ok()?,
        })
    }

    /// The number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the set holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get the typed object at a one-based object position.
    pub fn at_position(&self, position: u8) -> Option<PowerDataObject> {
        let index = usize::from(position).checked_sub(1)?;
        self.objects.get(index).map(|raw| PowerDataObject::from_raw(*raw))
    }

    /// Iterate over all typed objects.
    pub fn iter(&self) -> impl Iterator<Item = PowerDataObject> + '_ {
        self.objects.iter().map(|raw| PowerDataObject::from_raw(*raw))
    }

    /// Whether the first object is a vSafe5V fixed supply, as required for source capabilities.
    pub fn starts_with_vsafe5v(&self) -> bool {
        matches!(
            self.at_position(1),
            Some(PowerDataObject::FixedSupply(supply)) if supply.raw_voltage() == 100
        )
    }
}
