//! BIST data object.
//!
//! See [6.4.3].
use proc_bitfield::bitfield;

/// BIST modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum BistMode {
    ReceiverMode,
    TransmitMode,
    ReturnedBistCounters,
    CarrierMode0,
    CarrierMode1,
    CarrierMode2,
    CarrierMode3,
    EyePattern,
    TestData,
    Reserved,
}

impl From<u8> for BistMode {
    fn from(value: u8) -> Self {
        match value {
            0b0000 => Self::ReceiverMode,
            0b0001 => Self::TransmitMode,
            0b0010 => Self::ReturnedBistCounters,
            0b0011 => Self::CarrierMode0,
            0b0100 => Self::CarrierMode1,
            0b0101 => Self::CarrierMode2,
            0b0110 => Self::CarrierMode3,
            0b0111 => Self::EyePattern,
            0b1000 => Self::TestData,
            _ => Self::Reserved,
        }
    }
}

impl From<BistMode> for u8 {
    fn from(value: BistMode) -> Self {
        match value {
            BistMode::ReceiverMode => 0b0000,
            BistMode::TransmitMode => 0b0001,
            BistMode::ReturnedBistCounters => 0b0010,
            BistMode::CarrierMode0 => 0b0011,
            BistMode::CarrierMode1 => 0b0100,
            BistMode::CarrierMode2 => 0b0101,
            BistMode::CarrierMode3 => 0b0110,
            BistMode::EyePattern => 0b0111,
            BistMode::TestData => 0b1000,
            BistMode::Reserved => 0b1111,
        }
    }
}

bitfield! {
    /// The first data object of a BIST message.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct BistDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// The requested test mode.
        pub mode: u8 [get BistMode, set BistMode] @ 28..=31,
    }
}
