//! A dual-role USB Power Delivery policy engine and protocol layer for `[no_std]`.
//!
//! The stack is driven by three entry points, all of which run to completion:
//! - [`PolicyEngine::tick`](policy_engine::PolicyEngine::tick) at a fixed 100 µs cadence,
//! - [`PolicyEngine::run_protocol`](policy_engine::PolicyEngine::run_protocol) once per scheduling pass,
//! - [`PolicyEngine::run_policy`](policy_engine::PolicyEngine::run_policy) once per scheduling pass.
//!
//! Hardware access happens through the [`Driver`] trait, power switching and Type-C role
//! changes through [`platform::Platform`].
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

pub mod config;
pub mod counters;
pub mod device_policy_manager;
#[cfg(feature = "state-log")]
pub mod host;
pub mod platform;
pub mod policy_engine;
pub mod protocol_layer;
#[cfg(feature = "state-log")]
pub mod state_log;
pub mod timers;

#[cfg(test)]
pub mod dummy;

#[macro_use]
extern crate uom;

pub use usbpd_engine_traits::{Driver, DriverError, PhyEvent};

/// Custom unit of 50 mV, used by voltage fields of power data objects.
pub mod _50millivolts_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::electric_potential;

        @_50millivolts: 0.05; "_50mV", "_50millivolts", "_50millivolts";
    }
}

/// Custom unit of 250 mW, used by battery power data objects.
pub mod _250milliwatts_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::power;

        @_250milliwatts: 0.25; "_250mW", "_250milliwatts", "_250milliwatts";
    }
}

/// Physical quantities, as used throughout the crate.
pub mod units {
    pub use uom::si::f32::{ElectricCurrent, ElectricPotential, Power};
}

/// The power role of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerRole {
    /// The port provides VBUS.
    Source,
    /// The port consumes VBUS.
    Sink,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Sink,
            true => Self::Source,
        }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        match role {
            PowerRole::Sink => false,
            PowerRole::Source => true,
        }
    }
}

/// The data role of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataRole {
    /// Upstream facing port.
    Ufp,
    /// Downstream facing port.
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Ufp,
            true => Self::Dfp,
        }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        match role {
            DataRole::Ufp => false,
            DataRole::Dfp => true,
        }
    }
}

impl DataRole {
    /// The opposite data role, as taken after a successful DR swap.
    pub fn swapped(self) -> Self {
        match self {
            Self::Ufp => Self::Dfp,
            Self::Dfp => Self::Ufp,
        }
    }
}
