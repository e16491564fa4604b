//! Platform services: VBUS and VCONN switching, and the Type-C connection state machine.
//!
//! The policy engine only observes and switches power through this trait. CC line role
//! detection is owned by the Type-C state machine, which the policy engine reconfigures on
//! power role swaps and error recovery.

/// Trait for platform services.
pub trait Platform {
    /// Switch the 5 V VBUS supply.
    fn set_vbus_5v_enable(&mut self, enable: bool);

    /// Switch the higher voltage VBUS supply.
    fn set_vbus_lvl1_enable(&mut self, enable: bool);

    /// Whether VBUS is within vSafe0V.
    fn vbus_vsafe0v(&mut self) -> bool;

    /// Whether VBUS is below vSafe5V, i.e. no source provides VBUS.
    fn vbus_under_5v(&mut self) -> bool;

    /// Switch the VCONN supply.
    fn set_vconn_enable(&mut self, enable: bool);

    /// Start or stop the 100 µs policy tick.
    fn enable_timer(&mut self, _enable: bool) {}

    /// Resume CC line monitoring by the Type-C state machine.
    fn enable_type_c_state_machine(&mut self) {}

    /// Suspend CC line monitoring by the Type-C state machine, e.g. during a power role swap.
    fn disable_type_c_state_machine(&mut self) {}

    /// Reconfigure the Type-C state machine as an attached source.
    fn role_swap_to_attached_source(&mut self);

    /// Reconfigure the Type-C state machine as an attached sink.
    fn role_swap_to_attached_sink(&mut self);

    /// Tear down the Type-C connection, and restart attach detection.
    fn error_recovery(&mut self);
}
