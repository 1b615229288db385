//! Shared fixtures for the integration tests

#![allow(dead_code)] // not every test file uses every helper

use std::time::Duration;

use scopewire::{
    protocols::{SimulatedBus, SimulatedScope},
    CalibrationScalars, InstrumentAddress, InstrumentSession, InterfaceKind, SessionOptions,
    WaitPolicy,
};

/// A simulated MSO54 at `SIM::<name>`.
pub fn scope(name: &str) -> SimulatedScope {
    SimulatedScope::new(InstrumentAddress::simulated(name))
}

/// Session options for simulated buses, polling every millisecond.
pub fn options() -> SessionOptions {
    SessionOptions::default()
        .with_interface(InterfaceKind::Simulated)
        .with_wait(fast_wait(Duration::from_millis(200)))
}

pub fn fast_wait(timeout: Duration) -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(1), timeout)
}

/// A connected session bound to `scope`.
pub fn connected(scope: &SimulatedScope) -> InstrumentSession<SimulatedBus> {
    let bus = SimulatedBus::new().with_scope(scope.clone());
    let mut session = InstrumentSession::new(bus, options());
    session.connect().expect("simulated scope should connect");
    session
}

pub fn scalars(y_mult: f64, y_zero: f64, x_incr: f64, pre_trigger_offset: i64) -> CalibrationScalars {
    CalibrationScalars {
        y_mult,
        y_zero,
        x_incr,
        x_zero: 0.0,
        pre_trigger_offset,
    }
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
