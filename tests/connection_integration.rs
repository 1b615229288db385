//! Connecting, discovery and connection state

mod common;

use std::error::Error as _;

use common::{options, scope};
use scopewire::{
    protocols::SimulatedBus, ConnectionEvent, ConnectionState, Error, InstrumentAddress,
    InstrumentSession, InterfaceKind, SessionMonitor,
};

#[test]
fn discovery_binds_first_matching_resource() {
    let wrong = scope("WRONG").with_identity("KEYSIGHT TECHNOLOGIES,DSOX1204G,CN0000,2.12");
    let right = scope("RIGHT");
    let unreachable = scope("LATE").failing_on("*IDN");
    let bus = SimulatedBus::new()
        .with_unopenable(InstrumentAddress::simulated("BAD"))
        .with_scope(wrong.clone())
        .with_scope(right.clone())
        .with_scope(unreachable.clone());

    let mut session = InstrumentSession::new(bus, options());
    session.connect().unwrap();

    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(session.address(), Some(&InstrumentAddress::simulated("RIGHT")));
    assert_eq!(
        session.manager().opened(),
        &[
            InstrumentAddress::simulated("WRONG"),
            InstrumentAddress::simulated("RIGHT")
        ]
    );
    assert!(wrong.is_closed());
    assert!(!right.is_closed());
    assert!(unreachable.commands().is_empty());
}

#[test]
fn discovery_skips_candidates_that_fail_to_identify() {
    let mute = scope("MUTE").failing_on("*IDN");
    let right = scope("RIGHT");
    let bus = SimulatedBus::new()
        .with_scope(mute.clone())
        .with_scope(right.clone());
    let mut session = InstrumentSession::new(bus, options());
    session.connect().unwrap();
    assert!(mute.is_closed());
    assert_eq!(session.address(), Some(&InstrumentAddress::simulated("RIGHT")));
}

#[test]
fn discovery_ignores_other_interfaces() {
    let sim = scope("MSO54");
    let bus = SimulatedBus::new().with_scope(sim.clone());
    let mut session = InstrumentSession::new(bus, options().with_interface(InterfaceKind::Tcpip));
    let err = session.connect().unwrap_err();
    assert!(matches!(err, Error::NoConnection { .. }));
    assert!(sim.commands().is_empty());
    assert_eq!(sim.close_calls(), 1);
}

#[test]
fn discovery_with_nothing_matching_fails() {
    let bus = SimulatedBus::new().with_scope(scope("A").with_identity("RIGOL,DS1054Z"));
    let mut session = InstrumentSession::new(bus, options());
    let err = session.connect().unwrap_err();
    assert!(matches!(err, Error::NoConnection { .. }));
    assert!(err.is_connection_failure());
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[test]
fn fixed_address_wrong_identity() {
    let rigol = scope("FIXED").with_identity("RIGOL TECHNOLOGIES,DS1054Z,DS1ZA0000,00.04.04");
    let bus = SimulatedBus::new().with_scope(rigol.clone());
    let mut session = InstrumentSession::new(
        bus,
        options().with_address(InstrumentAddress::simulated("FIXED")),
    );
    match session.connect() {
        Err(Error::WrongInstrument {
            identity, expected, ..
        }) => {
            assert!(identity.starts_with("RIGOL"));
            assert_eq!(expected, "MSO");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(rigol.commands(), vec!["*CLS", "*IDN?"]);
    assert!(rigol.is_closed());
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[test]
fn fixed_address_that_will_not_open() {
    let bus = SimulatedBus::new().with_unopenable(InstrumentAddress::simulated("DEAD"));
    let mut session = InstrumentSession::new(
        bus,
        options().with_address(InstrumentAddress::simulated("DEAD")),
    );
    let err = session.connect().unwrap_err();
    assert!(matches!(err, Error::NoConnection { .. }));
    let source = err.source().expect("open failure is kept as the source");
    assert!(source.to_string().contains("SIM::DEAD"));
}

#[test]
fn fixed_address_matches_token_case_insensitively() {
    let lower = scope("LOWER").with_identity("tektronix,mso58,c0,fv:2.0");
    let bus = SimulatedBus::new().with_scope(lower);
    let mut session = InstrumentSession::new(
        bus,
        options().with_address(InstrumentAddress::simulated("LOWER")),
    );
    session.connect().unwrap();
    assert!(session.is_connected());
}

#[test]
fn disconnect_never_fails() {
    let sim = scope("MSO54");
    let mut session = common::connected(&sim);
    session.disconnect();
    session.disconnect();
    assert_eq!(sim.close_calls(), 1);
    assert!(!session.is_connected());
    assert!(matches!(
        session.transfer_waveform("CH1"),
        Err(Error::NotConnected)
    ));
}

#[test]
fn state_transitions_are_broadcast() {
    let sim = scope("MSO54");
    let bus = SimulatedBus::new().with_scope(sim.clone());
    let mut session = InstrumentSession::new(bus, options());
    let first = session.subscribe();
    let second = session.subscribe();

    session.connect().unwrap();
    assert!(session.is_connected());
    session.disconnect();
    session.disconnect();

    let events: Vec<ConnectionEvent> = first.try_iter().collect();
    assert_eq!(
        events,
        vec![
            ConnectionEvent {
                previous: ConnectionState::Disconnected,
                current: ConnectionState::Connected,
            },
            ConnectionEvent {
                previous: ConnectionState::Connected,
                current: ConnectionState::Disconnected,
            },
        ]
    );
    assert_eq!(second.try_iter().count(), 2);
}

#[test]
fn failed_reconnect_reports_disconnected() {
    let sim = scope("MSO54");
    let bus = SimulatedBus::new().with_scope(sim.clone());
    let mut session = InstrumentSession::new(bus, options());
    let events = session.subscribe();
    session.connect().unwrap();

    let mute = sim.failing_on("*IDN");
    assert!(matches!(session.connect(), Err(Error::NoConnection { .. })));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.address().is_none());

    let events: Vec<ConnectionEvent> = events.try_iter().collect();
    assert_eq!(
        events,
        vec![
            ConnectionEvent {
                previous: ConnectionState::Disconnected,
                current: ConnectionState::Connected,
            },
            ConnectionEvent {
                previous: ConnectionState::Connected,
                current: ConnectionState::Disconnected,
            },
        ]
    );

    // the monitor keeps trying to reconnect
    let identifies = |s: &scopewire::protocols::SimulatedScope| {
        s.commands().iter().filter(|c| c.as_str() == "*IDN?").count()
    };
    let before = identifies(&mute);
    let mut monitor = SessionMonitor::new(session);
    assert_eq!(monitor.tick(), ConnectionState::Disconnected);
    assert_eq!(identifies(&mute), before + 1);
}

#[test]
fn liveness_probe_notices_a_dead_link() {
    let flaky = scope("FLAKY");
    let mut monitor = SessionMonitor::new(common::connected(&flaky));
    let events = monitor.subscribe();
    assert_eq!(monitor.tick(), ConnectionState::Connected);

    // the instrument stops answering
    let dead = flaky.failing_on("*IDN");
    assert!(!monitor.session_mut().is_connected());
    assert_eq!(monitor.state(), ConnectionState::Disconnected);
    assert_eq!(events.try_recv().unwrap().current, ConnectionState::Disconnected);
    assert!(monitor.data("CH1").unwrap().is_none());
    drop(dead);
}
