use super::mock::*;
use libnbiot::cellular::{Error, SessionState};
use libnbiot::network::error::Error as LinkError;

const KEEPALIVE: &str = "AT+QMTCFG=\"keepalive\",0,300";
const AUTH: &str =
    "AT+QMTCFG=\"aliauth\",0,\"a1p8Pngb3oY\",\"BC28\",\"miYe6iSBGKbYq71nhkd0cddVT2PSlPGs\"";
const OPEN: &str = "AT+QMTOPEN=0,\"a1p8Pngb3oY.iot-as-mqtt.cn-shanghai.aliyuncs.com\",1883";
const CONNECT: &str = "AT+QMTCONN=0,\"867726037265602\"";
const CLOSE: &str = "AT+QMTCLOSE=0";

#[test]
fn test_build_network() {
    let fixture = Fixture::attached();

    fixture.device.build_network().unwrap();

    assert_eq!(fixture.modem().commands(), vec![KEEPALIVE, AUTH, OPEN, CONNECT]);
    assert_eq!(fixture.device.state(), SessionState::Connected);
}

#[test]
fn test_build_network_stops_at_first_failure() {
    let fixture = Fixture::attached();
    fixture.modem().always(AUTH, Err(LinkError::ErrorResponse));

    assert_eq!(fixture.device.build_network(), Err(Error::Transport));

    assert_eq!(fixture.modem().commands(), vec![KEEPALIVE, AUTH]);
    assert_eq!(fixture.device.state(), SessionState::Attached);
}

#[test]
fn test_build_network_keepalive_failure() {
    let fixture = Fixture::attached();
    fixture.modem().always(KEEPALIVE, Err(LinkError::Timeout));

    assert_eq!(fixture.device.build_network(), Err(Error::Transport));
    assert_eq!(fixture.modem().commands(), vec![KEEPALIVE]);
}

#[test]
fn test_rebuild_network_closes_first() {
    let fixture = Fixture::attached();

    fixture.device.rebuild_network().unwrap();

    assert_eq!(
        fixture.modem().commands(),
        vec![CLOSE, KEEPALIVE, AUTH, OPEN, CONNECT]
    );
}

#[test]
fn test_rebuild_network_ignores_close_failure() {
    let fixture = Fixture::attached();
    fixture.modem().always(CLOSE, Err(LinkError::ErrorResponse));

    fixture.device.rebuild_network().unwrap();

    assert_eq!(
        fixture.modem().commands(),
        vec![CLOSE, KEEPALIVE, AUTH, OPEN, CONNECT]
    );
    assert_eq!(fixture.device.state(), SessionState::Connected);
}

#[test]
fn test_rebuild_network_reports_build_failure() {
    let fixture = Fixture::attached();
    fixture.modem().always(CONNECT, Err(LinkError::Timeout));

    assert_eq!(fixture.device.rebuild_network(), Err(Error::Transport));
    assert_eq!(fixture.device.state(), SessionState::Attached);
}

#[test]
fn test_build_network_with_retry() {
    let fixture = Fixture::attached();
    fixture.modem().queue(OPEN, Err(LinkError::Timeout));
    fixture.modem().queue(OPEN, Ok(&["", "OK", "", "+QMTOPEN: 0,2"]));

    assert_eq!(fixture.device.build_network_with_retry(), 3);

    assert_eq!(
        fixture.modem().commands(),
        vec![
            KEEPALIVE, AUTH, OPEN, CLOSE, KEEPALIVE, AUTH, OPEN, CLOSE, KEEPALIVE, AUTH, OPEN,
            CONNECT,
        ]
    );
    assert_eq!(fixture.device.state(), SessionState::Connected);
}

#[test]
fn test_build_network_with_retry_first_attempt() {
    let fixture = Fixture::attached();

    assert_eq!(fixture.device.build_network_with_retry(), 1);
    assert_eq!(fixture.modem().count(CLOSE), 0);
}

#[test]
fn test_deactivate_pdp_is_silent() {
    let fixture = Fixture::connected();

    fixture.device.deactivate_pdp();

    assert!(fixture.modem().commands().is_empty());
    assert_eq!(fixture.device.state(), SessionState::Connected);
}
