use super::mock::*;
use libnbiot::cellular::{Error, SessionState};
use libnbiot::network::error::Error as LinkError;
use std::time::Duration;

const ATTACH_SEQUENCE: [&str; 15] = [
    "ATE0",
    "AT+QREGSWT=2",
    "AT+NCONFIG=AUTOCONNECT,FALSE",
    "AT+NRB",
    "AT",
    "AT+CGSN=1",
    "AT+NBAND=8",
    "AT+CFUN=1",
    "AT+NSONMI=2",
    "AT+CEDRXS=0,5",
    "AT+CPSMS=0",
    "AT+CIMI",
    "AT+CGATT=1",
    "AT+CGATT?",
    "AT+CGPADDR",
];

const NOT_ATTACHED: &[&str] = &["", "+CGATT:0", "", "OK"];

fn initialized() -> Fixture {
    let fixture = Fixture::new();
    fixture.device.initialize_device().unwrap();
    fixture
}

#[test]
fn test_initialize_device() {
    let fixture = Fixture::new();
    assert_eq!(fixture.device.state(), SessionState::Disconnected);

    fixture.device.initialize_device().unwrap();

    assert_eq!(*fixture.levels.lock().unwrap(), vec![true, false]);
    assert_eq!(fixture.pauses(), vec![300, 300]);
    assert_eq!(fixture.modem().buffer_len(), Some(256));
    assert!(fixture.modem().has_urc_handler());
    assert!(fixture.modem().commands().is_empty());
    assert_eq!(fixture.device.state(), SessionState::Init);
}

#[test]
fn test_initialize_device_reset_line_failure() {
    let fixture = Fixture::with_broken_pin();
    assert_eq!(fixture.device.initialize_device(), Err(Error::Hardware));
    assert_eq!(fixture.modem().buffer_len(), None);
    assert_eq!(fixture.device.state(), SessionState::Disconnected);
}

#[test]
fn test_initialize_device_executor_failure() {
    let fixture = Fixture::new();
    fixture.modem().fail_init(LinkError::NotOpen);
    assert_eq!(fixture.device.initialize_device(), Err(Error::Transport));
    assert!(!fixture.modem().has_urc_handler());
    assert_eq!(fixture.device.state(), SessionState::Disconnected);
}

#[test]
fn test_attach_command_sequence() {
    let fixture = initialized();

    fixture.device.attach_to_network().unwrap();

    assert_eq!(fixture.modem().commands(), ATTACH_SEQUENCE);
    assert_eq!(fixture.device.state(), SessionState::Attached);
    assert_eq!(fixture.device.imei().as_str(), IMEI);
    assert_eq!(fixture.device.ip_address().as_str(), IP);

    let reboot = fixture.modem().sent()[3].clone();
    assert_eq!(reboot.timeout, Duration::from_secs(10));
    assert!(fixture.modem().sent().iter().all(|sent| !sent.awaited));
}

#[test]
fn test_attach_poll_exhaustion() {
    let fixture = initialized();
    fixture.modem().always("AT+CGATT?", Ok(NOT_ATTACHED));

    assert_eq!(fixture.device.attach_to_network(), Err(Error::Timeout));

    assert_eq!(fixture.modem().count("AT+CGATT?"), 60);
    assert_eq!(fixture.modem().count("AT+CGPADDR"), 0);
    assert_eq!(fixture.device.state(), SessionState::Init);
    assert!(fixture.device.ip_address().is_empty());

    let polls = fixture.pauses().iter().filter(|&&ms| ms == 1000).count();
    assert_eq!(polls, 60);
}

#[test]
fn test_attach_on_third_poll() {
    let fixture = initialized();
    fixture.modem().queue("AT+CGATT?", Ok(NOT_ATTACHED));
    fixture.modem().queue("AT+CGATT?", Err(LinkError::ErrorResponse));

    fixture.device.attach_to_network().unwrap();

    let commands = fixture.modem().commands();
    assert_eq!(fixture.modem().count("AT+CGATT?"), 3);
    assert_eq!(commands.len(), ATTACH_SEQUENCE.len() + 2);
    assert_eq!(&commands[..13], &ATTACH_SEQUENCE[..13]);
    assert_eq!(commands.last().map(String::as_str), Some("AT+CGPADDR"));
    assert_eq!(fixture.device.state(), SessionState::Attached);
    assert_eq!(fixture.device.ip_address().as_str(), IP);
}

#[test]
fn test_probe_waits_for_reboot() {
    let fixture = initialized();
    for _ in 0..4 {
        fixture.modem().queue("AT", Err(LinkError::Timeout));
    }

    fixture.device.attach_to_network().unwrap();

    assert_eq!(fixture.modem().count("AT"), 5);
    // reset hold and settle, then one pause per failed probe
    assert_eq!(fixture.pauses(), vec![300, 300, 1000, 1000, 1000, 1000]);
}

#[test]
fn test_attach_aborts_on_first_failure() {
    let fixture = initialized();
    fixture.modem().always("AT+NBAND=8", Err(LinkError::ErrorResponse));

    assert_eq!(fixture.device.attach_to_network(), Err(Error::Transport));

    assert_eq!(fixture.modem().commands(), &ATTACH_SEQUENCE[..7]);
    assert_eq!(fixture.device.state(), SessionState::Init);
}

#[test]
fn test_attach_aborts_before_reboot() {
    let fixture = initialized();
    fixture.modem().always("AT+QREGSWT=2", Err(LinkError::Timeout));

    assert_eq!(fixture.device.attach_to_network(), Err(Error::Transport));
    assert_eq!(fixture.modem().commands(), &ATTACH_SEQUENCE[..2]);
}

#[test]
fn test_attach_ignores_echo_and_reboot_results() {
    let fixture = initialized();
    fixture.modem().always("ATE0", Err(LinkError::ErrorResponse));
    fixture.modem().always("AT+NRB", Err(LinkError::Timeout));

    fixture.device.attach_to_network().unwrap();
    assert_eq!(fixture.modem().commands(), ATTACH_SEQUENCE);
}

#[test]
fn test_attach_out_of_memory() {
    let fixture = initialized();
    fixture.modem().always("AT+CIMI", Err(LinkError::BufferFull));

    assert_eq!(fixture.device.attach_to_network(), Err(Error::OutOfMemory));
    assert_eq!(fixture.device.state(), SessionState::Init);
}

#[test]
fn test_attach_requires_expected_status_line() {
    let fixture = initialized();
    fixture.modem().always("AT+CGATT?", Ok(&["", "OK"]));

    assert_eq!(fixture.device.attach_to_network(), Err(Error::Timeout));
}

#[test]
fn test_unreadable_imei_does_not_abort_attach() {
    let fixture = initialized();
    fixture.modem().always("AT+CGSN=1", Ok(&["", "OK"]));

    fixture.device.attach_to_network().unwrap();

    assert_eq!(fixture.modem().commands(), ATTACH_SEQUENCE);
    assert!(fixture.device.imei().is_empty());
}

#[test]
fn test_imei_transport_failure_aborts_attach() {
    let fixture = initialized();
    fixture.modem().always("AT+CGSN=1", Err(LinkError::Timeout));

    assert_eq!(fixture.device.attach_to_network(), Err(Error::Transport));
    assert_eq!(fixture.modem().commands(), &ATTACH_SEQUENCE[..6]);
}

#[test]
fn test_address_failure_keeps_attach() {
    let fixture = initialized();
    fixture.modem().always("AT+CGPADDR", Ok(&["", "OK"]));

    fixture.device.attach_to_network().unwrap();

    assert_eq!(fixture.device.state(), SessionState::Attached);
    assert!(fixture.device.ip_address().is_empty());
}

#[test]
fn test_detach_and_reattach() {
    let fixture = Fixture::attached();

    fixture.device.detach_from_network().unwrap();
    assert_eq!(fixture.modem().commands(), vec!["AT+CGATT=0"]);
    assert_eq!(fixture.device.state(), SessionState::Deattached);

    fixture.device.attach_to_network().unwrap();
    assert_eq!(fixture.device.state(), SessionState::Attached);
}

#[test]
fn test_detach_failure_keeps_state() {
    let fixture = Fixture::attached();
    fixture.modem().always("AT+CGATT=0", Err(LinkError::ErrorResponse));

    assert_eq!(fixture.device.detach_from_network(), Err(Error::Transport));
    assert_eq!(fixture.device.state(), SessionState::Attached);
}
