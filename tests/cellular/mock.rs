#![allow(dead_code)]

use atat::{AtatCmd, AtatUrc};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use libnbiot::cellular::{Config, Device, Urc};
use libnbiot::network::at::{CommandExecutor, UrcHandler, command_text, command_timeout};
use libnbiot::network::error::Error;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IMEI: &str = "867726037265602";
pub const IP: &str = "10.172.3.99";

type Outcome = Result<Vec<String>, Error>;

/// One executed command, as the modem would have seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub command: String,
    /// Command deadline, or the acknowledgement deadline when awaited.
    pub timeout: Duration,
    /// Whether a result URC was awaited after the `OK`.
    pub awaited: bool,
}

#[derive(Default)]
struct Inner {
    sent: Vec<Sent>,
    queued: HashMap<String, VecDeque<Outcome>>,
    fixed: HashMap<String, Outcome>,
    handler: Option<UrcHandler<Urc>>,
    buffer_len: Option<usize>,
    init_error: Option<Error>,
}

/// Executor double answering like a healthy BC28 unless told otherwise.
///
/// Replies are scripted as the lines the modem prints. They are split the
/// way the digester splits them: MQTT result lines become URCs, `OK` and the
/// `>` prompt end the response, everything else is the response body.
#[derive(Default)]
pub struct MockExecutor {
    inner: Mutex<Inner>,
}

fn outcome(reply: Result<&[&str], Error>) -> Outcome {
    reply.map(|lines| lines.iter().map(|line| line.to_string()).collect())
}

fn default_reply(command: &str) -> Vec<String> {
    let lines: &[&str] = if command == "AT+CGSN=1" {
        &["", "+CGSN:867726037265602", "", "OK"]
    } else if command == "AT+CGATT?" {
        &["", "+CGATT:1", "", "OK"]
    } else if command == "AT+CGPADDR" {
        &["", "+CGPADDR:0,10.172.3.99", "", "OK"]
    } else if command == "AT+CIMI" {
        &["", "460111174590523", "", "OK"]
    } else if command.starts_with("AT+QMTOPEN=") {
        &["", "OK", "", "+QMTOPEN: 0,0"]
    } else if command.starts_with("AT+QMTCONN=") {
        &["", "OK", "", "+QMTCONN: 0,0,0"]
    } else if command.starts_with("AT+QMTSUB=") {
        &["", "OK", "", "+QMTSUB: 0,1,0,0"]
    } else if command.starts_with("AT+QMTPUB=") {
        &["", ">"]
    } else if command.ends_with('\u{1A}') {
        &["", "OK", "", "+QMTPUB: 0,0,0"]
    } else {
        &["", "OK"]
    };
    lines.iter().map(|line| line.to_string()).collect()
}

/// The response body and the URCs among the scripted lines.
fn split(lines: &[String]) -> (String, Vec<Urc>) {
    let mut body = Vec::new();
    let mut urcs = Vec::new();
    for line in lines {
        if let Some(urc) = <Urc as AtatUrc>::parse(line.as_bytes()) {
            urcs.push(urc);
        } else if !line.is_empty() && line != "OK" && line != ">" {
            body.push(line.as_str());
        }
    }
    (body.join("\r\n"), urcs)
}

impl MockExecutor {
    /// Answer the next occurrence of `command` with `reply`. Queued replies
    /// are used up in order before fixed or default replies apply.
    pub fn queue(&self, command: &str, reply: Result<&[&str], Error>) {
        self.inner
            .lock()
            .unwrap()
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(outcome(reply));
    }

    /// Answer every occurrence of `command` with `reply`.
    pub fn always(&self, command: &str, reply: Result<&[&str], Error>) {
        self.inner
            .lock()
            .unwrap()
            .fixed
            .insert(command.to_string(), outcome(reply));
    }

    pub fn fail_init(&self, error: Error) {
        self.inner.lock().unwrap().init_error = Some(error);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.sent().into_iter().map(|sent| sent.command).collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().sent.clear();
    }

    pub fn buffer_len(&self) -> Option<usize> {
        self.inner.lock().unwrap().buffer_len
    }

    pub fn has_urc_handler(&self) -> bool {
        self.inner.lock().unwrap().handler.is_some()
    }

    /// Deliver an unsolicited line the way the dispatcher would. Returns
    /// whether it decoded as a URC and reached a handler.
    pub fn emit(&self, line: &str) -> bool {
        let handler = self.inner.lock().unwrap().handler.clone();
        match (handler, <Urc as AtatUrc>::parse(line.as_bytes())) {
            (Some(handler), Some(urc)) => {
                handler(&urc);
                true
            }
            _ => false,
        }
    }

    fn exchange<Cmd: AtatCmd>(&self, cmd: &Cmd, timeout: Duration, awaited: bool) -> Outcome {
        let mut inner = self.inner.lock().unwrap();
        let command = command_text(cmd);
        inner.sent.push(Sent {
            command: command.clone(),
            timeout,
            awaited,
        });

        let queued = inner
            .queued
            .get_mut(&command)
            .and_then(|replies| replies.pop_front());
        queued
            .or_else(|| inner.fixed.get(&command).cloned())
            .unwrap_or_else(|| Ok(default_reply(&command)))
    }
}

impl CommandExecutor for MockExecutor {
    type Urc = Urc;

    fn init(&self, buffer_len: usize) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.init_error {
            return Err(error);
        }
        inner.buffer_len = Some(buffer_len);
        Ok(())
    }

    fn send<Cmd: AtatCmd>(&self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        let lines = self.exchange(cmd, command_timeout::<Cmd>(), false)?;
        let (body, _) = split(&lines);
        cmd.parse(Ok(body.as_bytes())).map_err(Error::from)
    }

    fn send_and_await<Cmd, T, F>(&self, cmd: &Cmd, timeout: Duration, mut accept: F) -> Result<T, Error>
    where
        Cmd: AtatCmd,
        F: FnMut(&Urc) -> Option<T>,
    {
        let lines = self.exchange(cmd, timeout, true)?;
        let (body, urcs) = split(&lines);
        cmd.parse(Ok(body.as_bytes())).map_err(Error::from)?;
        urcs.iter().find_map(|urc| accept(urc)).ok_or(Error::Timeout)
    }

    fn set_urc_handler(&self, handler: UrcHandler<Urc>) {
        self.inner.lock().unwrap().handler = Some(handler);
    }
}

/// Reset line double recording every level it is driven to.
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    pub levels: Arc<Mutex<Vec<bool>>>,
    pub broken: bool,
}

impl ErrorType for MockPin {
    type Error = ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.broken {
            return Err(ErrorKind::Other);
        }
        self.levels.lock().unwrap().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.broken {
            return Err(ErrorKind::Other);
        }
        self.levels.lock().unwrap().push(true);
        Ok(())
    }
}

/// Delay double that returns at once and records the requested pauses.
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    pub pauses_ms: Arc<Mutex<Vec<u32>>>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.pauses_ms.lock().unwrap().push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.pauses_ms.lock().unwrap().push(ms);
    }
}

pub type MockDevice = Device<MockExecutor, MockPin, MockDelay>;

pub struct Fixture {
    pub device: Arc<MockDevice>,
    pub levels: Arc<Mutex<Vec<bool>>>,
    pub pauses_ms: Arc<Mutex<Vec<u32>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(MockPin::default(), config)
    }

    pub fn with_broken_pin() -> Self {
        let pin = MockPin {
            broken: true,
            ..MockPin::default()
        };
        Self::build(pin, Config::default())
    }

    fn build(pin: MockPin, config: Config) -> Self {
        let delay = MockDelay::default();
        let levels = pin.levels.clone();
        let pauses_ms = delay.pauses_ms.clone();
        let device = Device::new(MockExecutor::default(), pin, delay, config);
        Self {
            device,
            levels,
            pauses_ms,
        }
    }

    /// A device that went through initialization and attach.
    pub fn attached() -> Self {
        let fixture = Self::new();
        fixture.device.initialize_device().unwrap();
        fixture.device.attach_to_network().unwrap();
        fixture.modem().clear();
        fixture
    }

    /// A device with an established MQTT session.
    pub fn connected() -> Self {
        let fixture = Self::attached();
        fixture.device.build_network().unwrap();
        fixture.modem().clear();
        fixture
    }

    pub fn modem(&self) -> &MockExecutor {
        self.device.executor()
    }

    pub fn pauses(&self) -> Vec<u32> {
        self.pauses_ms.lock().unwrap().clone()
    }
}
