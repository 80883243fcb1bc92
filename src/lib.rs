//! # libnbiot - NB-IoT modem driver
//!
//! A Rust library that drives a Quectel BC28 class NB-IoT modem over its AT
//! command interface and keeps an MQTT session to the cloud alive. The MQTT
//! protocol itself runs inside the modem firmware; this crate sequences the
//! commands that bring the modem up, attach it to the network, open and
//! connect the session, and recover it when the modem reports a link failure.
//!
//! ## Features
//!
//! ### Network Layer
//! - **Link traits**: byte-stream `Read`/`Write` over any UART-like link
//! - **AT executor**: the `atat` client, ingress and URC channel on plain
//!   threads; one command in flight at a time, with unsolicited result codes
//!   (URCs) routed to a handler on a separate thread
//!
//! ### Cellular Layer
//! - **Device bring-up**: hardware reset, modem configuration and bounded
//!   network attach polling
//! - **MQTT session manager**: authentication, keep-alive, open, connect,
//!   subscribe, unsubscribe and two-phase publish
//! - **URC handler**: link status codes trigger session rebuilds, inbound
//!   messages reach the bound parser
//! - **Lifecycle orchestrator**: build, rebuild and retry-until-connected
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libnbiot = "0.1.0"
//! ```
//!
//! ### Bringing a session up
//!
//! ```rust,no_run
//! use libnbiot::cellular::{Config, Device, Urc};
//! use libnbiot::network::at::AtClient;
//! # struct Uart;
//! # impl libnbiot::network::Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl libnbiot::network::Read for Uart {
//! #     type Error = libnbiot::network::error::Error;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # struct Pin;
//! # impl embedded_hal::digital::ErrorType for Pin { type Error = core::convert::Infallible; }
//! # impl embedded_hal::digital::OutputPin for Pin {
//! #     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Delay;
//! # impl embedded_hal::delay::DelayNs for Delay { fn delay_ns(&mut self, _ns: u32) {} }
//!
//! let (client, ingress, dispatcher) = AtClient::<_, Urc>::new(Uart);
//! std::thread::spawn(move || ingress.run(Uart));
//! std::thread::spawn(move || dispatcher.run());
//!
//! let device = Device::new(client, Pin, Delay, Config::default());
//! device.bind_parser(|payload| println!("received {}", payload)).unwrap();
//!
//! device.initialize_device().unwrap();
//! device.attach_to_network().unwrap();
//! device.build_network_with_retry();
//! device.subscribe("/a1p8Pngb3oY/BC28/user/get").unwrap();
//! device.publish("/a1p8Pngb3oY/BC28/user/update", b"{\"temp\":23.5}").unwrap();
//! ```
//!
//! ## Platform Support
//!
//! The link traits and error types build on any platform supporting Rust's
//! `core` library. The AT executor and the cellular layer need threads and
//! synchronization primitives and therefore the `std` feature.
//!
//! ## Optional Features
//!
//! - `std`: Enable the AT executor and the cellular layer (default: enabled)
//! - `defmt`: Enable defmt formatting of error types for embedded debugging

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libnbiot/")]

/// Link abstraction and AT command execution.
///
/// This module contains the byte-stream traits a modem link implements, the
/// transport error type and the AT command executor that keeps command
/// responses and unsolicited result codes apart.
pub mod network;

/// NB-IoT modem device, MQTT session management and recovery.
#[cfg(feature = "std")]
pub mod cellular;
