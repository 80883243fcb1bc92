//! Device, session and recovery behavior against a scripted modem.

mod bringup;
mod lifecycle;
mod mock;
