// WireGuard peer activity logging library
// Shared modules for daemon and tests

#![warn(missing_docs)]

//! WireGuard peer activity logging
//!
//! WireGuard is connectionless and never reports peers connecting or
//! disconnecting. This library infers it from the latest handshake of each
//! peer: a peer is active while its handshake is younger than a timeout, and
//! every change of that state is logged.
//!
//! # Main Components
//!
//! - [`cli`]: Command line arguments
//! - [`config`]: Configuration file parsing, merging and validation
//! - [`logging`]: Logger setup (stdout, syslog, file; JSON or text)
//! - [`monitor`]: Edge-triggered peer activity state machine
//! - [`names`]: wg-gen-web client name lookup
//! - [`scheduler`]: Polling loop and shutdown handling
//! - [`snapshot`]: Reading peers from the WireGuard interfaces
//! - [`types`]: Shared data structures

pub mod cli;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod names;
pub mod scheduler;
pub mod snapshot;
pub mod types;
