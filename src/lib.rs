//! A test wrapper for a feature flag SDK, letting test suites written in any language drive flag
//! evaluation over HTTP.
//!
//! # Overview
//!
//! The crate consists of two parts:
//!
//! - [`CfClient`], a flag client that authenticates against the flag service, polls flags and
//!   target segments in the background, and evaluates flags for a [`Target`] locally.
//! - [`WrapperServer`], an embedded HTTP server that exposes any [`FlagClient`] through a small
//!   set of endpoints:
//!
//! | Path                  | Method | Response                                  |
//! |-----------------------|--------|-------------------------------------------|
//! | `/sdk/version`        | GET    | `{"version": "..."}`                      |
//! | `/api/1.0/ping`       | GET    | `{"ok": true}`                            |
//! | `/api/1.0/check_flag` | POST   | `{"flag_key": "...", "flag_value": "..."}` |
//!
//! Anything else is answered with `404 Not found`. Failures while handling a request are answered
//! with `500` and the failure message as a plain text body.
//!
//! # Error Handling
//!
//! Lifecycle and client errors are represented by the [`Error`] enum. Flag evaluation never fails:
//! when a flag cannot be evaluated, the supplied default is returned and a message is logged.
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with target `ff_wrapper`. The
//! `ff-test-wrapper` binary installs [`env_logger`](https://docs.rs/env_logger), see
//! [`logging::init()`].
//!
//! # Examples
//!
//! ```no_run
//! # use ff_wrapper::{ServerConfig, Status, WrapperServer};
//! let mut server = WrapperServer::new(ServerConfig::new(4000, "sdk-key"));
//! let ready = server.start()?;
//! server.wait_for_shutdown_signal()?;
//! server.stop();
//! # Ok::<(), ff_wrapper::Error>(())
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod configuration_store;
mod connector;
mod error;
mod eval;
mod models;
mod poller;
mod rules;
mod sharder;

pub mod logging;
pub mod server;

pub use client::{CfClient, FlagClient, Target, TargetBuilder};
pub use config::{ClientConfig, LoggerType, ServerConfig, WrapperConfig};
pub use error::{Error, Result};
pub use server::{FlagKind, LifecycleState, Status, WrapperServer};
