//! Canopy node runtime.
//!
//! This crate is the I/O shell around [`canopy_core`]: it loads a node's
//! configuration, listens for framed messages over TCP, drives the
//! exploration state machine and reports the node's place in the spanning
//! tree once it terminates.
//!
//! # Modules
//!
//! - [`config`]: YAML node configuration
//! - [`runtime`]: Receive loop and fire-and-forget send lanes
//! - [`tcp`]: Tokio TCP transport
//! - [`env`]: Production environment (Tokio timers, OS entropy)
//! - [`orchestrator`]: Run a whole cluster in one process
//! - [`error`]: Node error types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod tcp;

pub use config::{ConfigError, DEFAULT_PORT, NeighbourConfig, NodeConfig};
pub use env::SystemEnv;
pub use error::NodeError;
pub use runtime::NodeRuntime;
pub use tcp::TcpTransport;
