//! Deterministic simulation harness for Canopy protocol testing.
//!
//! Two levels of simulation are provided:
//!
//! - [`scenario`]: every node's [`Explorer`](canopy_core::Explorer) lives in
//!   one in-memory [`World`](scenario::World). A seeded scheduler decides
//!   which in-flight message is delivered next, so interleavings (including
//!   crossing probes) are explored reproducibly and checked by oracles.
//! - [`cluster`]: full [`NodeRuntime`](canopy_node::NodeRuntime)s running over
//!   Turmoil's simulated TCP using [`SimTransport`] and [`SimEnv`].
//!
//! Graphs for both come from [`Topology`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod scenario;
mod sim_env;
mod sim_transport;
pub mod topology;

pub use cluster::Cluster;
pub use sim_env::SimEnv;
pub use sim_transport::SimTransport;
pub use topology::Topology;
