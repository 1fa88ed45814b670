//! Scenario testing framework for deterministic multi-node simulation.
//!
//! This module provides a declarative API for writing scenario-based tests
//! that follow the Oracle Pattern: build a [`Scenario`] from a topology, run
//! it to quiescence, and let an oracle verify the resulting [`World`].

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use oracle::OracleFn;
pub use world::{NodeFailure, PolicyKind, World};
