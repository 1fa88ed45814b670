//! Canopy protocol core logic
//!
//! This crate contains the pure state machine logic for building a spanning
//! tree with a decentralized depth-first traversal. It is completely decoupled
//! from I/O, enabling deterministic testing.
//!
//! # Architecture: "The Hollow Shell"
//!
//! Protocol logic is strictly separated from transport concerns:
//!
//! ```text
//!      ┌──────────────────────────────┐
//!      │ canopy-core                  │
//!      │ - Exploration state machine  │
//!      │ - Neighbour selection        │
//!      │ - Tree aggregation           │
//!      └──────────────────────────────┘
//!         ↓                      ↓
//! ┌────────────────┐  ┌────────────────┐
//! │ canopy-harness │  │ canopy-node    │
//! │ (Turmoil)      │  │ (Tokio TCP)    │
//! │ - Virtual time │  │ - Real network │
//! │ - Seeded RNG   │  │ - OS entropy   │
//! │ - Scenarios    │  │ - CLI          │
//! └────────────────┘  └────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - No I/O in Core: Never call `tokio::spawn`, `std::time::Instant::now()`, or
//!   `rand::thread_rng()` directly
//! - Environment Trait: randomness goes through the `Environment` trait
//! - Deterministic: Given the same inputs and selection choices, produce the
//!   same outputs
//!
//! # Modules
//!
//! - [`addr`]: Node addresses
//! - [`directory`]: Static neighbour directory and edge metadata
//! - [`explorer`]: Exploration state machine (parent, children, termination)
//! - [`selection`]: Neighbour selection policies
//! - [`tree`]: Per-node reports and spanning-tree aggregation
//! - [`env`]: Environment abstraction (sleep, RNG)
//! - [`transport`]: Transport abstraction (one connection per message)
//! - [`error`]: Error types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod addr;
pub mod directory;
pub mod env;
pub mod error;
pub mod explorer;
pub mod selection;
pub mod transport;
pub mod tree;

pub use addr::NodeAddr;
pub use directory::{EdgeWeight, Neighbour, NeighbourDirectory, NodeIdentity};
pub use error::{DirectoryError, ExplorationError, TreeError};
pub use explorer::{Explorer, ExplorerAction, ExplorerState};
pub use selection::{LightestEdge, SelectionPolicy, UniformRandom};
pub use tree::{SpanningTree, TreeReport};
