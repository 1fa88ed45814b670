//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use crate::{
    Topology,
    scenario::{OracleFn, PolicyKind, World},
};

/// Deliveries after which a scenario is considered livelocked.
const DEFAULT_MAX_STEPS: usize = 100_000;

/// Scenario builder.
///
/// Construct a scenario from a topology, pick the root, seed and policy, and
/// add an oracle verification function.
pub struct Scenario {
    topology: Topology,
    root: usize,
    seed: u64,
    policy: PolicyKind,
    max_steps: usize,
}

impl Scenario {
    /// Create a scenario on `topology` rooted at node 0 with seed 0.
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            root: 0,
            seed: 0,
            policy: PolicyKind::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Start the traversal from node `index`.
    pub fn root(mut self, index: usize) -> Self {
        self.root = index;
        self
    }

    /// Seed for delivery order and neighbour selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Selection policy used by every node.
    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Upper bound on deliveries before the run is declared stuck.
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Kicks off the root, then delivers in-flight messages in seeded random
    /// order until the network is quiet. The oracle then checks the final
    /// world, which is returned for further inspection.
    ///
    /// # Errors
    ///
    /// Returns a description if the root is out of range, the run exceeds its
    /// step budget, or the oracle rejects the outcome.
    pub fn run(self) -> Result<World, String> {
        let Scenario { topology, root, seed, policy, max_steps } = self.scenario;
        if root >= topology.len() {
            return Err(format!("root {root} outside topology of {} nodes", topology.len()));
        }

        let root_addr = topology.addr(root);
        let mut world = World::new(topology, root, policy, seed);
        world.start(root_addr);

        let mut steps = 0;
        while world.step() {
            steps += 1;
            if steps > max_steps {
                return Err(format!(
                    "no quiescence after {max_steps} deliveries ({} in flight)",
                    world.in_flight()
                ));
            }
        }

        (self.oracle)(&world)?;

        Ok(world)
    }
}
