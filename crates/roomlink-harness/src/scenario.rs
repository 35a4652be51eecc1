//! Seeded random walks.
//!
//! The same seed always yields the same operations, so a failing walk can be
//! replayed by seed alone.

use arbitrary::{Arbitrary, Unstructured};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roomlink_core::SupervisorConfig;

use crate::{invariants::InvariantRegistry, operation::Operation, sim_driver::SimDriver};

/// Bytes of entropy drawn per generated operation.
const BYTES_PER_OPERATION: usize = 8;

/// Generate `steps` operations from `seed`.
pub fn random_operations(seed: u64, steps: usize) -> Vec<Operation> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bytes = vec![0u8; steps * BYTES_PER_OPERATION];
    rng.fill_bytes(&mut bytes);

    let mut u = Unstructured::new(&bytes);
    (0..steps).map_while(|_| Operation::arbitrary(&mut u).ok()).collect()
}

/// Run a seeded walk from a started session in `room`, checking every
/// standard invariant after each step.
///
/// # Panics
///
/// Panics with the seed and the violation if an invariant breaks.
pub fn run_walk(seed: u64, steps: usize, room: &str) -> SimDriver {
    let mut driver = SimDriver::new(SupervisorConfig::default(), room)
        .with_invariants(InvariantRegistry::standard());
    driver.start();

    for op in random_operations(seed, steps) {
        tracing::trace!("seed {seed}: {op:?}");
        driver.apply(&op);
    }
    driver
}
