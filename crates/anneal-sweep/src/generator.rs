//! Problem instance generator.
//!
//! Generates random job-duration sequences. Seeded generators are
//! reproducible; the RNG lives in the generator, never in global state.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::error::InstanceGenerationError;
use crate::instance::{validate_shape, CoolingStrategy, ProblemInstance};

/// Generator for scheduling problem instances.
pub struct InstanceGenerator {
    rng: ChaCha8Rng,
}

impl InstanceGenerator {
    /// Create a generator. `None` seeds from the thread RNG.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self { rng }
    }

    /// Generate an instance with `job_count` durations drawn uniformly from
    /// `[min_duration, max_duration]`.
    pub fn generate(
        &mut self,
        job_count: usize,
        processor_count: usize,
        cooling: CoolingStrategy,
        min_duration: u32,
        max_duration: u32,
    ) -> Result<ProblemInstance, InstanceGenerationError> {
        validate_shape(job_count, processor_count, min_duration, max_duration)?;

        let durations: Vec<u32> = (0..job_count)
            .map(|_| self.rng.random_range(min_duration..=max_duration))
            .collect();

        ProblemInstance::new(processor_count, cooling, min_duration, max_duration, durations)
    }
}
