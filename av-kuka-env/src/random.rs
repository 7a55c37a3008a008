//! Uniformly random policy.
use crate::{act::N_ACTIONS, backend::PhysicsBackend, segment::Segmenter, KukaAct, KukaEnv};
use av_core::{Discrete, Policy};

/// Samples actions uniformly from the 6 displacements.
pub struct RandomPolicy {
    space: Discrete,
    rng: fastrand::Rng,
}

impl RandomPolicy {
    /// Constructs a policy with a seeded random number generator.
    pub fn new(seed: u64) -> Self {
        Self {
            space: Discrete::new(N_ACTIONS),
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl<B: PhysicsBackend, S: Segmenter> Policy<KukaEnv<B, S>> for RandomPolicy {
    fn sample(&mut self, _: &crate::BoundingBox) -> KukaAct {
        KukaAct(self.space.sample(&self.rng))
    }
}
