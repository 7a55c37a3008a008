//! Action and observation spaces.
use serde::{Deserialize, Serialize};

/// Discrete space with `n` values `{0, 1, ..., n - 1}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrete {
    /// Number of possible values.
    pub n: usize,
}

impl Discrete {
    /// Creates a discrete space with `n` values.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "Discrete space must have at least 1 element");
        Self { n }
    }

    /// Returns `true` if `value` is in the space.
    pub fn contains(&self, value: usize) -> bool {
        value < self.n
    }

    /// Samples a value uniformly.
    pub fn sample(&self, rng: &fastrand::Rng) -> usize {
        rng.usize(..self.n)
    }
}

/// Box space of continuous values with element-wise bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    /// Lower bound for each element.
    pub low: Vec<f32>,

    /// Upper bound for each element.
    pub high: Vec<f32>,

    /// Shape of the space.
    pub shape: Vec<usize>,
}

impl BoxSpace {
    /// Creates a box space with the same bounds for all elements.
    pub fn uniform(shape: &[usize], low: f32, high: f32) -> Self {
        let n = shape.iter().product();
        Self {
            low: vec![low; n],
            high: vec![high; n],
            shape: shape.to_vec(),
        }
    }

    /// Returns the number of elements of a value in the space.
    pub fn num_elements(&self) -> usize {
        self.low.len()
    }

    /// Returns `true` if `value` has the right number of elements and is within the bounds.
    pub fn contains(&self, value: &[f32]) -> bool {
        value.len() == self.num_elements()
            && value
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(&v, (&l, &h))| v >= l && v <= h)
    }
}
