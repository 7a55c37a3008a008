//! Discrete actions of [`KukaEnv`](crate::KukaEnv).
use av_core::{error::AvError, Act};
use ndarray::{arr1, Array1};

/// Number of discrete actions.
pub const N_ACTIONS: usize = 6;

/// Index of a discrete end-effector displacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KukaAct(pub usize);

impl Act for KukaAct {}

impl From<usize> for KukaAct {
    fn from(a: usize) -> Self {
        Self(a)
    }
}

impl From<KukaAct> for usize {
    fn from(a: KukaAct) -> Self {
        a.0
    }
}

/// Maps action indices to displacements in the end-effector frame.
///
/// Actions `2i` and `2i + 1` move by `-delta` and `+delta` along axis `i`.
#[derive(Clone, Debug)]
pub struct ActionMap {
    displacements: Vec<Array1<f64>>,
}

impl ActionMap {
    /// Builds the map for step size `delta`.
    pub fn new(delta: f64) -> Self {
        let mut displacements = Vec::with_capacity(N_ACTIONS);
        for axis in 0..3 {
            for &sign in &[-1.0, 1.0] {
                let mut d = arr1(&[0.0, 0.0, 0.0]);
                d[axis] = sign * delta;
                displacements.push(d);
            }
        }
        Self { displacements }
    }

    /// Returns the displacement of an action in the end-effector frame.
    pub fn displacement(&self, act: KukaAct) -> Result<&Array1<f64>, AvError> {
        self.displacements
            .get(act.0)
            .ok_or(AvError::InvalidAction(act.0, N_ACTIONS))
    }

    /// Returns the number of actions.
    pub fn len(&self) -> usize {
        self.displacements.len()
    }

    /// Returns `true` if there is no action.
    pub fn is_empty(&self) -> bool {
        self.displacements.is_empty()
    }
}
