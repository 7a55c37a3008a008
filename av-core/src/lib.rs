#![warn(missing_docs)]
//! Core abstractions for active vision experiments.
//!
//! This crate defines the interface between environments and the policies acting on them:
//!
//! * [`Env`] - an environment with Gym-like `reset`/`step` semantics.
//! * [`Obs`], [`Act`] and [`Info`] - observation, action and per-step information of an [`Env`].
//! * [`Step`] - the value emitted at every interaction step.
//! * [`Policy`] - a mapping from observations to actions.
//! * [`Discrete`] and [`BoxSpace`] - descriptions of action and observation spaces.
//! * [`record`] - key-value records for logging, and recorders consuming them.
//! * [`Evaluator`] - runs episodes with a policy and summarizes the returns.
pub mod error;
pub mod record;
pub mod util;

mod base;
pub use base::{Act, Configurable, Env, Info, Obs, Policy, Step};

mod space;
pub use space::{BoxSpace, Discrete};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};
