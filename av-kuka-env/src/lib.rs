#![warn(missing_docs)]
//! Active vision environment with a Kuka arm.
//!
//! A Kuka iiwa arm carries a camera on its end effector. The agent moves the end effector
//! with 6 discrete actions to keep a target object in view. Each step, the camera frame is
//! segmented by a one-shot network conditioned on a reference image of the target, and the
//! bounding box of the segmented pixels is both the observation and, through its area, the
//! reward.
//!
//! [`KukaEnv`] implements [`av_core::Env`] and is generic over two seams:
//!
//! * [`PhysicsBackend`] - the rigid body simulator. With feature `pybullet`,
//!   [`PyBulletBackend`] drives PyBullet through PyO3.
//! * [`Segmenter`] - the segmentation network. With feature `fcn`, [`FcnSegmenter`] runs
//!   the FCN8s models through PyO3.
//!
//! ```no_run
//! # #[cfg(all(feature = "pybullet", feature = "fcn"))]
//! # fn main() -> anyhow::Result<()> {
//! use av_core::Env as _;
//! use av_kuka_env::{FcnSegmenter, KukaAct, KukaEnv, KukaEnvConfig, PyBulletBackend};
//!
//! let config = KukaEnvConfig::default().max_steps(100);
//! let mut env = KukaEnv::<PyBulletBackend, FcnSegmenter>::build(&config, 0)?;
//! let bbox = env.reset(None)?;
//! let (step, _record) = env.step(&KukaAct(5))?;
//! println!("{:?} {:?} {}", bbox, step.obs, step.reward[0]);
//! env.close()?;
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "pybullet", feature = "fcn")))]
//! # fn main() {}
//! ```
mod act;
pub mod backend;
mod base;
mod config;
mod control;
pub mod geometry;
mod obs;
mod random;
pub mod segment;

pub use act::{ActionMap, KukaAct, N_ACTIONS};
pub use backend::{BodyId, CameraImage, ConnectionMode, LinkState, MotorCommand, PhysicsBackend};
pub use base::{compute_done, EpisodeState, KukaEnv, KukaInfo, RenderMode};
pub use config::{CameraConfig, KukaEnvConfig, SceneConfig};
pub use control::{ControlConfig, ControlMode, Controller, Target};
pub use obs::BoundingBox;
pub use random::RandomPolicy;
pub use segment::{Mask, SegmentationModel, Segmenter, SegmenterConfig};

#[cfg(feature = "pybullet")]
mod pybullet;
#[cfg(feature = "pybullet")]
pub use pybullet::PyBulletBackend;

#[cfg(feature = "fcn")]
mod fcn;
#[cfg(feature = "fcn")]
pub use fcn::FcnSegmenter;
