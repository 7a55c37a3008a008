//! Exploration and tracking controller of the end effector.
//!
//! When the target is (almost) out of view, the controller ignores the agent and sweeps
//! the end effector around the robot base. Otherwise the agent's action moves the end
//! effector in its own frame.
use crate::{
    act::{ActionMap, KukaAct},
    backend::MotorCommand,
    geometry::rotate_xy,
};
use anyhow::Result;
use av_core::error::AvError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// Parameters of the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Bounding-box area below which the target is considered lost.
    pub lost_target_area_threshold: f32,

    /// Position gain while exploring.
    pub exploration_gain: f64,

    /// Position gain while following the agent's actions.
    pub tracking_gain: f64,

    /// Rotation about the vertical axis per exploration step, in radians.
    pub exploration_angle: f64,

    /// Horizontal distance of exploration targets from the base.
    pub exploration_radius: f64,

    /// Height of exploration targets.
    pub exploration_height: f64,

    /// Maximum force of each joint motor.
    pub max_force: f64,

    /// Target velocity of each joint.
    pub target_velocity: f64,

    /// Velocity gain of each joint.
    pub velocity_gain: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            lost_target_area_threshold: 0.02,
            exploration_gain: 0.15,
            tracking_gain: 0.03,
            exploration_angle: -FRAC_PI_4,
            exploration_radius: 2.0,
            exploration_height: 0.5,
            max_force: 300.0,
            target_velocity: 0.0,
            velocity_gain: 1.0,
        }
    }
}

impl ControlConfig {
    /// Sets the area threshold of a lost target.
    pub fn lost_target_area_threshold(mut self, v: f32) -> Self {
        self.lost_target_area_threshold = v;
        self
    }

    /// Sets the position gain while exploring.
    pub fn exploration_gain(mut self, v: f64) -> Self {
        self.exploration_gain = v;
        self
    }

    /// Sets the position gain while tracking.
    pub fn tracking_gain(mut self, v: f64) -> Self {
        self.tracking_gain = v;
        self
    }
}

/// Which branch of the controller produced a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    /// The target was lost and the end effector sweeps around the base.
    Explore,

    /// The agent's action moved the end effector.
    Track,
}

/// End-effector target chosen for a step.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// Branch that chose the target.
    pub mode: ControlMode,

    /// World-frame position.
    pub position: [f64; 3],
}

/// Chooses end-effector targets and turns them into motor commands.
#[derive(Clone, Debug)]
pub struct Controller {
    config: ControlConfig,
    action_map: ActionMap,
}

impl Controller {
    /// Constructs a controller with actions of step size `delta`.
    pub fn new(config: ControlConfig, delta: f64) -> Self {
        Self {
            config,
            action_map: ActionMap::new(delta),
        }
    }

    /// Parameters of the controller.
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// The map from actions to displacements.
    pub fn action_map(&self) -> &ActionMap {
        &self.action_map
    }

    /// Chooses the next end-effector target.
    ///
    /// `bbox_area` is the area of the latest bounding box, `position` and `rot` the
    /// current end-effector pose. `act` is only used when the target is in view.
    pub fn resolve(
        &self,
        bbox_area: f32,
        act: KukaAct,
        position: &Array1<f64>,
        rot: &Array2<f64>,
    ) -> Result<Target, AvError> {
        if bbox_area < self.config.lost_target_area_threshold {
            Ok(Target {
                mode: ControlMode::Explore,
                position: self.explore(position),
            })
        } else {
            let world_disp = rot.dot(self.action_map.displacement(act)?);
            let p = position + &world_disp;
            Ok(Target {
                mode: ControlMode::Track,
                position: [p[0], p[1], p[2]],
            })
        }
    }

    /// Rotates the horizontal position about the base and puts it on the exploration circle.
    pub fn explore(&self, position: &Array1<f64>) -> [f64; 3] {
        let c = &self.config;
        let (mut x, mut y) = (position[0], position[1]);
        if x.hypot(y) < 1e-9 {
            x = 1.0;
            y = 0.0;
        }
        let (x, y) = rotate_xy(x, y, c.exploration_angle);
        let norm = x.hypot(y);
        [
            x / norm * c.exploration_radius,
            y / norm * c.exploration_radius,
            c.exploration_height,
        ]
    }

    /// Position gain of a branch.
    pub fn gain(&self, mode: ControlMode) -> f64 {
        match mode {
            ControlMode::Explore => self.config.exploration_gain,
            ControlMode::Track => self.config.tracking_gain,
        }
    }

    /// Position control of the first `num_joints` joints towards `joint_positions`.
    pub fn motor_command(
        &self,
        joint_positions: &[f64],
        num_joints: usize,
        mode: ControlMode,
    ) -> Result<MotorCommand, AvError> {
        if joint_positions.len() < num_joints {
            return Err(AvError::ShapeMismatch {
                expected: num_joints,
                actual: joint_positions.len(),
            });
        }
        let c = &self.config;
        Ok(MotorCommand {
            joint_indices: (0..num_joints).collect(),
            target_positions: joint_positions[..num_joints].to_vec(),
            forces: vec![c.max_force; num_joints],
            position_gains: vec![self.gain(mode); num_joints],
            target_velocities: vec![c.target_velocity; num_joints],
            velocity_gains: vec![c.velocity_gain; num_joints],
        })
    }
}
