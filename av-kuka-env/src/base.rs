//! The active vision environment.
use crate::{
    act::{KukaAct, N_ACTIONS},
    backend::{BodyId, CameraImage, ConnectionMode, PhysicsBackend},
    control::{ControlMode, Controller},
    geometry::{projection_matrix_fov, quaternion_from_euler, quaternion_to_matrix, CameraMount, Mat4},
    obs::BoundingBox,
    segment::Segmenter,
    KukaEnvConfig,
};
use anyhow::{Context, Result};
use av_core::{
    error::AvError,
    record::{Record, RecordValue},
    BoxSpace, Discrete, Env, Info, Obs, Step,
};
use image::RgbImage;
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2};
use std::f64::consts::PI;

/// Information attached to every [`Step`] of [`KukaEnv`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KukaInfo {
    /// Branch of the controller taken in the step.
    pub mode: ControlMode,
}

impl Info for KukaInfo {}

/// Lifecycle of an episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeState {
    /// Built, but never reset.
    Uninitialized,

    /// Accepting steps.
    Stepping,

    /// The step limit was reached. Only `reset` is accepted.
    Done,
}

/// Render modes of [`KukaEnv::render`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// The simulator GUI shows the scene when the environment was built with `render`.
    Human,

    /// Returns the current wrist camera frame.
    RgbArray,
}

/// Disconnects a backend on a failed construction.
fn release<B: PhysicsBackend>(backend: B) {
    if let Err(e) = backend.disconnect() {
        warn!("Failed to disconnect the physics backend: {}", e);
    }
}

/// `true` once the episode has run `max_steps` steps.
pub fn compute_done(step_counter: usize, max_steps: usize) -> bool {
    step_counter >= max_steps
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A Kuka arm with a wrist camera looking for a target object.
///
/// The observation is the bounding box of the target in the camera frame, found by a
/// [`Segmenter`] conditioned on a reference image of the target. The reward is the area of
/// the bounding box. While the target is out of view, the agent's action is ignored and the
/// arm sweeps around its base (see [`Controller`]).
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Uninitialized: build
///     Uninitialized --> Stepping: reset
///     Stepping --> Stepping: step
///     Stepping --> Done: step, counter reaches max_steps
///     Done --> Stepping: reset
///     Stepping --> Stepping: reset
/// ```
///
/// Each step runs: action resolution, one physics step, refresh of the end-effector pose
/// and camera frame, segmentation and bounding box. The bounding box is computed once per
/// step and is both the observation and the input of the reward and of the next step's
/// branch decision.
pub struct KukaEnv<B: PhysicsBackend, S: Segmenter> {
    config: KukaEnvConfig,
    backend: B,
    segmenter: S,
    target_image: RgbImage,
    controller: Controller,
    camera_mount: CameraMount,
    projection_matrix: Mat4,
    rng: fastrand::Rng,
    robot: Option<BodyId>,
    object_position: Option<[f64; 3]>,
    state: EpisodeState,
    end_effector_pos: Array1<f64>,
    rot_matrix: Array2<f64>,
    camera_image: Option<CameraImage>,
    step_counter: usize,
    bbox: BoundingBox,
}

impl<B: PhysicsBackend, S: Segmenter> KukaEnv<B, S> {
    /// Constructs the environment from a connected backend and a loaded segmenter.
    ///
    /// `seed` drives the placement of the target object.
    pub fn from_parts(
        config: KukaEnvConfig,
        mut backend: B,
        segmenter: S,
        target_image: RgbImage,
        seed: i64,
    ) -> Result<Self> {
        if let Some(path) = config.scene.search_path.as_ref() {
            if let Err(e) = backend.set_additional_search_path(path) {
                release(backend);
                return Err(e);
            }
        }
        let camera = &config.camera;
        let projection_matrix =
            projection_matrix_fov(camera.fov, camera.aspect, camera.near, camera.far);
        let camera_mount = CameraMount {
            eye_offset: camera.eye_offset,
            target_offset: camera.target_offset,
        };
        let controller = Controller::new(config.control.clone(), config.delta);
        info!("Environment initialized");

        Ok(Self {
            backend,
            segmenter,
            target_image,
            controller,
            camera_mount,
            projection_matrix,
            rng: fastrand::Rng::with_seed(seed as u64),
            robot: None,
            object_position: None,
            state: EpisodeState::Uninitialized,
            end_effector_pos: Array1::zeros(3),
            rot_matrix: Array2::eye(3),
            camera_image: None,
            step_counter: 0,
            bbox: BoundingBox::default(),
            config,
        })
    }

    /// Discrete space of the 6 end-effector displacements.
    pub fn action_space(&self) -> Discrete {
        Discrete::new(N_ACTIONS)
    }

    /// Box space of bounding boxes, 4 values in `[0, 1]`.
    pub fn observation_space(&self) -> BoxSpace {
        BoxSpace::uniform(&[4], 0.0, 1.0)
    }

    /// Configuration of the environment.
    pub fn config(&self) -> &KukaEnvConfig {
        &self.config
    }

    /// Lifecycle state.
    pub fn state(&self) -> EpisodeState {
        self.state
    }

    /// Steps taken in the current episode.
    pub fn step_counter(&self) -> usize {
        self.step_counter
    }

    /// Latest bounding box.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// World-frame position of the end effector.
    pub fn end_effector_position(&self) -> &Array1<f64> {
        &self.end_effector_pos
    }

    /// Rotation of the end-effector frame.
    pub fn rotation_matrix(&self) -> &Array2<f64> {
        &self.rot_matrix
    }

    /// Latest camera frame.
    pub fn camera_image(&self) -> Option<&CameraImage> {
        self.camera_image.as_ref()
    }

    /// Position of the target object in the current episode.
    pub fn object_position(&self) -> Option<[f64; 3]> {
        self.object_position
    }

    /// The fixed projection matrix of the camera.
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// The physics backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Renders the environment.
    ///
    /// [`RenderMode::Human`] returns `None`; the GUI is driven by the backend connection.
    pub fn render(&self, mode: RenderMode) -> Result<Option<RgbImage>> {
        match (mode, self.camera_image.as_ref()) {
            (RenderMode::RgbArray, Some(img)) => Ok(Some(img.rgb()?)),
            _ => Ok(None),
        }
    }

    /// Disconnects the physics backend.
    pub fn close(self) -> Result<()> {
        info!("Closing the environment");
        self.backend.disconnect()
    }

    fn init_simulation(&mut self) -> Result<()> {
        let scene = &self.config.scene;
        self.backend.set_gravity(scene.gravity)?;
        self.backend.set_time_step(scene.time_step)?;

        let identity = quaternion_from_euler([0.0, 0.0, 0.0]);
        self.backend
            .load_urdf(&scene.plane_urdf, [0.0, 0.0, 0.0], identity)
            .with_context(|| format!("Failed to load {}", scene.plane_urdf))?;
        let base = scene.robot_position;
        let robot = self
            .backend
            .load_urdf(&scene.robot_urdf, base, identity)
            .with_context(|| format!("Failed to load {}", scene.robot_urdf))?;

        // The object is placed at a random angle around the robot.
        let theta = self.rng.f64() * 2.0 * PI;
        let object_position = [
            base[0] + scene.object_radius * theta.cos(),
            base[1] + scene.object_radius * theta.sin(),
            scene.object_height,
        ];
        self.backend
            .load_urdf(&scene.object_urdf, object_position, identity)
            .with_context(|| format!("Failed to load {}", scene.object_urdf))?;
        debug!("Target object at {:?}", object_position);

        self.robot = Some(robot);
        self.object_position = Some(object_position);
        self.update_state_quantities()
    }

    fn robot(&self) -> Result<BodyId> {
        self.robot.ok_or_else(|| AvError::NotReset.into())
    }

    /// Reads the end-effector pose and renders a new camera frame.
    fn update_state_quantities(&mut self) -> Result<()> {
        let robot = self.robot()?;
        let link = self
            .backend
            .link_state(robot, self.config.scene.end_effector_link)?;
        self.end_effector_pos = Array1::from(link.position.to_vec());
        self.rot_matrix = quaternion_to_matrix(link.orientation);

        let view = self
            .camera_mount
            .view(&self.end_effector_pos, &self.rot_matrix);
        let size = self.config.camera.image_size;
        let img = self
            .backend
            .camera_image(size, size, &view, &self.projection_matrix)?;
        self.camera_image = Some(img);
        Ok(())
    }

    fn step_simulation(&mut self) -> Result<()> {
        self.backend.step_simulation()?;
        self.update_state_quantities()
    }

    /// Segments the current frame and returns the bounding box of the target.
    fn compute_observation(&mut self) -> Result<BoundingBox> {
        let frame = self
            .camera_image
            .as_ref()
            .ok_or(AvError::NotReset)?
            .rgb()?;
        let mask = self.segmenter.mask(&frame, &self.target_image)?;
        let (h, w) = (frame.height() as usize, frame.width() as usize);
        if mask.dim() != (h, w) {
            return Err(AvError::ShapeMismatch {
                expected: h * w,
                actual: mask.len(),
            }
            .into());
        }
        Ok(BoundingBox::from_mask(
            &mask,
            self.config.camera.image_size as f32,
        ))
    }

    /// Drives the end effector towards `target` with the gain of `mode`.
    fn assign_throttle(&mut self, target: [f64; 3], mode: ControlMode) -> Result<()> {
        let robot = self.robot()?;
        let scene = &self.config.scene;
        let joint_positions =
            self.backend
                .inverse_kinematics(robot, scene.end_effector_link, target)?;
        let command = self
            .controller
            .motor_command(&joint_positions, scene.num_joints, mode)?;
        self.backend.set_joint_motor_control_array(robot, &command)
    }

    fn reset_episode(&mut self) -> Result<BoundingBox> {
        self.step_counter = 0;
        self.backend.reset_simulation()?;
        self.init_simulation()?;
        self.bbox = self.compute_observation()?;
        self.state = EpisodeState::Stepping;
        Ok(self.bbox)
    }
}

impl<B: PhysicsBackend, S: Segmenter> Env for KukaEnv<B, S> {
    type Config = KukaEnvConfig;
    type Obs = BoundingBox;
    type Act = KukaAct;
    type Info = KukaInfo;

    /// Connects the backend, loads the segmentation network and the target image.
    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let backend = B::connect(ConnectionMode::from_render(config.render))?;
        let loaded = S::load(&config.segmenter)
            .with_context(|| {
                format!(
                    "Failed to load {} segmenter from {:?}",
                    config.segmenter.model,
                    config.segmenter.checkpoint()
                )
            })
            .and_then(|segmenter| {
                let target_image = image::open(&config.target_image_path)
                    .with_context(|| format!("Failed to open {:?}", config.target_image_path))?
                    .to_rgb8();
                Ok((segmenter, target_image))
            });

        match loaded {
            Ok((segmenter, target_image)) => {
                Self::from_parts(config.clone(), backend, segmenter, target_image, seed)
            }
            Err(e) => {
                release(backend);
                Err(e)
            }
        }
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        trace!("KukaEnv::step()");
        match self.state {
            EpisodeState::Uninitialized => return Err(AvError::NotReset.into()),
            EpisodeState::Done => return Err(AvError::EpisodeOver(self.step_counter).into()),
            EpisodeState::Stepping => {}
        }

        let target = self.controller.resolve(
            self.bbox.area(),
            *a,
            &self.end_effector_pos,
            &self.rot_matrix,
        )?;
        debug!("{:?} towards {:?}", target.mode, target.position);
        self.assign_throttle(target.position, target.mode)?;
        self.step_simulation()?;

        self.bbox = self.compute_observation()?;
        let reward = self.bbox.area();
        self.step_counter += 1;
        let done = compute_done(self.step_counter, self.config.max_steps);
        if done {
            self.state = EpisodeState::Done;
        }

        let mut record = Record::empty();
        record.insert("bbox_area", RecordValue::Scalar(reward));
        record.insert(
            "position_gain",
            RecordValue::Scalar(self.controller.gain(target.mode) as f32),
        );
        record.insert("step_counter", RecordValue::Scalar(self.step_counter as f32));
        record.insert("obs", RecordValue::Array1(self.bbox.into()));

        let step = Step::new(
            self.bbox,
            *a,
            vec![reward],
            vec![0],
            vec![done as i8],
            KukaInfo { mode: target.mode },
            BoundingBox::dummy(),
        );
        Ok((step, record))
    }

    /// Starts a new episode if `is_done` is `None`, empty or `is_done[0] != 0`.
    ///
    /// Otherwise the latest bounding box is returned and nothing changes.
    fn reset(&mut self, is_done: Option<&Vec<i8>>) -> Result<Self::Obs> {
        trace!("KukaEnv::reset()");
        let reset = match is_done {
            None => true,
            Some(v) => v.first().map_or(true, |&d| d != 0),
        };

        if reset {
            self.reset_episode()
        } else {
            Ok(self.bbox)
        }
    }

    /// Re-seeds the placement of the target object with `ix` and starts a new episode.
    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.rng = fastrand::Rng::with_seed(ix as u64);
        self.reset(None)
    }
}
