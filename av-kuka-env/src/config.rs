//! Configuration of [`KukaEnv`](crate::KukaEnv).
use crate::{control::ControlConfig, segment::SegmenterConfig};
use av_core::Configurable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wrist camera parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Width and height of rendered frames in pixels. Bounding boxes are divided by this.
    pub image_size: u32,

    /// Vertical field of view in degrees.
    pub fov: f64,

    /// Aspect ratio.
    pub aspect: f64,

    /// Near clipping plane.
    pub near: f64,

    /// Far clipping plane.
    pub far: f64,

    /// Distance of the eye in front of the end effector.
    pub eye_offset: f64,

    /// Distance of the look-at point in front of the end effector.
    pub target_offset: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            image_size: 256,
            fov: 60.0,
            aspect: 1.0,
            near: 0.01,
            far: 100.0,
            eye_offset: 0.005,
            target_offset: 0.1,
        }
    }
}

/// Bodies and physics parameters of the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Directory searched for assets in addition to the backend defaults.
    pub search_path: Option<String>,

    /// Gravity vector.
    pub gravity: [f64; 3],

    /// Duration of a simulation step.
    pub time_step: f64,

    /// Ground plane asset.
    pub plane_urdf: String,

    /// Robot asset.
    pub robot_urdf: String,

    /// Base position of the robot.
    pub robot_position: [f64; 3],

    /// Target object asset.
    pub object_urdf: String,

    /// Horizontal distance of the object from the robot base.
    pub object_radius: f64,

    /// Height of the object.
    pub object_height: f64,

    /// Number of controlled joints, starting from joint 0.
    pub num_joints: usize,

    /// Link index of the end effector carrying the camera.
    pub end_effector_link: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            search_path: None,
            gravity: [0.0, 0.0, -10.0],
            time_step: 1.0,
            plane_urdf: "plane.urdf".to_string(),
            robot_urdf: "kuka_iiwa/model.urdf".to_string(),
            robot_position: [0.0, 0.0, 0.001],
            object_urdf: "sphere2.urdf".to_string(),
            object_radius: 3.0,
            object_height: 0.5,
            num_joints: 7,
            end_effector_link: 6,
        }
    }
}

/// Configuration of [`KukaEnv`](crate::KukaEnv).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KukaEnvConfig {
    /// Connect the simulator with a GUI.
    pub render: bool,

    /// Step size of the discrete actions.
    pub delta: f64,

    /// Reference image of the target object.
    pub target_image_path: PathBuf,

    /// Episode length in steps.
    pub max_steps: usize,

    /// Segmentation network.
    pub segmenter: SegmenterConfig,

    /// Exploration and tracking controller.
    pub control: ControlConfig,

    /// Wrist camera.
    pub camera: CameraConfig,

    /// Scene.
    pub scene: SceneConfig,
}

impl Default for KukaEnvConfig {
    fn default() -> Self {
        Self {
            render: false,
            delta: 0.3,
            target_image_path: PathBuf::from("active-vision-storage/av_data/targets/1.png"),
            max_steps: 200,
            segmenter: SegmenterConfig::default(),
            control: ControlConfig::default(),
            camera: CameraConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl Configurable for KukaEnvConfig {}

impl KukaEnvConfig {
    /// Sets whether the simulator is shown in a GUI.
    pub fn render(mut self, v: bool) -> Self {
        self.render = v;
        self
    }

    /// Sets the step size of the discrete actions.
    pub fn delta(mut self, v: f64) -> Self {
        self.delta = v;
        self
    }

    /// Sets the path of the target reference image.
    pub fn target_image_path(mut self, v: impl Into<PathBuf>) -> Self {
        self.target_image_path = v.into();
        self
    }

    /// Sets the episode length.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the configuration of the segmentation network.
    pub fn segmenter(mut self, v: SegmenterConfig) -> Self {
        self.segmenter = v;
        self
    }

    /// Sets the configuration of the controller.
    pub fn control(mut self, v: ControlConfig) -> Self {
        self.control = v;
        self
    }

    /// Sets the configuration of the camera.
    pub fn camera(mut self, v: CameraConfig) -> Self {
        self.camera = v;
        self
    }

    /// Sets the configuration of the scene.
    pub fn scene(mut self, v: SceneConfig) -> Self {
        self.scene = v;
        self
    }
}
