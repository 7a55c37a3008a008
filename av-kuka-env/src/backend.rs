//! Interface to the physics simulator.
use crate::geometry::Mat4;
use anyhow::Result;
use av_core::error::AvError;
use image::RgbImage;

/// Handle of a body loaded into the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyId(pub i64);

/// How the simulator is connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionMode {
    /// With a GUI window.
    Gui,

    /// Headless.
    Direct,
}

impl ConnectionMode {
    /// `Gui` if `render` is `true`, `Direct` otherwise.
    pub fn from_render(render: bool) -> Self {
        if render {
            Self::Gui
        } else {
            Self::Direct
        }
    }
}

/// World-frame pose of a link.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkState {
    /// Position.
    pub position: [f64; 3],

    /// Orientation as a quaternion `(x, y, z, w)`.
    pub orientation: [f64; 4],
}

/// A rendered camera frame.
///
/// Buffers are row-major with `height` rows of `width` pixels.
#[derive(Clone, Debug)]
pub struct CameraImage {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// RGBA pixels, 4 bytes per pixel.
    pub rgba: Vec<u8>,

    /// Depth buffer.
    pub depth: Vec<f32>,

    /// Body id visible at each pixel, `-1` for background.
    pub segmentation: Vec<i32>,
}

impl CameraImage {
    /// Returns the RGB channels of the frame, dropping alpha.
    pub fn rgb(&self) -> Result<RgbImage> {
        let n_pixels = (self.width * self.height) as usize;
        if self.rgba.len() != 4 * n_pixels {
            return Err(AvError::ShapeMismatch {
                expected: 4 * n_pixels,
                actual: self.rgba.len(),
            }
            .into());
        }
        let rgb = self
            .rgba
            .chunks_exact(4)
            .flat_map(|p| p[..3].iter().copied())
            .collect();
        RgbImage::from_raw(self.width, self.height, rgb).ok_or_else(|| {
            anyhow::Error::from(AvError::ShapeMismatch {
                expected: 3 * n_pixels,
                actual: 0,
            })
        })
    }
}

/// Position control targets for a set of joints.
#[derive(Clone, Debug, PartialEq)]
pub struct MotorCommand {
    /// Indices of the controlled joints.
    pub joint_indices: Vec<usize>,

    /// Target joint positions.
    pub target_positions: Vec<f64>,

    /// Maximum motor forces.
    pub forces: Vec<f64>,

    /// Position gains.
    pub position_gains: Vec<f64>,

    /// Target joint velocities.
    pub target_velocities: Vec<f64>,

    /// Velocity gains.
    pub velocity_gains: Vec<f64>,
}

/// A physics simulator holding one simulation context.
///
/// The context is acquired in [`PhysicsBackend::connect`] and released in
/// [`PhysicsBackend::disconnect`]. All calls block until the simulator answers.
pub trait PhysicsBackend {
    /// Connects to a new simulation context.
    fn connect(mode: ConnectionMode) -> Result<Self>
    where
        Self: Sized;

    /// Adds a directory searched when loading assets.
    fn set_additional_search_path(&mut self, path: &str) -> Result<()>;

    /// Sets the gravity vector.
    fn set_gravity(&mut self, gravity: [f64; 3]) -> Result<()>;

    /// Sets the duration of a simulation step.
    fn set_time_step(&mut self, time_step: f64) -> Result<()>;

    /// Loads a URDF asset at the given pose.
    fn load_urdf(&mut self, asset: &str, position: [f64; 3], orientation: [f64; 4])
        -> Result<BodyId>;

    /// Returns the pose of a link, computed with forward kinematics.
    fn link_state(&mut self, body: BodyId, link_index: usize) -> Result<LinkState>;

    /// Renders a frame with the given view and projection matrices.
    fn camera_image(
        &mut self,
        width: u32,
        height: u32,
        view: &Mat4,
        projection: &Mat4,
    ) -> Result<CameraImage>;

    /// Solves inverse kinematics placing a link at `target`.
    fn inverse_kinematics(
        &mut self,
        body: BodyId,
        link_index: usize,
        target: [f64; 3],
    ) -> Result<Vec<f64>>;

    /// Applies position control to the joints of a body.
    fn set_joint_motor_control_array(&mut self, body: BodyId, command: &MotorCommand)
        -> Result<()>;

    /// Advances the simulation by one step.
    fn step_simulation(&mut self) -> Result<()>;

    /// Removes all bodies and resets the simulation.
    fn reset_simulation(&mut self) -> Result<()>;

    /// Releases the simulation context.
    fn disconnect(self) -> Result<()>
    where
        Self: Sized;
}
