//! In-process doubles of the simulator and the segmentation network.
#![allow(dead_code)]
use anyhow::Result;
use av_kuka_env::{
    geometry::Mat4, BodyId, CameraConfig, CameraImage, ConnectionMode, KukaEnv, KukaEnvConfig,
    LinkState, Mask, MotorCommand, PhysicsBackend, Segmenter, SegmenterConfig,
};
use image::RgbImage;
use ndarray::Array2;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

pub const IMAGE_SIZE: u32 = 32;
pub const START: [f64; 3] = [0.5, 0.0, 1.0];

thread_local! {
    static DISCONNECTS: Cell<usize> = Cell::new(0);
}

/// Number of [`MockBackend`]s disconnected on the current thread.
pub fn disconnects() -> usize {
    DISCONNECTS.with(|n| n.get())
}

/// Calls observed by [`MockBackend`].
#[derive(Debug, Default)]
pub struct BackendLog {
    pub loaded: Vec<(String, [f64; 3])>,
    pub commands: Vec<MotorCommand>,
    pub ik_targets: Vec<[f64; 3]>,
    pub views: Vec<Mat4>,
    pub n_resets: usize,
    pub n_steps: usize,
    pub disconnected: bool,
}

/// Moves the end effector to the latest inverse kinematics target on every step.
///
/// The end effector also turns by `yaw_per_step` radians about the vertical axis per step.
pub struct MockBackend {
    pub log: Rc<RefCell<BackendLog>>,
    pub yaw_per_step: f64,
    yaw: f64,
    position: [f64; 3],
    pending: Option<[f64; 3]>,
    n_bodies: i64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(BackendLog::default())),
            yaw_per_step: 0.0,
            yaw: 0.0,
            position: START,
            pending: None,
            n_bodies: 0,
        }
    }
}

impl PhysicsBackend for MockBackend {
    fn connect(_mode: ConnectionMode) -> Result<Self> {
        Ok(Self::new())
    }

    fn set_additional_search_path(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn set_gravity(&mut self, _gravity: [f64; 3]) -> Result<()> {
        Ok(())
    }

    fn set_time_step(&mut self, _time_step: f64) -> Result<()> {
        Ok(())
    }

    fn load_urdf(&mut self, asset: &str, position: [f64; 3], _: [f64; 4]) -> Result<BodyId> {
        self.log
            .borrow_mut()
            .loaded
            .push((asset.to_string(), position));
        self.n_bodies += 1;
        Ok(BodyId(self.n_bodies - 1))
    }

    fn link_state(&mut self, _body: BodyId, _link_index: usize) -> Result<LinkState> {
        Ok(LinkState {
            position: self.position,
            orientation: [0.0, 0.0, (self.yaw / 2.0).sin(), (self.yaw / 2.0).cos()],
        })
    }

    fn camera_image(
        &mut self,
        width: u32,
        height: u32,
        view: &Mat4,
        _projection: &Mat4,
    ) -> Result<CameraImage> {
        self.log.borrow_mut().views.push(*view);
        let n = (width * height) as usize;
        Ok(CameraImage {
            width,
            height,
            rgba: vec![0; 4 * n],
            depth: vec![1.0; n],
            segmentation: vec![-1; n],
        })
    }

    fn inverse_kinematics(&mut self, _: BodyId, _: usize, target: [f64; 3]) -> Result<Vec<f64>> {
        self.log.borrow_mut().ik_targets.push(target);
        self.pending = Some(target);
        Ok(vec![target[0], target[1], target[2], 0.0, 0.0, 0.0, 0.0])
    }

    fn set_joint_motor_control_array(&mut self, _: BodyId, command: &MotorCommand) -> Result<()> {
        self.log.borrow_mut().commands.push(command.clone());
        Ok(())
    }

    fn step_simulation(&mut self) -> Result<()> {
        self.log.borrow_mut().n_steps += 1;
        self.yaw += self.yaw_per_step;
        if let Some(p) = self.pending.take() {
            self.position = p;
        }
        Ok(())
    }

    fn reset_simulation(&mut self) -> Result<()> {
        self.log.borrow_mut().n_resets += 1;
        self.position = START;
        self.yaw = 0.0;
        self.pending = None;
        self.n_bodies = 0;
        Ok(())
    }

    fn disconnect(self) -> Result<()> {
        self.log.borrow_mut().disconnected = true;
        DISCONNECTS.with(|n| n.set(n.get() + 1));
        Ok(())
    }
}

/// Pixel rectangle `(row_min, row_max, col_min, col_max)`, inclusive.
pub type Rect = (usize, usize, usize, usize);

pub const CENTER: Rect = (8, 23, 8, 23);

pub fn rect_mask(rect: Option<Rect>, size: usize) -> Mask {
    let mut mask = Array2::from_elem((size, size), false);
    if let Some((r0, r1, c0, c1)) = rect {
        for r in r0..=r1 {
            for c in c0..=c1 {
                mask[[r, c]] = true;
            }
        }
    }
    mask
}

/// Returns scripted masks, then `fallback` once the script runs out.
pub struct ScriptedSegmenter {
    pub script: VecDeque<Option<Rect>>,
    pub fallback: Option<Rect>,
    pub n_calls: Rc<RefCell<usize>>,
}

impl ScriptedSegmenter {
    pub fn new(script: Vec<Option<Rect>>, fallback: Option<Rect>) -> Self {
        Self {
            script: script.into(),
            fallback,
            n_calls: Rc::new(RefCell::new(0)),
        }
    }
}

impl Segmenter for ScriptedSegmenter {
    fn load(_config: &SegmenterConfig) -> Result<Self> {
        Ok(Self::new(vec![], Some(CENTER)))
    }

    fn mask(&mut self, frame: &RgbImage, _target: &RgbImage) -> Result<Mask> {
        *self.n_calls.borrow_mut() += 1;
        let rect = self.script.pop_front().unwrap_or(self.fallback);
        Ok(rect_mask(rect, frame.width() as usize))
    }
}

pub type TestEnv = KukaEnv<MockBackend, ScriptedSegmenter>;

pub fn config() -> KukaEnvConfig {
    KukaEnvConfig::default().camera(CameraConfig {
        image_size: IMAGE_SIZE,
        ..CameraConfig::default()
    })
}

/// Builds an environment and returns the shared logs of its doubles.
pub fn env_with(
    config: KukaEnvConfig,
    segmenter: ScriptedSegmenter,
) -> Result<(TestEnv, Rc<RefCell<BackendLog>>, Rc<RefCell<usize>>)> {
    env_with_backend(config, MockBackend::new(), segmenter)
}

/// Same as [`env_with`] with a configured backend.
pub fn env_with_backend(
    config: KukaEnvConfig,
    backend: MockBackend,
    segmenter: ScriptedSegmenter,
) -> Result<(TestEnv, Rc<RefCell<BackendLog>>, Rc<RefCell<usize>>)> {
    let log = backend.log.clone();
    let n_calls = segmenter.n_calls.clone();
    let env = KukaEnv::from_parts(config, backend, segmenter, RgbImage::new(8, 8), 42)?;
    Ok((env, log, n_calls))
}
