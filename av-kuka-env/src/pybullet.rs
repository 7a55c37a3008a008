//! PyBullet through PyO3.
use crate::{
    backend::{BodyId, CameraImage, ConnectionMode, LinkState, MotorCommand, PhysicsBackend},
    geometry::Mat4,
};
use anyhow::Result;
use log::info;
use numpy::PyArray1;
use pyo3::{
    types::{IntoPyDict, PyDict},
    IntoPy, Py, PyAny, PyObject, PyResult, Python,
};

/// A PyBullet physics client.
///
/// Every call is tagged with the client id, so several environments can live in the same
/// interpreter.
pub struct PyBulletBackend {
    p: PyObject,
    client: i64,
}

impl PyBulletBackend {
    fn kwargs<'py>(&self, py: Python<'py>) -> &'py PyDict {
        vec![("physicsClientId", self.client)].into_py_dict(py)
    }

    fn call<'py, A>(&self, py: Python<'py>, name: &str, args: A) -> PyResult<&'py PyAny>
    where
        A: IntoPy<Py<pyo3::types::PyTuple>>,
    {
        self.p
            .as_ref(py)
            .call_method(name, args, Some(self.kwargs(py)))
    }

    /// Flattens a buffer returned by `getCameraImage` into a contiguous vector.
    fn flatten<T: numpy::Element + Copy>(
        py: Python,
        buf: &PyAny,
        dtype: &str,
    ) -> PyResult<Vec<T>> {
        let np = py.import("numpy")?;
        let arr = np
            .call_method1("ascontiguousarray", (buf, dtype))?
            .call_method1("reshape", (-1,))?;
        let arr: &PyArray1<T> = arr.extract()?;
        Ok(arr.to_owned_array().into_raw_vec())
    }
}

impl PhysicsBackend for PyBulletBackend {
    fn connect(mode: ConnectionMode) -> Result<Self> {
        Python::with_gil(|py| {
            let p = py.import("pybullet")?;
            let mode_name = match mode {
                ConnectionMode::Gui => "GUI",
                ConnectionMode::Direct => "DIRECT",
            };
            let mode_id: i64 = p.getattr(mode_name)?.extract()?;
            let client: i64 = p.call_method1("connect", (mode_id,))?.extract()?;
            if client < 0 {
                return Err(anyhow::anyhow!("Failed to connect to pybullet in {} mode", mode_name));
            }
            info!("Connected to pybullet, client = {}, mode = {}", client, mode_name);

            let backend = Self {
                p: p.into(),
                client,
            };
            let data_path: String = py
                .import("pybullet_data")?
                .call_method0("getDataPath")?
                .extract()?;
            backend.call(py, "setAdditionalSearchPath", (data_path,))?;
            Ok(backend)
        })
    }

    fn set_additional_search_path(&mut self, path: &str) -> Result<()> {
        Python::with_gil(|py| {
            self.call(py, "setAdditionalSearchPath", (path,))?;
            Ok(())
        })
    }

    fn set_gravity(&mut self, gravity: [f64; 3]) -> Result<()> {
        Python::with_gil(|py| {
            self.call(py, "setGravity", (gravity[0], gravity[1], gravity[2]))?;
            Ok(())
        })
    }

    fn set_time_step(&mut self, time_step: f64) -> Result<()> {
        Python::with_gil(|py| {
            self.call(py, "setTimeStep", (time_step,))?;
            Ok(())
        })
    }

    fn load_urdf(
        &mut self,
        asset: &str,
        position: [f64; 3],
        orientation: [f64; 4],
    ) -> Result<BodyId> {
        Python::with_gil(|py| {
            let id: i64 = self
                .call(py, "loadURDF", (asset, position.to_vec(), orientation.to_vec()))?
                .extract()?;
            Ok(BodyId(id))
        })
    }

    fn link_state(&mut self, body: BodyId, link_index: usize) -> Result<LinkState> {
        Python::with_gil(|py| {
            let kwargs = self.kwargs(py);
            kwargs.set_item("computeForwardKinematics", true)?;
            let state = self
                .p
                .as_ref(py)
                .call_method("getLinkState", (body.0, link_index), Some(kwargs))?;
            let position: (f64, f64, f64) = state.get_item(0)?.extract()?;
            let orientation: (f64, f64, f64, f64) = state.get_item(1)?.extract()?;
            Ok(LinkState {
                position: [position.0, position.1, position.2],
                orientation: [orientation.0, orientation.1, orientation.2, orientation.3],
            })
        })
    }

    fn camera_image(
        &mut self,
        width: u32,
        height: u32,
        view: &Mat4,
        projection: &Mat4,
    ) -> Result<CameraImage> {
        Python::with_gil(|py| {
            let img = self.call(
                py,
                "getCameraImage",
                (width, height, view.to_vec(), projection.to_vec()),
            )?;
            Ok(CameraImage {
                width,
                height,
                rgba: Self::flatten(py, img.get_item(2)?, "uint8")?,
                depth: Self::flatten(py, img.get_item(3)?, "float32")?,
                segmentation: Self::flatten(py, img.get_item(4)?, "int32")?,
            })
        })
    }

    fn inverse_kinematics(
        &mut self,
        body: BodyId,
        link_index: usize,
        target: [f64; 3],
    ) -> Result<Vec<f64>> {
        Python::with_gil(|py| {
            let joints: Vec<f64> = self
                .call(
                    py,
                    "calculateInverseKinematics",
                    (body.0, link_index, target.to_vec()),
                )?
                .extract()?;
            Ok(joints)
        })
    }

    fn set_joint_motor_control_array(&mut self, body: BodyId, command: &MotorCommand) -> Result<()> {
        Python::with_gil(|py| {
            let p = self.p.as_ref(py);
            let kwargs = self.kwargs(py);
            kwargs.set_item("bodyIndex", body.0)?;
            kwargs.set_item("jointIndices", command.joint_indices.clone())?;
            kwargs.set_item("controlMode", p.getattr("POSITION_CONTROL")?)?;
            kwargs.set_item("targetPositions", command.target_positions.clone())?;
            kwargs.set_item("forces", command.forces.clone())?;
            kwargs.set_item("positionGains", command.position_gains.clone())?;
            kwargs.set_item("targetVelocities", command.target_velocities.clone())?;
            kwargs.set_item("velocityGains", command.velocity_gains.clone())?;
            p.call_method("setJointMotorControlArray", (), Some(kwargs))?;
            Ok(())
        })
    }

    fn step_simulation(&mut self) -> Result<()> {
        Python::with_gil(|py| {
            self.call(py, "stepSimulation", ())?;
            Ok(())
        })
    }

    fn reset_simulation(&mut self) -> Result<()> {
        Python::with_gil(|py| {
            self.call(py, "resetSimulation", ())?;
            Ok(())
        })
    }

    fn disconnect(self) -> Result<()> {
        Python::with_gil(|py| {
            self.call(py, "disconnect", ())?;
            info!("Disconnected from pybullet, client = {}", self.client);
            Ok(())
        })
    }
}
