//! Camera geometry.
//!
//! Matrices handed to the physics backend follow the OpenGL convention used by pybullet:
//! 16 floats in column-major order. Rotation matrices are row-major 3x3 [`Array2`]s.
use ndarray::{arr1, arr2, Array1, Array2};

/// A column-major 4x4 matrix.
pub type Mat4 = [f32; 16];

/// Returns the rotation matrix of a quaternion `(x, y, z, w)`.
pub fn quaternion_to_matrix(q: [f64; 4]) -> Array2<f64> {
    let [x, y, z, w] = q;
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (xw, yw, zw) = (x * w, y * w, z * w);
    arr2(&[
        [1.0 - 2.0 * (yy + zz), 2.0 * (xy - zw), 2.0 * (xz + yw)],
        [2.0 * (xy + zw), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - xw)],
        [2.0 * (xz - yw), 2.0 * (yz + xw), 1.0 - 2.0 * (xx + yy)],
    ])
}

/// Returns the quaternion `(x, y, z, w)` of Euler angles `(roll, pitch, yaw)`.
pub fn quaternion_from_euler(euler: [f64; 3]) -> [f64; 4] {
    let (sr, cr) = (euler[0] * 0.5).sin_cos();
    let (sp, cp) = (euler[1] * 0.5).sin_cos();
    let (sy, cy) = (euler[2] * 0.5).sin_cos();
    [
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    ]
}

/// Perspective projection from a vertical field of view in degrees.
pub fn projection_matrix_fov(fov: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let y_scale = 1.0 / (fov.to_radians() / 2.0).tan();
    let x_scale = y_scale / aspect;
    let near_m_far = near - far;

    let mut m = [0f32; 16];
    m[0] = x_scale as f32;
    m[5] = y_scale as f32;
    m[10] = ((far + near) / near_m_far) as f32;
    m[11] = -1.0;
    m[14] = (2.0 * far * near / near_m_far) as f32;
    m
}

/// View matrix of a camera at `eye` looking at `target`.
pub fn view_matrix(eye: &Array1<f64>, target: &Array1<f64>, up: &Array1<f64>) -> Mat4 {
    let f = normalize(&(target - eye));
    let s = normalize(&cross(&f, &normalize(up)));
    let u = cross(&s, &f);

    let mut m = [0f32; 16];
    for i in 0..3 {
        m[4 * i] = s[i] as f32;
        m[4 * i + 1] = u[i] as f32;
        m[4 * i + 2] = -f[i] as f32;
    }
    m[12] = -s.dot(eye) as f32;
    m[13] = -u.dot(eye) as f32;
    m[14] = f.dot(eye) as f32;
    m[15] = 1.0;
    m
}

/// Placement of the wrist camera relative to the end effector.
#[derive(Clone, Debug)]
pub struct CameraMount {
    /// Distance of the eye from the end effector along the viewing axis.
    pub eye_offset: f64,

    /// Distance of the look-at point from the end effector along the viewing axis.
    pub target_offset: f64,
}

impl CameraMount {
    /// View matrix of the camera for an end effector at `position` with rotation `rot`.
    ///
    /// The camera looks along the rotated z-axis with the rotated y-axis as up vector.
    pub fn view(&self, position: &Array1<f64>, rot: &Array2<f64>) -> Mat4 {
        let camera_vector = rot.dot(&arr1(&[0.0, 0.0, 1.0]));
        let up_vector = rot.dot(&arr1(&[0.0, 1.0, 0.0]));
        let eye = position + &(&camera_vector * self.eye_offset);
        let target = position + &(&camera_vector * self.target_offset);
        view_matrix(&eye, &target, &up_vector)
    }
}

/// Rotates `(x, y)` by `theta` radians about the vertical axis.
pub fn rotate_xy(x: f64, y: f64, theta: f64) -> (f64, f64) {
    let (s, c) = theta.sin_cos();
    (c * x - s * y, s * x + c * y)
}

fn cross(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    arr1(&[
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ])
}

fn normalize(v: &Array1<f64>) -> Array1<f64> {
    let norm = v.dot(v).sqrt();
    if norm > f64::EPSILON {
        v / norm
    } else {
        v.clone()
    }
}
