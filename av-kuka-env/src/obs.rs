//! Bounding-box observation of the target object.
use av_core::Obs;
use ndarray::{Array2, Axis};

/// Normalized bounding box `(x_min, y_min, x_max, y_max)` of the target in the camera frame.
///
/// `x` runs along image columns and `y` along image rows. A box of all zeros means the
/// target was not detected.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    /// Left edge.
    pub x_min: f32,

    /// Top edge.
    pub y_min: f32,

    /// Right edge.
    pub x_max: f32,

    /// Bottom edge.
    pub y_max: f32,
}

impl BoundingBox {
    /// Constructs a bounding box.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Bounding box of the set pixels of `mask`, divided by `scale`.
    ///
    /// Returns the zero box when no pixel is set.
    pub fn from_mask(mask: &Array2<bool>, scale: f32) -> Self {
        let any = |lane: ndarray::ArrayView1<bool>| lane.iter().any(|&p| p);
        let cols = mask.map_axis(Axis(0), any);
        let rows = mask.map_axis(Axis(1), any);

        let extent = |flags: &ndarray::Array1<bool>| {
            let first = flags.iter().position(|&f| f)?;
            let last = flags.iter().rposition(|&f| f)?;
            Some((first as f32 / scale, last as f32 / scale))
        };

        match (extent(&cols), extent(&rows)) {
            (Some((x_min, x_max)), Some((y_min, y_max))) => Self::new(x_min, y_min, x_max, y_max),
            _ => Self::default(),
        }
    }

    /// Width times height. This is the reward of a step.
    pub fn area(&self) -> f32 {
        (self.x_max - self.x_min) * (self.y_max - self.y_min)
    }

    /// Returns `[x_min, y_min, x_max, y_max]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

impl Obs for BoundingBox {
    fn dummy() -> Self {
        Self::default()
    }

    fn len(&self) -> usize {
        4
    }
}

impl From<BoundingBox> for Vec<f32> {
    fn from(b: BoundingBox) -> Self {
        b.to_array().to_vec()
    }
}
