//! Interface to the segmentation network.
use anyhow::Result;
use image::RgbImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

/// Boolean mask of target pixels, indexed by `[row, column]`.
pub type Mask = Array2<bool>;

/// Architecture of the segmentation network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationModel {
    /// FCN8s with an AlexNet encoder.
    Alexnet,

    /// FCN8s with a VGG16 encoder.
    Vgg,
}

impl fmt::Display for SegmentationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alexnet => write!(f, "alexnet"),
            Self::Vgg => write!(f, "vgg"),
        }
    }
}

impl FromStr for SegmentationModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alexnet" => Ok(Self::Alexnet),
            "vgg" => Ok(Self::Vgg),
            _ => Err(anyhow::anyhow!(
                "Unknown segmentation model {:?}, expected alexnet or vgg",
                s
            )),
        }
    }
}

/// Configuration of a [`Segmenter`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Selected architecture.
    pub model: SegmentationModel,

    /// Checkpoint of the AlexNet variant.
    pub alexnet_checkpoint: PathBuf,

    /// Checkpoint of the VGG variant.
    pub vgg_checkpoint: PathBuf,

    /// Number of output classes of the network.
    pub num_classes: usize,

    /// Run on CUDA if it is available.
    pub use_cuda_if_available: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            model: SegmentationModel::Alexnet,
            alexnet_checkpoint: PathBuf::from(
                "active-vision-storage/ckpt/alexnet/epoch_7_loss_750.40502_acc_0.99551_acc-cls_0.98263_mean-iu_0.96637_fwavacc_0.99118_lr_0.0000100000.pth",
            ),
            vgg_checkpoint: PathBuf::from(
                "active-vision-storage/ckpt/av_fcn8s/epoch_24_loss_416.99406_acc_0.99835_acc-cls_0.99487_mean-iu_0.98788_fwavacc_0.99672_lr_0.0000100000.pth",
            ),
            num_classes: 2,
            use_cuda_if_available: true,
        }
    }
}

impl SegmenterConfig {
    /// Sets the architecture.
    pub fn model(mut self, v: SegmentationModel) -> Self {
        self.model = v;
        self
    }

    /// Sets the checkpoint of the AlexNet variant.
    pub fn alexnet_checkpoint(mut self, v: impl Into<PathBuf>) -> Self {
        self.alexnet_checkpoint = v.into();
        self
    }

    /// Sets the checkpoint of the VGG variant.
    pub fn vgg_checkpoint(mut self, v: impl Into<PathBuf>) -> Self {
        self.vgg_checkpoint = v.into();
        self
    }

    /// Sets whether CUDA is used when available.
    pub fn use_cuda_if_available(mut self, v: bool) -> Self {
        self.use_cuda_if_available = v;
        self
    }

    /// Checkpoint of the selected architecture.
    pub fn checkpoint(&self) -> &PathBuf {
        match self.model {
            SegmentationModel::Alexnet => &self.alexnet_checkpoint,
            SegmentationModel::Vgg => &self.vgg_checkpoint,
        }
    }
}

/// Segments the target object in camera frames.
pub trait Segmenter {
    /// Loads the network weights selected by `config`.
    ///
    /// Fails if the checkpoint cannot be loaded; there is no partial load.
    fn load(config: &SegmenterConfig) -> Result<Self>
    where
        Self: Sized;

    /// Returns the mask of pixels in `frame` showing the object of `target`.
    ///
    /// The mask has the spatial size of `frame`.
    fn mask(&mut self, frame: &RgbImage, target: &RgbImage) -> Result<Mask>;
}
