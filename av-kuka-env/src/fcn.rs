//! FCN8s one-shot segmentation through PyO3.
use crate::segment::{Mask, Segmenter, SegmenterConfig};
use anyhow::{Context, Result};
use image::RgbImage;
use log::info;
use ndarray::Array2;
use numpy::PyArray1;
use pyo3::{
    types::{PyBytes, PyModule},
    PyObject, Python,
};

const GLUE: &str = r#"
import numpy as np
import torch
from PIL import Image
from one_shot.eval.eval_av import get_mask
from one_shot.models import FCN8s, FCN8s_alex


def load(model, checkpoint, num_classes, use_cuda_if_available):
    if model == "alexnet":
        net = FCN8s_alex(num_classes=num_classes, pretrained=False)
    else:
        net = FCN8s(num_classes=num_classes, pretrained=False)
    if use_cuda_if_available and torch.cuda.is_available():
        net.cuda()
        net.load_state_dict(torch.load(checkpoint))
    else:
        net.load_state_dict(torch.load(checkpoint, map_location=lambda storage, loc: storage))
    return net


def to_image(buf, height, width):
    return np.frombuffer(buf, dtype=np.uint8).reshape(height, width, 3)


def mask(net, frame, frame_h, frame_w, target, target_h, target_w):
    img = to_image(frame, frame_h, frame_w)
    tgt = Image.fromarray(to_image(target, target_h, target_w))
    seg = get_mask(img, tgt, net)
    return np.ascontiguousarray(np.asarray(seg) != 0, dtype=np.uint8).reshape(-1)
"#;

/// FCN8s segmenter with an AlexNet or VGG16 encoder.
///
/// The network runs in the embedded Python interpreter with PyTorch.
pub struct FcnSegmenter {
    glue: PyObject,
    net: PyObject,
}

impl Segmenter for FcnSegmenter {
    fn load(config: &SegmenterConfig) -> Result<Self> {
        let checkpoint = config.checkpoint();
        let path = checkpoint
            .to_str()
            .with_context(|| format!("Non UTF-8 checkpoint path {:?}", checkpoint))?;

        Python::with_gil(|py| {
            let glue = PyModule::from_code(py, GLUE, "fcn_glue.py", "fcn_glue")?;
            let net = glue.getattr("load")?.call1((
                config.model.to_string(),
                path,
                config.num_classes,
                config.use_cuda_if_available,
            ))?;
            info!("Loaded {} segmenter from {}", config.model, path);
            Ok(Self {
                glue: glue.into(),
                net: net.into(),
            })
        })
    }

    fn mask(&mut self, frame: &RgbImage, target: &RgbImage) -> Result<Mask> {
        let (h, w) = (frame.height() as usize, frame.width() as usize);
        let pixels = Python::with_gil(|py| -> Result<Vec<u8>> {
            let seg = self.glue.as_ref(py).getattr("mask")?.call1((
                self.net.as_ref(py),
                PyBytes::new(py, frame.as_raw()),
                frame.height(),
                frame.width(),
                PyBytes::new(py, target.as_raw()),
                target.height(),
                target.width(),
            ))?;
            let seg: &PyArray1<u8> = seg.extract()?;
            Ok(seg.to_owned_array().into_raw_vec())
        })?;

        let mask = Array2::from_shape_vec((h, w), pixels.into_iter().map(|p| p != 0).collect())
            .with_context(|| format!("Segmentation mask does not match the {}x{} frame", w, h))?;
        Ok(mask)
    }
}
