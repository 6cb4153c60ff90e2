#![allow(dead_code)]

use detector::catalog::Delegate;
use detector::options::{DelegateSupport, DetectorOptions};
use detector::error::DelegateUnavailable;
use detector::{
    BackendLoader, Detection, DetectionListener, DetectorError, InferenceBackend, InferenceOutput,
};
use image::{Rgb, RgbImage};
use ndarray::{Array, IxDyn};
use preprocess::PreprocessOutput;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LABELS: &str = "tench\ngoldfish\tGoldfish\nshark\n";

/// Loader whose backends return canned outputs.
#[derive(Clone, Default)]
pub struct MockLoader {
    pub gpu: bool,
    pub nnapi: bool,
    /// Accelerators pass the support check but fail to attach at load.
    pub fail_attach: bool,
    pub fail_load: bool,
    pub fail_infer: bool,
    pub delay: Duration,
    pub loads: Arc<AtomicUsize>,
    pub infers: Arc<AtomicUsize>,
    pub last_options: Arc<Mutex<Option<DetectorOptions>>>,
    /// First element of the last input tensor.
    pub first_input: Arc<Mutex<Option<f32>>>,
}

impl MockLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn infers(&self) -> usize {
        self.infers.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<DetectorOptions> {
        self.last_options.lock().unwrap().clone()
    }

    pub fn first_input(&self) -> Option<f32> {
        *self.first_input.lock().unwrap()
    }
}

impl DelegateSupport for MockLoader {
    fn supports(&self, delegate: Delegate) -> bool {
        match delegate {
            Delegate::Cpu => true,
            Delegate::Gpu => self.gpu,
            Delegate::Nnapi => self.nnapi,
        }
    }
}

impl BackendLoader for MockLoader {
    type Backend = MockBackend;

    fn load(&self, options: &DetectorOptions) -> anyhow::Result<MockBackend> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        let delegate = options.base.delegate;
        if self.fail_attach && delegate != Delegate::Cpu {
            return Err(DelegateUnavailable {
                delegate,
                reason: "no device found".to_string(),
            }
            .into());
        }
        if self.fail_load {
            anyhow::bail!("Model file not found: {}", options.model_path.display());
        }
        Ok(MockBackend {
            delay: self.delay,
            fail: self.fail_infer,
            infers: Arc::clone(&self.infers),
            first_input: Arc::clone(&self.first_input),
        })
    }
}

pub struct MockBackend {
    delay: Duration,
    fail: bool,
    infers: Arc<AtomicUsize>,
    first_input: Arc<Mutex<Option<f32>>>,
}

impl InferenceBackend for MockBackend {
    fn infer(&mut self, input: &PreprocessOutput) -> anyhow::Result<InferenceOutput> {
        self.infers.fetch_add(1, Ordering::SeqCst);
        *self.first_input.lock().unwrap() = match input {
            PreprocessOutput::Float(arr) => arr.iter().next().copied(),
            PreprocessOutput::Quantized(arr) => arr.iter().next().map(|&v| f32::from(v)),
        };
        std::thread::sleep(self.delay);
        if self.fail {
            anyhow::bail!("tensor shape mismatch");
        }
        let tensors = match input {
            PreprocessOutput::Float(_) => vec![tensor(&[1, 3], vec![0.1, 0.2, 0.7])],
            // SSD: one person box, one dog box
            PreprocessOutput::Quantized(_) => vec![
                tensor(
                    &[1, 2, 4],
                    vec![0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0],
                ),
                tensor(&[1, 2], vec![0.0, 17.0]),
                tensor(&[1, 2], vec![0.9, 0.8]),
                tensor(&[1], vec![2.0]),
            ],
        };
        Ok(InferenceOutput { tensors })
    }
}

fn tensor(shape: &[usize], data: Vec<f32>) -> ndarray::ArrayD<f32> {
    Array::from_shape_vec(IxDyn(shape), data).unwrap()
}

/// Records listener callbacks as strings in call order.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl DetectionListener for RecordingListener {
    fn on_start(&self) {
        self.events.lock().unwrap().push("start".to_string());
    }

    fn on_error(&self, error: &DetectorError) {
        self.events.lock().unwrap().push(format!("error:{error}"));
    }

    fn on_result(&self, detections: &[Detection], _inference_time: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(format!("result:{}", detections.len()));
    }

    fn on_rejected(&self, error: &DetectorError) {
        self.events.lock().unwrap().push(format!("rejected:{error}"));
    }
}

/// Model directory with an ImageNet-style label file.
pub fn model_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("imagenet_labels.txt"), LABELS).unwrap();
    dir
}

pub fn test_image(width: u32, height: u32) -> Arc<RgbImage> {
    Arc::new(RgbImage::from_pixel(width, height, Rgb([120, 60, 200])))
}

pub fn write_gallery_image(dir: &Path, name: &str, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([5, 5, 5]))
        .save(dir.join(name))
        .unwrap();
}
