use crate::options::{DelegateSupport, DetectorOptions};
use ndarray::ArrayD;
use preprocess::PreprocessOutput;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded model ready to run.
pub trait InferenceBackend: Send {
    fn infer(&mut self, input: &PreprocessOutput) -> anyhow::Result<InferenceOutput>;
}

/// Builds backends for a resolved option set and reports which delegates
/// the device can run.
pub trait BackendLoader: DelegateSupport + Send + Sync + 'static {
    type Backend: InferenceBackend + 'static;

    fn load(&self, options: &DetectorOptions) -> anyhow::Result<Self::Backend>;
}

/// Model outputs in declaration order, converted to f32.
#[derive(Debug, Default)]
pub struct InferenceOutput {
    pub tensors: Vec<ArrayD<f32>>,
}
