use super::{BackendLoader, InferenceBackend, InferenceOutput};
use crate::catalog::Delegate;
use crate::error::DelegateUnavailable;
use crate::options::{DelegateSupport, DetectorOptions};
use ort::{
    execution_providers::{CUDAExecutionProvider, ExecutionProvider, NNAPIExecutionProvider},
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use preprocess::PreprocessOutput;
use std::sync::OnceLock;

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    /// Load model with the delegate and thread count from `options`
    pub fn load(options: &DetectorOptions) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let path = &options.model_path;
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.base.num_threads)?;

        let delegate = options.base.delegate;
        let registered = match delegate {
            Delegate::Gpu => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()
                    .error_on_failure()])
            }
            Delegate::Nnapi => {
                tracing::info!("Initializing ONNX Runtime with NNAPI execution provider");
                builder.with_execution_providers([NNAPIExecutionProvider::default()
                    .build()
                    .error_on_failure()])
            }
            Delegate::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
                Ok(builder)
            }
        };
        // A provider compiled into the runtime can still fail to register
        // when the device or its driver is absent.
        let builder = registered.map_err(|e| DelegateUnavailable {
            delegate,
            reason: e.to_string(),
        })?;

        let session = builder.commit_from_file(path)?;

        tracing::info!(
            threads = options.base.num_threads,
            "Model loaded from {}",
            path.display()
        );
        Ok(Self { session })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, input: &PreprocessOutput) -> anyhow::Result<InferenceOutput> {
        let _span = common::span_debug!("ort_run");

        let outputs = match input {
            PreprocessOutput::Float(arr) => self
                .session
                .run(ort::inputs![TensorRef::from_array_view(arr.view())?])?,
            PreprocessOutput::Quantized(arr) => self
                .session
                .run(ort::inputs![TensorRef::from_array_view(arr.view())?])?,
        };

        let mut tensors = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            // Quantized heads emit u8 scores; everything downstream works in f32.
            let tensor = match value.try_extract_array::<f32>() {
                Ok(view) => view.into_owned(),
                Err(_) => value
                    .try_extract_array::<u8>()
                    .map_err(|e| anyhow::anyhow!("Unsupported output type for {name}: {e}"))?
                    .mapv(f32::from),
            };
            tensors.push(tensor);
        }

        Ok(InferenceOutput { tensors })
    }
}

/// Loads ONNX Runtime sessions and probes execution provider availability.
///
/// A provider counts as supported only when it registers on a session
/// builder, not merely when the runtime was compiled with it. Probe results
/// are cached for the loader's lifetime.
#[derive(Debug, Default, Clone)]
pub struct OrtLoader {
    gpu: OnceLock<bool>,
    nnapi: OnceLock<bool>,
}

impl DelegateSupport for OrtLoader {
    fn supports(&self, delegate: Delegate) -> bool {
        match delegate {
            Delegate::Cpu => true,
            Delegate::Gpu => *self.gpu.get_or_init(|| registers(delegate)),
            Delegate::Nnapi => *self.nnapi.get_or_init(|| registers(delegate)),
        }
    }
}

fn registers(delegate: Delegate) -> bool {
    let _ = ort::init().commit();

    let listed = match delegate {
        Delegate::Cpu => return true,
        Delegate::Gpu => CUDAExecutionProvider::default().is_available(),
        Delegate::Nnapi => NNAPIExecutionProvider::default().is_available(),
    };
    if !matches!(listed, Ok(true)) {
        tracing::debug!(%delegate, "Execution provider not built into the runtime");
        return false;
    }

    let mut builder = match Session::builder() {
        Ok(builder) => builder,
        Err(e) => {
            tracing::debug!(%delegate, error = %e, "Session builder unavailable for probe");
            return false;
        }
    };
    let registered = match delegate {
        Delegate::Gpu => CUDAExecutionProvider::default()
            .with_device_id(0)
            .register(&mut builder),
        _ => NNAPIExecutionProvider::default().register(&mut builder),
    };
    match registered {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(%delegate, error = %e, "Execution provider failed to register");
            false
        }
    }
}

impl BackendLoader for OrtLoader {
    type Backend = OrtBackend;

    fn load(&self, options: &DetectorOptions) -> anyhow::Result<OrtBackend> {
        OrtBackend::load(options)
    }
}
