//! Configuration and dispatch wrapper around the inference backend.
//!
//! The detector owns at most one loaded engine for the current (model,
//! delegate) pair. Changing the selection drops it; the next call rebuilds.
//! Inference runs on tokio's blocking pool and reports through a
//! [`DetectionListener`].

use crate::backend::{BackendLoader, InferenceBackend};
use crate::catalog::{Delegate, Model};
use crate::error::{DelegateUnavailable, DetectorError};
use crate::labels::LabelMap;
use crate::options::{Tuning, resolve_options};
use crate::processing::{Detection, PostProcessor, TransformParams};
use image::RgbImage;
use preprocess::{CpuPreProcessor, InputSpec};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Callbacks fired around each detection.
///
/// `on_start` precedes exactly one of `on_result` or `on_error` for a call
/// that reaches the backend. Soft errors (delegate fallback) arrive through
/// `on_error` on their own, before `on_start`.
pub trait DetectionListener: Send + Sync {
    fn on_start(&self);
    fn on_error(&self, error: &DetectorError);
    fn on_result(&self, detections: &[Detection], inference_time: Duration);
    /// A request refused before reaching the backend (no image, or another
    /// detection in flight). The running detection, if any, is unaffected.
    fn on_rejected(&self, error: &DetectorError);
}

/// Loaded model plus the processing stages around it.
struct Engine<B> {
    backend: B,
    preprocessor: CpuPreProcessor,
    post: PostProcessor,
    labels: LabelMap,
}

impl<B: InferenceBackend> Engine<B> {
    fn run(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let (width, height) = image.dimensions();

        let pre = {
            let _span = common::span_debug!("preprocess");
            self.preprocessor.preprocess_rgb(image.as_raw(), width, height)?
        };

        let output = {
            let _span = common::span!("inference");
            self.backend.infer(&pre.data)?
        };

        let _span = common::span_debug!("postprocess");
        let transform = TransformParams::new((width, height), self.preprocessor.spec.size, &pre);
        self.post.process(&output, &self.labels, &transform)
    }
}

struct State<B> {
    model: Model,
    delegate: Delegate,
    tuning: Tuning,
    engine: Option<Engine<B>>,
    /// Bumped on every selection change so a stale engine is not put back.
    generation: u64,
}

pub struct ObjectDetector<L: BackendLoader> {
    loader: Arc<L>,
    model_dir: PathBuf,
    listener: Arc<dyn DetectionListener>,
    state: Arc<Mutex<State<L::Backend>>>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the request finishes, however it finishes.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<L: BackendLoader> ObjectDetector<L> {
    pub fn new(
        loader: L,
        model_dir: impl Into<PathBuf>,
        model: Model,
        delegate: Delegate,
        tuning: Tuning,
        listener: Arc<dyn DetectionListener>,
    ) -> Self {
        Self {
            loader: Arc::new(loader),
            model_dir: model_dir.into(),
            listener,
            state: Arc::new(Mutex::new(State {
                model,
                delegate,
                tuning,
                engine: None,
                generation: 0,
            })),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<L::Backend>> {
        lock_state(&self.state)
    }

    pub fn model(&self) -> Model {
        self.lock().model
    }

    pub fn delegate(&self) -> Delegate {
        self.lock().delegate
    }

    pub fn tuning(&self) -> Tuning {
        self.lock().tuning
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether an engine for the current selection is loaded.
    pub fn is_ready(&self) -> bool {
        self.lock().engine.is_some()
    }

    /// Switch selection. The loaded engine is dropped only when something
    /// actually changed.
    pub fn reconfigure(&self, model: Model, delegate: Delegate) {
        let mut state = self.lock();
        if state.model == model && state.delegate == delegate {
            return;
        }
        tracing::debug!(%model, %delegate, "Selection changed, detector will be rebuilt");
        state.model = model;
        state.delegate = delegate;
        state.engine = None;
        state.generation += 1;
    }

    pub fn set_model(&self, model: Model) {
        let delegate = self.delegate();
        self.reconfigure(model, delegate);
    }

    pub fn set_delegate(&self, delegate: Delegate) {
        let model = self.model();
        self.reconfigure(model, delegate);
    }

    /// Load the engine now instead of on the first detection.
    ///
    /// Failures are reported to the listener and returned; the next
    /// [`detect`](Self::detect) tries again.
    pub fn prepare(&self) -> Result<(), DetectorError> {
        let (model, delegate, tuning, generation) = {
            let state = self.lock();
            if state.engine.is_some() {
                return Ok(());
            }
            (state.model, state.delegate, state.tuning, state.generation)
        };

        let engine = build_engine(
            self.loader.as_ref(),
            &self.model_dir,
            model,
            delegate,
            &tuning,
            self.listener.as_ref(),
        )?;

        let mut state = self.lock();
        if state.generation == generation {
            state.engine = Some(engine);
        }
        Ok(())
    }

    /// Run detection on `image` off the calling thread.
    ///
    /// An absent image and a request arriving while another is in flight
    /// are rejected before the backend is touched.
    pub async fn detect(
        &self,
        image: Option<Arc<RgbImage>>,
    ) -> Result<(Vec<Detection>, Duration), DetectorError> {
        let Some(image) = image else {
            return Err(self.reject(DetectorError::MissingImage));
        };
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            return Err(self.reject(DetectorError::Busy));
        };

        let loader = Arc::clone(&self.loader);
        let model_dir = self.model_dir.clone();
        let listener = Arc::clone(&self.listener);
        let state = Arc::clone(&self.state);

        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            run_detection(loader.as_ref(), &model_dir, &state, listener.as_ref(), &image)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => {
                let err = DetectorError::Inference(e.to_string());
                self.listener.on_error(&err);
                Err(err)
            }
        }
    }

    fn reject(&self, err: DetectorError) -> DetectorError {
        tracing::warn!(error = %err, "Detection rejected");
        self.listener.on_rejected(&err);
        err
    }
}

fn lock_state<B>(state: &Mutex<State<B>>) -> MutexGuard<'_, State<B>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_detection<L: BackendLoader>(
    loader: &L,
    model_dir: &Path,
    state: &Mutex<State<L::Backend>>,
    listener: &dyn DetectionListener,
    image: &RgbImage,
) -> Result<(Vec<Detection>, Duration), DetectorError> {
    let (engine, model, delegate, tuning, generation) = {
        let mut state = lock_state(state);
        (
            state.engine.take(),
            state.model,
            state.delegate,
            state.tuning,
            state.generation,
        )
    };

    let mut engine = match engine {
        Some(engine) => engine,
        None => build_engine(loader, model_dir, model, delegate, &tuning, listener)?,
    };

    listener.on_start();
    let start = Instant::now();
    let result = engine.run(image);
    let elapsed = start.elapsed();

    {
        let mut state = lock_state(state);
        if state.generation == generation {
            state.engine = Some(engine);
        }
    }

    match result {
        Ok(detections) => {
            tracing::info!(
                %model,
                %delegate,
                elapsed_ms = elapsed.as_millis() as u64,
                count = detections.len(),
                "Detection finished"
            );
            listener.on_result(&detections, elapsed);
            Ok((detections, elapsed))
        }
        Err(e) => {
            tracing::error!(%model, error = %e, "Inference failed");
            let err = DetectorError::Inference(format!("{e:#}"));
            listener.on_error(&err);
            Err(err)
        }
    }
}

fn build_engine<L: BackendLoader>(
    loader: &L,
    model_dir: &Path,
    model: Model,
    delegate: Delegate,
    tuning: &Tuning,
    listener: &dyn DetectionListener,
) -> Result<Engine<L::Backend>, DetectorError> {
    let _span = common::span!("build_engine");

    let resolved = resolve_options(model_dir, model, delegate, tuning, loader);
    if let Some(soft) = &resolved.fallback {
        listener.on_error(soft);
    }
    let mut options = resolved.options;

    let backend = match loader.load(&options) {
        Ok(backend) => Ok(backend),
        Err(e) => match e.downcast_ref::<DelegateUnavailable>() {
            // Accelerator passed the support check but failed to attach
            Some(unavailable) => {
                tracing::warn!(error = %unavailable, "Falling back to CPU delegate");
                if let Some(soft) = DetectorError::unavailable(unavailable.delegate) {
                    listener.on_error(&soft);
                }
                options.base.delegate = Delegate::Cpu;
                loader.load(&options)
            }
            None => Err(e),
        },
    }
    .map_err(|e| {
        tracing::error!(path = %options.model_path.display(), error = %e, "Failed to load model");
        let err = DetectorError::ModelLoad(format!("{e:#}"));
        listener.on_error(&err);
        err
    })?;

    let spec = model.spec();
    let labels = LabelMap::load_or_builtin(model_dir, spec.labels_file);
    let input = InputSpec {
        resize: tuning.resize,
        ..spec.input
    };

    tracing::info!(
        %model,
        delegate = %options.base.delegate,
        threads = options.base.num_threads,
        resize = ?input.resize,
        "Detector ready"
    );

    Ok(Engine {
        backend,
        preprocessor: CpuPreProcessor::new(input),
        post: PostProcessor::new(
            spec.head,
            spec.activation,
            options.max_results,
            options.score_threshold,
        ),
        labels,
    })
}
