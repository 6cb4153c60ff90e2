//! Presentation state for the single home screen.
//!
//! [`HomeScreen`] binds the model/delegate selection, the picked image and
//! the text rendering of the last result. The detector reports into it via
//! [`ScreenListener`].

use crate::backend::BackendLoader;
use crate::catalog::{Delegate, Model};
use crate::detector::{DetectionListener, ObjectDetector};
use crate::error::{DetectorError, PickerError};
use crate::options::Tuning;
use crate::permission::PermissionGate;
use crate::picker::{self, ImageSource, Selection};
use crate::processing::{Category, Detection};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const RESULT_HEADER: &str = "Classification Result: ";

#[derive(Debug, Clone, Default)]
pub struct ScreenState {
    pub model: Model,
    pub delegate: Delegate,
    pub image: Option<Arc<RgbImage>>,
    pub image_path: Option<PathBuf>,
    pub result_text: String,
    pub in_progress: bool,
    /// Failure of the last request. Cleared when the next detection starts.
    pub last_error: Option<String>,
    /// Soft error for the current selection, such as a delegate fallback.
    pub notice: Option<String>,
    pub detections: Vec<Detection>,
    pub inference_time: Option<Duration>,
}

/// One category in the result text block.
pub fn format_category(category: &Category) -> String {
    format!(
        "\n\nIndex: {}\nDisplay name: {}\nLabel: {}\nScore: {}",
        category.index, category.display_name, category.label, category.score
    )
}

/// Applies detector callbacks to shared screen state.
#[derive(Clone)]
pub struct ScreenListener {
    state: Arc<Mutex<ScreenState>>,
}

impl ScreenListener {
    pub fn new(state: Arc<Mutex<ScreenState>>) -> Self {
        Self { state }
    }

    fn lock(&self) -> MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DetectionListener for ScreenListener {
    fn on_start(&self) {
        let mut state = self.lock();
        state.result_text.clear();
        state.detections.clear();
        state.inference_time = None;
        state.last_error = None;
        state.in_progress = true;
    }

    fn on_error(&self, error: &DetectorError) {
        tracing::warn!(%error, "Detector reported an error");
        let mut state = self.lock();
        if error.is_soft() {
            state.notice = Some(error.to_string());
            return;
        }
        state.in_progress = false;
        state.last_error = Some(error.to_string());
    }

    fn on_rejected(&self, error: &DetectorError) {
        self.lock().last_error = Some(error.to_string());
    }

    fn on_result(&self, detections: &[Detection], inference_time: Duration) {
        let mut state = self.lock();
        state.in_progress = false;
        for category in detections.iter().flat_map(|d| &d.categories) {
            let block = format_category(category);
            state.result_text.push_str(&block);
        }
        state.detections = detections.to_vec();
        state.inference_time = Some(inference_time);
    }
}

/// Snapshot of the last classification for scripted consumers.
#[derive(Debug, Serialize)]
pub struct ResultReport<'a> {
    pub model: &'static str,
    pub delegate: &'static str,
    pub image: Option<&'a Path>,
    pub inference_time_ms: Option<f64>,
    pub detections: &'a [Detection],
    pub error: Option<&'a str>,
    pub notice: Option<&'a str>,
}

pub struct HomeScreen<L: BackendLoader> {
    state: Arc<Mutex<ScreenState>>,
    detector: ObjectDetector<L>,
    gate: PermissionGate,
}

impl<L: BackendLoader> HomeScreen<L> {
    pub fn new(loader: L, model_dir: impl Into<PathBuf>, tuning: Tuning) -> Self {
        Self::with_selection(loader, model_dir, Model::default(), Delegate::default(), tuning)
    }

    pub fn with_selection(
        loader: L,
        model_dir: impl Into<PathBuf>,
        model: Model,
        delegate: Delegate,
        tuning: Tuning,
    ) -> Self {
        let state = Arc::new(Mutex::new(ScreenState {
            model,
            delegate,
            ..ScreenState::default()
        }));
        let listener = Arc::new(ScreenListener::new(Arc::clone(&state)));
        let detector = ObjectDetector::new(loader, model_dir, model, delegate, tuning, listener);
        Self {
            state,
            detector,
            gate: PermissionGate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn detector(&self) -> &ObjectDetector<L> {
        &self.detector
    }

    /// Copy of the current state.
    pub fn state(&self) -> ScreenState {
        self.lock().clone()
    }

    /// Changing the selection drops the notice of the previous one.
    pub fn select_model(&self, model: Model) {
        {
            let mut state = self.lock();
            if state.model != model {
                state.notice = None;
            }
            state.model = model;
        }
        self.detector.set_model(model);
    }

    pub fn select_delegate(&self, delegate: Delegate) {
        {
            let mut state = self.lock();
            if state.delegate != delegate {
                state.notice = None;
            }
            state.delegate = delegate;
        }
        self.detector.set_delegate(delegate);
    }

    /// Pick an image through the permission gate.
    ///
    /// Returns whether an image was picked. Picking clears the previous
    /// result text; nothing picked leaves the state untouched.
    pub fn insert_image(
        &self,
        source: &ImageSource,
        selection: Option<&Selection>,
    ) -> Result<bool, PickerError> {
        match picker::pick(&self.gate, source, selection) {
            Ok(Some(picked)) => {
                self.set_image(picked.image, Some(picked.path));
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.lock().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_image(&self, image: RgbImage, path: Option<PathBuf>) {
        let mut state = self.lock();
        state.result_text.clear();
        state.detections.clear();
        state.inference_time = None;
        state.image = Some(Arc::new(image));
        state.image_path = path;
    }

    /// Run the detector on the current image.
    ///
    /// Without an image the detector is never called and the screen shows
    /// "Insert an image".
    pub async fn classify(&self) -> Result<(), DetectorError> {
        let image = self.lock().image.clone();
        if image.is_none() {
            let err = DetectorError::MissingImage;
            self.lock().last_error = Some(err.to_string());
            return Err(err);
        }
        self.detector.detect(image).await.map(|_| ())
    }

    pub fn render(&self) -> String {
        format!("{RESULT_HEADER}{}", self.lock().result_text)
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        let state = self.lock();
        let report = ResultReport {
            model: state.model.display_name(),
            delegate: state.delegate.name(),
            image: state.image_path.as_deref(),
            inference_time_ms: state.inference_time.map(|d| d.as_secs_f64() * 1000.0),
            detections: &state.detections,
            error: state.last_error.as_deref(),
            notice: state.notice.as_deref(),
        };
        serde_json::to_string_pretty(&report)
    }
}
