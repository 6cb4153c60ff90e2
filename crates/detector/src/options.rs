//! Mapping from the (model, delegate) selection to inference-library options.

use crate::catalog::{Delegate, Model};
use crate::error::DetectorError;
use preprocess::ResizeMode;
use std::path::{Path, PathBuf};

pub const DEFAULT_NUM_THREADS: usize = 10;
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Options shared by every model: thread count and hardware delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseOptions {
    pub num_threads: usize,
    pub delegate: Delegate,
}

impl Default for BaseOptions {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
            delegate: Delegate::Cpu,
        }
    }
}

/// Full option set handed to the inference library for one detector build.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    pub base: BaseOptions,
    pub model_path: PathBuf,
    /// Categories kept per result. Zero keeps everything.
    pub max_results: usize,
    /// Categories scoring below this are dropped.
    pub score_threshold: Option<f32>,
}

/// Whether the current device can run a given delegate.
pub trait DelegateSupport {
    fn supports(&self, delegate: Delegate) -> bool;
}

/// Options after delegate resolution, plus the soft error to report when
/// the requested delegate had to be replaced.
#[derive(Debug)]
pub struct ResolvedOptions {
    pub options: DetectorOptions,
    pub fallback: Option<DetectorError>,
}

/// Settings that do not depend on the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub num_threads: usize,
    pub max_results: usize,
    pub score_threshold: Option<f32>,
    /// How images are fitted into the model input.
    pub resize: ResizeMode,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
            max_results: DEFAULT_MAX_RESULTS,
            score_threshold: None,
            resize: ResizeMode::Stretch,
        }
    }
}

/// Build the option set for `model` on `delegate`.
///
/// CPU is always available. An unsupported accelerator degrades to CPU and
/// carries the matching soft error instead of failing.
pub fn resolve_options(
    model_dir: &Path,
    model: Model,
    delegate: Delegate,
    tuning: &Tuning,
    support: &dyn DelegateSupport,
) -> ResolvedOptions {
    let (delegate, fallback) = if support.supports(delegate) {
        (delegate, None)
    } else {
        (Delegate::Cpu, DetectorError::unavailable(delegate))
    };

    if let Some(err) = &fallback {
        tracing::warn!(requested = %err, "Falling back to CPU delegate");
    }

    ResolvedOptions {
        options: DetectorOptions {
            base: BaseOptions {
                num_threads: tuning.num_threads.max(1),
                delegate,
            },
            model_path: model_dir.join(model.file_name()),
            max_results: tuning.max_results,
            score_threshold: tuning.score_threshold,
        },
        fallback,
    }
}
