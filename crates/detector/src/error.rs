use crate::catalog::Delegate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the detector wrapper and surfaced to the listener.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector failed to initialize. See error logs for details: {0}")]
    ModelLoad(String),

    #[error("Detector failed to run inference: {0}")]
    Inference(String),

    #[error("GPU is not supported on this device")]
    GpuUnavailable,

    #[error("NNAPI is not supported on this device")]
    NnapiUnavailable,

    #[error("Insert an image")]
    MissingImage,

    #[error("A detection is already running")]
    Busy,
}

impl DetectorError {
    /// Soft error reported when `delegate` cannot run on this device.
    pub fn unavailable(delegate: Delegate) -> Option<Self> {
        match delegate {
            Delegate::Cpu => None,
            Delegate::Gpu => Some(DetectorError::GpuUnavailable),
            Delegate::Nnapi => Some(DetectorError::NnapiUnavailable),
        }
    }

    /// Soft errors are reported but do not abort the operation.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            DetectorError::GpuUnavailable | DetectorError::NnapiUnavailable
        )
    }
}

/// Raised by a backend loader when the accelerator passed the support check
/// but could not be attached to the session.
#[derive(Debug, Error)]
#[error("{delegate} execution provider failed to register: {reason}")]
pub struct DelegateUnavailable {
    pub delegate: Delegate,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("Storage read access denied for {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Image source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No image at index {index} (gallery has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No image named {0} in gallery")]
    UnknownName(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid gallery pattern for {}: {source}", path.display())]
    Pattern {
        path: PathBuf,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Failed to read label file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Label file {} is empty", .0.display())]
    Empty(PathBuf),
}
