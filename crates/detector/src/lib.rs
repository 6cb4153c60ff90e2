pub mod backend;
pub mod catalog;
pub mod config;
pub mod detector;
pub mod error;
pub mod labels;
pub mod logging;
pub mod options;
pub mod permission;
pub mod picker;
pub mod processing;
pub mod screen;

// Re-export commonly used types for convenience
pub use backend::{BackendLoader, InferenceBackend, InferenceOutput};
pub use catalog::{Delegate, Model};
pub use config::DetectorConfig;
pub use detector::{DetectionListener, ObjectDetector};
pub use error::{DetectorError, PickerError};
pub use options::{DelegateSupport, Tuning};
pub use processing::{BoundingBox, Category, Detection};
pub use screen::HomeScreen;
