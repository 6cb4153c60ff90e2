//! Storage read-access check for image sources.

use crate::error::PickerError;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    Denied,
    Missing,
}

/// Decides whether an image source may be read.
///
/// There is no grant flow on the desktop: a denied source stays denied and
/// the pick is abandoned.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionGate;

impl PermissionGate {
    pub fn check(&self, path: &Path) -> AccessStatus {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => return status_from_error(e.kind()),
        };

        let probe = if metadata.is_dir() {
            fs::read_dir(path).map(|_| ())
        } else {
            File::open(path).map(|_| ())
        };

        match probe {
            Ok(()) => AccessStatus::Granted,
            Err(e) => status_from_error(e.kind()),
        }
    }

    /// Like [`check`](Self::check) but as an error for the picker.
    pub fn require(&self, path: &Path) -> Result<(), PickerError> {
        match self.check(path) {
            AccessStatus::Granted => Ok(()),
            AccessStatus::Denied => {
                tracing::warn!(path = %path.display(), "Storage read access denied");
                Err(PickerError::PermissionDenied(path.to_path_buf()))
            }
            AccessStatus::Missing => Err(PickerError::NotFound(path.to_path_buf())),
        }
    }
}

fn status_from_error(kind: ErrorKind) -> AccessStatus {
    match kind {
        ErrorKind::NotFound => AccessStatus::Missing,
        _ => AccessStatus::Denied,
    }
}
