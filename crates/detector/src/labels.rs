//! Label files: one label per line, optionally followed by a tab and a
//! display name.

use crate::catalog::COCO_LABELS_FILE;
use crate::error::LabelError;
use std::fs;
use std::path::Path;

const BUILTIN_COCO: &str = include_str!("../assets/coco_labels.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub label: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<LabelEntry>,
}

impl LabelMap {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (label, display) = line.split_once('\t').unwrap_or((line, ""));
                LabelEntry {
                    label: label.trim().to_string(),
                    display_name: display.trim().to_string(),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let text = fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::parse(&text);
        if map.is_empty() {
            return Err(LabelError::Empty(path.to_path_buf()));
        }
        tracing::debug!(path = %path.display(), count = map.len(), "Loaded labels");
        Ok(map)
    }

    /// Load `file_name` from `dir`. A missing file falls back to the bundled
    /// copy when one exists, otherwise to numeric labels.
    pub fn load_or_builtin(dir: &Path, file_name: &str) -> Self {
        let path = dir.join(file_name);
        match Self::load(&path) {
            Ok(map) => map,
            Err(err) if file_name == COCO_LABELS_FILE => {
                tracing::debug!(error = %err, "Using bundled COCO labels");
                Self::builtin_coco()
            }
            Err(err) => {
                tracing::warn!(error = %err, "Labels unavailable, reporting class indices");
                Self::default()
            }
        }
    }

    pub fn builtin_coco() -> Self {
        Self::parse(BUILTIN_COCO)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label and display name for a class index. Unknown indices resolve to
    /// the index itself.
    pub fn resolve(&self, index: usize) -> (String, String) {
        match self.entries.get(index) {
            Some(entry) => (entry.label.clone(), entry.display_name.clone()),
            None => (index.to_string(), String::new()),
        }
    }
}
