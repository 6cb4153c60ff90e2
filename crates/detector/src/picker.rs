//! Image picker: a single file or a gallery directory of images.

use crate::error::PickerError;
use crate::permission::PermissionGate;
use image::{ImageReader, RgbImage};
use glob::MatchOptions;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// Extensions recognized as gallery images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Gallery(PathBuf),
}

impl ImageSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ImageSource::Gallery(path)
        } else {
            ImageSource::File(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ImageSource::File(path) | ImageSource::Gallery(path) => path,
        }
    }
}

/// Which gallery entry to pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    Name(String),
}

impl Selection {
    /// Numbers select by position, anything else by file name.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse() {
            Ok(index) => Selection::Index(index),
            Err(_) => Selection::Name(raw.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryEntry {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
}

/// A decoded image and where it came from.
#[derive(Debug, Clone)]
pub struct PickedImage {
    pub path: PathBuf,
    pub image: RgbImage,
}

/// Image files in `dir`, sorted by file name. Extensions match
/// case-insensitively.
pub fn list_gallery(dir: &Path) -> Result<Vec<GalleryEntry>, PickerError> {
    let io_err = |source| PickerError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let dir_str = dir.to_str().ok_or_else(|| {
        io_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "gallery path is not valid UTF-8",
        ))
    })?;
    let escaped = glob::Pattern::escape(dir_str);
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let mut paths = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        let pattern = format!("{escaped}/*.{ext}");
        let matches = glob::glob_with(&pattern, options).map_err(|source| PickerError::Pattern {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in matches {
            let path = entry.map_err(|e| io_err(e.into_error()))?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    paths.dedup();

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| GalleryEntry {
            index,
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
        })
        .collect())
}

/// Resolve a source and selection to a decoded image.
///
/// `Ok(None)` means nothing was picked: an empty gallery, or a gallery
/// without a selection.
pub fn pick(
    gate: &PermissionGate,
    source: &ImageSource,
    selection: Option<&Selection>,
) -> Result<Option<PickedImage>, PickerError> {
    gate.require(source.path())?;

    let path = match source {
        ImageSource::File(path) => path.clone(),
        ImageSource::Gallery(dir) => {
            let entries = list_gallery(dir)?;
            let Some(selection) = selection else {
                tracing::debug!(dir = %dir.display(), "No gallery selection");
                return Ok(None);
            };
            if entries.is_empty() {
                tracing::debug!(dir = %dir.display(), "Gallery is empty");
                return Ok(None);
            }
            select(&entries, selection)?.path.clone()
        }
    };

    let image = decode(&path)?;
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Image picked"
    );
    Ok(Some(PickedImage { path, image }))
}

fn select<'a>(
    entries: &'a [GalleryEntry],
    selection: &Selection,
) -> Result<&'a GalleryEntry, PickerError> {
    match selection {
        Selection::Index(index) => entries.get(*index).ok_or(PickerError::IndexOutOfRange {
            index: *index,
            len: entries.len(),
        }),
        Selection::Name(name) => entries
            .iter()
            .find(|entry| &entry.name == name)
            .ok_or_else(|| PickerError::UnknownName(name.clone())),
    }
}

/// Decode any supported image into an owned RGB8 bitmap.
pub fn decode(path: &Path) -> Result<RgbImage, PickerError> {
    let reader = ImageReader::open(path).map_err(|source| PickerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = reader.with_guessed_format().map_err(|source| PickerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = reader.decode().map_err(|source| PickerError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([10, 200, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_list_gallery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 2, 2);
        write_png(&dir.path().join("a.png"), 2, 2);
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let entries = list_gallery(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(entries[1].index, 1);
    }

    #[test]
    fn test_list_gallery_ignores_extension_case() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("c.PNG"), 2, 2);
        std::fs::copy(dir.path().join("c.PNG"), dir.path().join("a.Jpg")).unwrap();
        std::fs::write(dir.path().join("b.TXT"), "x").unwrap();

        let entries = list_gallery(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.Jpg", "c.PNG"]);
    }

    #[test]
    fn test_list_gallery_escapes_directory_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("holiday [2024]");
        std::fs::create_dir(&dir).unwrap();
        write_png(&dir.join("a.png"), 2, 2);

        let entries = list_gallery(&dir).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, dir.join("a.png"));
    }

    #[test]
    fn test_pick_by_index_and_name() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 4, 3);
        write_png(&dir.path().join("b.png"), 6, 5);
        let source = ImageSource::from_path(dir.path());
        let gate = PermissionGate;

        let picked = pick(&gate, &source, Some(&Selection::Index(1))).unwrap().unwrap();
        assert_eq!(picked.image.dimensions(), (6, 5));

        let picked = pick(&gate, &source, Some(&Selection::parse("a.png")))
            .unwrap()
            .unwrap();
        assert_eq!(picked.image.dimensions(), (4, 3));
        assert_eq!(picked.image.get_pixel(0, 0), &Rgb([10, 200, 30]));
    }

    #[test]
    fn test_nothing_picked() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSource::Gallery(dir.path().to_path_buf());
        let gate = PermissionGate;
        assert!(pick(&gate, &source, Some(&Selection::Index(0))).unwrap().is_none());

        write_png(&dir.path().join("a.png"), 2, 2);
        assert!(pick(&gate, &source, None).unwrap().is_none());
    }

    #[test]
    fn test_bad_selection() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 2, 2);
        let source = ImageSource::Gallery(dir.path().to_path_buf());
        let gate = PermissionGate;

        assert!(matches!(
            pick(&gate, &source, Some(&Selection::Index(3))),
            Err(PickerError::IndexOutOfRange { index: 3, len: 1 })
        ));
        assert!(matches!(
            pick(&gate, &source, Some(&Selection::Name("z.png".into()))),
            Err(PickerError::UnknownName(_))
        ));
    }

    #[test]
    fn test_single_file_and_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("cat.png");
        write_png(&good, 3, 3);
        let bad = dir.path().join("broken.jpg");
        std::fs::write(&bad, b"definitely not jpeg").unwrap();
        let gate = PermissionGate;

        let picked = pick(&gate, &ImageSource::File(good), None).unwrap();
        assert!(picked.is_some());
        assert!(matches!(
            pick(&gate, &ImageSource::File(bad), None),
            Err(PickerError::Decode { .. })
        ));
        assert!(matches!(
            pick(&gate, &ImageSource::File(dir.path().join("missing.png")), None),
            Err(PickerError::NotFound(_))
        ));
    }
}
