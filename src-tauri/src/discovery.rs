use crate::profile::FolderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const TEXTURE_EXTENSION: &str = "dds";

/// One texture card in the frontend grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageInfo {
    /// Empty, or a `data:image/jpeg;base64,...` preview
    pub src: String,
    pub alt: String,
    pub path: String,
}

impl ImageInfo {
    pub fn from_path(path: &Path) -> Self {
        Self {
            src: String::new(),
            alt: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_string_lossy().replace('\\', "/"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImageCounts {
    pub dump_count: usize,
    pub inject_count: usize,
}

pub fn is_texture_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(TEXTURE_EXTENSION))
        .unwrap_or(false)
}

/// List DDS files under `dir`; a missing directory yields nothing.
/// Order follows the filesystem and is not stable.
pub fn discover_textures(dir: &Path, kind: FolderKind) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut walker = WalkDir::new(dir).min_depth(1);
    if !kind.is_recursive() {
        walker = walker.max_depth(1);
    }

    walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_texture_file(p))
        .collect()
}

pub fn discover_images(dir: &Path, kind: FolderKind) -> Vec<ImageInfo> {
    discover_textures(dir, kind)
        .iter()
        .map(|p| ImageInfo::from_path(p))
        .collect()
}

pub fn count_images(dir: &Path, kind: FolderKind) -> usize {
    discover_textures(dir, kind).len()
}
