//! Extension-based media classification.

use std::collections::HashSet;
use std::path::Path;

use crate::types::MediaCategory;

pub const DEFAULT_PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi"];

/// Maps a path to a [`MediaCategory`] by case-insensitive extension match.
/// Extensions are stored lowercased and without the leading dot.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    photo: HashSet<String>,
    video: HashSet<String>,
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PHOTO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS)
    }
}

impl FileClassifier {
    pub fn new<P, V>(photo: &[P], video: &[V]) -> Self
    where
        P: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            photo: photo.iter().map(|e| normalize_extension(e.as_ref())).collect(),
            video: video.iter().map(|e| normalize_extension(e.as_ref())).collect(),
        }
    }

    /// Returns `None` for files that are neither photos nor videos.
    pub fn classify(&self, path: &Path) -> Option<MediaCategory> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if self.photo.contains(&ext) {
            Some(MediaCategory::Photo)
        } else if self.video.contains(&ext) {
            Some(MediaCategory::Video)
        } else {
            None
        }
    }

    /// Extensions claimed by both categories. A non-empty result is a
    /// configuration error since classification would be ambiguous.
    pub fn overlapping(&self) -> Vec<&str> {
        let mut shared: Vec<&str> = self
            .photo
            .intersection(&self.video)
            .map(String::as_str)
            .collect();
        shared.sort_unstable();
        shared
    }

    pub fn extensions(&self, category: MediaCategory) -> &HashSet<String> {
        match category {
            MediaCategory::Photo => &self.photo,
            MediaCategory::Video => &self.video,
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}
