//! Which directory entries the scanner keeps.

use super::ImageFormat;
use std::path::Path;

/// Accepts PNG and JPEG files, optionally skipping dot-files
#[derive(Debug, Clone, Copy)]
pub struct ImageFilter {
    include_hidden: bool,
}

impl ImageFilter {
    pub fn new(include_hidden: bool) -> Self {
        Self { include_hidden }
    }

    /// Dot-prefixed name
    pub fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'))
    }

    /// Format of a file worth hashing, `None` for anything to skip
    pub fn accept(&self, path: &Path) -> Option<ImageFormat> {
        if !self.include_hidden && Self::is_hidden(path) {
            return None;
        }
        ImageFormat::from_path(path)
    }
}

impl Default for ImageFilter {
    /// Hidden files count, like a plain recursive listing
    fn default() -> Self {
        Self::new(true)
    }
}
