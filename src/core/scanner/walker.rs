//! Directory walking implementation using walkdir.

use super::{filter::ImageFilter, ImageFile, ScanResult};
use crate::error::ScanError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Stop after this many images (None = unlimited)
    pub max_images: Option<usize>,
    /// Directory subtrees to skip, e.g. the trash folder
    pub exclude: Vec<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: true,
            max_depth: None,
            max_images: None,
            exclude: Vec::new(),
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let filter = ImageFilter::new(config.include_hidden);
        Self { config, filter }
    }

    /// Scan a directory tree
    pub fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.scan_until(root, &AtomicBool::new(false))
    }

    /// Scan a directory tree, giving up with `ScanError::Cancelled` once
    /// `cancelled` is set.
    pub fn scan_until(&self, root: &Path, cancelled: &AtomicBool) -> Result<ScanResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        // Absolute paths make cache keys independent of the working directory
        let root = fs::canonicalize(root).map_err(|source| ScanError::ReadDirectory {
            path: root.to_path_buf(),
            source,
        })?;
        let excluded: Vec<PathBuf> = self
            .config
            .exclude
            .iter()
            .filter_map(|path| fs::canonicalize(path).ok())
            .filter(|path| path != &root)
            .collect();

        let include_hidden = self.config.include_hidden;
        let mut walker = WalkDir::new(&root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let entries = walker.into_iter().filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            if excluded.iter().any(|skip| skip == entry.path()) {
                debug!(path = %entry.path().display(), "Skipping excluded directory");
                return false;
            }
            include_hidden || !ImageFilter::is_hidden(entry.path())
        });

        let mut result = ScanResult::default();

        for entry_result in entries {
            if cancelled.load(Ordering::Relaxed) {
                return Err(ScanError::Cancelled);
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let error = if e.io_error().map(io::Error::kind)
                        == Some(io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: io::Error::other(e.to_string()),
                        }
                    };
                    warn!(%error, "Skipping unreadable entry");
                    result.errors.push(error);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            let Some(format) = self.filter.accept(entry.path()) else {
                continue;
            };

            if self
                .config
                .max_images
                .is_some_and(|max| result.files.len() >= max)
            {
                result.truncated = true;
                break;
            }

            result.files.push(ImageFile {
                path: entry.into_path(),
                format,
            });
        }

        info!(
            root = %root.display(),
            images = result.files.len(),
            errors = result.errors.len(),
            truncated = result.truncated,
            "Scan complete"
        );

        Ok(result)
    }
}
