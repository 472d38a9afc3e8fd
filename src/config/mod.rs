//! # Config Module
//!
//! Run configuration for the finder.
//!
//! `FinderConfig` is an immutable value built once and handed to the
//! finder at construction. Values come from, in increasing priority:
//! built-in defaults, an optional TOML file, and explicit builder calls
//! (the CLI maps its flags onto those).
//!
//! ## File Format
//! ```toml
//! [paths]
//! image_folder = "/photos"
//! trash_folder = "/photos/trash"
//! exclude_trash = false
//! cache_file = "image_hash_cache.json"
//!
//! [settings]
//! similarity_threshold = 10
//! threads = 4
//! batch_size = 100
//! max_images = 50000
//! cache_save_interval = 50
//! high_resource_threshold = 90.0
//! resource_check_interval_ms = 1000
//! ```
//!
//! Unknown keys are logged and ignored.

use crate::core::cache::DEFAULT_CACHE_FILE;
use crate::core::hasher::Fingerprint;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "dedup.toml";

pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 10;
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_IMAGES: usize = 50_000;
pub const DEFAULT_CACHE_SAVE_INTERVAL: usize = 50;
/// CPU or memory percentage above which the finder backs off
pub const DEFAULT_HIGH_RESOURCE_THRESHOLD: f32 = 90.0;
pub const DEFAULT_RESOURCE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a finder run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct FinderConfig {
    image_folder: PathBuf,
    trash_folder: Option<PathBuf>,
    exclude_trash: bool,
    similarity_threshold: u32,
    num_threads: usize,
    batch_size: usize,
    max_images: usize,
    cache_save_interval: usize,
    high_resource_threshold: f32,
    resource_check_interval: Duration,
    cache_path: PathBuf,
    include_hidden: bool,
    follow_symlinks: bool,
    adaptive: bool,
}

impl FinderConfig {
    pub fn builder(image_folder: impl Into<PathBuf>) -> FinderConfigBuilder {
        FinderConfigBuilder::new(image_folder)
    }

    /// Root directory to scan
    pub fn image_folder(&self) -> &Path {
        &self.image_folder
    }

    /// Where the user sets duplicates aside. Opaque to the engine unless
    /// `exclude_trash` is set.
    pub fn trash_folder(&self) -> Option<&Path> {
        self.trash_folder.as_deref()
    }

    /// Skip the trash folder subtree during enumeration. Off by default,
    /// so a trash folder inside the image folder is scanned like any other.
    pub fn exclude_trash(&self) -> bool {
        self.exclude_trash
    }

    pub fn similarity_threshold(&self) -> u32 {
        self.similarity_threshold
    }

    /// Worker threads for the first batch
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Files in the first batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    /// Processed files between cache flushes
    pub fn cache_save_interval(&self) -> usize {
        self.cache_save_interval
    }

    pub fn high_resource_threshold(&self) -> f32 {
        self.high_resource_threshold
    }

    pub fn resource_check_interval(&self) -> Duration {
        self.resource_check_interval
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Whether thread count and batch size follow system load
    pub fn adaptive(&self) -> bool {
        self.adaptive
    }
}

/// Builder for `FinderConfig`
#[derive(Debug, Clone)]
pub struct FinderConfigBuilder {
    config: FinderConfig,
}

impl FinderConfigBuilder {
    pub fn new(image_folder: impl Into<PathBuf>) -> Self {
        Self {
            config: FinderConfig {
                image_folder: image_folder.into(),
                trash_folder: None,
                exclude_trash: false,
                similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
                num_threads: DEFAULT_THREADS,
                batch_size: DEFAULT_BATCH_SIZE,
                max_images: DEFAULT_MAX_IMAGES,
                cache_save_interval: DEFAULT_CACHE_SAVE_INTERVAL,
                high_resource_threshold: DEFAULT_HIGH_RESOURCE_THRESHOLD,
                resource_check_interval: DEFAULT_RESOURCE_CHECK_INTERVAL,
                cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
                include_hidden: true,
                follow_symlinks: false,
                adaptive: true,
            },
        }
    }

    pub fn trash_folder(mut self, trash_folder: impl Into<PathBuf>) -> Self {
        self.config.trash_folder = Some(trash_folder.into());
        self
    }

    pub fn exclude_trash(mut self, exclude: bool) -> Self {
        self.config.exclude_trash = exclude;
        self
    }

    /// Set the comparison threshold (lower = stricter)
    pub fn similarity_threshold(mut self, threshold: u32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn max_images(mut self, max_images: usize) -> Self {
        self.config.max_images = max_images;
        self
    }

    pub fn cache_save_interval(mut self, interval: usize) -> Self {
        self.config.cache_save_interval = interval;
        self
    }

    pub fn high_resource_threshold(mut self, percent: f32) -> Self {
        self.config.high_resource_threshold = percent;
        self
    }

    pub fn resource_check_interval(mut self, interval: Duration) -> Self {
        self.config.resource_check_interval = interval;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = path.into();
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.include_hidden = include;
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.config.follow_symlinks = follow;
        self
    }

    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.config.adaptive = adaptive;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<FinderConfig, ConfigError> {
        let config = self.config;

        if config.image_folder.as_os_str().is_empty() {
            return Err(invalid("image_folder", "must not be empty"));
        }
        if config.similarity_threshold > Fingerprint::BITS {
            return Err(invalid(
                "similarity_threshold",
                format!(
                    "{} exceeds the {}-bit fingerprint width",
                    config.similarity_threshold,
                    Fingerprint::BITS
                ),
            ));
        }
        if config.num_threads == 0 {
            return Err(invalid("threads", "must be at least 1"));
        }
        if config.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if config.cache_save_interval == 0 {
            return Err(invalid("cache_save_interval", "must be at least 1"));
        }
        if !(config.high_resource_threshold > 0.0 && config.high_resource_threshold <= 100.0) {
            return Err(invalid(
                "high_resource_threshold",
                format!("{} is not a percentage in (0, 100]", config.high_resource_threshold),
            ));
        }
        if config.resource_check_interval.is_zero() {
            return Err(invalid("resource_check_interval", "must be non-zero"));
        }

        Ok(config)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Contents of a TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub paths: PathsSection,
    pub settings: SettingsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub image_folder: Option<PathBuf>,
    pub trash_folder: Option<PathBuf>,
    pub exclude_trash: Option<bool>,
    pub cache_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSection {
    pub similarity_threshold: Option<u32>,
    pub threads: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_images: Option<usize>,
    pub cache_save_interval: Option<usize>,
    pub high_resource_threshold: Option<f32>,
    pub resource_check_interval_ms: Option<u64>,
}

const PATHS_KEYS: &[&str] = &["image_folder", "trash_folder", "exclude_trash", "cache_file"];
const SETTINGS_KEYS: &[&str] = &[
    "similarity_threshold",
    "threads",
    "batch_size",
    "max_images",
    "cache_save_interval",
    "high_resource_threshold",
    "resource_check_interval_ms",
];

/// Dotted names of keys the file format does not know
fn unknown_keys(table: &toml::Table) -> Vec<String> {
    let mut unknown = Vec::new();
    for (name, value) in table {
        let known = match name.as_str() {
            "paths" => PATHS_KEYS,
            "settings" => SETTINGS_KEYS,
            _ => {
                unknown.push(name.clone());
                continue;
            }
        };
        if let Some(section) = value.as_table() {
            unknown.extend(
                section
                    .keys()
                    .filter(|key| !known.contains(&key.as_str()))
                    .map(|key| format!("{name}.{key}")),
            );
        }
    }
    unknown
}

impl FileConfig {
    /// Parse TOML text. Unknown keys are logged and ignored so files
    /// written for newer versions still load.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let parse_error = |e: toml::de::Error| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        };

        let table: toml::Table = text.parse().map_err(parse_error)?;
        for key in unknown_keys(&table) {
            warn!(path = %origin.display(), key = %key, "Ignoring unknown config key");
        }
        toml::Value::Table(table).try_into().map_err(parse_error)
    }

    /// Layer the file's values over a builder's defaults
    pub fn apply(&self, mut builder: FinderConfigBuilder) -> FinderConfigBuilder {
        let paths = &self.paths;
        let settings = &self.settings;

        if let Some(trash) = paths.trash_folder.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            builder = builder.trash_folder(trash);
        }
        if let Some(exclude) = paths.exclude_trash {
            builder = builder.exclude_trash(exclude);
        }
        if let Some(cache) = &paths.cache_file {
            builder = builder.cache_path(cache);
        }
        if let Some(threshold) = settings.similarity_threshold {
            builder = builder.similarity_threshold(threshold);
        }
        if let Some(threads) = settings.threads {
            builder = builder.num_threads(threads);
        }
        if let Some(batch_size) = settings.batch_size {
            builder = builder.batch_size(batch_size);
        }
        if let Some(max_images) = settings.max_images {
            builder = builder.max_images(max_images);
        }
        if let Some(interval) = settings.cache_save_interval {
            builder = builder.cache_save_interval(interval);
        }
        if let Some(percent) = settings.high_resource_threshold {
            builder = builder.high_resource_threshold(percent);
        }
        if let Some(ms) = settings.resource_check_interval_ms {
            builder = builder.resource_check_interval(Duration::from_millis(ms));
        }
        builder
    }
}

/// Load a config file. A missing file yields all defaults.
pub fn load(path: &Path) -> Result<FileConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "Loaded config file");
            FileConfig::parse(&text, path)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(FileConfig::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = FinderConfig::builder("/photos").build().unwrap();

        assert_eq!(config.image_folder(), Path::new("/photos"));
        assert_eq!(config.trash_folder(), None);
        assert!(!config.exclude_trash());
        assert_eq!(config.similarity_threshold(), 10);
        assert_eq!(config.num_threads(), 4);
        assert_eq!(config.batch_size(), 100);
        assert_eq!(config.max_images(), 50_000);
        assert_eq!(config.cache_save_interval(), 50);
        assert_eq!(config.high_resource_threshold(), 90.0);
        assert_eq!(config.resource_check_interval(), Duration::from_secs(1));
        assert_eq!(config.cache_path(), Path::new("image_hash_cache.json"));
        assert!(config.include_hidden());
        assert!(config.adaptive());
    }

    #[test]
    fn threshold_above_fingerprint_width_is_rejected() {
        assert!(FinderConfig::builder("/p").similarity_threshold(64).build().is_ok());

        let err = FinderConfig::builder("/p")
            .similarity_threshold(65)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "similarity_threshold",
                ..
            }
        ));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(FinderConfig::builder("/p").num_threads(0).build().is_err());
        assert!(FinderConfig::builder("/p").batch_size(0).build().is_err());
        assert!(FinderConfig::builder("/p").cache_save_interval(0).build().is_err());
        assert!(FinderConfig::builder("/p")
            .resource_check_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(FinderConfig::builder("").build().is_err());
    }

    #[test]
    fn resource_threshold_must_be_a_percentage() {
        assert!(FinderConfig::builder("/p").high_resource_threshold(0.0).build().is_err());
        assert!(FinderConfig::builder("/p").high_resource_threshold(150.0).build().is_err());
        assert!(FinderConfig::builder("/p").high_resource_threshold(100.0).build().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = FileConfig::parse(
            r#"
            [paths]
            image_folder = "/photos"
            trash_folder = "/photos/trash"
            exclude_trash = true

            [settings]
            similarity_threshold = 6
            batch_size = 25
            resource_check_interval_ms = 250
            "#,
            Path::new("dedup.toml"),
        )
        .unwrap();

        assert_eq!(file.paths.image_folder.as_deref(), Some(Path::new("/photos")));

        let config = file.apply(FinderConfig::builder("/photos")).build().unwrap();
        assert_eq!(config.trash_folder(), Some(Path::new("/photos/trash")));
        assert!(config.exclude_trash());
        assert_eq!(config.similarity_threshold(), 6);
        assert_eq!(config.batch_size(), 25);
        assert_eq!(config.num_threads(), DEFAULT_THREADS);
        assert_eq!(config.resource_check_interval(), Duration::from_millis(250));
    }

    #[test]
    fn empty_trash_folder_means_none() {
        let file = FileConfig::parse("[paths]\ntrash_folder = \"\"\n", Path::new("x.toml")).unwrap();
        let config = file.apply(FinderConfig::builder("/p")).build().unwrap();

        assert_eq!(config.trash_folder(), None);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let text = "[settings]\nthreshhold = 3\nthreads = 2\n\n[display]\ntheme = \"dark\"\n";
        let file = FileConfig::parse(text, Path::new("x.toml")).unwrap();

        assert_eq!(file.settings.threads, Some(2));
        assert_eq!(file.settings.similarity_threshold, None);

        let config = file.apply(FinderConfig::builder("/p")).build().unwrap();
        assert_eq!(config.num_threads(), 2);
        assert_eq!(config.similarity_threshold(), DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn unknown_keys_are_named_with_their_section() {
        let table: toml::Table = "[paths]\ncache_file = \"c.json\"\nbin = \"/b\"\n\n[display]\ntheme = 1\n"
            .parse()
            .unwrap();

        let mut unknown = unknown_keys(&table);
        unknown.sort();
        assert_eq!(unknown, vec!["display".to_string(), "paths.bin".to_string()]);
    }

    #[test]
    fn malformed_toml_is_still_a_parse_error() {
        let result = FileConfig::parse("[settings\nthreads = 2\n", Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        let result = FileConfig::parse("[settings]\nthreads = \"many\"\n", Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let file = load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(file, FileConfig::default());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[settings]\nthreads = 2\n").unwrap();

        assert_eq!(load(&path).unwrap().settings.threads, Some(2));
    }
}
