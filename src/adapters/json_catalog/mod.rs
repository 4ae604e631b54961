// JSON catalog adapter - Format descriptors stored as one JSON file per format

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{EncodeError, EncodeResult};
use crate::format::FormatTemplate;
use crate::ports::{bare_format_name, FormatCatalog};

/// Type prefix of listed format names
pub const VIDEO_PREFIX: &str = "video";

/// Catalog backed by a directory of `<name>.json` descriptors
#[derive(Debug, Clone)]
pub struct JsonFormatCatalog {
    root: PathBuf,
}

impl JsonFormatCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn descriptor_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", bare_format_name(name)))
    }
}

impl FormatCatalog for JsonFormatCatalog {
    fn load(&self, name: &str) -> EncodeResult<FormatTemplate> {
        let path = self.descriptor_path(name);
        if !path.is_file() {
            return Err(EncodeError::MissingFormat { name: name.to_string() });
        }
        debug!("Loading format descriptor {}", path.display());
        let content = fs::read_to_string(&path)?;
        let document: Value = serde_json::from_str(&content).map_err(|e| EncodeError::InvalidFormatDescriptor {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        FormatTemplate::from_json(name, &document)
    }

    fn list(&self) -> EncodeResult<Vec<String>> {
        if !self.root.is_dir() {
            return Err(EncodeError::Config {
                message: format!("Formats directory does not exist: {}", self.root.display()),
            });
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| EncodeError::Config {
                message: format!("Failed to read formats directory: {}", e),
            })?;
            let path = entry.path();
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            if !entry.file_type().is_file() || !is_json {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                names.push(format!("{}/{}", VIDEO_PREFIX, stem.to_string_lossy()));
            }
        }
        names.sort();
        Ok(names)
    }
}
