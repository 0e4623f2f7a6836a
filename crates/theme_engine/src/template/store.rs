use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::atomic_io::write_text_atomic;

use super::{TemplateAsset, TemplatePreview, TemplateRef};

const TEMPLATE_SUFFIX: &str = ".template.json";
const PREVIEW_SUFFIX: &str = ".preview.json";

#[derive(Debug, Error)]
pub enum TemplateStoreError {
    #[error("template path already occupied: {path}")]
    Occupied { path: PathBuf },
    #[error("template not found: {template} (expected at {path})")]
    NotFound { template: TemplateRef, path: PathBuf },
    #[error("failed to read/write template file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("template at {path} has invalid format: {message}")]
    InvalidFormat { path: PathBuf, message: String },
}

pub trait TemplateStore {
    fn exists(&self, template: &TemplateRef) -> bool;

    /// Writes a new asset. Never replaces an existing one.
    fn create(
        &mut self,
        template: &TemplateRef,
        asset: &TemplateAsset,
    ) -> Result<(), TemplateStoreError>;

    fn load(&self, template: &TemplateRef) -> Result<TemplateAsset, TemplateStoreError>;

    fn list(&self, folder: &str) -> Result<Vec<TemplateRef>, TemplateStoreError>;

    fn write_preview(&mut self, preview: &TemplatePreview) -> Result<(), TemplateStoreError>;

    /// Deletes an asset and its preview. Removing a missing asset is not an
    /// error.
    fn remove(&mut self, template: &TemplateRef) -> Result<(), TemplateStoreError>;
}

#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn asset_path(&self, template: &TemplateRef) -> PathBuf {
        self.path_with_suffix(template, TEMPLATE_SUFFIX)
    }

    pub fn preview_path(&self, template: &TemplateRef) -> PathBuf {
        self.path_with_suffix(template, PREVIEW_SUFFIX)
    }

    fn path_with_suffix(&self, template: &TemplateRef, suffix: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = template
            .as_str()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}{suffix}"));
            }
        }
        path
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        folder
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl TemplateStore for FsTemplateStore {
    fn exists(&self, template: &TemplateRef) -> bool {
        !template.is_empty() && self.asset_path(template).is_file()
    }

    fn create(
        &mut self,
        template: &TemplateRef,
        asset: &TemplateAsset,
    ) -> Result<(), TemplateStoreError> {
        let path = self.asset_path(template);
        if path.exists() {
            return Err(TemplateStoreError::Occupied { path });
        }
        let text = serde_json::to_string_pretty(asset).map_err(|error| {
            TemplateStoreError::InvalidFormat {
                path: path.clone(),
                message: format!("failed to encode template json: {error}"),
            }
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TemplateStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(TemplateStoreError::Occupied { path });
            }
            Err(source) => return Err(TemplateStoreError::Io { path, source }),
        };
        if let Err(source) = file.write_all(text.as_bytes()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(TemplateStoreError::Io { path, source });
        }
        Ok(())
    }

    fn load(&self, template: &TemplateRef) -> Result<TemplateAsset, TemplateStoreError> {
        let path = self.asset_path(template);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(TemplateStoreError::NotFound {
                    template: template.clone(),
                    path,
                });
            }
            Err(source) => return Err(TemplateStoreError::Io { path, source }),
        };
        serde_json::from_str(&raw).map_err(|error| TemplateStoreError::InvalidFormat {
            path,
            message: error.to_string(),
        })
    }

    fn list(&self, folder: &str) -> Result<Vec<TemplateRef>, TemplateStoreError> {
        let dir = self.folder_path(folder);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(TemplateStoreError::Io { path: dir, source }),
        };

        let mut templates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TemplateStoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(TEMPLATE_SUFFIX))
            else {
                continue;
            };
            templates.push(TemplateRef::in_folder(folder, name));
        }
        templates.sort();
        Ok(templates)
    }

    fn write_preview(&mut self, preview: &TemplatePreview) -> Result<(), TemplateStoreError> {
        let path = self.preview_path(&preview.template);
        let text = serde_json::to_string_pretty(preview).map_err(|error| {
            TemplateStoreError::InvalidFormat {
                path: path.clone(),
                message: format!("failed to encode preview json: {error}"),
            }
        })?;
        write_text_atomic(&path, &text).map_err(|source| TemplateStoreError::Io { path, source })
    }

    fn remove(&mut self, template: &TemplateRef) -> Result<(), TemplateStoreError> {
        for path in [self.asset_path(template), self.preview_path(template)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(TemplateStoreError::Io { path, source }),
            }
        }
        Ok(())
    }
}
