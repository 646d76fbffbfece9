//! Mutating operations and text editing.
//!
//! Every operation validates completely (path, name, type, size, collisions)
//! before the pre-hooks run, then performs a single storage call and runs
//! the post-hooks.

use std::sync::Arc;

use protocol::{FileCategory, VersionInfo};
use tracing::{debug, info, warn};

use super::browser::{DirectoryBrowser, DirectoryEntry};
use super::category::split_extension;
use super::error::{FilesError, Result};
use super::hooks::{HookList, Operation, OperationHook};
use super::resolver::{PathResolver, ResolvedPath};
use super::sanitize::NameSanitizer;
use super::storage::Storage;
use super::versions::VersionSet;
use crate::config::{Config, ConfigError};

/// Entry point for browsing and changing the media directory.
#[derive(Debug)]
pub struct FileManager {
    browser: DirectoryBrowser,
    sanitizer: NameSanitizer,
    versions: VersionSet,
    max_upload_size: u64,
    hooks: HookList,
}

impl FileManager {
    pub fn new(
        browser: DirectoryBrowser,
        sanitizer: NameSanitizer,
        versions: VersionSet,
        max_upload_size: u64,
    ) -> Self {
        Self {
            browser,
            sanitizer,
            versions,
            max_upload_size,
            hooks: HookList::new(),
        }
    }

    /// Build a manager over `storage` from a validated configuration.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
    ) -> std::result::Result<Self, ConfigError> {
        let resolver = PathResolver::new(storage, &config.storage.root).map_err(|e| {
            ConfigError::InvalidRoot {
                path: config.storage.root.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let extensions = config.extension_table();
        let versions = config.version_set(&extensions);
        let settings = config.listing_settings(&versions)?;
        let browser = DirectoryBrowser::new(resolver, extensions, settings);

        Ok(Self::new(
            browser,
            config.sanitizer()?,
            versions,
            config.upload.max_size,
        ))
    }

    /// Register a hook; hooks run in registration order.
    pub fn with_hook(mut self, hook: Box<dyn OperationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn add_hook(&mut self, hook: Box<dyn OperationHook>) {
        self.hooks.push(hook);
    }

    pub fn browser(&self) -> &DirectoryBrowser {
        &self.browser
    }

    pub fn sanitizer(&self) -> &NameSanitizer {
        &self.sanitizer
    }

    fn resolver(&self) -> &PathResolver {
        self.browser.resolver()
    }

    fn storage(&self) -> &dyn Storage {
        self.resolver().storage()
    }

    /// Create folder `raw_name` in `dir`. Returns the sanitized name.
    pub fn create_dir(&self, dir: &str, raw_name: &str) -> Result<String> {
        let dir = self.resolver().resolve(dir)?;
        let name = self.sanitizer.sanitize(raw_name)?;
        let target = self.resolver().child_for_creation(&dir, &name)?;

        if self.storage().exists(&target.absolute) {
            return Err(FilesError::AlreadyExists(target.relative));
        }

        let operation = Operation::CreateDir {
            dir: dir.relative.clone(),
            name: name.clone(),
        };
        self.hooks.run_before(&operation)?;

        self.storage()
            .create_dir(&target.absolute)
            .map_err(|e| FilesError::from_io(e, target.relative.clone()))?;

        info!(path = %target.relative, "Created folder");
        self.hooks.run_after(&operation);
        Ok(name)
    }

    /// Store `data` as `raw_file_name` in `dir`. Returns the stored name.
    pub fn upload(&self, dir: &str, raw_file_name: &str, data: &[u8]) -> Result<String> {
        let dir = self.resolver().resolve(dir)?;
        let name = self.sanitizer.sanitize_file_name(raw_file_name)?;

        let (_, extension) = split_extension(&name);
        if self.browser.extensions().lookup(extension).is_none() {
            return Err(FilesError::UnsupportedType(name));
        }

        let size = data.len() as u64;
        if size > self.max_upload_size {
            return Err(FilesError::SizeExceeded {
                size,
                limit: self.max_upload_size,
            });
        }

        let target = self.resolver().child_for_creation(&dir, &name)?;
        if self.storage().exists(&target.absolute) {
            return Err(FilesError::AlreadyExists(target.relative));
        }

        let operation = Operation::Upload {
            dir: dir.relative.clone(),
            name: name.clone(),
            size,
        };
        self.hooks.run_before(&operation)?;

        self.storage()
            .create_new(&target.absolute, data)
            .map_err(|e| FilesError::from_io(e, target.relative.clone()))?;

        info!(path = %target.relative, size, "Uploaded file");
        self.hooks.run_after(&operation);
        Ok(name)
    }

    /// Delete a file (and its image versions) or an empty folder.
    pub fn delete(&self, dir: &str, name: &str) -> Result<DirectoryEntry> {
        let dir = self.resolver().resolve(dir)?;
        let entry = self.browser.entry(&dir, name)?;

        if entry.is_directory && entry.is_empty != Some(true) {
            return Err(FilesError::NotEmpty(entry.relative_path));
        }

        let operation = Operation::Delete {
            dir: dir.relative.clone(),
            name: entry.name.clone(),
            is_directory: entry.is_directory,
        };
        self.hooks.run_before(&operation)?;

        let removed = if entry.is_directory {
            self.storage().remove_dir(&entry.path)
        } else {
            self.storage().remove_file(&entry.path)
        };
        removed.map_err(|e| FilesError::from_io(e, entry.relative_path.clone()))?;
        if !entry.is_directory {
            self.remove_versions(&dir, &entry.name);
        }

        info!(path = %entry.relative_path, is_directory = entry.is_directory, "Deleted entry");
        self.hooks.run_after(&operation);
        Ok(entry)
    }

    /// Rename `name` in `dir`.
    ///
    /// `raw_new_name` is the new stem; a file keeps its current extension
    /// (lowercased). A raw name already ending with that extension has it
    /// stripped first. Returns the new name.
    pub fn rename(&self, dir: &str, name: &str, raw_new_name: &str) -> Result<String> {
        let dir = self.resolver().resolve(dir)?;
        let entry = self.browser.entry(&dir, name)?;

        let extension = if entry.is_directory {
            String::new()
        } else {
            split_extension(&entry.name).1.to_lowercase()
        };

        let raw_stem = strip_extension(raw_new_name.trim(), &extension);
        let stem = self.sanitizer.sanitize(raw_stem)?;
        let new_name = format!("{}{}", stem, extension);

        let stem_path = self.resolver().child_for_creation(&dir, &stem)?;
        if self
            .storage()
            .stat(&stem_path.absolute)
            .is_ok_and(|stat| stat.is_dir())
        {
            return Err(FilesError::AlreadyExists(stem_path.relative));
        }

        let target = self.resolver().child_for_creation(&dir, &new_name)?;
        if self.storage().exists(&target.absolute) {
            return Err(FilesError::AlreadyExists(target.relative));
        }

        let operation = Operation::Rename {
            dir: dir.relative.clone(),
            from: entry.name.clone(),
            to: new_name.clone(),
        };
        self.hooks.run_before(&operation)?;

        self.storage()
            .rename(&entry.path, &target.absolute)
            .map_err(|e| FilesError::from_io(e, entry.relative_path.clone()))?;
        if !entry.is_directory {
            self.remove_versions(&dir, &entry.name);
        }

        info!(from = %entry.relative_path, to = %target.relative, "Renamed entry");
        self.hooks.run_after(&operation);
        Ok(new_name)
    }

    /// UTF-8 content of a file.
    pub fn read_text(&self, dir: &str, name: &str) -> Result<String> {
        let dir = self.resolver().resolve(dir)?;
        let entry = self.editable_entry(&dir, name)?;

        let bytes = self
            .storage()
            .read(&entry.path)
            .map_err(|e| FilesError::from_io(e, entry.relative_path.clone()))?;

        String::from_utf8(bytes).map_err(|_| FilesError::UnsupportedType(entry.relative_path))
    }

    /// Replace the content of an existing file. Carriage returns are
    /// stripped.
    pub fn save_text(&self, dir: &str, name: &str, content: &str) -> Result<()> {
        let dir = self.resolver().resolve(dir)?;
        let entry = self.editable_entry(&dir, name)?;

        let content = content.replace('\r', "");
        self.storage()
            .write(&entry.path, content.as_bytes())
            .map_err(|e| FilesError::from_io(e, entry.relative_path.clone()))?;

        info!(path = %entry.relative_path, size = content.len(), "Saved file");
        Ok(())
    }

    /// Configured versions of an image and whether each exists.
    pub fn versions(&self, dir: &str, name: &str) -> Result<Vec<VersionInfo>> {
        let dir = self.resolver().resolve(dir)?;
        let entry = self.browser.entry(&dir, name)?;

        if entry.category != FileCategory::Image {
            return Err(FilesError::UnsupportedType(entry.relative_path));
        }

        self.versions
            .renditions(&entry.name)
            .into_iter()
            .map(|(version, file_name)| -> Result<VersionInfo> {
                let path = self.resolver().child_for_creation(&dir, &file_name)?;
                Ok(VersionInfo {
                    version: version.to_string(),
                    exists: self.storage().exists(&path.absolute),
                    path: path.relative,
                })
            })
            .collect()
    }

    fn editable_entry(&self, dir: &ResolvedPath, name: &str) -> Result<DirectoryEntry> {
        let entry = self.browser.entry(dir, name)?;
        if entry.is_directory {
            return Err(FilesError::UnsupportedType(entry.relative_path));
        }
        Ok(entry)
    }

    /// Remove every existing version of `name`. Failures are logged.
    fn remove_versions(&self, dir: &ResolvedPath, name: &str) {
        for (version, file_name) in self.versions.renditions(name) {
            let Ok(path) = self.resolver().child_for_creation(dir, &file_name) else {
                continue;
            };
            if !self.storage().exists(&path.absolute) {
                continue;
            }
            match self.storage().remove_file(&path.absolute) {
                Ok(()) => debug!(path = %path.relative, version, "Removed version"),
                Err(e) => {
                    warn!(path = %path.relative, version, error = %e, "Failed to remove version")
                }
            }
        }
    }
}

/// Strip `extension` from the end of `raw`, ignoring ASCII case.
fn strip_extension<'a>(raw: &'a str, extension: &str) -> &'a str {
    if extension.is_empty() || raw.len() <= extension.len() {
        return raw;
    }
    let split = raw.len() - extension.len();
    match raw.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(extension) => &raw[..split],
        _ => raw,
    }
}
