//! Image versions: renditions stored next to the original as
//! `<stem>_<version><ext>`.

use protocol::FileCategory;
use regex::Regex;

use super::category::{split_extension, ExtensionTable};

/// Version names used when none are configured.
pub const DEFAULT_VERSIONS: [&str; 6] =
    ["fb_thumb", "thumbnail", "small", "medium", "big", "large"];

/// The configured image versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSet {
    names: Vec<String>,
    image_extensions: Vec<String>,
}

impl VersionSet {
    /// Versions `names` of files whose extension is an image extension in
    /// `table`.
    pub fn new(names: Vec<String>, table: &ExtensionTable) -> Self {
        let image_extensions = table
            .extensions_for(FileCategory::Image)
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            names,
            image_extensions,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether `file_name` can have versions.
    pub fn applies_to(&self, file_name: &str) -> bool {
        let (_, extension) = split_extension(file_name);
        let extension = extension.to_lowercase();
        self.image_extensions.iter().any(|e| *e == extension)
    }

    /// File name of `version` of `file_name`.
    ///
    /// ```
    /// use filebrowser::files::versions::VersionSet;
    /// use filebrowser::files::category::ExtensionTable;
    ///
    /// let versions = VersionSet::new(vec!["thumb".into()], &ExtensionTable::default());
    /// assert_eq!(versions.version_file_name("beach.jpg", "thumb"), "beach_thumb.jpg");
    /// ```
    pub fn version_file_name(&self, file_name: &str, version: &str) -> String {
        let (stem, extension) = split_extension(file_name);
        format!("{}_{}{}", stem, version, extension)
    }

    /// `(version, file name)` for every configured version of `file_name`.
    /// Empty when the file is not an image.
    pub fn renditions(&self, file_name: &str) -> Vec<(&str, String)> {
        if !self.applies_to(file_name) {
            return Vec::new();
        }
        self.names
            .iter()
            .map(|v| (v.as_str(), self.version_file_name(file_name, v)))
            .collect()
    }

    /// One listing exclude pattern per version, matching
    /// `_<version>.<image extension>` at the end of a name.
    pub fn exclude_patterns(&self) -> Result<Vec<Regex>, regex::Error> {
        if self.image_extensions.is_empty() {
            return Ok(Vec::new());
        }

        let alternatives = self
            .image_extensions
            .iter()
            .map(|e| regex::escape(e.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join("|");

        self.names
            .iter()
            .map(|v| Regex::new(&format!(r"(?i)_{}\.({})$", regex::escape(v), alternatives)))
            .collect()
    }
}
