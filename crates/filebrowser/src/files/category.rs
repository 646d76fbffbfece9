//! Extension based classification of entries.

use std::collections::{BTreeMap, HashMap};

use protocol::FileCategory;

/// Split `name` into stem and extension, the extension keeping its dot.
///
/// Leading dots do not start an extension, so `.profile` has none.
///
/// ```
/// use filebrowser::files::category::split_extension;
///
/// assert_eq!(split_extension("photo.JPG"), ("photo", ".JPG"));
/// assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
/// assert_eq!(split_extension(".profile"), (".profile", ""));
/// assert_eq!(split_extension("README"), ("README", ""));
/// ```
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if name[..index].chars().any(|c| c != '.') => {
            (&name[..index], &name[index..])
        }
        _ => (name, ""),
    }
}

/// Maps lowercase extensions (with dot) to categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionTable {
    by_extension: HashMap<String, FileCategory>,
}

impl ExtensionTable {
    /// Build a table from category labels to extension lists.
    ///
    /// Labels that are not a known category are skipped. Extensions may be
    /// given with or without the leading dot.
    pub fn from_labels(table: &BTreeMap<String, Vec<String>>) -> Self {
        let mut by_extension = HashMap::new();
        for (label, extensions) in table {
            let Ok(category) = label.parse::<FileCategory>() else {
                continue;
            };
            for ext in extensions {
                by_extension.insert(normalize_extension(ext), category);
            }
        }
        Self { by_extension }
    }

    /// Category for a lowercase or mixed-case extension (with dot).
    pub fn lookup(&self, extension: &str) -> Option<FileCategory> {
        self.by_extension.get(&extension.to_lowercase()).copied()
    }

    /// Category for an entry. Folders are always [`FileCategory::Folder`];
    /// unknown extensions give [`FileCategory::Unknown`].
    pub fn categorize(&self, name: &str, is_directory: bool) -> FileCategory {
        if is_directory {
            return FileCategory::Folder;
        }
        let (_, extension) = split_extension(name);
        self.lookup(extension).unwrap_or(FileCategory::Unknown)
    }

    /// Extensions (with dot) registered for `category`, sorted.
    pub fn extensions_for(&self, category: FileCategory) -> Vec<&str> {
        let mut extensions: Vec<&str> = self
            .by_extension
            .iter()
            .filter(|(_, c)| **c == category)
            .map(|(ext, _)| ext.as_str())
            .collect();
        extensions.sort_unstable();
        extensions
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::from_labels(&default_extensions())
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// The stock extension table, keyed by category label.
pub fn default_extensions() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 5] = [
        ("Image", &[".jpg", ".jpeg", ".gif", ".png", ".tif", ".tiff"]),
        ("Video", &[".mov", ".wmv", ".mpeg", ".mpg", ".avi", ".rm", ".flv"]),
        ("Document", &[".pdf", ".doc", ".rtf", ".txt", ".xls", ".csv"]),
        ("Sound", &[".mp3", ".mp4", ".wav", ".aiff", ".midi", ".m4p"]),
        ("Code", &[".html", ".py", ".js", ".css"]),
    ];

    table
        .into_iter()
        .map(|(label, exts)| {
            (
                label.to_string(),
                exts.iter().map(|e| e.to_string()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_defaults() {
        let table = ExtensionTable::default();
        assert_eq!(table.categorize("photo.jpg", false), FileCategory::Image);
        assert_eq!(table.categorize("PHOTO.JPEG", false), FileCategory::Image);
        assert_eq!(table.categorize("notes.txt", false), FileCategory::Document);
        assert_eq!(table.categorize("song.mp3", false), FileCategory::Sound);
        assert_eq!(table.categorize("clip.avi", false), FileCategory::Video);
        assert_eq!(table.categorize("app.js", false), FileCategory::Code);
        assert_eq!(table.categorize("data.bin", false), FileCategory::Unknown);
        assert_eq!(table.categorize("Makefile", false), FileCategory::Unknown);
        assert_eq!(table.categorize("album.jpg", true), FileCategory::Folder);
    }

    #[test]
    fn test_custom_table() {
        let mut labels = BTreeMap::new();
        labels.insert("image".to_string(), vec!["webp".to_string(), ".AVIF".to_string()]);
        labels.insert("Spreadsheet".to_string(), vec!["ods".to_string()]);

        let table = ExtensionTable::from_labels(&labels);
        assert_eq!(table.lookup(".webp"), Some(FileCategory::Image));
        assert_eq!(table.lookup(".avif"), Some(FileCategory::Image));
        assert_eq!(table.lookup(".ods"), None);
        assert_eq!(table.lookup(".jpg"), None);
    }

    #[test]
    fn test_extensions_for() {
        let table = ExtensionTable::default();
        assert_eq!(table.extensions_for(FileCategory::Code), vec![".css", ".html", ".js", ".py"]);
        assert!(table.extensions_for(FileCategory::Folder).is_empty());
    }

    #[test]
    fn test_split_extension_edge_cases() {
        assert_eq!(split_extension("photo."), ("photo", "."));
        assert_eq!(split_extension("..hidden"), ("..hidden", ""));
        assert_eq!(split_extension(""), ("", ""));
    }
}
