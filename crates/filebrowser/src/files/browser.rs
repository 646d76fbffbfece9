//! Directory listing: exclusion, classification, filtering, sorting and
//! pagination.
//!
//! A listing is a pure query over the filesystem state at call time. All
//! aggregate counts are gathered in the same pass that filters entries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use protocol::messages::{ListRequest, ListResponse};
use protocol::{CategoryCount, FileCategory, FileEntry, PageInfo, SortField, SortKey, SortOrder};
use regex::Regex;
use tracing::{debug, warn};

use super::category::ExtensionTable;
use super::error::{FilesError, Result};
use super::query::{paginate, sort_entries, EntryFilter};
use super::resolver::{PathResolver, ResolvedPath};
use super::storage::ChildEntry;

/// Entries per page when nothing is configured.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A directory entry with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the root, `/` separated.
    pub relative_path: String,
    /// Absolute path in storage.
    pub path: PathBuf,
    pub is_directory: bool,
    pub category: FileCategory,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
    /// Whether the directory is empty. `None` for files.
    pub is_empty: Option<bool>,
}

impl DirectoryEntry {
    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        let modified = self
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        FileEntry {
            name: self.name.clone(),
            path: self.relative_path.clone(),
            is_directory: self.is_directory,
            category: self.category,
            size: self.size,
            modified,
            is_empty: self.is_empty,
        }
    }

    /// Files and empty folders can be deleted.
    pub fn is_deletable(&self) -> bool {
        !self.is_directory || self.is_empty == Some(true)
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Listed directory, relative to the root.
    pub dir: String,
    pub entries: Vec<DirectoryEntry>,
    pub page_info: PageInfo,
}

impl Listing {
    pub fn to_protocol(&self) -> ListResponse {
        ListResponse {
            dir: self.dir.clone(),
            entries: self.entries.iter().map(DirectoryEntry::to_protocol).collect(),
            page_info: self.page_info.clone(),
        }
    }
}

/// Listing behaviour, built once from configuration.
#[derive(Debug, Clone)]
pub struct ListingSettings {
    /// Names matching any of these are never listed.
    pub exclude: Vec<Regex>,
    /// List entries whose extension is not in the table.
    pub show_unknown: bool,
    pub page_size: usize,
    /// Sort used when a request has none.
    pub default_sort: SortKey,
    /// Selection type to the categories it may select.
    pub select_formats: BTreeMap<String, Vec<FileCategory>>,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            show_unknown: true,
            page_size: DEFAULT_PAGE_SIZE,
            default_sort: SortKey::new(SortField::Date, SortOrder::Descending),
            select_formats: default_select_formats(),
        }
    }
}

/// Stock selection types.
pub fn default_select_formats() -> BTreeMap<String, Vec<FileCategory>> {
    BTreeMap::from([
        (
            "File".to_string(),
            vec![FileCategory::Folder, FileCategory::Document],
        ),
        ("Image".to_string(), vec![FileCategory::Image]),
        (
            "Media".to_string(),
            vec![FileCategory::Video, FileCategory::Sound],
        ),
        ("Document".to_string(), vec![FileCategory::Document]),
    ])
}

/// Running totals for [`PageInfo`].
#[derive(Debug, Default)]
struct Tally {
    by_category: BTreeMap<FileCategory, usize>,
    delete_total: usize,
    select_total: usize,
    images_total: usize,
}

impl Tally {
    fn add(&mut self, entry: &DirectoryEntry, selectable: Option<&[FileCategory]>) {
        *self.by_category.entry(entry.category).or_default() += 1;
        if entry.category == FileCategory::Image {
            self.images_total += 1;
        }
        if entry.is_deletable() {
            self.delete_total += 1;
        }
        if selectable.is_none_or(|categories| categories.contains(&entry.category)) {
            self.select_total += 1;
        }
    }

    fn category_counts(&self) -> Vec<CategoryCount> {
        self.by_category
            .iter()
            .map(|(category, count)| CategoryCount {
                category: *category,
                count: *count,
            })
            .collect()
    }
}

/// Lists directories under the root.
#[derive(Debug, Clone)]
pub struct DirectoryBrowser {
    resolver: PathResolver,
    extensions: ExtensionTable,
    settings: ListingSettings,
}

impl DirectoryBrowser {
    pub fn new(
        resolver: PathResolver,
        extensions: ExtensionTable,
        settings: ListingSettings,
    ) -> Self {
        Self {
            resolver,
            extensions,
            settings,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn extensions(&self) -> &ExtensionTable {
        &self.extensions
    }

    pub fn settings(&self) -> &ListingSettings {
        &self.settings
    }

    /// Hidden names and names matching an exclude pattern.
    pub fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || self.settings.exclude.iter().any(|re| re.is_match(name))
    }

    /// List a directory.
    pub fn list(&self, request: &ListRequest) -> Result<Listing> {
        self.list_at(request, Local::now())
    }

    /// List a directory, evaluating date filters against `now`.
    pub fn list_at(&self, request: &ListRequest, now: DateTime<Local>) -> Result<Listing> {
        let dir = self.resolver.resolve(&request.dir)?;
        let children = self
            .resolver
            .storage()
            .list_children(&dir.absolute)
            .map_err(|e| FilesError::from_io(e, dir.relative.clone()))?;

        let filter = EntryFilter::new(&request.criteria, now);
        let selectable = self.selectable_categories(request.select_type.as_deref());

        let mut tally = Tally::default();
        let mut entries = Vec::new();
        for child in children {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!(dir = %dir.relative, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if self.is_excluded(&child.name) {
                continue;
            }

            let Some(entry) = self.build_entry(&dir, child) else {
                continue;
            };

            if filter.matches(&entry) {
                tally.add(&entry, selectable);
                entries.push(entry);
            }
        }

        sort_entries(&mut entries, request.sort.unwrap_or(self.settings.default_sort));

        let page_size = request
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or(self.settings.page_size);
        let results_total = entries.len();
        let page = paginate(results_total, request.page, page_size);

        debug!(
            dir = %dir.relative,
            results_total,
            page = page.number,
            total_pages = page.total_pages,
            "Listed directory"
        );

        let page_info = PageInfo {
            results_total,
            page: page.number,
            total_pages: page.total_pages,
            page_size: page_size.max(1),
            category_counts: tally.category_counts(),
            delete_total: tally.delete_total,
            select_total: tally.select_total,
            images_total: tally.images_total,
        };

        let entries = entries.drain(page.range).collect();
        Ok(Listing {
            dir: dir.relative,
            entries,
            page_info,
        })
    }

    /// Metadata of one existing entry of `dir`.
    pub fn entry(&self, dir: &ResolvedPath, name: &str) -> Result<DirectoryEntry> {
        let file = self.resolver.resolve_file(dir, name)?;
        let storage = self.resolver.storage();

        let stat = storage
            .stat(&file.absolute)
            .map_err(|e| FilesError::from_io(e, file.relative.clone()))?;
        let is_directory = stat.is_dir();
        let is_empty = if is_directory {
            Some(
                storage
                    .is_empty_dir(&file.absolute)
                    .map_err(|e| FilesError::from_io(e, file.relative.clone()))?,
            )
        } else {
            None
        };

        Ok(DirectoryEntry {
            name: name.to_string(),
            category: self.extensions.categorize(name, is_directory),
            relative_path: file.relative,
            path: file.absolute,
            is_directory,
            size: stat.size,
            modified: stat.modified,
            is_empty,
        })
    }

    fn build_entry(&self, dir: &ResolvedPath, child: ChildEntry) -> Option<DirectoryEntry> {
        let path = dir.absolute.join(&child.name);
        let (stat, target) = if child.is_symlink {
            let target = self.link_target(&path)?;
            match self.resolver.storage().stat(&target) {
                Ok(stat) => (stat, target),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable link");
                    return None;
                }
            }
        } else {
            (child.stat, path.clone())
        };

        let is_directory = stat.is_dir();
        let category = self.extensions.categorize(&child.name, is_directory);
        if category == FileCategory::Unknown && !self.settings.show_unknown {
            return None;
        }

        let is_empty = if is_directory {
            match self.resolver.storage().is_empty_dir(&target) {
                Ok(empty) => Some(empty),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable folder");
                    return None;
                }
            }
        } else {
            None
        };

        Some(DirectoryEntry {
            relative_path: dir.child_relative(&child.name),
            name: child.name,
            path,
            is_directory,
            category,
            size: stat.size,
            modified: stat.modified,
            is_empty,
        })
    }

    /// Canonical target of a symlink child, or `None` when the link dangles
    /// or leaves the root. Nothing about an outside target is ever read.
    fn link_target(&self, link: &Path) -> Option<PathBuf> {
        let target = match self.resolver.storage().canonicalize(link) {
            Ok(target) => target,
            Err(e) => {
                debug!(path = %link.display(), error = %e, "Skipping dangling link");
                return None;
            }
        };
        if !target.starts_with(self.resolver.root()) {
            warn!(path = %link.display(), "Skipping link pointing outside the root");
            return None;
        }
        Some(target)
    }

    /// Categories counted by `select_total`. `None` means every entry counts;
    /// an unknown selection type selects nothing.
    fn selectable_categories(&self, select_type: Option<&str>) -> Option<&[FileCategory]> {
        let select_type = select_type.filter(|t| !t.is_empty())?;
        let formats = &self.settings.select_formats;
        let categories = formats.get(select_type).or_else(|| {
            formats
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(select_type))
                .map(|(_, categories)| categories)
        });
        Some(categories.map(Vec::as_slice).unwrap_or(&[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::storage::{LocalStorage, Storage};
    use crate::files::versions::VersionSet;
    use std::fs;
    use std::io;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn browser_with(root: &Path, settings: ListingSettings) -> DirectoryBrowser {
        let resolver = PathResolver::new(Arc::new(LocalStorage::new()), root).unwrap();
        DirectoryBrowser::new(resolver, ExtensionTable::default(), settings)
    }

    fn by_name() -> Option<SortKey> {
        Some(SortKey::new(SortField::Name, SortOrder::Ascending))
    }

    fn names(listing: &Listing) -> Vec<&str> {
        listing.entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn create_test_structure(dir: &Path) {
        fs::create_dir_all(dir.join("album")).unwrap();
        fs::create_dir_all(dir.join("empty")).unwrap();
        fs::write(dir.join("album/inside.jpg"), "x").unwrap();
        fs::write(dir.join("beach.jpg"), "jpeg").unwrap();
        fs::write(dir.join("beach_thumbnail.jpg"), "thumb").unwrap();
        fs::write(dir.join("notes.txt"), "Hello").unwrap();
        fs::write(dir.join("song.mp3"), "la").unwrap();
        fs::write(dir.join("blob.bin"), "01").unwrap();
        fs::write(dir.join(".hidden"), "Hidden").unwrap();
    }

    fn version_settings() -> ListingSettings {
        let versions = VersionSet::new(vec!["thumbnail".to_string()], &ExtensionTable::default());
        ListingSettings {
            exclude: versions.exclude_patterns().unwrap(),
            ..ListingSettings::default()
        }
    }

    #[test]
    fn test_list_excludes_hidden_and_versions() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let browser = browser_with(temp_dir.path(), version_settings());
        let listing = browser
            .list(&ListRequest {
                sort: by_name(),
                ..ListRequest::default()
            })
            .unwrap();

        assert_eq!(
            names(&listing),
            vec!["album", "beach.jpg", "blob.bin", "empty", "notes.txt", "song.mp3"]
        );
        assert_eq!(listing.page_info.results_total, 6);
        assert_eq!(listing.dir, "");
    }

    #[test]
    fn test_entry_metadata() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let browser = browser_with(temp_dir.path(), version_settings());
        let listing = browser.list(&ListRequest::default()).unwrap();
        let find = |name: &str| listing.entries.iter().find(|e| e.name == name).unwrap();

        let notes = find("notes.txt");
        assert_eq!(notes.category, FileCategory::Document);
        assert_eq!(notes.size, 5);
        assert_eq!(notes.is_empty, None);
        assert_eq!(notes.relative_path, "notes.txt");

        assert_eq!(find("album").is_empty, Some(false));
        assert_eq!(find("empty").is_empty, Some(true));
        assert_eq!(find("album").category, FileCategory::Folder);
        assert_eq!(find("blob.bin").category, FileCategory::Unknown);

        let proto = notes.to_protocol();
        assert_eq!(proto.path, "notes.txt");
        assert!(!proto.is_directory);
    }

    #[test]
    fn test_nested_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let browser = browser_with(temp_dir.path(), version_settings());
        let listing = browser
            .list(&ListRequest {
                dir: "album/".to_string(),
                ..ListRequest::default()
            })
            .unwrap();

        assert_eq!(listing.dir, "album");
        assert_eq!(listing.entries[0].relative_path, "album/inside.jpg");
    }

    #[test]
    fn test_hide_unknown() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let settings = ListingSettings {
            show_unknown: false,
            ..version_settings()
        };
        let browser = browser_with(temp_dir.path(), settings);
        let listing = browser.list(&ListRequest::default()).unwrap();

        assert!(!names(&listing).contains(&"blob.bin"));
        assert_eq!(listing.page_info.count_for(FileCategory::Unknown), 0);
    }

    #[test]
    fn test_counts_cover_filtered_set() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let browser = browser_with(temp_dir.path(), version_settings());
        let listing = browser
            .list(&ListRequest {
                page_size: Some(2),
                ..ListRequest::default()
            })
            .unwrap();
        let info = &listing.page_info;

        assert_eq!(listing.entries.len(), 2);
        assert_eq!(info.results_total, 6);
        assert_eq!(info.total_pages, 3);
        let sum: usize = info.category_counts.iter().map(|c| c.count).sum();
        assert_eq!(sum, info.results_total);
        assert_eq!(info.count_for(FileCategory::Folder), 2);
        assert_eq!(info.images_total, 1);
        // Every file plus the empty folder.
        assert_eq!(info.delete_total, 5);
        assert_eq!(info.select_total, 6);

        let images = browser
            .list(&ListRequest {
                criteria: protocol::FilterCriteria {
                    category: Some(FileCategory::Image),
                    ..Default::default()
                },
                ..ListRequest::default()
            })
            .unwrap();
        assert_eq!(images.page_info.results_total, 1);
        assert_eq!(images.page_info.category_counts.len(), 1);
    }

    #[test]
    fn test_select_total() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let browser = browser_with(temp_dir.path(), version_settings());

        let select = |select_type: &str| {
            browser
                .list(&ListRequest {
                    select_type: Some(select_type.to_string()),
                    ..ListRequest::default()
                })
                .unwrap()
                .page_info
                .select_total
        };

        assert_eq!(select("Image"), 1);
        assert_eq!(select("media"), 1);
        // Two folders and one document.
        assert_eq!(select("File"), 3);
        assert_eq!(select("Spreadsheet"), 0);
        assert_eq!(select(""), 6);
    }

    #[test]
    fn test_page_beyond_last_is_clamped() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let browser = browser_with(temp_dir.path(), version_settings());

        let page = |page: usize| {
            browser
                .list(&ListRequest {
                    sort: by_name(),
                    page,
                    page_size: Some(4),
                    ..ListRequest::default()
                })
                .unwrap()
        };

        let last = page(2);
        let beyond = page(10);
        assert_eq!(beyond.page_info.page, 2);
        assert_eq!(names(&beyond), names(&last));
        assert_eq!(names(&page(0)), names(&page(1)));
    }

    #[test]
    fn test_zero_page_size_uses_default() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let settings = ListingSettings {
            page_size: 3,
            ..version_settings()
        };
        let browser = browser_with(temp_dir.path(), settings);

        let listing = browser
            .list(&ListRequest {
                page_size: Some(0),
                ..ListRequest::default()
            })
            .unwrap();
        assert_eq!(listing.page_info.page_size, 3);
        assert_eq!(listing.entries.len(), 3);
    }

    #[test]
    fn test_list_rejects_escape() {
        let temp_dir = TempDir::new().unwrap();
        let browser = browser_with(temp_dir.path(), ListingSettings::default());
        let result = browser.list(&ListRequest {
            dir: "../".to_string(),
            ..ListRequest::default()
        });
        assert!(matches!(result, Err(FilesError::OutOfBounds(_))));
    }

    #[test]
    fn test_entry() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let browser = browser_with(temp_dir.path(), ListingSettings::default());
        let root = browser.resolver().resolve("").unwrap();

        let entry = browser.entry(&root, "empty").unwrap();
        assert!(entry.is_directory);
        assert!(entry.is_deletable());

        let entry = browser.entry(&root, "album").unwrap();
        assert!(!entry.is_deletable());

        assert!(matches!(
            browser.entry(&root, "missing.txt"),
            Err(FilesError::NotFound(_))
        ));
    }

    /// Storage whose listing reports one entry as unreadable.
    struct FlakyStorage {
        inner: LocalStorage,
        broken: &'static str,
    }

    impl Storage for FlakyStorage {
        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            self.inner.canonicalize(path)
        }

        fn stat(&self, path: &Path) -> io::Result<crate::files::storage::EntryStat> {
            self.inner.stat(path)
        }

        fn list_children(&self, path: &Path) -> io::Result<Vec<io::Result<ChildEntry>>> {
            let children = self.inner.list_children(path)?;
            Ok(children
                .into_iter()
                .map(|child| match child {
                    Ok(c) if c.name == self.broken => {
                        Err(io::Error::new(io::ErrorKind::NotFound, "vanished"))
                    }
                    other => other,
                })
                .collect())
        }

        fn create_dir(&self, path: &Path) -> io::Result<()> {
            self.inner.create_dir(path)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.inner.remove_file(path)
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            self.inner.remove_dir(path)
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.inner.rename(from, to)
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.inner.read(path)
        }

        fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
            self.inner.write(path, data)
        }

        fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
            self.inner.create_new(path, data)
        }
    }

    #[test]
    fn test_unreadable_entry_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let storage = FlakyStorage {
            inner: LocalStorage::new(),
            broken: "notes.txt",
        };
        let resolver = PathResolver::new(Arc::new(storage), temp_dir.path()).unwrap();
        let browser =
            DirectoryBrowser::new(resolver, ExtensionTable::default(), version_settings());

        let listing = browser.list(&ListRequest::default()).unwrap();
        assert_eq!(listing.page_info.results_total, 5);
        assert!(!names(&listing).contains(&"notes.txt"));
    }

    #[test]
    #[cfg(unix)]
    fn test_links_outside_root_are_not_listed() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("leak.txt"), vec![b'x'; 12345]).unwrap();
        fs::create_dir(outside.path().join("leakdir")).unwrap();

        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        symlink(outside.path().join("leak.txt"), temp_dir.path().join("leak.txt")).unwrap();
        symlink(outside.path().join("leakdir"), temp_dir.path().join("leakdir")).unwrap();
        symlink(temp_dir.path().join("album"), temp_dir.path().join("shortcut")).unwrap();
        symlink(temp_dir.path().join("gone"), temp_dir.path().join("dangling")).unwrap();

        let browser = browser_with(temp_dir.path(), version_settings());
        let listing = browser
            .list(&ListRequest {
                sort: by_name(),
                ..ListRequest::default()
            })
            .unwrap();

        assert_eq!(
            names(&listing),
            vec!["album", "beach.jpg", "blob.bin", "empty", "notes.txt", "shortcut", "song.mp3"]
        );
        assert!(listing.entries.iter().all(|e| e.size != 12345));

        let shortcut = listing.entries.iter().find(|e| e.name == "shortcut").unwrap();
        assert!(shortcut.is_directory);
        assert_eq!(shortcut.is_empty, Some(false));
        assert_eq!(shortcut.path, temp_dir.path().canonicalize().unwrap().join("shortcut"));
    }
}
