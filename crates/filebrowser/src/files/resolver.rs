//! Path resolution and sandboxing under the root directory.
//!
//! Every path that reaches the storage backend passes through
//! [`PathResolver`]. User input is normalized lexically first, then joined
//! with the root, canonicalized and checked again so symlinks cannot lead
//! outside the root.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::error::{FilesError, Result};
use super::storage::Storage;

/// A validated location inside the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path handed to storage.
    pub absolute: PathBuf,
    /// Path relative to the root, `/` separated. Empty for the root itself.
    pub relative: String,
}

impl ResolvedPath {
    /// Relative path of a child entry.
    pub fn child_relative(&self, name: &str) -> String {
        join_relative(&self.relative, name)
    }

    /// Last component of the relative path (empty for the root).
    pub fn name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or_default()
    }
}

/// Join a relative directory and an entry name.
pub fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Resolves untrusted relative paths against a canonical root.
#[derive(Clone)]
pub struct PathResolver {
    storage: Arc<dyn Storage>,
    root: PathBuf,
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl PathResolver {
    /// Create a resolver for `root`.
    ///
    /// The root must exist and be a directory; it is canonicalized once here.
    pub fn new(storage: Arc<dyn Storage>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let display = root.display().to_string();

        let canonical = storage
            .canonicalize(root)
            .map_err(|e| FilesError::from_io(e, display.clone()))?;
        let stat = storage
            .stat(&canonical)
            .map_err(|e| FilesError::from_io(e, display.clone()))?;
        if !stat.is_dir() {
            return Err(FilesError::NotFound(display));
        }

        debug!(root = %canonical.display(), "Path resolver ready");
        Ok(Self {
            storage,
            root: canonical,
        })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage backend used for all checks.
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Resolve a directory given relative to the root.
    ///
    /// Leading separators, drive or scheme prefixes, NUL bytes and `..`
    /// segments climbing above the root yield `OutOfBounds`. A missing path
    /// or a path that is not a directory yields `NotFound`.
    pub fn resolve(&self, user_path: &str) -> Result<ResolvedPath> {
        let components = normalize_components(user_path)?;
        let relative = components.join("/");

        let mut joined = self.root.clone();
        joined.extend(&components);

        let canonical = self
            .storage
            .canonicalize(&joined)
            .map_err(|e| lookup_error(e, &relative))?;

        if !canonical.starts_with(&self.root) {
            warn!(path = %user_path, "Rejected path resolving outside the root");
            return Err(FilesError::OutOfBounds(user_path.to_string()));
        }

        let stat = self
            .storage
            .stat(&canonical)
            .map_err(|e| lookup_error(e, &relative))?;
        if !stat.is_dir() {
            return Err(FilesError::NotFound(relative));
        }

        Ok(ResolvedPath {
            absolute: canonical,
            relative,
        })
    }

    /// Resolve an existing entry `name` inside a resolved directory.
    ///
    /// The returned absolute path is the entry itself, not its symlink
    /// target, but the target must stay inside the root.
    pub fn resolve_file(&self, dir: &ResolvedPath, name: &str) -> Result<ResolvedPath> {
        let child = self.child_path(dir, name)?;

        if !self.storage.exists(&child.absolute) {
            return Err(FilesError::NotFound(child.relative));
        }

        let canonical = self
            .storage
            .canonicalize(&child.absolute)
            .map_err(|e| lookup_error(e, &child.relative))?;
        if !canonical.starts_with(&self.root) {
            warn!(path = %child.relative, "Rejected entry pointing outside the root");
            return Err(FilesError::OutOfBounds(child.relative));
        }

        Ok(child)
    }

    /// Path of a child that does not exist yet.
    pub fn child_for_creation(&self, dir: &ResolvedPath, name: &str) -> Result<ResolvedPath> {
        self.child_path(dir, name)
    }

    fn child_path(&self, dir: &ResolvedPath, name: &str) -> Result<ResolvedPath> {
        let relative = dir.child_relative(name);

        if name.is_empty() {
            return Err(FilesError::NotFound(relative));
        }
        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(FilesError::OutOfBounds(relative));
        }

        Ok(ResolvedPath {
            absolute: dir.absolute.join(name),
            relative,
        })
    }
}

/// Split a user path into plain components, collapsing `.` and `..`.
fn normalize_components(user_path: &str) -> Result<Vec<&str>> {
    let out_of_bounds = || FilesError::OutOfBounds(user_path.to_string());

    if user_path.contains('\0') || user_path.starts_with(['/', '\\']) {
        return Err(out_of_bounds());
    }

    let mut components: Vec<&str> = Vec::new();
    for (index, part) in user_path.split(['/', '\\']).enumerate() {
        // `C:`, `file:`, `https:` and friends.
        if index == 0 && part.contains(':') {
            return Err(out_of_bounds());
        }
        match part {
            "" | "." => {}
            ".." => {
                if components.pop().is_none() {
                    return Err(out_of_bounds());
                }
            }
            _ => components.push(part),
        }
    }

    Ok(components)
}

fn lookup_error(err: io::Error, relative: &str) -> FilesError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => FilesError::PermissionDenied(relative.to_string()),
        _ => FilesError::NotFound(relative.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::storage::LocalStorage;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("photos/2024")).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "notes").unwrap();
        let resolver = PathResolver::new(Arc::new(LocalStorage::new()), temp_dir.path()).unwrap();
        (temp_dir, resolver)
    }

    #[test]
    fn test_empty_path_is_root() {
        let (_temp_dir, resolver) = setup();
        let resolved = resolver.resolve("").unwrap();
        assert_eq!(resolved.absolute, resolver.root());
        assert_eq!(resolved.relative, "");
    }

    #[test]
    fn test_nested_path_and_trailing_separator() {
        let (_temp_dir, resolver) = setup();
        let resolved = resolver.resolve("photos/2024/").unwrap();
        assert_eq!(resolved.relative, "photos/2024");
        assert_eq!(resolved.absolute, resolver.root().join("photos/2024"));
        assert_eq!(resolved.name(), "2024");
    }

    #[test]
    fn test_dot_segments_collapse() {
        let (_temp_dir, resolver) = setup();
        let resolved = resolver.resolve("photos/./2024/../2024").unwrap();
        assert_eq!(resolved.relative, "photos/2024");

        let resolved = resolver.resolve("photos/..").unwrap();
        assert_eq!(resolved.relative, "");
    }

    #[test]
    fn test_parent_traversal_is_out_of_bounds() {
        let (_temp_dir, resolver) = setup();
        for path in ["..", "../etc", "photos/../../etc", "photos/2024/../../..", "..\\windows"] {
            let result = resolver.resolve(path);
            assert!(
                matches!(result, Err(FilesError::OutOfBounds(_))),
                "{} should be out of bounds, got {:?}",
                path,
                result
            );
        }
    }

    #[test]
    fn test_absolute_and_prefixed_paths_rejected() {
        let (_temp_dir, resolver) = setup();
        for path in ["/etc", "\\etc", "C:\\Windows", "file:/etc/passwd", "photos\0"] {
            assert!(matches!(
                resolver.resolve(path),
                Err(FilesError::OutOfBounds(_))
            ));
        }
    }

    #[test]
    fn test_missing_and_non_directory_are_not_found() {
        let (_temp_dir, resolver) = setup();
        assert!(matches!(
            resolver.resolve("missing"),
            Err(FilesError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("notes.txt"),
            Err(FilesError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("notes.txt/inner"),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_escaping_root_is_out_of_bounds() {
        let (temp_dir, resolver) = setup();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            temp_dir.path().join("secret.txt"),
        )
        .unwrap();

        assert!(matches!(
            resolver.resolve("escape"),
            Err(FilesError::OutOfBounds(_))
        ));

        let root = resolver.resolve("").unwrap();
        assert!(matches!(
            resolver.resolve_file(&root, "secret.txt"),
            Err(FilesError::OutOfBounds(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_inside_root_is_allowed() {
        let (temp_dir, resolver) = setup();
        std::os::unix::fs::symlink(
            temp_dir.path().join("photos"),
            temp_dir.path().join("pictures"),
        )
        .unwrap();

        let resolved = resolver.resolve("pictures/2024").unwrap();
        assert_eq!(resolved.relative, "pictures/2024");
        assert_eq!(resolved.absolute, resolver.root().join("photos/2024"));
    }

    #[test]
    fn test_resolve_file() {
        let (_temp_dir, resolver) = setup();
        let root = resolver.resolve("").unwrap();

        let file = resolver.resolve_file(&root, "notes.txt").unwrap();
        assert_eq!(file.relative, "notes.txt");
        assert_eq!(file.absolute, resolver.root().join("notes.txt"));

        assert!(matches!(
            resolver.resolve_file(&root, "absent.txt"),
            Err(FilesError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve_file(&root, "photos/2024"),
            Err(FilesError::OutOfBounds(_))
        ));
        assert!(matches!(
            resolver.resolve_file(&root, ".."),
            Err(FilesError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_child_for_creation() {
        let (_temp_dir, resolver) = setup();
        let dir = resolver.resolve("photos").unwrap();

        let child = resolver.child_for_creation(&dir, "new_album").unwrap();
        assert_eq!(child.relative, "photos/new_album");
        assert_eq!(child.absolute, resolver.root().join("photos/new_album"));

        assert!(resolver.child_for_creation(&dir, "a/b").is_err());
        assert!(resolver.child_for_creation(&dir, "").is_err());
    }

    #[test]
    fn test_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = PathResolver::new(
            Arc::new(LocalStorage::new()),
            temp_dir.path().join("does-not-exist"),
        );
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }
}
