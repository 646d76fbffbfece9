//! File manager module for browsing and editing the media directory.
//!
//! This module provides:
//! - Path resolution sandboxed under a single root
//! - Filename sanitization against an allow-list pattern
//! - Directory listing with filtering, sorting and pagination
//! - Create, upload, delete, rename and text editing with operation hooks
//!
//! # Security
//!
//! Every path handed to the [`Storage`] backend is a descendant of the
//! canonical root. Untrusted input is normalized lexically, then
//! canonicalized and checked again, so neither `..` segments nor symlinks
//! can escape the root.

pub mod browser;
pub mod category;
pub mod error;
pub mod hooks;
pub mod operations;
pub mod query;
pub mod resolver;
pub mod sanitize;
pub mod storage;
pub mod versions;

pub use browser::{DirectoryBrowser, DirectoryEntry, Listing, ListingSettings};
pub use category::ExtensionTable;
pub use error::{FilesError, Result};
pub use hooks::{HookError, HookList, LoggingHook, Operation, OperationHook};
pub use operations::FileManager;
pub use resolver::{join_relative, PathResolver, ResolvedPath};
pub use sanitize::NameSanitizer;
pub use storage::{LocalStorage, Storage};
pub use versions::VersionSet;
