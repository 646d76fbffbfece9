//! # FileBrowser Library
//!
//! This crate provides a sandboxed browser for a media directory: listing
//! with filters, sorting and pagination, plus folder creation, uploads,
//! renames, deletes and text editing. Nothing outside the configured root
//! is ever read or written.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Router                            │
//! │            (protocol Message -> FileManager)             │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐  ┌──────────────┐  ┌──────────────┐  │
//! │  │  FileManager   │  │    Hooks     │  │ NameSanitizer│  │
//! │  └───────┬────────┘  └──────────────┘  └──────────────┘  │
//! │  ┌───────┴────────┐  ┌──────────────┐  ┌──────────────┐  │
//! │  │DirectoryBrowser│  │ query (filter│  │ VersionSet / │  │
//! │  │                │  │ sort, pages) │  │ExtensionTable│  │
//! │  └───────┬────────┘  └──────────────┘  └──────────────┘  │
//! │  ┌───────┴────────┐  ┌──────────────────────────────┐    │
//! │  │  PathResolver  │──│   Storage (LocalStorage)     │    │
//! │  └────────────────┘  └──────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use filebrowser::files::{FileManager, LocalStorage};
//! use filebrowser::protocol::messages::ListRequest;
//! use filebrowser::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     config.apply_env_overrides();
//!     config.validate()?;
//!
//!     let manager = FileManager::from_config(&config, Arc::new(LocalStorage::new()))?;
//!     let listing = manager.browser().list(&ListRequest::default())?;
//!     for entry in &listing.entries {
//!         println!("{} ({})", entry.name, entry.category);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path resolution, naming, listing and mutations
//! - [`router`]: Message routing to the file manager

pub mod config;
pub mod files;
pub mod router;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{DirectoryBrowser, DirectoryEntry, FileManager, FilesError, LocalStorage, Storage};

// Re-export router types for convenience
pub use router::{Router, RouterError, RouterResult};
