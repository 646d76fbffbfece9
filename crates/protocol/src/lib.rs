//! # FileBrowser Protocol Library
//!
//! Message definitions shared between the file browser core and whatever
//! presents it (web front-end, CLI, RPC bridge).
//!
//! ## Overview
//!
//! - **Entries**: [`FileEntry`], [`FileCategory`] and image [`VersionInfo`]
//! - **Listing**: [`FilterCriteria`], [`DateFilter`], [`SortKey`], [`PageInfo`]
//! - **Mutations**: create folder, upload, delete, rename, edit
//! - **Errors**: [`ErrorCode`] taxonomy carried in [`ErrorMessage`]
//!
//! Messages travel inside an [`Envelope`] serialized as JSON:
//!
//! ```rust
//! use protocol::{Envelope, Message};
//! use protocol::messages::ListRequest;
//!
//! let request = Envelope::new(1, Message::ListRequest(ListRequest::default()));
//! let json = request.to_json().unwrap();
//! assert_eq!(Envelope::from_json(&json).unwrap(), request);
//! ```

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    CategoryCount, DateFilter, Envelope, ErrorCode, ErrorMessage, FileCategory, FileEntry,
    FilterCriteria, Message, PageInfo, SortField, SortKey, SortOrder, VersionInfo,
    PROTOCOL_VERSION,
};
