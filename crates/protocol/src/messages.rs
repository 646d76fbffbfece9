//! Message definitions for FileBrowser.
//!
//! This module defines the request/response types exchanged between the file
//! browser core and a presentation layer (web front-end, CLI, RPC bridge).
//! All messages are serialized as JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope wrapper for all messages.
///
/// The envelope provides versioning and sequence numbers so a caller can
/// match a response to the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number, echoed back in the response envelope.
    pub sequence: u64,
    /// The actual message payload.
    pub payload: Message,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }

    /// Serialize the envelope to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }

    /// Deserialize an envelope from JSON, rejecting unknown protocol versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(json)?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: envelope.version,
            });
        }
        Ok(envelope)
    }
}

/// Top-level message enum containing all message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    // Requests
    /// List a directory.
    ListRequest(ListRequest),
    /// Create a folder.
    CreateDirRequest(CreateDirRequest),
    /// Upload a file.
    UploadRequest(UploadRequest),
    /// Delete a file or an empty folder.
    DeleteRequest(DeleteRequest),
    /// Rename a file or folder.
    RenameRequest(RenameRequest),
    /// Read the text content of a file.
    ReadTextRequest(EntryRef),
    /// Replace the text content of a file.
    SaveTextRequest(SaveTextRequest),
    /// List the versions of an image.
    VersionsRequest(EntryRef),

    // Responses
    /// Directory listing.
    ListResponse(ListResponse),
    /// A folder was created.
    DirCreated(EntryRef),
    /// A file was uploaded.
    Uploaded(Uploaded),
    /// An entry was deleted.
    Deleted(EntryRef),
    /// An entry was renamed.
    Renamed(Renamed),
    /// Text content of a file.
    TextContent(TextContent),
    /// A file's text content was saved.
    TextSaved(EntryRef),
    /// Versions of an image.
    VersionsResponse(VersionsResponse),

    /// Request failed.
    Error(ErrorMessage),
}

// ============================================================================
// Entries
// ============================================================================

/// Category of an entry, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    Folder,
    Image,
    Video,
    Document,
    Sound,
    Code,
    /// Extension not present in the extension table.
    Unknown,
}

impl FileCategory {
    /// All categories, in display order.
    pub const ALL: [FileCategory; 7] = [
        FileCategory::Folder,
        FileCategory::Image,
        FileCategory::Video,
        FileCategory::Document,
        FileCategory::Sound,
        FileCategory::Code,
        FileCategory::Unknown,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FileCategory::Folder => "Folder",
            FileCategory::Image => "Image",
            FileCategory::Video => "Video",
            FileCategory::Document => "Document",
            FileCategory::Sound => "Sound",
            FileCategory::Code => "Code",
            FileCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FileCategory {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        FileCategory::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::InvalidValue {
                field: "category",
                value: s.to_string(),
            })
    }
}

/// A single file or directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the browser root, `/` separated.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Category derived from the extension.
    pub category: FileCategory,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: u64,
    /// Whether the directory is empty. `None` for files.
    pub is_empty: Option<bool>,
}

/// A rendition of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version name, e.g. `thumbnail`.
    pub version: String,
    /// Path of the rendition relative to the root.
    pub path: String,
    /// Whether the rendition has been generated.
    pub exists: bool,
}

// ============================================================================
// Listing
// ============================================================================

/// Attribute to sort a listing by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Date,
    Size,
    Category,
}

impl FromStr for SortField {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "filename" => Ok(SortField::Name),
            "date" | "modified" => Ok(SortField::Date),
            "size" | "filesize" => Ok(SortField::Size),
            "category" | "type" | "filetype" => Ok(SortField::Category),
            _ => Err(ProtocolError::InvalidValue {
                field: "sort field",
                value: s.to_string(),
            }),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl FromStr for SortOrder {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => Err(ProtocolError::InvalidValue {
                field: "sort order",
                value: s.to_string(),
            }),
        }
    }
}

/// Sort attribute plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Modification date constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilter {
    /// Modified on the current calendar day.
    Today,
    /// Modified within the last seven days.
    Past7Days,
    /// Modified in the current calendar month.
    ThisMonth,
    /// Modified in the current calendar year.
    ThisYear,
    /// Modified between two Unix timestamps, both bounds inclusive.
    Range { from: Option<u64>, to: Option<u64> },
}

impl FromStr for DateFilter {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(DateFilter::Today),
            "past7days" => Ok(DateFilter::Past7Days),
            "thismonth" => Ok(DateFilter::ThisMonth),
            "thisyear" => Ok(DateFilter::ThisYear),
            _ => Err(ProtocolError::InvalidValue {
                field: "date filter",
                value: s.to_string(),
            }),
        }
    }
}

/// Optional constraints on a listing, applied conjunctively.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Only entries of this category.
    pub category: Option<FileCategory>,
    /// Only entries modified within this window.
    pub date: Option<DateFilter>,
    /// Case-insensitive pattern matched against the name. Falls back to a
    /// substring match when the pattern is not a valid regex.
    pub query: Option<String>,
}

impl FilterCriteria {
    /// Whether no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.date.is_none() && self.query.is_none()
    }
}

/// Number of listed entries in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: FileCategory,
    pub count: usize,
}

/// Pagination and aggregate counts for a listing.
///
/// All counts cover the filtered set, not just the current page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageInfo {
    /// Number of entries matching the filter.
    pub results_total: usize,
    /// Current page, 1-based.
    pub page: usize,
    /// Number of pages (at least 1).
    pub total_pages: usize,
    /// Entries per page.
    pub page_size: usize,
    /// Per-category totals. Categories with no entries are omitted.
    pub category_counts: Vec<CategoryCount>,
    /// Entries that can be deleted (files and empty folders).
    pub delete_total: usize,
    /// Entries selectable under the requested selection type.
    pub select_total: usize,
    /// Number of images.
    pub images_total: usize,
}

impl PageInfo {
    /// Total for a single category.
    pub fn count_for(&self, category: FileCategory) -> usize {
        self.category_counts
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// Request to list a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    /// Directory relative to the root. Empty means the root.
    pub dir: String,
    /// Filter constraints.
    pub criteria: FilterCriteria,
    /// Sort key. `None` uses the configured default.
    pub sort: Option<SortKey>,
    /// Page number, 1-based.
    pub page: usize,
    /// Page size. `None` uses the configured default.
    pub page_size: Option<usize>,
    /// Selection type (e.g. `Image`, `Document`) for `select_total`.
    pub select_type: Option<String>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            dir: String::new(),
            criteria: FilterCriteria::default(),
            sort: None,
            page: 1,
            page_size: None,
            select_type: None,
        }
    }
}

/// Response with a directory listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Directory that was listed, relative to the root.
    pub dir: String,
    /// Entries on the requested page.
    pub entries: Vec<FileEntry>,
    /// Pagination and counts.
    pub page_info: PageInfo,
}

// ============================================================================
// Mutations
// ============================================================================

/// Reference to an entry inside a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRef {
    /// Directory relative to the root.
    pub dir: String,
    /// Entry name.
    pub name: String,
}

/// Request to create a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDirRequest {
    pub dir: String,
    /// Raw folder name, sanitized by the core.
    pub name: String,
}

/// Request to upload a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub dir: String,
    /// Raw file name, sanitized by the core.
    pub file_name: String,
    /// File content.
    pub data: Vec<u8>,
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploaded {
    pub dir: String,
    /// Name the file was stored under.
    pub name: String,
    pub size: u64,
}

/// Request to delete a file or an empty folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub dir: String,
    pub name: String,
}

/// Request to rename a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    pub dir: String,
    pub name: String,
    /// New name without extension; the current extension is kept.
    pub new_name: String,
}

/// Result of a rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renamed {
    pub dir: String,
    pub old_name: String,
    pub new_name: String,
}

/// Text content of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub dir: String,
    pub name: String,
    pub content: String,
}

/// Request to replace the text content of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveTextRequest {
    pub dir: String,
    pub name: String,
    pub content: String,
}

/// Versions of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsResponse {
    pub dir: String,
    pub name: String,
    pub versions: Vec<VersionInfo>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional context (directory, file name).
    pub context: Option<String>,
}

/// Rejection reasons reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Path escapes the root directory.
    OutOfBounds,
    /// Path or file missing.
    NotFound,
    /// Name fails sanitization.
    InvalidName,
    /// Name collision on create, rename or upload.
    AlreadyExists,
    /// The filesystem refused the operation.
    PermissionDenied,
    /// Upload over the size limit.
    SizeExceeded,
    /// Extension or content not allowed.
    UnsupportedType,
    /// Folder still has entries.
    NotEmpty,
    /// A pre-operation hook refused the operation.
    Vetoed,
    /// Malformed or unsupported request.
    InvalidRequest,
    /// Any other I/O failure.
    Io,
}
