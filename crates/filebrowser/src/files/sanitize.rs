//! Filename sanitization.
//!
//! User-supplied names are checked against a configurable allow-list pattern
//! and normalized before they reach the filesystem.

use regex::Regex;

use super::category::split_extension;
use super::error::{FilesError, Result};

/// Default allow-list: letters, digits, underscore, space and hyphen.
pub const DEFAULT_ALLOWED_PATTERN: &str = r"^[A-Za-z0-9_ -]+$";

/// Default replacement for filesystem-unsafe characters.
pub const DEFAULT_SUBSTITUTE: &str = "_";

/// Longest name accepted, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

/// Characters that are never written to the filesystem.
pub fn is_unsafe_char(c: char) -> bool {
    c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Whether `substitute` can stand in for unsafe characters.
///
/// It must be non-empty and contain no unsafe or whitespace characters,
/// otherwise sanitizing twice could give a different result.
pub fn is_valid_substitute(substitute: &str) -> bool {
    !substitute.is_empty()
        && !substitute
            .chars()
            .any(|c| is_unsafe_char(c) || c.is_whitespace())
}

/// Normalizes names and enforces the allow-list.
///
/// `sanitize(sanitize(x)) == sanitize(x)` holds for every accepted `x`.
#[derive(Debug, Clone)]
pub struct NameSanitizer {
    allowed: Regex,
    substitute: String,
    convert_spaces: bool,
    lowercase: bool,
}

impl NameSanitizer {
    /// Create a sanitizer with the given allow-list pattern.
    ///
    /// The pattern is searched, not implicitly anchored, so it should carry
    /// its own `^`/`$`.
    pub fn new(allowed_pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            allowed: Regex::new(allowed_pattern)?,
            substitute: DEFAULT_SUBSTITUTE.to_string(),
            convert_spaces: false,
            lowercase: false,
        })
    }

    /// Replacement for unsafe characters. Invalid substitutes are ignored
    /// and the default is kept.
    pub fn with_substitute(mut self, substitute: &str) -> Self {
        if is_valid_substitute(substitute) {
            self.substitute = substitute.to_string();
        }
        self
    }

    /// Replace spaces with underscores.
    pub fn convert_spaces(mut self, enabled: bool) -> Self {
        self.convert_spaces = enabled;
        self
    }

    /// Lowercase the result.
    pub fn lowercase(mut self, enabled: bool) -> Self {
        self.lowercase = enabled;
        self
    }

    /// Sanitize a folder name or file stem.
    pub fn sanitize(&self, raw: &str) -> Result<String> {
        let invalid = || FilesError::InvalidName(raw.to_string());

        let trimmed = raw.trim();
        if trimmed.is_empty() || !self.allowed.is_match(trimmed) {
            return Err(invalid());
        }

        let mut result = String::with_capacity(trimmed.len());
        let mut in_unsafe_run = false;
        for c in trimmed.chars() {
            if is_unsafe_char(c) {
                if !in_unsafe_run {
                    result.push_str(&self.substitute);
                }
                in_unsafe_run = true;
                continue;
            }
            in_unsafe_run = false;

            if self.convert_spaces && c == ' ' {
                result.push('_');
            } else {
                result.push(c);
            }
        }

        if self.lowercase {
            result = result.to_lowercase();
        }

        if result == "."
            || result == ".."
            || result.len() > MAX_NAME_BYTES
            || !self.allowed.is_match(&result)
        {
            return Err(invalid());
        }

        Ok(result)
    }

    /// Sanitize an uploaded file name.
    ///
    /// The last extension is split off and must be alphanumeric; it is
    /// lowercased and re-attached to the sanitized stem.
    pub fn sanitize_file_name(&self, raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        let (stem, extension) = split_extension(trimmed);

        if extension.is_empty() {
            return self.sanitize(stem);
        }

        let ext = &extension[1..];
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FilesError::InvalidName(raw.to_string()));
        }

        let stem = self
            .sanitize(stem)
            .map_err(|_| FilesError::InvalidName(raw.to_string()))?;
        let name = format!("{}.{}", stem, ext.to_ascii_lowercase());
        if name.len() > MAX_NAME_BYTES {
            return Err(FilesError::InvalidName(raw.to_string()));
        }

        Ok(name)
    }
}
