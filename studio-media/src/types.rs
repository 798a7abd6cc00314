use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of bytes for asset content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Kind of asset the host should store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Image,
    Video,
    Raw,
    #[default]
    Auto,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
            ResourceType::Auto => "auto",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical result of one asset upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    url: String,
    public_id: String,
    size_bytes: u64,
}

impl UploadResult {
    pub fn new(url: String, public_id: String, size_bytes: u64) -> Self {
        Self {
            url,
            public_id,
            size_bytes,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn into_parts(self) -> (String, String, u64) {
        (self.url, self.public_id, self.size_bytes)
    }
}

/// Logical destination at the host: `root/segment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    root: String,
    segment: String,
}

impl UploadTarget {
    /// Build a target from a raw project name.
    ///
    /// The name is cut to `max_len` characters, whitespace runs become `_`,
    /// anything outside `[A-Za-z0-9_.-]` is dropped and dot-only segments are
    /// rejected. An empty result falls back to `default_name`.
    pub fn for_project(root: &str, name: Option<&str>, default_name: &str, max_len: usize) -> Self {
        let segment = name
            .map(|n| sanitize_segment(n, max_len))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| sanitize_segment(default_name, max_len));

        Self {
            root: normalize_root(root),
            segment,
        }
    }

    /// Target directly under the root (no project segment)
    pub fn root_only(root: &str) -> Self {
        Self {
            root: normalize_root(root),
            segment: String::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Folder path as sent to the host
    pub fn folder(&self) -> String {
        match (self.root.is_empty(), self.segment.is_empty()) {
            (true, _) => self.segment.clone(),
            (false, true) => self.root.clone(),
            (false, false) => format!("{}/{}", self.root, self.segment),
        }
    }
}

impl std::fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.folder())
    }
}

fn sanitize_segment(name: &str, max_len: usize) -> String {
    let clamped: String = name.trim().chars().take(max_len).collect();

    let mut out = String::with_capacity(clamped.len());
    let mut in_space = false;
    for c in clamped.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
            out.push(c);
        }
    }

    if out.chars().all(|c| c == '.') {
        return String::new();
    }
    out
}

fn normalize_root(root: &str) -> String {
    root.split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// A file attached to an inbound request
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new<S: Into<String>>(field: S, data: Bytes) -> Self {
        Self {
            field: field.into(),
            filename: None,
            content_type: None,
            data,
        }
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Files extracted from a request, grouped by the field they arrived on
#[derive(Debug, Clone, Default)]
pub struct RequestFiles {
    pub preview: Option<MediaFile>,
    pub sections: Vec<MediaFile>,
}

impl RequestFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preview(mut self, file: MediaFile) -> Self {
        self.preview = Some(file);
        self
    }

    pub fn with_section(mut self, file: MediaFile) -> Self {
        self.sections.push(file);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.preview.is_none() && self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_runs_collapse_to_one_underscore() {
        let target = UploadTarget::for_project("VDS_FOLDER", Some("My   Project"), "UNKNOWN_PROJECT", 50);
        assert_eq!(target.folder(), "VDS_FOLDER/My_Project");
    }

    #[test]
    fn missing_or_empty_name_uses_default() {
        let target = UploadTarget::for_project("VDS_FOLDER", None, "UNKNOWN_PROJECT", 50);
        assert_eq!(target.folder(), "VDS_FOLDER/UNKNOWN_PROJECT");

        let target = UploadTarget::for_project("VDS_FOLDER", Some("  //  "), "UNKNOWN_PROJECT", 50);
        assert_eq!(target.folder(), "VDS_FOLDER/UNKNOWN_PROJECT");
    }

    #[test]
    fn traversal_and_slashes_are_stripped() {
        let target = UploadTarget::for_project("VDS_FOLDER", Some("../../etc/passwd"), "UNKNOWN_PROJECT", 50);
        assert!(!target.segment().contains('/'));
        assert_eq!(target.folder(), "VDS_FOLDER/....etcpasswd");

        let target = UploadTarget::for_project("VDS_FOLDER", Some(".."), "UNKNOWN_PROJECT", 50);
        assert_eq!(target.segment(), "UNKNOWN_PROJECT");
    }

    #[test]
    fn name_is_clamped_before_sanitizing() {
        let long = "a".repeat(80);
        let target = UploadTarget::for_project("VDS_FOLDER", Some(&long), "UNKNOWN_PROJECT", 50);
        assert_eq!(target.segment().len(), 50);
    }

    #[test]
    fn root_slashes_collapse() {
        let target = UploadTarget::for_project("/VDS_FOLDER//", Some("x"), "UNKNOWN_PROJECT", 50);
        assert_eq!(target.folder(), "VDS_FOLDER/x");
        assert_eq!(UploadTarget::root_only("VDS_FOLDER").folder(), "VDS_FOLDER");
    }

    #[test]
    fn upload_result_serializes_camel_case() {
        let result = UploadResult::new("https://cdn/x.png".into(), "VDS_FOLDER/x".into(), 42);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["publicId"], "VDS_FOLDER/x");
        assert_eq!(json["sizeBytes"], 42);
    }
}
