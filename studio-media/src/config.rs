use std::time::Duration;

use crate::ResourceType;

/// Largest decoded payload accepted from a base64 data URI (5 MiB)
pub const MAX_DECODED_BYTES: u64 = 5 * 1024 * 1024;

/// Chunk size used when streaming to the media host
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 6_000_000;

/// Request timeout for a single asset upload
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Namespace root every project folder lives under
    pub root_folder: String,

    /// Project segment used when the request carries no usable name
    pub default_project: String,

    /// Max characters kept from the project name before sanitizing
    pub max_project_segment: usize,

    /// Ceiling for decoded base64 payloads
    pub max_decoded_bytes: u64,

    /// Transfer settings handed to the uploader
    pub uploader: UploaderConfig,

    /// Clamping applied to pass-through text fields
    pub limits: FieldLimits,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root_folder: "VDS_FOLDER".to_string(),
            default_project: "UNKNOWN_PROJECT".to_string(),
            max_project_segment: 50,
            max_decoded_bytes: MAX_DECODED_BYTES,
            uploader: UploaderConfig::default(),
            limits: FieldLimits::default(),
        }
    }
}

/// Transfer settings for a single asset upload
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Bytes per chunk sent to the host
    pub chunk_size_bytes: usize,

    /// Whole-upload timeout; elapsed means `UploadTimeout`, never a retry
    pub timeout: Duration,

    /// Resource type used when the caller gives no hint
    pub resource_type: ResourceType,

    /// Quality policy forwarded to the host ("auto")
    pub quality_policy: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
            resource_type: ResourceType::Auto,
            quality_policy: "auto".to_string(),
        }
    }
}

/// Character limits for text fields the orchestrator passes through
#[derive(Debug, Clone)]
pub struct FieldLimits {
    pub name: usize,
    pub client: usize,
    pub collaborators: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            name: 255,
            client: 100,
            collaborators: 200,
        }
    }
}

impl MediaConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace root
    pub fn with_root_folder<S: Into<String>>(mut self, root: S) -> Self {
        self.root_folder = root.into();
        self
    }

    /// Set the fallback project segment
    pub fn with_default_project<S: Into<String>>(mut self, name: S) -> Self {
        self.default_project = name.into();
        self
    }

    /// Set max decoded size for base64 payloads
    pub fn with_max_decoded_bytes(mut self, bytes: u64) -> Self {
        self.max_decoded_bytes = bytes;
        self
    }

    /// Set uploader settings
    pub fn with_uploader(mut self, uploader: UploaderConfig) -> Self {
        self.uploader = uploader;
        self
    }

    /// Set text field limits
    pub fn with_limits(mut self, limits: FieldLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl UploaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set chunk size; zero is bumped to one byte
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size_bytes = bytes.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}
