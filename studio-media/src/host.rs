use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HOST_REJECTED_FORMAT;
use crate::{ByteStream, MediaError, ResourceType};

/// The external media host - implemented by Cloudinary, the in-memory host, and test fakes
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store one asset from a stream of chunks
    async fn upload(&self, request: HostUpload, body: ByteStream) -> Result<HostAsset, HostError>;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        "media-host"
    }
}

/// Options sent along with an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUpload {
    pub folder: String,
    pub resource_type: ResourceType,
    pub quality_policy: String,
    pub chunk_size_bytes: usize,
    pub timeout_ms: u64,
    pub total_bytes: u64,
}

/// What the host hands back for a stored asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAsset {
    pub secure_url: String,
    pub public_id: String,
    pub bytes: u64,
}

/// Error category reported by the host, when it gives one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorCode {
    FileTooLarge,
    InvalidFileType,
    Misconfigured,
    Timeout,
    /// No structured category; the message is all we have
    Unknown,
}

/// A rejection or transport failure coming from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub code: HostErrorCode,
    pub message: String,
    pub http_status: Option<u16>,
}

impl HostError {
    pub fn new<S: Into<String>>(code: HostErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: None,
        }
    }

    /// An error with no structured category
    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::new(HostErrorCode::Unknown, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HostError {}

/// Map a host error into the media taxonomy.
///
/// The explicit code wins. For `Unknown` we fall back to matching known host
/// message fragments; that fallback breaks silently if the host rewords its
/// messages, so hosts should set a code whenever they can.
pub fn classify(error: &HostError, request: &HostUpload) -> MediaError {
    let code = match error.code {
        HostErrorCode::Unknown => code_from_message(&error.message),
        code => code,
    };

    match code {
        HostErrorCode::FileTooLarge => MediaError::PayloadTooLarge {
            size: request.total_bytes,
            max: host_limit(&error.message).unwrap_or(0),
        },
        HostErrorCode::InvalidFileType => {
            MediaError::unsupported_format(HOST_REJECTED_FORMAT).with_detail(error.to_string())
        }
        HostErrorCode::Misconfigured => MediaError::configuration(error.message.clone()),
        HostErrorCode::Timeout => MediaError::UploadTimeout {
            timeout_ms: request.timeout_ms,
        },
        HostErrorCode::Unknown => {
            MediaError::upload_failed("media host rejected the upload").with_detail(error.to_string())
        }
    }
}

/// Pulls `N` out of "... Maximum is N." when the host states its limit
fn host_limit(message: &str) -> Option<u64> {
    let (_, tail) = message.split_once("Maximum is ")?;
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn code_from_message(message: &str) -> HostErrorCode {
    const TOO_LARGE: &[&str] = &["File size too large", "Maximum is", "too large"];
    const BAD_TYPE: &[&str] = &["Invalid file type", "Invalid image file", "Unsupported"];
    const MISCONFIGURED: &[&str] = &[
        "Upload preset not found",
        "Must supply api_key",
        "Invalid cloud_name",
        "Invalid Signature",
        "Unknown API key",
    ];

    if TOO_LARGE.iter().any(|m| message.contains(m)) {
        HostErrorCode::FileTooLarge
    } else if BAD_TYPE.iter().any(|m| message.contains(m)) {
        HostErrorCode::InvalidFileType
    } else if MISCONFIGURED.iter().any(|m| message.contains(m)) {
        HostErrorCode::Misconfigured
    } else if message.contains("timed out") || message.contains("Request Timeout") {
        HostErrorCode::Timeout
    } else {
        HostErrorCode::Unknown
    }
}
