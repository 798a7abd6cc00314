use thiserror::Error;

/// Format label used when the host, not the decoder, refuses the file type
pub const HOST_REJECTED_FORMAT: &str = "unrecognized";

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding or uploading media
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Invalid base64 image format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Unsupported image format: {format}")]
    UnsupportedFormat {
        format: String,
        detail: Option<String>,
    },

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Upload timed out after {timeout_ms} ms")]
    UploadTimeout { timeout_ms: u64 },

    #[error("Upload configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Upload failed: {message}")]
    UploadFailed {
        message: String,
        detail: Option<String>,
    },
}

/// Coarse failure category, stable across message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaErrorKind {
    InvalidFormat,
    UnsupportedFormat,
    PayloadTooLarge,
    UploadTimeout,
    ConfigurationError,
    UploadFailed,
}

impl MediaErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            MediaErrorKind::InvalidFormat => "InvalidFormat",
            MediaErrorKind::UnsupportedFormat => "UnsupportedFormat",
            MediaErrorKind::PayloadTooLarge => "PayloadTooLarge",
            MediaErrorKind::UploadTimeout => "UploadTimeout",
            MediaErrorKind::ConfigurationError => "ConfigurationError",
            MediaErrorKind::UploadFailed => "UploadFailed",
        }
    }

    /// Kebab-cased name, as used in JSON error payloads
    pub fn class_name(&self) -> &'static str {
        match self {
            MediaErrorKind::InvalidFormat => "invalid-format",
            MediaErrorKind::UnsupportedFormat => "unsupported-format",
            MediaErrorKind::PayloadTooLarge => "payload-too-large",
            MediaErrorKind::UploadTimeout => "upload-timeout",
            MediaErrorKind::ConfigurationError => "configuration-error",
            MediaErrorKind::UploadFailed => "upload-failed",
        }
    }
}

impl MediaError {
    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(reason: S) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            detail: None,
        }
    }

    pub fn too_large(size: u64, max: u64) -> Self {
        Self::PayloadTooLarge { size, max }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a generic upload failure, keeping the host's raw message as detail
    pub fn upload_failed<S: Into<String>>(message: S) -> Self {
        Self::UploadFailed {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach host diagnostics; only `UploadFailed` and `UnsupportedFormat` carry them
    pub fn with_detail<S: Into<String>>(self, detail: S) -> Self {
        match self {
            Self::UploadFailed { message, .. } => Self::UploadFailed {
                message,
                detail: Some(detail.into()),
            },
            Self::UnsupportedFormat { format, .. } => Self::UnsupportedFormat {
                format,
                detail: Some(detail.into()),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> MediaErrorKind {
        match self {
            Self::InvalidFormat { .. } => MediaErrorKind::InvalidFormat,
            Self::UnsupportedFormat { .. } => MediaErrorKind::UnsupportedFormat,
            Self::PayloadTooLarge { .. } => MediaErrorKind::PayloadTooLarge,
            Self::UploadTimeout { .. } => MediaErrorKind::UploadTimeout,
            Self::ConfigurationError { .. } => MediaErrorKind::ConfigurationError,
            Self::UploadFailed { .. } => MediaErrorKind::UploadFailed,
        }
    }

    /// Human-readable message suitable for end users.
    ///
    /// Never contains the host's raw message; see [`MediaError::detail`].
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFormat { .. } => "Invalid image data. Please upload a valid base64 image.".to_string(),
            Self::UnsupportedFormat { format, .. } => format!(
                "Unsupported image format '{}'. Allowed formats: jpeg, jpg, png, gif, webp, svg.",
                format
            ),
            Self::PayloadTooLarge { .. } => {
                "File size too large. Please compress your image or GIF, or use a smaller file.".to_string()
            }
            Self::UploadTimeout { .. } => "The image upload timed out. Please try again.".to_string(),
            Self::ConfigurationError { .. } => {
                "Upload configuration error. Please contact support.".to_string()
            }
            Self::UploadFailed { .. } => "Failed to upload image to the media host.".to_string(),
        }
    }

    /// Auxiliary diagnostic detail (sizes, host message) for logs and error payloads
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::InvalidFormat { reason } => Some(reason.clone()),
            Self::UnsupportedFormat { format, detail } => {
                Some(detail.clone().unwrap_or_else(|| format!("format={}", format)))
            }
            Self::PayloadTooLarge { .. } => Some(self.to_string()),
            Self::UploadTimeout { timeout_ms } => Some(format!("timeout_ms={}", timeout_ms)),
            Self::ConfigurationError { message } => Some(message.clone()),
            Self::UploadFailed { message, detail } => {
                Some(detail.clone().unwrap_or_else(|| message.clone()))
            }
        }
    }
}
