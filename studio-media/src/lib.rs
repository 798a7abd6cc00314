//! # studio-media: media ingestion for the studio admin backend
//!
//! `studio-media` takes images arriving on admin requests, either as raw
//! multipart buffers or as base64 data URIs, pushes them to an external image
//! host in bounded chunks, and writes the resulting URL/identifier pairs back
//! into the request body before it is persisted.
//!
//! ## Quick Start
//!
//! ```rust
//! use studio_media::prelude::*;
//! use bytes::Bytes;
//! use serde_json::{json, Map, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> MediaResult<()> {
//! // 1. Pick a host (CloudinaryHost::from_env() in production)
//! let uploader = StreamUploader::new(MemoryHost::new(), UploaderConfig::default());
//! let orchestrator = UploadOrchestrator::new(uploader, MediaConfig::default());
//!
//! // 2. Hand it the request's files and text fields
//! let files = RequestFiles::new()
//!     .with_preview(MediaFile::new("previewImage", Bytes::from_static(b"GIF89a")));
//! let fields: Map<String, Value> = json!({"name": "My   Project"})
//!     .as_object()
//!     .cloned()
//!     .unwrap_or_default();
//!
//! // 3. Get the fields back with host URLs filled in
//! let enriched = orchestrator.process(files, fields).await?;
//! assert!(enriched.contains_key("previewImageUrl"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  UploadOrchestrator  │  ← request files/fields in, enriched fields out
//! ├──────────┬───────────┤
//! │ encoder  │ sections  │  ← data-URI decoding, base64 stripping
//! ├──────────┴───────────┤
//! │   StreamUploader     │  ← chunking, timeout, error classification
//! ├──────────────────────┤
//! │     MediaHost        │  ← Cloudinary, in-memory, test fakes
//! └──────────────────────┘
//! ```

pub mod cloudinary;
mod config;
pub mod encoder;
mod error;
pub mod host;
mod memory_host;
pub mod orchestrator;
pub mod sections;
mod types;
pub mod uploader;

// Re-export main types for clean API
pub use cloudinary::{CloudinaryConfig, CloudinaryHost, SignatureAlgorithm};
pub use config::{
    FieldLimits, MediaConfig, UploaderConfig, DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_UPLOAD_TIMEOUT,
    MAX_DECODED_BYTES,
};
pub use encoder::{DecodedImage, ImageFormat};
pub use error::{MediaError, MediaErrorKind, MediaResult, HOST_REJECTED_FORMAT};
pub use host::{HostAsset, HostError, HostErrorCode, HostUpload, MediaHost};
pub use memory_host::{MemoryHost, StoredAsset};
pub use orchestrator::UploadOrchestrator;
pub use sections::{Section, SectionKind};
pub use types::{ByteStream, MediaFile, RequestFiles, ResourceType, UploadResult, UploadTarget};
pub use uploader::StreamUploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        MediaConfig, MediaError, MediaFile, MediaHost, MediaResult, MemoryHost, RequestFiles,
        StreamUploader, UploadOrchestrator, UploadResult, UploadTarget, UploaderConfig,
    };
}
