mod media_upload;

pub use media_upload::{InlineSections, MediaUpload, MediaUploadConfig, MediaUploadService};
