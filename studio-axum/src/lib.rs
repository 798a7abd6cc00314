//! studio-axum: Axum adapter for studio-media.
//!
//! Exposes a Tower layer that uploads request media before handlers run,
//! and the HTTP rendering of classified media errors.

pub mod middlewares;
mod error;
pub use error::{bad_request, status_for, MediaErrorResponse};

pub use middlewares::{InlineSections, MediaUpload, MediaUploadConfig};
