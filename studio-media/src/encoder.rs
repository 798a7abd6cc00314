//! Base64 data-URI decoding.
//!
//! Accepts `data:image/<format>;base64,<payload>` and turns it into raw bytes
//! plus a known [`ImageFormat`]. Everything here is pure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::config::MAX_DECODED_BYTES;
use crate::{MediaError, MediaResult};

const DATA_URI_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// Image formats accepted from data URIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Jpg,
    Png,
    Gif,
    Webp,
    Svg,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 6] = [
        ImageFormat::Jpeg,
        ImageFormat::Jpg,
        ImageFormat::Png,
        ImageFormat::Gif,
        ImageFormat::Webp,
        ImageFormat::Svg,
    ];

    /// Parse a format name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" => Some(ImageFormat::Jpeg),
            "jpg" => Some(ImageFormat::Jpg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::Webp),
            "svg" => Some(ImageFormat::Svg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg | ImageFormat::Jpg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
}

/// Split a data URI into its format name and base64 payload.
///
/// The format must be ASCII letters only and the payload non-empty.
fn split_data_uri(data_uri: &str) -> Option<(&str, &str)> {
    let rest = data_uri.strip_prefix(DATA_URI_PREFIX)?;
    let (format, payload) = rest.split_once(BASE64_MARKER)?;
    if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if payload.is_empty() || payload.contains(['\n', '\r']) {
        return None;
    }
    Some((format, payload))
}

/// Decode a data URI using the default 5 MiB ceiling
pub fn decode(data_uri: &str) -> MediaResult<DecodedImage> {
    decode_with_limit(data_uri, MAX_DECODED_BYTES)
}

/// Decode a data URI, rejecting payloads whose decoded size exceeds `max_bytes`
pub fn decode_with_limit(data_uri: &str, max_bytes: u64) -> MediaResult<DecodedImage> {
    let (format_name, payload) = split_data_uri(data_uri)
        .ok_or_else(|| MediaError::invalid_format("expected data:image/<format>;base64,<payload>"))?;

    let format = ImageFormat::parse(format_name)
        .ok_or_else(|| MediaError::unsupported_format(format_name))?;

    // Reject from the encoded length before allocating the decoded buffer
    let expected = decoded_len(payload) as u64;
    if expected > max_bytes {
        return Err(MediaError::too_large(expected, max_bytes));
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| MediaError::invalid_format(format!("payload is not valid base64: {}", e)))?;

    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(MediaError::too_large(size, max_bytes));
    }

    Ok(DecodedImage {
        bytes: Bytes::from(bytes),
        format,
    })
}

/// Decoded length implied by a base64 payload, net of `=` padding
fn decoded_len(payload: &str) -> usize {
    let padding = payload.bytes().rev().take(2).take_while(|&b| b == b'=').count();
    (payload.len() * 3 / 4).saturating_sub(padding)
}

/// Render bytes back into a data URI
pub fn encode(bytes: &[u8], format: ImageFormat) -> String {
    format!("{}{}{}{}", DATA_URI_PREFIX, format.as_str(), BASE64_MARKER, STANDARD.encode(bytes))
}

/// Approximate decoded size from the encoded length, without decoding.
///
/// Returns 0 for anything that is not a data URI.
pub fn estimate_size(data_uri: &str) -> usize {
    match split_data_uri(data_uri) {
        Some((_, payload)) => payload.len() * 3 / 4,
        None => 0,
    }
}

/// True when `content` looks like an inline base64 image
pub fn is_base64_image(content: &str) -> bool {
    content.starts_with(DATA_URI_PREFIX) && content.contains("base64,")
}
