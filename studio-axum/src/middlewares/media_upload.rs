use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use anyhow::Context;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use studio_media::{sections, MediaError, MediaFile, RequestFiles, UploadOrchestrator};
use tower::{Layer, Service};

use crate::error::{bad_request, MediaErrorResponse};

/// What to do with inline base64 images found in a JSON `sections` array
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InlineSections {
    /// Blank them out and set the pending-upload marker
    #[default]
    Sanitize,
    /// Decode and upload them, writing back URLs
    Resolve,
    /// Leave the body alone
    Ignore,
}

/// Configuration for the media upload middleware
#[derive(Clone, Debug)]
pub struct MediaUploadConfig {
    /// Field carrying the single preview image
    pub preview_field: String,
    /// Fields carrying section images, in attachment order
    pub section_fields: HashSet<String>,
    /// Maximum size of a single file in bytes (None = unlimited)
    pub max_file_size: Option<usize>,
    /// Maximum size of the whole request body in bytes
    pub max_body_size: usize,
    pub inline_sections: InlineSections,
}

impl Default for MediaUploadConfig {
    fn default() -> Self {
        Self {
            preview_field: "previewImage".to_string(),
            section_fields: ["sections", "sections[]"].into_iter().map(String::from).collect(),
            max_file_size: Some(100 * 1024 * 1024), // 100MB
            max_body_size: 200 * 1024 * 1024,       // 200MB
            inline_sections: InlineSections::default(),
        }
    }
}

impl MediaUploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum file size in bytes
    pub fn max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = Some(size);
        self
    }

    /// Set maximum request body size in bytes
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Add a field name whose files are treated as sections
    pub fn section_field(mut self, field_name: &str) -> Self {
        self.section_fields.insert(field_name.to_string());
        self
    }

    pub fn inline_sections(mut self, policy: InlineSections) -> Self {
        self.inline_sections = policy;
        self
    }
}

/// Middleware that uploads request media before the handler runs.
///
/// Multipart requests are parsed, their files uploaded through the
/// [`UploadOrchestrator`], and the body replaced by the enriched fields as
/// JSON. JSON requests only get their `sections` array handled according to
/// [`InlineSections`]. Anything else passes through.
#[derive(Clone)]
pub struct MediaUpload {
    orchestrator: Arc<UploadOrchestrator>,
    config: Arc<MediaUploadConfig>,
}

impl MediaUpload {
    pub fn new(orchestrator: UploadOrchestrator) -> Self {
        Self::with_config(orchestrator, MediaUploadConfig::default())
    }

    pub fn with_config(orchestrator: UploadOrchestrator, config: MediaUploadConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for MediaUpload {
    type Service = MediaUploadService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MediaUploadService {
            inner,
            orchestrator: self.orchestrator.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MediaUploadService<S> {
    inner: S,
    orchestrator: Arc<UploadOrchestrator>,
    config: Arc<MediaUploadConfig>,
}

/// Why the middleware refused a request
enum Rejection {
    Malformed(anyhow::Error),
    Media(MediaError),
}

impl From<MediaError> for Rejection {
    fn from(e: MediaError) -> Self {
        Rejection::Media(e)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::Malformed(e) => bad_request(format!("Failed to parse request body: {:#}", e)),
            Rejection::Media(e) => MediaErrorResponse(e).into_response(),
        }
    }
}

impl<S> Service<Request<Body>> for MediaUploadService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Swap so the ready service handles this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let orchestrator = self.orchestrator.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let content_type = req
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            let rewritten = if content_type.starts_with("multipart/form-data") {
                handle_multipart(req, &content_type, &orchestrator, &config).await
            } else if content_type.starts_with("application/json")
                && config.inline_sections != InlineSections::Ignore
            {
                handle_json(req, &orchestrator, &config).await
            } else {
                Ok(req)
            };

            match rewritten {
                Ok(req) => inner.call(req).await,
                Err(rejection) => {
                    if let Rejection::Media(e) = &rejection {
                        tracing::warn!(kind = e.kind().name(), detail = ?e.detail(), "media upload failed");
                    }
                    Ok(rejection.into_response())
                }
            }
        })
    }
}

async fn handle_multipart(
    req: Request<Body>,
    content_type: &str,
    orchestrator: &UploadOrchestrator,
    config: &MediaUploadConfig,
) -> Result<Request<Body>, Rejection> {
    let (parts, body) = req.into_parts();
    let declared = declared_length(&parts);
    let boundary = multer::parse_boundary(content_type)
        .context("Missing boundary in multipart content-type")
        .map_err(Rejection::Malformed)?;

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(config.max_body_size as u64));
    let mut multipart = multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut files = RequestFiles::new();
    let mut fields = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(e, declared, "Failed to read multipart field".to_string()))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        let filename = field.file_name().map(str::to_string);
        let field_type = field.content_type().map(|ct| ct.to_string());

        if filename.is_none() {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_rejection(e, declared, format!("Failed to read text field '{}'", name)))?;
            fields.insert(name, text_value(&value));
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_rejection(e, declared, format!("Failed to read file field '{}'", name)))?;

        if let Some(max) = config.max_file_size {
            if data.len() > max {
                return Err(MediaError::too_large(data.len() as u64, max as u64).into());
            }
        }

        let mut file = MediaFile::new(name.clone(), data);
        if let Some(filename) = filename {
            file = file.with_filename(filename);
        }
        if let Some(ct) = field_type {
            file = file.with_content_type(ct);
        }

        if name == config.preview_field {
            if files.preview.is_some() {
                return Err(Rejection::Malformed(anyhow::anyhow!(
                    "Only one '{}' file is allowed",
                    config.preview_field
                )));
            }
            files.preview = Some(file);
        } else if config.section_fields.contains(&name) {
            files.sections.push(file);
        } else {
            tracing::debug!(field = %name, "ignoring unexpected file field");
        }
    }

    tracing::debug!(
        preview = files.preview.is_some(),
        sections = files.sections.len(),
        fields = fields.len(),
        "parsed multipart request"
    );

    let enriched = orchestrator.process(files, fields).await?;
    // Sections sent as form text never went through the orchestrator's uploads
    let enriched = apply_inline_policy(enriched, orchestrator, config).await?;
    Ok(json_request(parts, enriched))
}

async fn handle_json(
    req: Request<Body>,
    orchestrator: &UploadOrchestrator,
    config: &MediaUploadConfig,
) -> Result<Request<Body>, Rejection> {
    let (parts, body) = req.into_parts();
    let declared = declared_length(&parts);
    let bytes = match Limited::new(body, config.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Err(body_too_large(declared, config.max_body_size as u64))
        }
        Err(e) => {
            return Err(Rejection::Malformed(
                anyhow::anyhow!(e).context("Failed to read request body"),
            ))
        }
    };

    let fields = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) if map.contains_key(studio_media::orchestrator::SECTIONS_FIELD) => map,
        // Not ours to judge; let the handler reject bad JSON
        _ => return Ok(Request::from_parts(parts, Body::from(bytes))),
    };

    let fields = apply_inline_policy(fields, orchestrator, config).await?;
    Ok(json_request(parts, fields))
}

/// Handle inline base64 images left in `sections` according to [`InlineSections`]
async fn apply_inline_policy(
    mut fields: Map<String, Value>,
    orchestrator: &UploadOrchestrator,
    config: &MediaUploadConfig,
) -> Result<Map<String, Value>, Rejection> {
    match config.inline_sections {
        InlineSections::Sanitize => sections::sanitize_fields(&mut fields),
        InlineSections::Resolve => fields = orchestrator.resolve_inline_fields(fields).await?,
        InlineSections::Ignore => {}
    }
    Ok(fields)
}

fn declared_length(parts: &axum::http::request::Parts) -> Option<u64> {
    parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// The body went past `max`; report the declared length when there is one
fn body_too_large(declared: Option<u64>, max: u64) -> Rejection {
    let size = declared.filter(|&n| n > max).unwrap_or(max + 1);
    Rejection::Media(MediaError::too_large(size, max))
}

fn multipart_rejection(e: multer::Error, declared: Option<u64>, context: String) -> Rejection {
    match e {
        multer::Error::StreamSizeExceeded { limit } => body_too_large(declared, limit),
        other => Rejection::Malformed(anyhow::Error::new(other).context(context)),
    }
}

/// Text values stay strings, except JSON arrays/objects sent as form text
fn text_value(value: &str) -> Value {
    let trimmed = value.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<Value>(value) {
            return parsed;
        }
    }
    Value::String(value.to_string())
}

fn json_request(mut parts: axum::http::request::Parts, fields: Map<String, Value>) -> Request<Body> {
    let json_bytes = Value::Object(fields).to_string().into_bytes();

    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(json_bytes.len()));

    Request::from_parts(parts, Body::from(json_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_text_arrays_are_parsed() {
        assert_eq!(text_value("[1, 2]"), json!([1, 2]));
        assert_eq!(text_value("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(text_value("[not json"), json!("[not json"));
        assert_eq!(text_value("plain"), json!("plain"));
    }

    #[test]
    fn oversized_body_reports_declared_length() {
        match body_too_large(Some(500), 100) {
            Rejection::Media(e) => assert_eq!(e, MediaError::too_large(500, 100)),
            Rejection::Malformed(e) => panic!("unexpected: {}", e),
        }
        match body_too_large(None, 100) {
            Rejection::Media(e) => assert_eq!(e, MediaError::too_large(101, 100)),
            Rejection::Malformed(e) => panic!("unexpected: {}", e),
        }
    }

    #[test]
    fn default_config_accepts_both_section_field_spellings() {
        let config = MediaUploadConfig::default();
        assert!(config.section_fields.contains("sections"));
        assert!(config.section_fields.contains("sections[]"));
        assert_eq!(config.preview_field, "previewImage");
    }
}
