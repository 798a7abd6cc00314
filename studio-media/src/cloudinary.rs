use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::host::{HostAsset, HostError, HostErrorCode, HostUpload};
use crate::{ByteStream, MediaError, MediaHost, MediaResult};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// Digest used for upload signatures; must match the account's setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// Cloudinary's default for new accounts
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha1" => Some(SignatureAlgorithm::Sha1),
            "sha256" => Some(SignatureAlgorithm::Sha256),
            _ => None,
        }
    }
}

/// Credentials and endpoint for a Cloudinary account
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("signature_algorithm", &self.signature_algorithm)
            .finish()
    }
}

impl CloudinaryConfig {
    pub fn new<S: Into<String>>(cloud_name: S, api_key: S, api_secret: S) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }

    /// Read `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`
    /// and the optional `CLOUDINARY_API_BASE` and `CLOUDINARY_SIGNATURE_ALGORITHM`
    pub fn from_env() -> MediaResult<Self> {
        fn get_env(key: &str) -> MediaResult<String> {
            env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| MediaError::configuration(format!("{} environment variable required", key)))
        }

        let mut config = Self::new(
            get_env("CLOUDINARY_CLOUD_NAME")?,
            get_env("CLOUDINARY_API_KEY")?,
            get_env("CLOUDINARY_API_SECRET")?,
        );
        if let Ok(base) = env::var("CLOUDINARY_API_BASE") {
            config = config.with_api_base(base);
        }
        if let Ok(name) = env::var("CLOUDINARY_SIGNATURE_ALGORITHM") {
            let algorithm = SignatureAlgorithm::parse(&name).ok_or_else(|| {
                MediaError::configuration(format!(
                    "CLOUDINARY_SIGNATURE_ALGORITHM must be sha1 or sha256, got '{}'",
                    name
                ))
            })?;
            config = config.with_signature_algorithm(algorithm);
        }
        Ok(config)
    }

    /// Point at a different API endpoint (tests, proxies)
    pub fn with_api_base<S: Into<String>>(mut self, base: S) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }
}

/// Cloudinary upload API client using chunked uploads
#[derive(Clone, Debug)]
pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MediaError::configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> MediaResult<Self> {
        Self::new(CloudinaryConfig::from_env()?)
    }

    fn upload_url(&self, request: &HostUpload) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.config.api_base, self.config.cloud_name, request.resource_type
        )
    }

    /// Parameters covered by the signature
    fn signed_params(request: &HostUpload, timestamp: i64) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        if !request.folder.is_empty() {
            params.insert("folder", request.folder.clone());
        }
        params.insert("timestamp", timestamp.to_string());
        params.insert("transformation", format!("q_{},f_auto", request.quality_policy));
        params
    }

    fn form_for(&self, params: &BTreeMap<&'static str, String>, signature: &str, chunk: bytes::Bytes) -> Form {
        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(*key, value.clone());
        }
        form.text("api_key", self.config.api_key.clone())
            .text("signature", signature.to_string())
            .part("file", Part::bytes(chunk.to_vec()).file_name("blob"))
    }

    async fn error_from_response(response: reqwest::Response) -> HostError {
        let status = response.status().as_u16();
        let code = match status {
            413 => HostErrorCode::FileTooLarge,
            401 | 403 | 404 => HostErrorCode::Misconfigured,
            408 | 499 => HostErrorCode::Timeout,
            415 => HostErrorCode::InvalidFileType,
            _ => HostErrorCode::Unknown,
        };
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);
        HostError::new(code, message).with_status(status)
    }

    fn transport_error(error: reqwest::Error) -> HostError {
        if error.is_timeout() {
            HostError::new(HostErrorCode::Timeout, format!("Request timed out: {}", error))
        } else {
            HostError::unknown(format!("Request failed: {}", error))
        }
    }
}

/// `digest(k1=v1&k2=v2...secret)` in hex, keys sorted
pub fn sign_params(
    params: &BTreeMap<&'static str, String>,
    api_secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, api_secret),
        SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, api_secret),
    }
}

fn hex_digest<D: Digest>(to_sign: &str, api_secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, request: HostUpload, mut body: ByteStream) -> Result<HostAsset, HostError> {
        if request.total_bytes == 0 {
            return Err(HostError::new(HostErrorCode::InvalidFileType, "Empty file"));
        }

        let url = self.upload_url(&request);
        let upload_id = Uuid::new_v4().simple().to_string();
        let params = Self::signed_params(&request, chrono::Utc::now().timestamp());
        let signature = sign_params(&params, &self.config.api_secret, self.config.signature_algorithm);
        let timeout = Duration::from_millis(request.timeout_ms);

        let mut offset = 0u64;
        let mut last_body: Option<String> = None;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| HostError::unknown(format!("Failed to read chunk: {}", e)))?;
            if chunk.is_empty() {
                continue;
            }
            let end = offset + chunk.len() as u64 - 1;

            let response = self
                .client
                .post(&url)
                .timeout(timeout)
                .header("X-Unique-Upload-Id", &upload_id)
                .header("Content-Range", format!("bytes {}-{}/{}", offset, end, request.total_bytes))
                .multipart(self.form_for(&params, &signature, chunk))
                .send()
                .await
                .map_err(Self::transport_error)?;

            if !response.status().is_success() {
                return Err(Self::error_from_response(response).await);
            }

            tracing::debug!(upload_id = %upload_id, offset, end, "chunk accepted");
            last_body = Some(response.text().await.map_err(Self::transport_error)?);
            offset = end + 1;
        }

        if offset != request.total_bytes {
            return Err(HostError::unknown(format!(
                "Stream ended after {} of {} bytes",
                offset, request.total_bytes
            )));
        }

        let text = last_body.unwrap_or_default();
        serde_json::from_str::<HostAsset>(&text)
            .map_err(|e| HostError::unknown(format!("Unexpected upload response: {}", e)))
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}
