use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::host::{HostAsset, HostError, HostUpload};
use crate::{ByteStream, MediaHost, ResourceType};

/// An asset held by [`MemoryHost`]
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub public_id: String,
    pub folder: String,
    pub resource_type: ResourceType,
    pub data: Bytes,
    pub chunks: usize,
}

/// Scripted behavior for uploads whose payload matches exactly
#[derive(Debug, Clone)]
struct Rule {
    payload: Bytes,
    delay: Option<Duration>,
    error: Option<HostError>,
}

/// In-memory media host for local development and tests.
///
/// Uploads can be delayed or failed per payload, which makes completion
/// order and partial failures reproducible.
#[derive(Debug)]
pub struct MemoryHost {
    base_url: String,
    rules: Vec<Rule>,
    assets: RwLock<BTreeMap<String, StoredAsset>>,
    completed: RwLock<Vec<String>>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::with_base_url("https://media.local")
    }

    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rules: Vec::new(),
            assets: RwLock::new(BTreeMap::new()),
            completed: RwLock::new(Vec::new()),
        }
    }

    /// Hold uploads of exactly `payload` for `delay` before storing them
    pub fn delay_payload<B: Into<Bytes>>(mut self, payload: B, delay: Duration) -> Self {
        self.rules.push(Rule {
            payload: payload.into(),
            delay: Some(delay),
            error: None,
        });
        self
    }

    /// Reject uploads of exactly `payload` with `error`
    pub fn fail_payload<B: Into<Bytes>>(mut self, payload: B, error: HostError) -> Self {
        self.rules.push(Rule {
            payload: payload.into(),
            delay: None,
            error: Some(error),
        });
        self
    }

    pub async fn get(&self, public_id: &str) -> Option<StoredAsset> {
        self.assets.read().await.get(public_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }

    /// Public ids in the order their uploads finished
    pub async fn completion_order(&self) -> Vec<String> {
        self.completed.read().await.clone()
    }

    fn rule_for(&self, data: &[u8]) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.payload.as_ref() == data)
    }
}

#[async_trait]
impl MediaHost for MemoryHost {
    async fn upload(&self, request: HostUpload, mut body: ByteStream) -> Result<HostAsset, HostError> {
        let mut buffer = BytesMut::with_capacity(request.total_bytes as usize);
        let mut chunks = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| HostError::unknown(format!("Failed to read chunk: {}", e)))?;
            buffer.extend_from_slice(&chunk);
            chunks += 1;
        }
        drop(body);
        let data = buffer.freeze();

        if let Some(rule) = self.rule_for(&data) {
            if let Some(delay) = rule.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = &rule.error {
                return Err(error.clone());
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        let public_id = if request.folder.is_empty() {
            id
        } else {
            format!("{}/{}", request.folder, id)
        };
        let kind = match request.resource_type {
            ResourceType::Auto => ResourceType::Image,
            other => other,
        };
        let asset = HostAsset {
            secure_url: format!("{}/{}/upload/{}", self.base_url, kind, public_id),
            public_id: public_id.clone(),
            bytes: data.len() as u64,
        };

        self.assets.write().await.insert(
            public_id.clone(),
            StoredAsset {
                public_id: public_id.clone(),
                folder: request.folder,
                resource_type: kind,
                data,
                chunks,
            },
        );
        self.completed.write().await.push(public_id);

        Ok(asset)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
