use std::sync::Arc;

use bytes::Bytes;
use tracing::Instrument;

use crate::host::{classify, HostUpload};
use crate::{
    ByteStream, MediaError, MediaHost, MediaResult, ResourceType, UploadResult, UploadTarget,
    UploaderConfig,
};

/// Streams in-memory payloads to the media host in bounded chunks
#[derive(Clone)]
pub struct StreamUploader {
    host: Arc<dyn MediaHost>,
    config: UploaderConfig,
}

impl StreamUploader {
    /// Create a new uploader for the given host
    pub fn new<H: MediaHost + 'static>(host: H, config: UploaderConfig) -> Self {
        Self {
            host: Arc::new(host),
            config,
        }
    }

    /// Create from a host that is already shared
    pub fn from_arc(host: Arc<dyn MediaHost>, config: UploaderConfig) -> Self {
        Self { host, config }
    }

    /// Upload one asset.
    ///
    /// The whole transfer is bounded by the configured timeout. Dropping the
    /// transfer future on timeout or error also drops the chunk stream, so
    /// nothing outlives this call. Failures are never retried.
    pub async fn upload(
        &self,
        data: Bytes,
        target: &UploadTarget,
        resource_type: ResourceType,
    ) -> MediaResult<UploadResult> {
        let request = HostUpload {
            folder: target.folder(),
            resource_type,
            quality_policy: self.config.quality_policy.clone(),
            chunk_size_bytes: self.config.chunk_size_bytes,
            timeout_ms: self.config.timeout_ms(),
            total_bytes: data.len() as u64,
        };

        let span = tracing::debug_span!(
            "media_upload",
            host = self.host.name(),
            folder = %request.folder,
            resource_type = %resource_type,
        );

        async {
            tracing::debug!(bytes = request.total_bytes, "starting upload");

            let body = chunk_stream(data, self.config.chunk_size_bytes);
            let transfer = self.host.upload(request.clone(), body);

            let asset = match tokio::time::timeout(self.config.timeout, transfer).await {
                Err(_) => {
                    tracing::warn!(timeout_ms = request.timeout_ms, "upload timed out");
                    return Err(MediaError::UploadTimeout {
                        timeout_ms: request.timeout_ms,
                    });
                }
                Ok(Err(host_error)) => {
                    let error = classify(&host_error, &request);
                    tracing::warn!(
                        kind = error.kind().name(),
                        host_message = %host_error,
                        "upload rejected by host"
                    );
                    return Err(error);
                }
                Ok(Ok(asset)) => asset,
            };

            if asset.secure_url.is_empty() || asset.public_id.is_empty() {
                return Err(MediaError::upload_failed("media host returned an incomplete asset")
                    .with_detail(format!("{:?}", asset)));
            }

            tracing::info!(public_id = %asset.public_id, bytes = asset.bytes, "upload complete");
            Ok(UploadResult::new(asset.secure_url, asset.public_id, asset.bytes))
        }
        .instrument(span)
        .await
    }

    /// Get configuration
    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }
}

/// Split a payload into a stream of `chunk_size` slices (the last may be shorter)
pub fn chunk_stream(data: Bytes, chunk_size: usize) -> ByteStream {
    let chunk_size = chunk_size.max(1);
    let stream = async_stream::stream! {
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + chunk_size).min(data.len());
            yield Ok::<Bytes, std::io::Error>(data.slice(offset..end));
            offset = end;
        }
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostAsset, HostError, HostErrorCode};
    use crate::MediaErrorKind;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        chunks: Arc<Mutex<Vec<usize>>>,
        requests: Arc<Mutex<Vec<HostUpload>>>,
    }

    #[async_trait]
    impl MediaHost for RecordingHost {
        async fn upload(&self, request: HostUpload, mut body: ByteStream) -> Result<HostAsset, HostError> {
            let mut total = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| HostError::unknown(e.to_string()))?;
                total += chunk.len() as u64;
                self.chunks.lock().await.push(chunk.len());
            }
            let public_id = format!("{}/asset", request.folder);
            self.requests.lock().await.push(request);
            Ok(HostAsset {
                secure_url: format!("https://cdn.test/{}", public_id),
                public_id,
                bytes: total,
            })
        }
    }

    struct StalledHost {
        guard: Arc<()>,
    }

    #[async_trait]
    impl MediaHost for StalledHost {
        async fn upload(&self, _request: HostUpload, _body: ByteStream) -> Result<HostAsset, HostError> {
            let _held = self.guard.clone();
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err(HostError::unknown("unreachable"))
        }
    }

    struct RejectingHost(HostError);

    #[async_trait]
    impl MediaHost for RejectingHost {
        async fn upload(&self, _request: HostUpload, _body: ByteStream) -> Result<HostAsset, HostError> {
            Err(self.0.clone())
        }
    }

    fn target() -> UploadTarget {
        UploadTarget::for_project("VDS_FOLDER", Some("Demo"), "UNKNOWN_PROJECT", 50)
    }

    #[tokio::test]
    async fn splits_payload_into_bounded_chunks() {
        let host = RecordingHost::default();
        let chunks = host.chunks.clone();
        let requests = host.requests.clone();
        let uploader = StreamUploader::new(host, UploaderConfig::default());

        let data = Bytes::from(vec![1u8; 13_000_000]);
        let result = uploader.upload(data, &target(), ResourceType::Auto).await.unwrap();

        assert_eq!(*chunks.lock().await, vec![6_000_000, 6_000_000, 1_000_000]);
        assert_eq!(result.size_bytes(), 13_000_000);
        assert_eq!(result.public_id(), "VDS_FOLDER/Demo/asset");

        let sent = requests.lock().await;
        assert_eq!(sent[0].folder, "VDS_FOLDER/Demo");
        assert_eq!(sent[0].quality_policy, "auto");
        assert_eq!(sent[0].timeout_ms, 60_000);
        assert_eq!(sent[0].total_bytes, 13_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_surfaces_and_releases_transfer() {
        let guard = Arc::new(());
        let uploader = StreamUploader::new(
            StalledHost { guard: guard.clone() },
            UploaderConfig::default(),
        );

        let err = uploader
            .upload(Bytes::from_static(b"gif89a"), &target(), ResourceType::Image)
            .await
            .unwrap_err();

        assert_eq!(err, MediaError::UploadTimeout { timeout_ms: 60_000 });
        // Ours plus the host's; a leaked transfer would hold a third
        assert_eq!(Arc::strong_count(&guard), 2);
        drop(uploader);
        assert_eq!(Arc::strong_count(&guard), 1);
    }

    #[tokio::test]
    async fn host_rejections_are_classified() {
        let cases = [
            (HostError::new(HostErrorCode::FileTooLarge, "too big"), MediaErrorKind::PayloadTooLarge),
            (HostError::new(HostErrorCode::InvalidFileType, "nope"), MediaErrorKind::UnsupportedFormat),
            (HostError::unknown("Upload preset not found"), MediaErrorKind::ConfigurationError),
            (HostError::unknown("kaboom"), MediaErrorKind::UploadFailed),
        ];

        for (host_error, kind) in cases {
            let uploader = StreamUploader::new(RejectingHost(host_error), UploaderConfig::default());
            let err = uploader
                .upload(Bytes::from_static(b"x"), &target(), ResourceType::Auto)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), kind);
        }
    }

    #[tokio::test]
    async fn chunk_stream_handles_empty_and_exact_sizes() {
        let empty: Vec<_> = chunk_stream(Bytes::new(), 4).collect().await;
        assert!(empty.is_empty());

        let exact: Vec<usize> = chunk_stream(Bytes::from_static(b"abcdefgh"), 4)
            .map(|c| c.unwrap().len())
            .collect()
            .await;
        assert_eq!(exact, vec![4, 4]);
    }
}
