use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value};

use crate::encoder::decode_with_limit;
use crate::sections::Section;
use crate::{
    MediaConfig, MediaError, MediaFile, MediaResult, RequestFiles, StreamUploader, UploadResult,
    UploadTarget,
};

pub const PREVIEW_URL_FIELD: &str = "previewImageUrl";
pub const PREVIEW_PUBLIC_ID_FIELD: &str = "previewImagePublicId";
pub const SECTIONS_FIELD: &str = "sections";
pub const NAME_FIELD: &str = "name";
pub const CLIENT_FIELD: &str = "client";
pub const COLLABORATORS_FIELD: &str = "collaborators";

/// Turns the files attached to a request into host URLs written back into its fields
pub struct UploadOrchestrator {
    uploader: StreamUploader,
    config: MediaConfig,
}

impl UploadOrchestrator {
    pub fn new(uploader: StreamUploader, config: MediaConfig) -> Self {
        Self { uploader, config }
    }

    /// Destination folder for the project named in `fields`
    pub fn target_for(&self, fields: &Map<String, Value>) -> UploadTarget {
        UploadTarget::for_project(
            &self.config.root_folder,
            fields.get(NAME_FIELD).and_then(Value::as_str),
            &self.config.default_project,
            self.config.max_project_segment,
        )
    }

    /// Upload every attached asset and return the enriched fields.
    ///
    /// The preview lands in `previewImageUrl`/`previewImagePublicId`; section
    /// files replace `sections` in attachment order. Any single failure fails
    /// the whole call and no enriched fields are returned.
    pub async fn process(
        &self,
        files: RequestFiles,
        mut fields: Map<String, Value>,
    ) -> MediaResult<Map<String, Value>> {
        let target = self.target_for(&fields);
        tracing::debug!(
            folder = %target,
            preview = files.preview.is_some(),
            sections = files.sections.len(),
            "processing request media"
        );

        let preview = async {
            match &files.preview {
                Some(file) => self.upload_file(file, &target).await.map(Some),
                None => Ok(None),
            }
        };
        let sections = self.upload_sections(&files.sections, &target);

        let (preview, sections) = futures::try_join!(preview, sections)?;

        if let Some(result) = preview {
            let (url, public_id, _) = result.into_parts();
            fields.insert(PREVIEW_URL_FIELD.to_string(), Value::String(url));
            fields.insert(PREVIEW_PUBLIC_ID_FIELD.to_string(), Value::String(public_id));
        }

        if let Some(sections) = sections {
            let value = serde_json::to_value(sections)
                .map_err(|e| MediaError::upload_failed("could not encode sections").with_detail(e.to_string()))?;
            fields.insert(SECTIONS_FIELD.to_string(), value);
        }

        self.clamp_fields(&mut fields);
        Ok(fields)
    }

    /// Upload inline base64 images found in `sections`.
    ///
    /// Every payload is decoded before anything is uploaded, so a malformed
    /// entry fails the call without touching the host.
    pub async fn resolve_inline_sections(
        &self,
        sections: Vec<Section>,
        target: &UploadTarget,
    ) -> MediaResult<Vec<Section>> {
        let mut decoded = Vec::new();
        for (index, section) in sections.iter().enumerate() {
            if section.has_inline_image() {
                let image = decode_with_limit(&section.content, self.config.max_decoded_bytes)?;
                decoded.push((index, image.bytes));
            }
        }

        if decoded.is_empty() {
            return Ok(sections);
        }

        let payloads: Vec<_> = decoded.iter().map(|(_, bytes)| bytes.clone()).collect();
        let results = self.upload_all(payloads, target).await?;

        let mut sections = sections;
        for ((index, _), result) in decoded.into_iter().zip(results) {
            let (url, public_id, _) = result.into_parts();
            let section = &mut sections[index];
            section.content = url;
            section.public_id = Some(public_id);
            section.needs_upload = false;
        }
        Ok(sections)
    }

    /// [`Self::resolve_inline_sections`] over a JSON request body
    pub async fn resolve_inline_fields(
        &self,
        mut fields: Map<String, Value>,
    ) -> MediaResult<Map<String, Value>> {
        let Some(raw) = fields.get(SECTIONS_FIELD) else {
            return Ok(fields);
        };
        let sections: Vec<Section> = serde_json::from_value(raw.clone())
            .map_err(|e| MediaError::invalid_format(format!("sections: {}", e)))?;

        let target = self.target_for(&fields);
        let resolved = self.resolve_inline_sections(sections, &target).await?;
        let value = serde_json::to_value(resolved)
            .map_err(|e| MediaError::upload_failed("could not encode sections").with_detail(e.to_string()))?;
        fields.insert(SECTIONS_FIELD.to_string(), value);
        Ok(fields)
    }

    async fn upload_file(&self, file: &MediaFile, target: &UploadTarget) -> MediaResult<UploadResult> {
        self.uploader
            .upload(file.data.clone(), target, self.uploader.config().resource_type)
            .await
    }

    async fn upload_sections(
        &self,
        files: &[MediaFile],
        target: &UploadTarget,
    ) -> MediaResult<Option<Vec<Section>>> {
        if files.is_empty() {
            return Ok(None);
        }

        let payloads = files.iter().map(|f| f.data.clone()).collect();
        let results = self.upload_all(payloads, target).await?;

        Ok(Some(
            results
                .into_iter()
                .enumerate()
                .map(|(order, result)| Section::uploaded_image(result, order as u32))
                .collect(),
        ))
    }

    /// Upload payloads concurrently; results come back in input order.
    ///
    /// Each task carries its index and writes into its own slot, so completion
    /// order never leaks into the output. The first error drops the rest.
    async fn upload_all(
        &self,
        payloads: Vec<bytes::Bytes>,
        target: &UploadTarget,
    ) -> MediaResult<Vec<UploadResult>> {
        let resource_type = self.uploader.config().resource_type;
        let mut slots: Vec<Option<UploadResult>> = vec![None; payloads.len()];

        let mut tasks: FuturesUnordered<_> = payloads
            .into_iter()
            .enumerate()
            .map(|(index, data)| async move {
                let result = self.uploader.upload(data, target, resource_type).await;
                (index, result)
            })
            .collect();

        while let Some((index, result)) = tasks.next().await {
            match result {
                Ok(uploaded) => slots[index] = Some(uploaded),
                Err(error) => {
                    tracing::warn!(index, kind = error.kind().name(), "asset upload failed, aborting request");
                    return Err(error);
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| MediaError::upload_failed(format!("asset {} produced no result", index)))
            })
            .collect()
    }

    /// Clamp pass-through text fields to their limits (characters, not bytes)
    fn clamp_fields(&self, fields: &mut Map<String, Value>) {
        let limits = &self.config.limits;
        for (key, limit) in [
            (CLIENT_FIELD, limits.client),
            (COLLABORATORS_FIELD, limits.collaborators),
            (NAME_FIELD, limits.name),
        ] {
            if let Some(Value::String(value)) = fields.get_mut(key) {
                if value.chars().count() > limit {
                    *value = value.chars().take(limit).collect();
                }
            }
        }
    }

    /// Get configuration
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }
}
