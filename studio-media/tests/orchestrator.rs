use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Map, Value};
use studio_media::{
    HostError, HostErrorCode, MediaConfig, MediaError, MediaErrorKind, MediaFile, MediaHost,
    MemoryHost, RequestFiles, StreamUploader, UploadOrchestrator, UploaderConfig,
};

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn orchestrator(host: Arc<MemoryHost>) -> UploadOrchestrator {
    let shared: Arc<dyn MediaHost> = host;
    UploadOrchestrator::new(
        StreamUploader::from_arc(shared, UploaderConfig::default()),
        MediaConfig::default(),
    )
}

fn section(payload: &'static [u8]) -> MediaFile {
    MediaFile::new("sections", Bytes::from_static(payload)).with_content_type("image/png")
}

#[tokio::test]
async fn preview_upload_fills_url_and_public_id() {
    let host = Arc::new(MemoryHost::new());
    let files = RequestFiles::new()
        .with_preview(MediaFile::new("previewImage", Bytes::from_static(b"preview-bytes")));

    let out = orchestrator(host.clone())
        .process(files, fields(json!({"name": "My   Project", "client": "ACME"})))
        .await
        .unwrap();

    let public_id = out["previewImagePublicId"].as_str().unwrap();
    assert!(public_id.starts_with("VDS_FOLDER/My_Project/"));
    assert!(out["previewImageUrl"].as_str().unwrap().ends_with(public_id));
    assert_eq!(out["name"], "My   Project");
    assert_eq!(out["client"], "ACME");

    let stored = host.get(public_id).await.unwrap();
    assert_eq!(stored.folder, "VDS_FOLDER/My_Project");
    assert_eq!(stored.data.as_ref(), b"preview-bytes");
}

#[tokio::test]
async fn missing_name_falls_back_to_default_folder() {
    let host = Arc::new(MemoryHost::new());
    let files = RequestFiles::new().with_preview(MediaFile::new("previewImage", Bytes::from_static(b"p")));

    let out = orchestrator(host).process(files, Map::new()).await.unwrap();

    assert!(out["previewImagePublicId"]
        .as_str()
        .unwrap()
        .starts_with("VDS_FOLDER/UNKNOWN_PROJECT/"));
}

#[tokio::test(start_paused = true)]
async fn sections_keep_attachment_order_when_uploads_finish_out_of_order() {
    let host = Arc::new(
        MemoryHost::new()
            .delay_payload(Bytes::from_static(b"section-0"), Duration::from_millis(50))
            .delay_payload(Bytes::from_static(b"section-2"), Duration::from_millis(30)),
    );
    let files = RequestFiles::new()
        .with_section(section(b"section-0"))
        .with_section(section(b"section-1"))
        .with_section(section(b"section-2"));

    let out = orchestrator(host.clone())
        .process(files, fields(json!({"name": "Ordered"})))
        .await
        .unwrap();

    let sections = out["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 3);

    let completed = host.completion_order().await;
    assert_eq!(completed[0], sections[1]["publicId"].as_str().unwrap());

    for (index, section) in sections.iter().enumerate() {
        assert_eq!(section["type"], "image");
        assert_eq!(section["order"], index);
        assert!(section.get("_needsUpload").is_none());

        let public_id = section["publicId"].as_str().unwrap();
        assert!(section["content"].as_str().unwrap().ends_with(public_id));
        let stored = host.get(public_id).await.unwrap();
        assert_eq!(stored.data.as_ref(), format!("section-{}", index).as_bytes());
    }
}

#[tokio::test(start_paused = true)]
async fn one_section_timing_out_fails_the_whole_request() {
    let host = Arc::new(
        MemoryHost::new().delay_payload(Bytes::from_static(b"slow"), Duration::from_secs(120)),
    );
    let files = RequestFiles::new()
        .with_section(section(b"fast"))
        .with_section(section(b"slow"));

    let err = orchestrator(host)
        .process(files, fields(json!({"name": "Timeout"})))
        .await
        .unwrap_err();

    assert_eq!(err, MediaError::UploadTimeout { timeout_ms: 60_000 });
}

#[tokio::test]
async fn preview_rejection_is_classified_and_aborts() {
    let host = Arc::new(MemoryHost::new().fail_payload(
        Bytes::from_static(b"not-an-image"),
        HostError::new(HostErrorCode::InvalidFileType, "Invalid image file"),
    ));
    let files = RequestFiles::new()
        .with_preview(MediaFile::new("previewImage", Bytes::from_static(b"not-an-image")))
        .with_section(section(b"fine"));

    let err = orchestrator(host)
        .process(files, fields(json!({"name": "Broken"})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), MediaErrorKind::UnsupportedFormat);
}

#[tokio::test]
async fn text_fields_are_clamped_by_characters() {
    let host = Arc::new(MemoryHost::new());
    let input = fields(json!({
        "name": "é".repeat(300),
        "client": "c".repeat(150),
        "collaborators": "x".repeat(250),
        "description": "d".repeat(1000),
        "featured": true,
    }));

    let out = orchestrator(host.clone())
        .process(RequestFiles::new(), input)
        .await
        .unwrap();

    assert_eq!(out["name"].as_str().unwrap().chars().count(), 255);
    assert_eq!(out["client"].as_str().unwrap().len(), 100);
    assert_eq!(out["collaborators"].as_str().unwrap().len(), 200);
    assert_eq!(out["description"].as_str().unwrap().len(), 1000);
    assert_eq!(out["featured"], true);
    assert!(out.get("sections").is_none());
    assert!(host.is_empty().await);
}

#[tokio::test]
async fn inline_sections_are_decoded_and_uploaded() {
    let host = Arc::new(MemoryHost::new());
    let body = fields(json!({
        "name": "Inline",
        "sections": [
            {"type": "text", "content": "Intro", "order": 0},
            {"type": "image", "content": "data:image/png;base64,iVBORw0K", "order": 1},
            {"type": "image", "content": "https://cdn.test/existing.png", "order": 2, "publicId": "old"}
        ]
    }));

    let out = orchestrator(host.clone()).resolve_inline_fields(body).await.unwrap();
    let sections = out["sections"].as_array().unwrap();

    assert_eq!(sections[0], json!({"type": "text", "content": "Intro", "order": 0}));
    assert_eq!(sections[2]["publicId"], "old");

    let public_id = sections[1]["publicId"].as_str().unwrap();
    assert!(public_id.starts_with("VDS_FOLDER/Inline/"));
    assert!(sections[1]["content"].as_str().unwrap().starts_with("https://"));
    assert_eq!(host.len().await, 1);
}

#[tokio::test]
async fn bad_inline_section_fails_before_any_upload() {
    let host = Arc::new(MemoryHost::new());
    let body = fields(json!({
        "sections": [
            {"type": "image", "content": "data:image/png;base64,iVBORw0K", "order": 0},
            {"type": "image", "content": "data:image/bmp;base64,AAAA", "order": 1}
        ]
    }));

    let err = orchestrator(host.clone()).resolve_inline_fields(body).await.unwrap_err();

    assert_eq!(err, MediaError::unsupported_format("bmp"));
    assert!(host.is_empty().await);
}
