//! Project content sections and the sanitizer that keeps inline base64
//! images out of persisted records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::encoder::is_base64_image;
use crate::UploadResult;

/// Kind of content a section holds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Image,
    Text,
    Video,
    #[serde(untagged)]
    Other(String),
}

/// A content block within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionKind,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub order: u32,

    #[serde(rename = "publicId", default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,

    /// Pending-upload marker
    #[serde(rename = "_needsUpload", default, skip_serializing_if = "is_false")]
    pub needs_upload: bool,

    /// Fields this crate does not interpret, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Section {
    pub fn new<S: Into<String>>(kind: SectionKind, content: S, order: u32) -> Self {
        Self {
            kind,
            content: content.into(),
            order,
            public_id: None,
            needs_upload: false,
            extra: Map::new(),
        }
    }

    /// An image section backed by a finished upload
    pub fn uploaded_image(result: UploadResult, order: u32) -> Self {
        let (url, public_id, _) = result.into_parts();
        Self {
            public_id: Some(public_id),
            ..Self::new(SectionKind::Image, url, order)
        }
    }

    /// Image section whose content is still an inline base64 payload
    pub fn has_inline_image(&self) -> bool {
        self.kind == SectionKind::Image && is_base64_image(&self.content)
    }
}

/// Strip inline base64 payloads from image sections.
///
/// Affected sections get empty content and the pending-upload marker;
/// everything else passes through untouched. Running it twice changes nothing.
pub fn sanitize(sections: Vec<Section>) -> Vec<Section> {
    sections
        .into_iter()
        .map(|section| {
            if section.has_inline_image() {
                Section {
                    content: String::new(),
                    needs_upload: true,
                    ..section
                }
            } else {
                section
            }
        })
        .collect()
}

/// Same as [`sanitize`] but on raw JSON, keeping entries that are not sections
pub fn sanitize_json(sections: &Value) -> Value {
    let Some(items) = sections.as_array() else {
        return sections.clone();
    };

    Value::Array(
        items
            .iter()
            .map(|item| {
                let is_inline_image = item.get("type").and_then(Value::as_str) == Some("image")
                    && item
                        .get("content")
                        .and_then(Value::as_str)
                        .is_some_and(is_base64_image);

                let mut item = item.clone();
                if is_inline_image {
                    if let Some(obj) = item.as_object_mut() {
                        obj.insert("content".to_string(), Value::String(String::new()));
                        obj.insert("_needsUpload".to_string(), Value::Bool(true));
                    }
                }
                item
            })
            .collect(),
    )
}

/// Sanitize the `sections` entry of a request body in place, if present
pub fn sanitize_fields(fields: &mut Map<String, Value>) {
    if let Some(sections) = fields.get_mut("sections") {
        *sections = sanitize_json(sections);
    }
}

/// Number of sections still waiting for an upload
pub fn pending_count(sections: &[Section]) -> usize {
    sections.iter().filter(|s| s.needs_upload).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Section> {
        vec![
            Section::new(SectionKind::Text, "Intro", 0),
            Section::new(SectionKind::Image, "data:image/png;base64,AAAA", 1),
            Section::new(SectionKind::Image, "https://cdn.test/a.png", 2),
            Section::new(SectionKind::Text, "data:image/png;base64,AAAA", 3),
        ]
    }

    #[test]
    fn strips_only_inline_image_payloads() {
        let cleaned = sanitize(sample());

        assert_eq!(cleaned[0], sample()[0]);
        assert_eq!(cleaned[1].content, "");
        assert!(cleaned[1].needs_upload);
        assert_eq!(cleaned[1].order, 1);
        assert_eq!(cleaned[2], sample()[2]);
        assert_eq!(cleaned[3], sample()[3]);
        assert_eq!(pending_count(&cleaned), 1);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize(sample());
        let twice = sanitize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn no_image_section_keeps_inline_payload() {
        for section in sanitize(sample()) {
            if section.kind == SectionKind::Image {
                assert!(!is_base64_image(&section.content));
                assert!(!section.content.is_empty() || section.needs_upload);
            }
        }
    }

    #[test]
    fn json_shape_round_trips_with_unknown_fields() {
        let raw = json!({"type": "gallery", "content": "x", "order": 4, "caption": "hi"});
        let section: Section = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(section.kind, SectionKind::Other("gallery".to_string()));
        assert_eq!(section.extra["caption"], "hi");
        assert_eq!(serde_json::to_value(&section).unwrap(), raw);
    }

    #[test]
    fn sanitize_fields_rewrites_sections_array() {
        let mut fields = json!({
            "name": "Demo",
            "sections": [
                {"type": "image", "content": "data:image/gif;base64,R0lG", "order": 0, "caption": "c"},
                {"type": "text", "content": "hello", "order": 1}
            ]
        })
        .as_object()
        .cloned()
        .unwrap();

        sanitize_fields(&mut fields);
        let again = {
            let mut copy = fields.clone();
            sanitize_fields(&mut copy);
            copy
        };

        assert_eq!(
            fields["sections"],
            json!([
                {"type": "image", "content": "", "order": 0, "caption": "c", "_needsUpload": true},
                {"type": "text", "content": "hello", "order": 1}
            ])
        );
        assert_eq!(fields, again);
    }
}
