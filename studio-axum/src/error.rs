use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use studio_media::{MediaError, MediaErrorKind};

/// HTTP rendering of a classified media error
#[derive(Debug)]
pub struct MediaErrorResponse(pub MediaError);

impl From<MediaError> for MediaErrorResponse {
    fn from(e: MediaError) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: MediaErrorKind) -> StatusCode {
    match kind {
        MediaErrorKind::InvalidFormat => StatusCode::BAD_REQUEST,
        MediaErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        MediaErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        MediaErrorKind::UploadTimeout => StatusCode::GATEWAY_TIMEOUT,
        MediaErrorKind::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
        MediaErrorKind::UploadFailed => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for MediaErrorResponse {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        // Host text only ever travels in `data.detail`, never in `message`
        let body = json!({
            "name": kind.name(),
            "message": self.0.user_message(),
            "code": status.as_u16(),
            "className": kind.class_name(),
            "data": {
                "detail": self.0.detail(),
            },
        });
        (status, Json(body)).into_response()
    }
}

/// 400 response for requests the middleware cannot parse
pub fn bad_request(message: impl Into<String>) -> Response {
    let body = json!({
        "name": "BadRequest",
        "message": message.into(),
        "code": 400,
        "className": "bad-request",
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
