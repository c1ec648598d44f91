//! Product image upload to object storage.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, JsonError};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Request body limit: the image plus multipart framing.
pub const BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// File extension for an accepted image content type.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn bad_request(message: impl Into<String>) -> JsonError {
    JsonError(AppError::BadRequest(message.into()))
}

/// Accept one `file` field and store it under `products/<uuid>.<ext>`.
#[instrument(skip(state, admin, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, JsonError> {
    let storage = state.storage()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let extension = image_extension(&content_type)
            .ok_or_else(|| bad_request("only JPEG, PNG and WebP images are accepted"))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("invalid upload: {e}")))?;
        if bytes.is_empty() {
            return Err(bad_request("file is empty"));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(bad_request("image must be 5 MB or smaller"));
        }

        let key = format!("products/{}.{extension}", Uuid::new_v4());
        let url = storage.put(&key, bytes.to_vec(), &content_type).await?;
        tracing::info!(admin = %admin.id, key = %key, "product image uploaded");

        return Ok(Json(UploadResponse { url }));
    }

    Err(bad_request("missing file field"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_web_images() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/webp"), Some("webp"));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(image_extension("image/gif"), None);
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("application/pdf"), None);
        assert_eq!(image_extension(""), None);
    }
}
