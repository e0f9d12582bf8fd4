//! Image uploads and public file serving.

use actix_web::{HttpResponse, http::header, web};
use futures::StreamExt;
use uuid::Uuid;

use fellowship_core::{Action, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::UploadResponse;

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Image type detected from the leading bytes; the declared content type
/// is not trusted.
fn sniff_image(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(("jpg", "image/jpeg")),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(("png", "image/png")),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(("gif", "image/gif")),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
            Some(("webp", "image/webp"))
        }
        _ => None,
    }
}

/// POST /api/uploads
///
/// The request body is the raw image.
pub async fn upload(
    state: web::Data<AppState>,
    identity: Identity,
    mut payload: web::Payload,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Upload, Action::Create)
        .await?;

    let mut bytes = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(e.to_string()))?;
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "uploads are limited to {} bytes",
                MAX_UPLOAD_BYTES
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Err(AppError::BadRequest("empty upload".to_string()));
    }
    let (ext, content_type) = sniff_image(&bytes).ok_or_else(|| {
        AppError::UnsupportedMediaType("only jpeg, png, gif and webp images are accepted".to_string())
    })?;

    let name = format!("{}.{}", Uuid::new_v4(), ext);
    let url = state.storage.put(&name, &bytes, content_type).await?;

    tracing::info!(user_id = %identity.user_id, name = %name, size = bytes.len(), "Image uploaded");

    Ok(HttpResponse::Created().json(ApiResponse::ok(UploadResponse {
        url,
        size: bytes.len(),
    })))
}

/// GET /uploads/{name}
pub async fn serve(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let name = path.into_inner();
    let file = state
        .storage
        .get(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file {} not found", name)))?;

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, file.content_type))
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(file.bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{self, bearer, test_app};
    use actix_web::test;
    use fellowship_core::domain::Role;
    use serde_json::Value;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn upload_req(token: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/uploads")
            .insert_header(bearer(token))
            .insert_header((header::CONTENT_TYPE, "application/octet-stream"))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_upload_then_serve() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, token) = testing::user(&state, "Ana", Role::Member).await;

        let res = test::call_service(&app, upload_req(&token, PNG.to_vec()).to_request()).await;
        assert_eq!(res.status(), 201);
        let body: Value = test::read_body_json(res).await;
        let url = body["data"]["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/") && url.ends_with(".png"));
        assert_eq!(body["data"]["size"], PNG.len());

        let res = test::call_service(&app, test::TestRequest::get().uri(&url).to_request()).await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(test::read_body(res).await.as_ref(), PNG);
    }

    #[actix_web::test]
    async fn test_upload_rejections() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, token) = testing::user(&state, "Ana", Role::Member).await;

        let res = test::call_service(&app, upload_req(&token, Vec::new()).to_request()).await;
        assert_eq!(res.status(), 400);

        let res =
            test::call_service(&app, upload_req(&token, b"%PDF-1.7".to_vec()).to_request()).await;
        assert_eq!(res.status(), 415);

        let mut big = PNG.to_vec();
        big.resize(MAX_UPLOAD_BYTES + 1, 0);
        let res = test::call_service(&app, upload_req(&token, big).to_request()).await;
        assert_eq!(res.status(), 413);

        let req = test::TestRequest::post()
            .uri("/api/uploads")
            .set_payload(PNG.to_vec())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }

    #[actix_web::test]
    async fn test_serve_missing_file() {
        let state = testing::state();
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/uploads/missing.png").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }
}

#[cfg(test)]
mod sniff_tests {
    use super::sniff_image;

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(("jpg", "image/jpeg")));
        assert_eq!(sniff_image(b"GIF89a...."), Some(("gif", "image/gif")));
        assert_eq!(sniff_image(b"GIF87a...."), Some(("gif", "image/gif")));
        assert_eq!(sniff_image(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some(("webp", "image/webp")));
        assert_eq!(sniff_image(b"RIFF\x10\x00\x00\x00WAVE"), None);
        assert_eq!(sniff_image(b"<svg"), None);
    }
}
