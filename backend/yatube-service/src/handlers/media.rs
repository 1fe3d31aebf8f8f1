/// Serving uploaded files from the media root
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Resolve a request path below `root`; anything that could leave it is refused.
pub fn resolve_media_path(root: &Path, requested: &str) -> Option<PathBuf> {
    let relative = Path::new(requested);
    if requested.is_empty() || requested.contains('\\') {
        return None;
    }
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn content_type_for(path: &Path) -> mime::Mime {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("bmp") => mime::IMAGE_BMP,
        Some("webp") => "image/webp"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

pub async fn serve_media(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let requested = path.into_inner();
    let file = resolve_media_path(&state.config.media.root, &requested)
        .ok_or_else(|| AppError::NotFound(format!("media {}", requested)))?;

    let missing = || AppError::NotFound(format!("media {}", requested));
    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(missing()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
        Err(e) => return Err(e.into()),
    }

    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
        Err(e) => return Err(e.into()),
    };
    debug!(path = %requested, bytes = bytes.len(), "Serving media file");

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&file))
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(bytes))
}
