use crate::{config::Config, errors::ApiError};
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::TryStreamExt as _;
use sanitize_filename::sanitize;
use std::io::Write;
use std::path::Path;

/// Store an uploaded image under the uploads dir and return the public
/// URL for it. Only image payloads are accepted (sniffed, not trusted
/// from the filename).
pub async fn save_image_field(
    cfg: &Config,
    mut field: actix_multipart::Field,
) -> Result<String, ApiError> {
    let content_disposition = field.content_disposition().cloned();
    let original = content_disposition
        .and_then(|cd| cd.get_filename().map(|s| s.to_string()))
        .unwrap_or_else(|| "upload.bin".into());
    let original_safe = sanitize(&original);

    let mut data: Vec<u8> = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > cfg.max_upload_size {
            return Err(ApiError::BadRequest("file too large".into()));
        }
    }

    match infer::get(&data) {
        Some(t) if t.mime_type().starts_with("image/") => {}
        _ => return Err(ApiError::BadRequest("only image uploads are allowed".into())),
    }

    let ext = Path::new(&original_safe)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bin");
    let stored_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let path = Path::new(&cfg.uploads_dir).join(&stored_name);
    let mut f = std::fs::File::create(&path)?;
    f.write_all(&data)?;

    Ok(format!("/files/{stored_name}"))
}

/// Delete a stored image given its public URL, ignoring files already gone.
pub fn remove_image(cfg: &Config, image_url: &str) {
    let Some(name) = image_url.strip_prefix("/files/") else {
        return;
    };
    let path = Path::new(&cfg.uploads_dir).join(sanitize(name));
    if path.exists() {
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("failed to remove image {name}: {e}");
        }
    }
}

pub async fn get_file(
    cfg: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    // sanitize squashes any traversal attempt in the name segment
    let name = sanitize(&path.into_inner());
    let p = Path::new(&cfg.uploads_dir).join(&name);
    if !p.exists() {
        return Err(ApiError::NotFound);
    }

    let named = actix_files::NamedFile::open_async(p)
        .await
        .map_err(|_| ApiError::Internal)?
        .use_last_modified(true)
        .prefer_utf8(true);
    Ok(named.into_response(&req))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_image_ignores_foreign_urls() {
        let cfg = Config::for_tests();
        // nothing to assert beyond not panicking on odd inputs
        remove_image(&cfg, "https://elsewhere.example/pic.png");
        remove_image(&cfg, "/files/../../etc/passwd");
        remove_image(&cfg, "/files/does-not-exist.png");
    }
}
