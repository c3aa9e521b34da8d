use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use tracing::{error, warn};

/// Re-encode `bytes` as PNG.
///
/// Input that cannot be decoded (or re-encoded) is returned unchanged, so a
/// malformed upload still reaches the downstream API which then decides.
pub fn convert_image_to_png(bytes: &[u8]) -> Vec<u8> {
    match encode_png(bytes) {
        Ok(png) => png,
        Err(err) => {
            warn!(
                ?err,
                bytes = bytes.len(),
                "failed to convert image to PNG; forwarding original bytes"
            );
            bytes.to_vec()
        }
    }
}

fn encode_png(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let mut out = Cursor::new(Vec::with_capacity(bytes.len()));
    decoded.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// PNG-normalize `bytes` and encode them as standard Base64.
pub fn image_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(convert_image_to_png(bytes))
}

/// Same as [`image_to_base64`], run on the blocking pool.
///
/// Decoding a large chart screenshot takes long enough to stall other tasks on
/// the runtime, so async callers should go through this instead.
pub async fn image_to_base64_async(bytes: Vec<u8>) -> String {
    let bytes: Arc<[u8]> = bytes.into();
    let worker_bytes = Arc::clone(&bytes);

    match tokio::task::spawn_blocking(move || image_to_base64(&worker_bytes)).await {
        Ok(encoded) => encoded,
        Err(err) => {
            error!(
                ?err,
                bytes = bytes.len(),
                "image encoding task failed; encoding original bytes"
            );
            STANDARD.encode(&bytes[..])
        }
    }
}

/// Build a `data:` URL for OpenAI-style `image_url` content parts.
pub async fn png_data_url(bytes: Vec<u8>) -> String {
    format!("data:image/png;base64,{}", image_to_base64_async(bytes).await)
}
