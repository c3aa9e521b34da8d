use serde::Serialize;
use tracing::warn;

use tradegenie_utils::image::png_data_url;

/// How closely the provider should look at each image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    High,
    Low,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ImageUrl {
    url: String,
    detail: ImageDetail,
}

/// Text part first, then one PNG data URL per chart. Oversized images are
/// replaced by a text note so the model knows a chart is missing.
pub(crate) async fn vision_content(
    prompt: &str,
    images: Vec<Vec<u8>>,
    detail: ImageDetail,
    max_image_bytes: usize,
) -> Vec<ContentPart> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::Text {
        text: prompt.to_owned(),
    });

    for (idx, bytes) in images.into_iter().enumerate() {
        let number = idx + 1;
        if bytes.len() > max_image_bytes {
            warn!(
                image = number,
                bytes = bytes.len(),
                max_bytes = max_image_bytes,
                "image too large for vision request; skipping"
            );
            parts.push(ContentPart::Text {
                text: format!("Warning: Image {number} was too large and was not processed."),
            });
            continue;
        }

        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: png_data_url(bytes).await,
                detail,
            },
        });
    }

    parts
}
