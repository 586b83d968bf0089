//! Converts uploaded assets into inline request parts.

use super::gemini::types::InlineData;
use crate::models::ImageAsset;
use base64::Engine as _;

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Base64-encode an asset, keeping its declared mime type (PNG when empty).
pub fn encode_asset(asset: &ImageAsset) -> InlineData {
    InlineData {
        mime_type: mime_or_default(&asset.mime_type).to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(&asset.bytes),
    }
}

/// Wrap already-encoded image data, as returned by the provider.
pub fn inline_from_base64(mime_type: &str, data: &str) -> InlineData {
    InlineData {
        mime_type: mime_or_default(mime_type).to_string(),
        data: data.to_string(),
    }
}

fn mime_or_default(mime_type: &str) -> &str {
    let trimmed = mime_type.trim();
    if trimmed.is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        trimmed
    }
}
