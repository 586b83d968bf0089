//! Magic-byte sniffing for uploads that arrive without a declared type.

const FALLBACK_MIME: &str = "image/png";

/// Recognizes the formats the provider accepts as inline image data.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        _ => None,
    }
}

/// Sniffed mime type, or PNG when the format is not recognized.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    sniff_image_mime(bytes).unwrap_or_else(|| {
        tracing::warn!(
            "Unrecognized image header {:02X?}, assuming {}",
            &bytes[..bytes.len().min(4)],
            FALLBACK_MIME
        );
        FALLBACK_MIME
    })
}

/// File extension used when writing an image of this type to disk.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
