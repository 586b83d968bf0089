//! Pulls inline image payloads out of a `generateContent` response.
//!
//! The response is walked as untyped JSON. Every level may be missing and the
//! inline container may be spelled `inlineData` or `inline_data`; a missing
//! level contributes no images rather than an error.

use crate::error::EmptyResponseKind;
use serde_json::Value;

/// Image data strings across all candidates, in candidate then part order.
///
/// Fails only when `candidates` itself is absent. An empty `candidates` array,
/// or candidates without image parts, yield an empty list; deciding whether
/// that is an error is left to the caller.
pub fn extract_images(response: &Value) -> Result<Vec<String>, EmptyResponseKind> {
    let candidates = match response.get("candidates") {
        None | Some(Value::Null) => return Err(EmptyResponseKind::NoCandidates),
        Some(value) => value.as_array().map(Vec::as_slice).unwrap_or_default(),
    };

    let images = candidates
        .iter()
        .flat_map(|candidate| {
            candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
        })
        .filter_map(part_image_data)
        .map(str::to_string)
        .collect();

    Ok(images)
}

fn part_image_data(part: &Value) -> Option<&str> {
    ["inlineData", "inline_data"]
        .iter()
        .filter_map(|key| part.get(*key))
        .filter_map(|inline| inline.get("data").and_then(Value::as_str))
        .find(|data| !data.is_empty())
}
