//! Filename sanitization, stem matching, and extension derivation.
//!
//! Destinations are built from a dot-free *stem* (`Midnight_Run_trailer`) plus
//! an extension chosen once the server has been probed. Matching existing
//! files therefore only ever compares the text before the first `.`.

use url::Url;

use super::constants::FALLBACK_EXTENSION;

/// Longest sanitized name we emit, in characters.
const MAX_NAME_CHARS: usize = 180;

/// Makes an arbitrary string safe as a single path segment.
///
/// Reserved characters and control characters become `_`, surrounding spaces
/// and dots are trimmed, and the result is capped in length. Empty results and
/// dot segments fall back to `file`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == ' ' || c == '.');
    let capped: String = trimmed.chars().take(MAX_NAME_CHARS).collect();
    let capped = capped.trim_end_matches(|c: char| c == ' ' || c == '.');
    if capped.is_empty() {
        "file".to_string()
    } else {
        capped.to_string()
    }
}

/// Sanitizes a value for use inside a file stem: no dots, no whitespace runs.
#[must_use]
pub fn stem_component(value: &str) -> String {
    let safe = sanitize_filename(value);
    let mut out = String::with_capacity(safe.len());
    let mut prev_sep = false;
    for ch in safe.chars() {
        let mapped = if ch.is_whitespace() || ch == '.' || ch == '_' {
            '_'
        } else {
            ch
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
            }
            prev_sep = true;
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    let out = out.trim_matches('_');
    if out.is_empty() {
        "file".to_string()
    } else {
        out.to_string()
    }
}

/// Case-folded stem of a file name: everything before the first `.`.
#[must_use]
pub fn stem_key(file_name: &str) -> String {
    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Chooses the final extension (with leading dot) for a fetched asset.
///
/// Priority: Content-Disposition filename, URL path, content type, `.bin`.
#[must_use]
pub fn choose_extension(
    disposition_name: Option<&str>,
    url: &str,
    content_type: Option<&str>,
) -> String {
    disposition_name
        .and_then(extension_from_name)
        .or_else(|| extension_from_url(url))
        .or_else(|| content_type.and_then(extension_from_content_type).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Extension of the last URL path segment, lowercased.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last_segment).ok()?;
    extension_from_name(&decoded)
}

fn extension_from_name(name: &str) -> Option<String> {
    let dot_index = name.rfind('.')?;
    let ext = &name[dot_index + 1..];
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Maps a Content-Type to an extension for the media festivals actually receive.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "video/mp4" => Some(".mp4"),
        "video/quicktime" => Some(".mov"),
        "video/x-matroska" => Some(".mkv"),
        "video/webm" => Some(".webm"),
        "video/x-msvideo" => Some(".avi"),
        "application/zip" | "application/x-zip-compressed" => Some(".zip"),
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/tiff" => Some(".tif"),
        "application/pdf" => Some(".pdf"),
        "audio/wav" | "audio/x-wav" => Some(".wav"),
        _ => None,
    }
}

/// Parses a Content-Disposition header to extract the filename.
///
/// Handles `filename="a.mov"`, `filename=a.mov`, and RFC 5987 `filename*=UTF-8''a.mov`
/// (the encoded form wins when both are present).
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        return stripped.find('"').map(|end| stripped[..end].to_string());
    }
    let end = value.find(';').unwrap_or(value.len());
    let filename = value[..end].trim();
    (!filename.is_empty()).then(|| filename.to_string())
}
