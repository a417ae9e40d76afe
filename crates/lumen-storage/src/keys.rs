//! Media key derivation and parsing.
//!
//! Key format: `{sha256 hex}/{normalized name}{ext}`, where the extension comes
//! from the master's format and never from the client-supplied name.

use lumen_core::models::MediaFormat;

use crate::traits::{StorageError, StorageResult};

pub const MAX_NAME_LENGTH: usize = 100;
pub const FALLBACK_NAME: &str = "image";
const DIGEST_LENGTH: usize = 64;

/// Normalize a client file name into a lower-case, URL-safe stem.
///
/// Directory components and the extension are dropped, the rest is
/// lower-cased, and anything outside `[a-z0-9-_.]` becomes a dash. Runs of
/// dashes or dots collapse, separators are trimmed from both ends, and the
/// result is capped at [`MAX_NAME_LENGTH`] characters. Names with nothing
/// usable become `image`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    let mut out = String::with_capacity(stem.len());
    for ch in stem.to_lowercase().chars() {
        let ch = if is_name_char(ch) { ch } else { '-' };
        if (ch == '-' || ch == '.') && out.ends_with(ch) {
            continue;
        }
        out.push(ch);
    }

    let name: String = out
        .trim_matches(is_separator)
        .chars()
        .take(MAX_NAME_LENGTH)
        .collect();
    let name = name.trim_end_matches(is_separator);

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '.')
}

fn is_separator(ch: char) -> bool {
    matches!(ch, '-' | '_' | '.')
}

/// Build the media key for a master.
pub fn derive_key(digest: &str, original_name: &str, format: MediaFormat) -> String {
    format!(
        "{}/{}{}",
        digest,
        sanitize_file_name(original_name),
        format.extension()
    )
}

/// Components of a validated media key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub digest: &'a str,
    pub file_name: &'a str,
    /// File name without the extension.
    pub stem: &'a str,
    pub format: MediaFormat,
}

fn invalid(key: &str) -> StorageError {
    StorageError::InvalidKey(format!("not a media key: {}", key))
}

pub fn is_digest(value: &str) -> bool {
    value.len() == DIGEST_LENGTH
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Validate a key and split it into its parts. Anything this module could
/// not have produced is rejected, which also rules out path traversal.
pub fn parse_key(key: &str) -> StorageResult<ParsedKey<'_>> {
    let (digest, file_name) = key.split_once('/').ok_or_else(|| invalid(key))?;
    if !is_digest(digest) {
        return Err(invalid(key));
    }

    let (stem, ext) = file_name.rsplit_once('.').ok_or_else(|| invalid(key))?;
    let stem_ok = !stem.is_empty()
        && stem.len() <= MAX_NAME_LENGTH
        && !stem.starts_with(is_separator)
        && !stem.ends_with(is_separator)
        && !stem.contains("..")
        && stem.chars().all(is_name_char);
    if !stem_ok {
        return Err(invalid(key));
    }

    let format = match ext {
        "jpg" => MediaFormat::Jpeg,
        "png" => MediaFormat::Png,
        "webp" => MediaFormat::WebP,
        "avif" => MediaFormat::Avif,
        _ => return Err(invalid(key)),
    };

    Ok(ParsedKey {
        digest,
        file_name,
        stem,
        format,
    })
}
