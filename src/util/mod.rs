use crate::models::PLACEHOLDER_PREFIX;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";
const FALLBACK_FAVICON_DOMAIN: &str = "google.com";

/// Schemes written without an authority part.
const OPAQUE_SCHEMES: &[&str] = &["mailto:", "tel:"];

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// True when `raw` already names a scheme (`https://...`, `ftp://...`, `mailto:...`).
///
/// `host:port` is deliberately not a scheme, so `localhost:3000` still gets one.
pub(crate) fn has_scheme(raw: &str) -> bool {
    let s = raw.trim();
    let lower = s.to_ascii_lowercase();
    if OPAQUE_SCHEMES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }

    let Some((scheme, _)) = s.split_once("://") else {
        return false;
    };

    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Trim and prefix `https://` when no scheme is present.
pub(crate) fn normalize_url(raw: &str) -> String {
    let s = raw.trim();
    if has_scheme(s) {
        s.to_string()
    } else {
        format!("https://{s}")
    }
}

pub(crate) fn hostname(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .filter(|h| !h.is_empty())
}

/// Icon for a tile. Unparsable addresses get the default icon instead of
/// failing the render.
pub(crate) fn favicon_url(raw: &str) -> String {
    let domain = hostname(raw).unwrap_or_else(|| FALLBACK_FAVICON_DOMAIN.to_string());
    format!("{FAVICON_SERVICE}?domain={domain}&sz=128")
}

/// New `tmp-*` id for an optimistic row; `taken` guards against collisions.
pub(crate) fn placeholder_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = format!("{PLACEHOLDER_PREFIX}{:016x}", random_u64());
        if !taken(&id) {
            return id;
        }
    }
}

static COUNTER: AtomicUsize = AtomicUsize::new(1);

fn random_u64() -> u64 {
    let mut buf = [0u8; 8];
    if getrandom::getrandom(&mut buf).is_ok() {
        return u64::from_le_bytes(buf);
    }

    // No entropy source; a hashed counter is still unique per page load.
    let mut hasher = DefaultHasher::new();
    COUNTER.fetch_add(1, Ordering::SeqCst).hash(&mut hasher);
    hasher.finish()
}
