//! Path rewriting for proxied requests.
//!
//! Incoming paths have the shape `/t/<slug>/<rest...>`; the upstream sees
//! `/<rest...>`. Query strings never reach this module, the caller carries
//! them alongside the rewritten path unchanged.

/// Literal first segment of the proxy namespace.
pub const PROXY_PREFIX: &str = "t";

/// Extract the slug from a `/t/<slug>[/...]` path.
///
/// Returns `None` for paths outside the proxy namespace or with an empty slug.
pub fn extract_slug(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?.strip_prefix(PROXY_PREFIX)?;
    let rest = rest.strip_prefix('/')?;
    let slug = rest.split('/').next().unwrap_or_default();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Map `/t/<slug>/<rest...>` to `/<rest...>`. Never returns an empty string.
pub fn rewrite(request_path: &str, slug: &str) -> String {
    let mount = format!("/{PROXY_PREFIX}/{slug}");
    match request_path.strip_prefix(mount.as_str()) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        // Slug did not line up with the path; drop the first two segments.
        _ => {
            let rest = request_path.splitn(4, '/').nth(3).unwrap_or_default();
            format!("/{rest}")
        }
    }
}
