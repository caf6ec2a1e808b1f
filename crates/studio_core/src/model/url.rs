//! Public URL helpers.

/// Upgrades `http://` URLs to `https://` to avoid mixed content.
///
/// Relative paths, `data:` URIs and `https://` URLs are returned unchanged.
pub fn normalize_to_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_to_https;

    #[test]
    fn upgrades_only_plain_http() {
        assert_eq!(normalize_to_https("http://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(normalize_to_https("https://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(normalize_to_https("/uploads/a.png"), "/uploads/a.png");
        assert_eq!(normalize_to_https("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
        assert_eq!(normalize_to_https(""), "");
    }
}
