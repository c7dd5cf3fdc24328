use url::Url;

use crate::downloaders::process::tool_version;

/// Whether the input parses as an http(s) URL
pub fn is_http_url(input: &str) -> bool {
    Url::parse(input)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|host| {
        // Remove 'www.' prefix if present
        host.strip_prefix("www.").unwrap_or(host).to_string()
    })
}

/// Check for helper tools the wrapped downloaders rely on.
/// Returns warnings for the ones that are missing.
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if tool_version("ffmpeg").await.is_err() {
        missing.push("ffmpeg - required for audio conversion and merging".to_string());
    }

    missing
}
