//! MIME type detection module
//!
//! Maps a served file's name to a Content-Type by extension.

/// Get MIME Content-Type for a file name
///
/// # Examples
/// ```
/// use spa_host::http::mime::content_type_for;
/// assert_eq!(content_type_for("index.html"), "text/html; charset=utf-8");
/// assert_eq!(content_type_for("main.4f2a.js"), "text/javascript; charset=utf-8");
/// assert_eq!(content_type_for("LICENSE"), "application/octet-stream");
/// ```
pub fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(stem, ext)| (stem, ext.to_ascii_lowercase()));

    match extension {
        Some((stem, ext)) if !stem.is_empty() => get_content_type(&ext),
        _ => "application/octet-stream",
    }
}

/// Get MIME Content-Type for a lowercase extension
fn get_content_type(extension: &str) -> &'static str {
    match extension {
        // Documents and scripts
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "wasm" => "application/wasm",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",

        // Media
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        assert_eq!(content_type_for("index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("main.css"), "text/css; charset=utf-8");
        assert_eq!(
            content_type_for("main.4f2a9c.chunk.js"),
            "text/javascript; charset=utf-8"
        );
        assert_eq!(content_type_for("main.js.map"), "application/json");
        assert_eq!(content_type_for("favicon.ico"), "image/x-icon");
        assert_eq!(content_type_for("Roboto.WOFF2"), "font/woff2");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(content_type_for("data.xyz"), "application/octet-stream");
        assert_eq!(content_type_for("LICENSE"), "application/octet-stream");
        assert_eq!(content_type_for(".htaccess"), "application/octet-stream");
    }
}
