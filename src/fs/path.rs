//! Slash-separated virtual path helpers
//!
//! Operates on URL paths, never on OS paths.

/// Lexically clean a slash-separated path
///
/// Collapses duplicate slashes, drops `.` segments and resolves `..`
/// against the preceding segment. Rooted paths never climb above `/`.
/// An empty result becomes `.` (or `/` for rooted input).
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join two path pieces and clean the result
pub fn join(base: &str, elem: &str) -> String {
    match (base.is_empty(), elem.is_empty()) {
        (true, true) => String::new(),
        (true, false) => clean(elem),
        (false, true) => clean(base),
        (false, false) => clean(&format!("{base}/{elem}")),
    }
}

/// Last element of a path, ignoring trailing slashes
///
/// Returns `/` for a path made only of slashes and `.` for an empty path.
pub fn base(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Map a request path onto the asset namespace by removing the mount root
///
/// The first occurrence of `root` anywhere in `path` is replaced with `/`
/// and the result is cleaned. The match is not anchored at the start, so a
/// mount root that also appears deeper in a path (`/ui` inside `/docs/ui/x`)
/// is rewritten as well.
pub fn strip_mount_root(path: &str, root: &str) -> String {
    if root.is_empty() {
        return clean(path);
    }
    clean(&path.replacen(root, "/", 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("//a//b/"), "/a/b");
        assert_eq!(clean("/a/./b/../c"), "/a/c");
        assert_eq!(clean("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(clean("a/../.."), "..");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "alerts"), "/alerts");
        assert_eq!(join("/ui", "alerts"), "/ui/alerts");
        assert_eq!(join("/ui/", "alerts"), "/ui/alerts");
        assert_eq!(join("", "alerts"), "alerts");
    }

    #[test]
    fn test_base() {
        assert_eq!(base("/ui/"), "ui");
        assert_eq!(base("/static/js/main.js"), "main.js");
        assert_eq!(base("src/build/index.html"), "index.html");
        assert_eq!(base("/"), "/");
        assert_eq!(base(""), ".");
    }

    #[test]
    fn test_strip_mount_root_prefix() {
        assert_eq!(strip_mount_root("/ui/index.html", "/ui"), "/index.html");
        assert_eq!(strip_mount_root("/ui/static/app.js", "/ui/"), "/static/app.js");
        assert_eq!(strip_mount_root("/ui", "/ui"), "/");
        assert_eq!(strip_mount_root("/index.html", "/"), "/index.html");
    }

    #[test]
    fn test_strip_mount_root_matches_anywhere() {
        // Not anchored at the start: an inner occurrence is rewritten too.
        assert_eq!(strip_mount_root("/docs/ui/page", "/ui"), "/docs/page");
        assert_eq!(strip_mount_root("/uikit/a.css", "/ui"), "/kit/a.css");
        assert_eq!(strip_mount_root("/build", "/ui"), "/build");
    }
}
