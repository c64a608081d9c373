//! Request handler module
//!
//! [`UiHandler`] decides once, at construction, whether the UI is served
//! from the bundled assets or proxied to an external server.

pub mod file_server;
pub mod proxy;
pub mod root_prefix;

pub use file_server::FileServer;
pub use proxy::{ClientAddr, ReverseProxy, UpstreamStatus};
pub use root_prefix::{RootPrefix, DEFAULT_LANDING_PATH};

use crate::assets::AssetTable;
use crate::build_info::BuildInfo;
use crate::fs::MemoryFs;
use crate::http::{self, BoxError, ResponseBody};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use std::sync::Arc;
use url::Url;

/// Synchronous request handler for locally served content
pub trait Handler {
    fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>;
}

/// Errors from building a [`UiHandler`]
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("parse url {input:?}: {reason}")]
    InvalidUrl {
        input: String,
        #[source]
        reason: UrlError,
    },
}

/// Why a UI target string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),
    #[error("unsupported proxy scheme {0:?}, only http upstreams can be proxied")]
    UnsupportedScheme(String),
}

/// Where the UI comes from, decided from the configured target string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Bundled assets mounted at `root`
    Local { root: String },
    /// External UI server
    Proxy(Url),
}

/// Base for resolving path-only targets
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Scheme used for proxied upstreams
const PROXY_SCHEME: &str = "http";

impl Target {
    /// Interpret a target string
    ///
    /// A target names a host only when `//` and a non-empty authority
    /// follow the scheme (or start a scheme-relative reference).
    ///
    /// - empty: local at `/`
    /// - a path (`/ui`, `ui`): local, mounted at that path
    /// - a URL with a host: proxy to it, `http` only
    /// - a URL without a host (`http:/ui`, `http:///ui`, `file:///ui`):
    ///   local, mounted at its path
    /// - `//host/path`: proxy over plain HTTP
    pub fn parse(input: &str) -> Result<Self, HandlerError> {
        let invalid = |reason: UrlError| HandlerError::InvalidUrl {
            input: input.to_string(),
            reason,
        };

        if input.is_empty() {
            return Ok(Self::local("/"));
        }
        check_escapes(input).map_err(invalid)?;

        let (has_scheme, rest) = match split_scheme(input) {
            Some((_, rest)) => (true, rest),
            None => (false, input),
        };

        let (authority, path) = split_authority(rest);
        if authority.is_some_and(|authority| !host_of(authority).is_empty()) {
            let url = if has_scheme {
                Url::parse(input)
            } else {
                Url::parse(&format!("{PROXY_SCHEME}:{input}"))
            }
            .map_err(|e| invalid(e.into()))?;
            if url.scheme() != PROXY_SCHEME {
                return Err(invalid(UrlError::UnsupportedScheme(url.scheme().to_string())));
            }
            return Ok(Self::Proxy(url));
        }

        // An absolute URL whose remainder is not a path is opaque
        // (`mailto:ops`); it has no path to mount at.
        if path.is_empty() || (has_scheme && !path.starts_with('/')) {
            return Ok(Self::local("/"));
        }
        let resolved = Url::parse(RELATIVE_BASE)
            .and_then(|base| base.join(path))
            .map_err(|e| invalid(e.into()))?;
        Ok(Self::local(resolved.path()))
    }

    fn local(root: &str) -> Self {
        Self::Local {
            root: root.to_string(),
        }
    }
}

/// Split a leading `scheme:` off the input
fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = input.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Split `//authority/path?query` into the authority, if any, and the path
fn split_authority(rest: &str) -> (Option<&str>, &str) {
    let end_of_path = rest.find(['?', '#']).unwrap_or(rest.len());
    let rest = &rest[..end_of_path];
    match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find('/').unwrap_or(after.len());
            (Some(&after[..end]), &after[end..])
        }
        None => (None, rest),
    }
}

/// Host and port part of an authority, without user info
fn host_of(authority: &str) -> &str {
    authority.rsplit('@').next().unwrap_or(authority)
}

/// Every `%` before the query must start a two-digit hex escape
fn check_escapes(input: &str) -> Result<(), UrlError> {
    let end = input.find('?').unwrap_or(input.len());
    let bytes = input[..end].as_bytes();
    for (i, _) in bytes.iter().enumerate().filter(|(_, b)| **b == b'%') {
        let escape = bytes.get(i + 1..i + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            let shown = input[i..].chars().take(3).collect();
            return Err(UrlError::InvalidEscape(shown));
        }
    }
    Ok(())
}

/// Serves the UI from bundled assets or from an external server
pub enum UiHandler {
    LocalAssets(RootPrefix<FileServer<MemoryFs>>),
    Proxy(ReverseProxy),
}

impl UiHandler {
    /// Build a handler for `target`, landing on [`DEFAULT_LANDING_PATH`]
    pub fn new(
        target: &str,
        assets: AssetTable,
        build: Arc<dyn BuildInfo>,
    ) -> Result<Self, HandlerError> {
        Self::with_landing_path(target, DEFAULT_LANDING_PATH, assets, build)
    }

    /// Build a handler whose bare mount root shows `landing`
    pub fn with_landing_path(
        target: &str,
        landing: &str,
        assets: AssetTable,
        build: Arc<dyn BuildInfo>,
    ) -> Result<Self, HandlerError> {
        match Target::parse(target)? {
            Target::Local { root } => {
                let fs = MemoryFs::new(root.clone(), assets, build);
                fs.spawn_warm_up();
                Ok(Self::LocalAssets(RootPrefix::new(
                    &root,
                    landing,
                    FileServer::new(fs),
                )))
            }
            Target::Proxy(url) => Ok(Self::Proxy(ReverseProxy::new(url))),
        }
    }

    /// Human readable description of where requests go
    pub fn describe(&self) -> String {
        match self {
            Self::LocalAssets(local) => format!("bundled assets mounted at {}", local.root()),
            Self::Proxy(proxy) => format!("proxy to {}", proxy.target()),
        }
    }

    pub async fn serve<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match self {
            Self::LocalAssets(local) => http::full_body_response(local.handle(req)),
            Self::Proxy(proxy) => proxy.forward(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NamedBlob;
    use crate::build_info::StaticBuildInfo;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use hyper::header::{CACHE_CONTROL, LOCATION};
    use hyper::StatusCode;

    const SHELL: &str = "<!DOCTYPE html><html><head></head><body><div id=\"app\"></div></body></html>";

    fn build() -> Arc<dyn BuildInfo> {
        Arc::new(StaticBuildInfo {
            version: "v1.2.3".to_string(),
            git_commit: "abcd123".to_string(),
            git_tree_state: "clean".to_string(),
            build_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        })
    }

    fn assets() -> AssetTable {
        vec![
            NamedBlob::new("src/build/index.html", SHELL),
            NamedBlob::new("src/build/static/js/main.js", "main()"),
            NamedBlob::new("src/build/favicon.ico", vec![1_u8, 2, 3]),
        ]
        .into_iter()
        .collect()
    }

    fn local(target: &str) -> UiHandler {
        UiHandler::new(target, assets(), build()).unwrap()
    }

    async fn get(handler: &UiHandler, uri: &str) -> (StatusCode, hyper::HeaderMap, Bytes) {
        let req = Request::get(uri).body(Full::new(Bytes::new())).unwrap();
        let response = handler.serve(req).await;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[test]
    fn test_parse_target() {
        let local = |root: &str| Target::Local {
            root: root.to_string(),
        };
        assert_eq!(Target::parse("").unwrap(), local("/"));
        assert_eq!(Target::parse("/").unwrap(), local("/"));
        assert_eq!(Target::parse("/ui").unwrap(), local("/ui"));
        assert_eq!(Target::parse("ui").unwrap(), local("/ui"));
        assert_eq!(Target::parse("/ui?tab=1").unwrap(), local("/ui"));
        assert_eq!(Target::parse("file:///ui").unwrap(), local("/ui"));
        assert_eq!(Target::parse("mailto:ops").unwrap(), local("/"));

        let Target::Proxy(url) = Target::parse("http://ui.example.com/app").unwrap() else {
            panic!("expected proxy");
        };
        assert_eq!(url.host_str(), Some("ui.example.com"));
        assert_eq!(url.path(), "/app");

        let Target::Proxy(url) = Target::parse("//localhost:3035").unwrap() else {
            panic!("expected proxy");
        };
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(3035));
    }

    #[test]
    fn test_url_without_host_is_local() {
        let local = |root: &str| Target::Local {
            root: root.to_string(),
        };
        assert_eq!(Target::parse("http:/ui").unwrap(), local("/ui"));
        assert_eq!(Target::parse("http:///ui").unwrap(), local("/ui"));
        assert_eq!(Target::parse("http://").unwrap(), local("/"));
        assert_eq!(Target::parse("http:").unwrap(), local("/"));
        assert_eq!(Target::parse("///ui").unwrap(), local("/ui"));
    }

    #[test]
    fn test_invalid_url() {
        for input in ["http://[::1", "http://exa mple.com/"] {
            let err = Target::parse(input).unwrap_err();
            assert!(matches!(err, HandlerError::InvalidUrl { .. }), "input {input}");
            assert!(err.to_string().starts_with("parse url"));
        }
        assert!(UiHandler::new("http://[::1", assets(), build()).is_err());
    }

    #[test]
    fn test_invalid_escape() {
        for input in ["/%zz", "/ui%", "/ui%4", "http://ui.example.com/%g0"] {
            let HandlerError::InvalidUrl { reason, .. } = Target::parse(input).unwrap_err();
            assert!(matches!(reason, UrlError::InvalidEscape(_)), "input {input}");
        }
        // Valid escapes and escapes in the query are accepted
        assert!(Target::parse("/ui%20kit").is_ok());
        assert!(Target::parse("/ui?q=%zz").is_ok());
    }

    #[test]
    fn test_non_http_upstream_rejected() {
        for input in ["https://ui.example.com/app", "ftp://ui.example.com/"] {
            let HandlerError::InvalidUrl { reason, .. } = Target::parse(input).unwrap_err();
            assert!(matches!(reason, UrlError::UnsupportedScheme(_)), "input {input}");
        }
        let err = UiHandler::new("https://ui.example.com/app", assets(), build())
            .err()
            .unwrap();
        assert!(err.to_string().contains("only http upstreams"));
    }

    #[tokio::test]
    async fn test_proxy_selected_for_host() {
        // An empty table proves the assets are never needed
        let handler = UiHandler::new("http://ui.example.com/app", AssetTable::default(), build())
            .unwrap();
        let UiHandler::Proxy(proxy) = &handler else {
            panic!("expected proxy handler");
        };
        assert_eq!(proxy.target().host_str(), Some("ui.example.com"));
        let uri = proxy.upstream_uri(&"/alerts".parse().unwrap()).unwrap();
        assert_eq!(uri.authority().map(|a| a.as_str()), Some("ui.example.com"));
        assert!(handler.describe().starts_with("proxy to http://ui.example.com"));
    }

    #[tokio::test]
    async fn test_local_fallback_serves_stamped_shell() {
        let handler = local("");
        let (status, _, index) = get(&handler, "/").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(index.to_vec()).unwrap();
        assert!(text.starts_with("<!DOCTYPE html><html><head></head><body><div id=\"app\"></div></body>"));
        assert!(text.contains("<!-- GitCommit: abcd123 (clean) -->"));

        for uri in ["/alerts", "/services/abc", "/profile/schedules"] {
            let (status, _, body) = get(&handler, uri).await;
            assert_eq!(status, StatusCode::OK, "uri {uri}");
            assert_eq!(body, index, "uri {uri}");
        }
    }

    #[tokio::test]
    async fn test_mounted_root() {
        let handler = local("/ui");
        let (status, _, shell) = get(&handler, "/ui").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&shell).contains("<!-- Version: v1.2.3 -->"));

        let (status, headers, body) = get(&handler, "/ui/static/js/main.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from("main()"));
        assert_eq!(headers[CACHE_CONTROL], "public, immutable, max-age=315360000");

        let (status, headers, _) = get(&handler, "/ui/").await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(headers[LOCATION], "../ui");
    }

    #[tokio::test]
    async fn test_cache_header_scope() {
        let handler = local("/");
        let (_, headers, _) = get(&handler, "/static/js/main.js").await;
        assert_eq!(headers[CACHE_CONTROL], "public, immutable, max-age=315360000");

        // Unknown static files still fall back to the shell, cached or not
        let (status, headers, _) = get(&handler, "/static/js/gone.js").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(CACHE_CONTROL).is_some());

        for uri in ["/favicon.ico", "/alerts", "/"] {
            let (_, headers, _) = get(&handler, uri).await;
            assert!(headers.get(CACHE_CONTROL).is_none(), "uri {uri}");
        }
    }

    #[tokio::test]
    async fn test_missing_index_is_not_found() {
        let assets: AssetTable = vec![NamedBlob::new("src/build/static/js/main.js", "main()")]
            .into_iter()
            .collect();
        let handler = UiHandler::new("", assets, build()).unwrap();
        for uri in ["/", "/alerts", "/deep/link"] {
            let (status, _, _) = get(&handler, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "uri {uri}");
        }
    }

    #[derive(Default)]
    struct CountingBuildInfo {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl BuildInfo for CountingBuildInfo {
        fn version(&self) -> String {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            "v2.0.0".to_string()
        }

        fn git_commit(&self) -> String {
            "feedbee".to_string()
        }

        fn git_tree_state(&self) -> String {
            "clean".to_string()
        }

        fn build_date(&self) -> chrono::DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_race_warm_up() {
        let counting = Arc::new(CountingBuildInfo::default());
        let handler = Arc::new(UiHandler::new("", assets(), counting.clone()).unwrap());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let handler = handler.clone();
                let uri = if i % 2 == 0 { "/alerts" } else { "/deep/link" };
                tokio::spawn(async move { get(&handler, uri).await })
            })
            .collect();

        let mut bodies = Vec::new();
        for task in tasks {
            let (status, _, body) = task.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            bodies.push(body);
        }
        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(String::from_utf8_lossy(&bodies[0]).contains("<!-- Version: v2.0.0 -->"));
        assert_eq!(counting.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
