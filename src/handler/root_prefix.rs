//! Mount-root middleware
//!
//! Lets the UI live under an arbitrary URL prefix. A request for the bare
//! mount root is sent to the landing view, and immutable assets are marked
//! cacheable for ten years.

use super::Handler;
use crate::fs::path;
use crate::http::cache;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CACHE_CONTROL};
use hyper::{Request, Response, Uri};

/// Default view for a request to the bare mount root
pub const DEFAULT_LANDING_PATH: &str = "alerts";

/// Wraps a handler mounted at `root`
pub struct RootPrefix<H> {
    root: String,
    landing: String,
    inner: H,
}

impl<H: Handler> RootPrefix<H> {
    /// An empty root is treated as `/`
    pub fn new(root: &str, landing: &str, inner: H) -> Self {
        let root = if root.is_empty() { "/" } else { root };
        Self {
            root: root.to_string(),
            landing: landing.to_string(),
            inner,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub const fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: Handler> Handler for RootPrefix<H> {
    fn handle<B>(&self, mut req: Request<B>) -> Response<Full<Bytes>> {
        // The file server redirects the bare root back to itself; serve the
        // landing view instead to break the loop.
        if req.uri().path() == self.root {
            let landing = path::join(&self.root, &self.landing);
            match with_path(req.uri(), &landing) {
                Some(uri) => *req.uri_mut() = uri,
                None => logger::log_warning(&format!(
                    "Cannot rewrite '{}' to landing path '{landing}'",
                    req.uri()
                )),
            }
        }

        let immutable = cache::is_immutable_path(req.uri().path());
        let mut response = self.inner.handle(req);
        if immutable {
            response.headers_mut().insert(
                CACHE_CONTROL,
                HeaderValue::from_static(cache::IMMUTABLE_CACHE_CONTROL),
            );
        }
        response
    }
}

/// Replace the path of `uri`, keeping everything else
fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}
