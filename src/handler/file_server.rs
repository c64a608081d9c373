//! Static file serving module
//!
//! Serves any [`FileSystem`] over HTTP: canonical-path redirects, content
//! type detection, conditional requests and byte ranges.

use super::Handler;
use crate::fs::{path, FileInfo, FileSystem, FsError, ServedFile};
use crate::http::{self, cache, mime, range::RangeParseResult, response::FileHeaders};
use crate::logger;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE};
use hyper::{Method, Request, Response};

const INDEX_SUFFIX: &str = "/index.html";

/// Request information needed to serve a file
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
    pub range_header: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        let header = move |name: HeaderName| req.headers().get(name).and_then(|v| v.to_str().ok());
        Self {
            path: req.uri().path(),
            query: req.uri().query(),
            is_head: req.method() == Method::HEAD,
            if_none_match: header(IF_NONE_MATCH),
            if_modified_since: header(IF_MODIFIED_SINCE),
            range_header: header(RANGE),
        }
    }
}

/// HTTP front for a [`FileSystem`]
pub struct FileServer<F> {
    fs: F,
}

impl<F: FileSystem> FileServer<F> {
    pub const fn new(fs: F) -> Self {
        Self { fs }
    }

    fn serve_path(&self, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
        let request_path = if ctx.path.starts_with('/') {
            ctx.path.to_string()
        } else {
            format!("/{}", ctx.path)
        };

        // The index is only reachable through its directory URL
        if request_path.ends_with(INDEX_SUFFIX) {
            return local_redirect(ctx, "./");
        }

        let mut file = match self.fs.open(&path::clean(&request_path)) {
            Ok(file) => file,
            Err(FsError::NotFound | FsError::NotADirectory) => return http::build_404_response(),
        };
        let info = file.stat();

        if !info.is_dir && request_path.ends_with('/') {
            let base = match path::base(&request_path) {
                "/" | "." => "",
                base => base,
            };
            return local_redirect(ctx, &format!("../{base}"));
        }

        serve_content(ctx, &mut file, &info)
    }
}

impl<F: FileSystem> Handler for FileServer<F> {
    fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        match req.method() {
            &Method::GET | &Method::HEAD => {}
            &Method::OPTIONS => return http::build_options_response(),
            method => {
                logger::log_warning(&format!("Method not allowed: {method}"));
                return http::build_405_response();
            }
        }

        let ctx = RequestContext::from_request(&req);
        self.serve_path(&ctx)
    }
}

/// Redirect relative to the request path, keeping the query string
fn local_redirect(ctx: &RequestContext<'_>, target: &str) -> Response<Full<Bytes>> {
    let location = match ctx.query {
        Some(query) if !query.is_empty() => format!("{target}?{query}"),
        _ => target.to_string(),
    };
    http::build_redirect_response(&location)
}

fn last_modified_header(modified: DateTime<Utc>) -> Option<String> {
    (modified != DateTime::<Utc>::UNIX_EPOCH).then(|| cache::format_http_date(modified))
}

/// Build the response for an opened file with `ETag` and Range support
fn serve_content(
    ctx: &RequestContext<'_>,
    file: &mut ServedFile,
    info: &FileInfo,
) -> Response<Full<Bytes>> {
    let data = file.contents();
    let etag = cache::generate_etag(&data);
    let last_modified = last_modified_header(info.modified);

    // If-None-Match takes precedence over If-Modified-Since
    let not_modified = if ctx.if_none_match.is_some() {
        cache::check_etag_match(ctx.if_none_match, &etag)
    } else {
        cache::check_not_modified(ctx.if_modified_since, info.modified)
    };
    if not_modified {
        return http::build_304_response(&etag, last_modified.as_deref());
    }

    let headers = FileHeaders {
        content_type: mime::content_type_for(&info.name),
        etag: &etag,
        last_modified: last_modified.as_deref(),
    };

    match http::parse_range_header(ctx.range_header, info.size) {
        RangeParseResult::Valid(range) => {
            let body = if ctx.is_head {
                Bytes::new()
            } else {
                let len = usize::try_from(range.byte_count()).unwrap_or(usize::MAX);
                match file.read_at(range.start, len) {
                    Ok(body) => body,
                    Err(e) => {
                        logger::log_error(&format!(
                            "Failed to read range of '{}': {e}",
                            file.path()
                        ));
                        return http::build_416_response(info.size);
                    }
                }
            };
            http::response::build_partial_response(body, range, info.size, &headers, ctx.is_head)
        }
        RangeParseResult::NotSatisfiable => http::build_416_response(info.size),
        RangeParseResult::None => {
            http::response::build_file_response(data, &headers, ctx.is_head)
        }
    }
}
