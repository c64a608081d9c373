//! HTTP protocol layer module
//!
//! Protocol helpers shared by the file server and the reverse proxy,
//! decoupled from where the bytes come from.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;

// Re-export commonly used types
pub use range::parse_range_header;
pub use response::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_502_response, build_options_response, build_redirect_response,
};

/// Boxed error type for bodies of mixed origin
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body of the UI handler, local or proxied
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Box a fully buffered body
pub fn full_body(body: Full<Bytes>) -> ResponseBody {
    body.map_err(|never| match never {}).boxed_unsync()
}

/// Box the body of a locally built response
pub fn full_body_response(response: hyper::Response<Full<Bytes>>) -> hyper::Response<ResponseBody> {
    response.map(full_body)
}
