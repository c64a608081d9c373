//! Reverse proxy to an externally hosted UI
//!
//! Forwards every request to a single upstream. The request path is
//! appended to the target path, hop-by-hop headers are dropped in both
//! directions and the client address is recorded in `X-Forwarded-For`.

use crate::http::{self, BoxError, ResponseBody};
use crate::logger;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::net::SocketAddr;
use url::Url;

type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Peer address of the connection a request arrived on
///
/// Stored in request extensions by the connection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// Status the upstream answered with
///
/// Present in the extensions of every response relayed from upstream and
/// absent when the proxy produced the response itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamStatus(pub StatusCode);

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that apply to a single connection and must not be forwarded
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Single-upstream reverse proxy
pub struct ReverseProxy {
    target: Url,
    client: Client<HttpConnector, ProxyBody>,
}

impl ReverseProxy {
    pub fn new(target: Url) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { target, client }
    }

    pub const fn target(&self) -> &Url {
        &self.target
    }

    /// Upstream URI for an incoming request URI
    pub fn upstream_uri(&self, incoming: &Uri) -> Result<Uri, hyper::http::Error> {
        let host = self.target.host_str().unwrap_or_default();
        let authority = match self.target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let path = join_paths(self.target.path(), incoming.path());
        let query = match (self.target.query(), incoming.query()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(format!("{a}&{b}")),
            (Some(a), _) if !a.is_empty() => Some(a.to_string()),
            (_, Some(b)) if !b.is_empty() => Some(b.to_string()),
            _ => None,
        };
        let path_and_query = match query {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };

        Uri::builder()
            .scheme(self.target.scheme())
            .authority(authority)
            .path_and_query(path_and_query)
            .build()
    }

    /// Send the request upstream and relay the answer
    ///
    /// Upstream failures become `502 Bad Gateway`.
    pub async fn forward<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (mut parts, body) = req.into_parts();

        parts.uri = match self.upstream_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                logger::log_proxy_error(self.target.as_str(), &e);
                return http::full_body_response(http::build_502_response());
            }
        };
        remove_hop_headers(&mut parts.headers);
        if let Some(ClientAddr(addr)) = parts.extensions.get::<ClientAddr>().copied() {
            append_forwarded_for(&mut parts.headers, addr);
        }

        let body: ProxyBody = body.map_err(Into::into).boxed_unsync();
        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                remove_hop_headers(&mut parts.headers);
                parts.extensions.insert(UpstreamStatus(parts.status));
                let body: ResponseBody = body.map_err(Into::into).boxed_unsync();
                Response::from_parts(parts, body)
            }
            Err(e) => {
                logger::log_proxy_error(self.target.as_str(), &e);
                http::full_body_response(http::build_502_response())
            }
        }
    }
}

/// Join two URL paths with exactly one slash between them
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

fn remove_hop_headers(headers: &mut HeaderMap) {
    // Headers listed in Connection are hop-by-hop as well
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let client_ip = addr.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    fn proxy(target: &str) -> ReverseProxy {
        ReverseProxy::new(Url::parse(target).unwrap())
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/alerts"), "/alerts");
        assert_eq!(join_paths("/app", "/alerts"), "/app/alerts");
        assert_eq!(join_paths("/app/", "/alerts"), "/app/alerts");
        assert_eq!(join_paths("/app", "alerts"), "/app/alerts");
    }

    #[tokio::test]
    async fn test_upstream_uri() {
        let p = proxy("http://ui.example.com/app");
        let uri = p.upstream_uri(&"/static/main.js?v=2".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://ui.example.com/app/static/main.js?v=2");

        let p = proxy("http://localhost:3035/?dev=1");
        let uri = p.upstream_uri(&"/alerts?x=1".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://localhost:3035/alerts?dev=1&x=1");
    }

    #[test]
    fn test_remove_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("accept", HeaderValue::from_static("text/html"));

        remove_hop_headers(&mut headers);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["accept"], "text/html");
    }

    #[test]
    fn test_forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        let addr: SocketAddr = "10.0.0.7:51000".parse().unwrap();
        append_forwarded_for(&mut headers, addr);
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.7");
        append_forwarded_for(&mut headers, "10.0.0.8:1".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.7, 10.0.0.8");
    }

    /// Upstream that echoes the request line and forwarded-for header
    async fn spawn_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                        let forwarded = req
                            .headers()
                            .get(X_FORWARDED_FOR)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-")
                            .to_string();
                        let line = format!("{} {} {forwarded}", req.method(), req.uri());
                        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(line))))
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_forward_to_upstream() {
        let upstream = spawn_upstream().await;
        let p = proxy(&format!("http://{upstream}/app"));

        let mut req = Request::get("/alerts?open=1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        req.extensions_mut()
            .insert(ClientAddr("192.0.2.1:4000".parse().unwrap()));

        let response = p.forward(req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.extensions().get::<UpstreamStatus>(),
            Some(&UpstreamStatus(StatusCode::OK))
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("GET /app/alerts?open=1 192.0.2.1"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let p = proxy(&format!("http://{addr}/"));
        let req = Request::get("/").body(Full::new(Bytes::new())).unwrap();
        let response = p.forward(req).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.extensions().get::<UpstreamStatus>().is_none());
    }
}
