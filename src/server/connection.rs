// Connection handling module
// Accepts a single TCP connection and serves it with the UI handler

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::{Body, Incoming};
use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, Version};
use hyper_util::rt::TokioIo;
use tokio::sync::watch;

use crate::config::Config;
use crate::handler::{ClientAddr, UiHandler, UpstreamStatus};
use crate::logger::{self, AccessLogEntry, AccessLogFormat, ServedBy};

/// Per-connection settings derived from the configuration
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub keep_alive: bool,
    pub timeout: Duration,
    pub max_connections: Option<u64>,
    /// Access log format, `None` when access logging is off
    pub access_log_format: Option<AccessLogFormat>,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        let perf = &config.performance;
        Self {
            keep_alive: perf.keep_alive_timeout > 0,
            timeout: Duration::from_secs(std::cmp::max(perf.read_timeout, perf.write_timeout)),
            max_connections: perf.max_connections,
            access_log_format: config
                .logging
                .access_log
                .then(|| access_log_format(&config.logging.access_log_format)),
        }
    }
}

fn access_log_format(name: &str) -> AccessLogFormat {
    name.parse().unwrap_or_else(|e| {
        logger::log_warning(&format!("{e}, using combined"));
        AccessLogFormat::Combined
    })
}

/// Accept and process a connection, checking limits.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `handler` - Shared UI handler
/// * `settings` - Connection settings
/// * `conn_counter` - Active connection counter
/// * `stop` - Flips to `true` when the server shuts down
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: &Arc<UiHandler>,
    settings: &Arc<ConnectionSettings>,
    conn_counter: &Arc<AtomicUsize>,
    stop: &watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = settings.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_connection_rejected(&peer_addr, max_conn);
            drop(stream);
            return;
        }
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(handler),
        Arc::clone(settings),
        Arc::clone(conn_counter),
        stop.clone(),
    );
}

/// Serve a single connection in a spawned task.
///
/// The connection is bounded by the configured timeout and the counter
/// is decremented when it ends. Once `stop` flips the connection finishes
/// its current request and closes instead of waiting for another one.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<UiHandler>,
    settings: Arc<ConnectionSettings>,
    conn_counter: Arc<AtomicUsize>,
    stop: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder.keep_alive(settings.keep_alive);

        let format = settings.access_log_format;
        let conn = builder.serve_connection(
            io,
            service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                async move {
                    let entry = format.as_ref().map(|_| start_entry(&req, peer_addr));
                    let started = Instant::now();

                    let mut req = req;
                    req.extensions_mut().insert(ClientAddr(peer_addr));
                    let response = handler.serve(req).await;

                    if let (Some(mut entry), Some(format)) = (entry, format) {
                        entry.status = response.status().as_u16();
                        entry.body_bytes = response
                            .body()
                            .size_hint()
                            .exact()
                            .and_then(|n| usize::try_from(n).ok())
                            .unwrap_or(0);
                        entry.elapsed = started.elapsed();
                        entry.served_by = served_by(&handler, &response);
                        logger::log_access(&entry, format);
                    }
                    Ok::<_, std::convert::Infallible>(response)
                }
            }),
        );

        let served = async move {
            tokio::pin!(conn);
            let stop_signal = stopped(stop);
            tokio::pin!(stop_signal);
            let mut closing = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => break result,
                    () = &mut stop_signal, if !closing => {
                        closing = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        };

        match tokio::time::timeout(settings.timeout, served).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    settings.timeout.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Resolve once the server has asked connections to close
async fn stopped(mut stop: watch::Receiver<bool>) {
    // A dropped sender means the server loop is gone as well
    let _ = stop.wait_for(|stop| *stop).await;
}

fn served_by<B>(handler: &UiHandler, response: &Response<B>) -> ServedBy {
    match handler {
        UiHandler::LocalAssets(_) => ServedBy::Local,
        UiHandler::Proxy(_) => ServedBy::Proxy {
            upstream_status: response
                .extensions()
                .get::<UpstreamStatus>()
                .map(|UpstreamStatus(status)| status.as_u16()),
        },
    }
}

/// Capture the request side of an access log entry
fn start_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let uri = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        uri,
    );
    entry.http_version = http_version(req.version()).to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

const fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_defaults() {
        let mut config = Config::load_from("/nonexistent/spa-host-config").unwrap();
        let settings = ConnectionSettings::from_config(&config);
        assert!(settings.keep_alive);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.access_log_format, Some(AccessLogFormat::Combined));

        config.logging.access_log = false;
        config.performance.keep_alive_timeout = 0;
        config.performance.write_timeout = 60;
        let settings = ConnectionSettings::from_config(&config);
        assert!(!settings.keep_alive);
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert!(settings.access_log_format.is_none());

        config.logging.access_log = true;
        config.logging.access_log_format = "json".to_string();
        let settings = ConnectionSettings::from_config(&config);
        assert_eq!(settings.access_log_format, Some(AccessLogFormat::Json));
    }

    #[test]
    fn test_unknown_access_log_format_falls_back() {
        assert_eq!(access_log_format("$remote_addr"), AccessLogFormat::Combined);
        assert_eq!(access_log_format("Common"), AccessLogFormat::Common);
    }

    #[test]
    fn test_start_entry() {
        let req = Request::get("/alerts?tab=open")
            .header(USER_AGENT, "curl/8.0")
            .body(())
            .unwrap();
        let entry = start_entry(&req, "10.1.2.3:5555".parse().unwrap());
        assert_eq!(entry.remote_addr, "10.1.2.3");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.uri, "/alerts?tab=open");
        assert_eq!(entry.http_version, "1.1");
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
        assert!(entry.referer.is_none());
    }
}
