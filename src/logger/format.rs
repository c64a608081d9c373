//! Access log lines
//!
//! Every line records who answered the request: the bundled assets, or the
//! upstream UI server together with the status it returned.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde_json::json;

/// Layout of an access log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLogFormat {
    /// Common layout plus referer, user agent, origin and request time
    #[default]
    Combined,
    /// Common Log Format
    Common,
    /// One JSON object per line
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown access log format {0:?}, expected combined, common or json")]
pub struct UnknownFormat(String);

impl FromStr for AccessLogFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(Self::Combined),
            "common" => Ok(Self::Common),
            "json" => Ok(Self::Json),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Which side produced the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    Local,
    /// `upstream_status` is `None` when the upstream could not be reached
    Proxy { upstream_status: Option<u16> },
}

impl fmt::Display for ServedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Proxy {
                upstream_status: Some(status),
            } => write!(f, "proxy:{status}"),
            Self::Proxy {
                upstream_status: None,
            } => f.write_str("proxy:-"),
        }
    }
}

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    /// Path and query as requested
    pub uri: String,
    pub http_version: String,
    pub status: u16,
    pub body_bytes: usize,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub elapsed: Duration,
    pub served_by: ServedBy,
}

impl AccessLogEntry {
    /// Start an entry stamped with the current time
    pub fn new(remote_addr: String, method: String, uri: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            uri,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            referer: None,
            user_agent: None,
            elapsed: Duration::ZERO,
            served_by: ServedBy::Local,
        }
    }

    pub fn format(&self, format: AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Combined => self.combined_line(),
            AccessLogFormat::Common => self.common_line(),
            AccessLogFormat::Json => self.json_line(),
        }
    }

    fn request_line(&self) -> String {
        format!("{} {} HTTP/{}", self.method, self.uri, self.http_version)
    }

    fn common_line(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn combined_line(&self) -> String {
        format!(
            "{} \"{}\" \"{}\" {} {:.3}",
            self.common_line(),
            self.referer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
            self.served_by,
            self.elapsed.as_secs_f64(),
        )
    }

    fn json_line(&self) -> String {
        let (served_by, upstream_status) = match self.served_by {
            ServedBy::Local => ("local", None),
            ServedBy::Proxy { upstream_status } => ("proxy", upstream_status),
        };
        json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "uri": self.uri,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
            "served_by": served_by,
            "upstream_status": upstream_status,
        })
        .to_string()
    }
}
