//! Single-page application host
//!
//! Serves a bundled web UI from memory, stamping the index page with build
//! provenance, or proxies UI requests to an external development server.

pub mod assets;
pub mod build_info;
pub mod config;
pub mod fs;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
