// Server module entry point
// Listener setup, connection handling, signals and the accept loop

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module is named server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use connection::ConnectionSettings;
pub use listener::create_listener;
pub use server_loop::start_server_loop;

use std::sync::Arc;

use crate::config::Config;
use crate::handler::UiHandler;
use crate::logger;

/// Bind the configured address and serve `handler` until SIGINT/SIGTERM
pub async fn run(config: &Config, handler: UiHandler) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.get_socket_addr()?;
    let listener = create_listener(addr, config.server.listen_backlog)?;
    logger::log_server_start(&listener.local_addr()?, config);
    logger::log_mode(&handler.describe());

    let signals = Arc::new(signal::SignalHandler::new());
    signal::start_signal_handler(Arc::clone(&signals));

    start_server_loop(
        listener,
        Arc::new(handler),
        Arc::new(ConnectionSettings::from_config(config)),
        Arc::clone(&signals.shutdown),
    )
    .await?;
    Ok(())
}
