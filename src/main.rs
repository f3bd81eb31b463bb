//! pakket: demo server
//!
//! Serves the `/demo` endpoints over TCP, UDP or both.
//!
//! Features:
//! - One acceptor thread and one worker pool per transport
//! - HTTP-style requests, one per connection or datagram
//! - Configuration via CLI arguments or TOML file
//! - Clean shutdown on SIGINT or SIGTERM

use pakket::config::Config;
use pakket::demo;
use pakket::runtime::{
    install_signal_handlers, signal_received, ListenerHandle, TcpListener, UdpListener,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        transport = ?config.transport,
        workers = config.workers,
        max_message_size = config.max_message_size,
        "Starting pakket server"
    );

    install_signal_handlers()?;

    // Routes are fixed before the first listener starts.
    let router = Arc::new(demo::routes());
    let options = config.listener_options();

    let mut handles: Vec<ListenerHandle> = Vec::new();
    if config.transport.tcp() {
        let listener = TcpListener::bind(&config.listen, Arc::clone(&router), options.clone())?;
        handles.push(listener.spawn()?);
    }
    if config.transport.udp() {
        let listener = UdpListener::bind(&config.listen, Arc::clone(&router), options)?;
        handles.push(listener.spawn()?);
    }

    // Runs until SIGINT/SIGTERM or until every acceptor has exited on its own.
    while !signal_received() && !handles.iter().all(ListenerHandle::is_finished) {
        thread::sleep(Duration::from_millis(100));
    }
    if signal_received() {
        info!("Shutdown signal received");
    }

    for handle in handles {
        handle.close();
    }

    info!("Server stopped");
    Ok(())
}
