//! Socket logging example
//!
//! Demonstrates a Socket appender sending JSON lines to a TCP collector,
//! and the connection surviving a reconfiguration.
//!
//! Run with: cargo run --example socket_logging

use rust_logging_core::prelude::*;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::thread;

fn socket_config(port: u16, level: Level) -> rust_logging_core::config::Component {
    let builder = ConfigurationBuilder::new().name("socket");
    let socket = builder
        .new_appender("Collector", "Socket")
        .add_attribute("host", "127.0.0.1")
        .add_attribute("port", port)
        .add_attribute("reconnectionDelayMillis", 1000)
        .add_component(builder.new_layout("JsonLayout"));
    let root = builder
        .new_root_logger(level)
        .add_component(builder.new_appender_ref("Collector"));
    builder.add_appender(socket).add_root_logger(root).build_component()
}

fn main() -> Result<()> {
    println!("=== Rust Logging Core - Socket Logging Example ===\n");

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let collector = thread::spawn(move || {
        let mut connections = 0;
        for stream in listener.incoming().take(1) {
            connections += 1;
            let Ok(stream) = stream else { continue };
            for line in BufReader::new(stream).lines().map_while(|l| l.ok()) {
                println!("   collector received: {}", line);
            }
        }
        connections
    });

    let context = LoggerContext::new("socket");
    context.reconfigure(socket_config(port, Level::INFO))?;
    let logger = context.get_logger("app.remote");

    println!("1. Sending events over TCP:");
    logger.info("Service started");
    logger.debug("Hidden at INFO");

    println!("\n2. Reconfiguring to DEBUG keeps the same connection:");
    context.reconfigure(socket_config(port, Level::DEBUG))?;
    logger.debug("Visible after reconfigure");
    println!(
        "   managers: {:?}",
        context.managers().manager_names()
    );

    context.stop(DEFAULT_SHUTDOWN_TIMEOUT);
    let connections = collector.join().unwrap_or(0);
    println!("\n   collector saw {} connection(s)", connections);
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
