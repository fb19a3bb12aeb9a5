//! Basic logger usage example
//!
//! Demonstrates a console configuration, level inheritance and
//! reconfiguring a running context.
//!
//! Run with: cargo run --example basic_usage

use rust_logging_core::prelude::*;
use rust_logging_core::{debug, info};

fn console_config(root: Level, db: Level) -> rust_logging_core::config::Component {
    let builder = ConfigurationBuilder::new().name("basic");
    let console = builder
        .new_appender("Stdout", "Console")
        .add_attribute("target", "SYSTEM_OUT");
    let db_logger = builder.new_logger("app.db", db);
    let root = builder
        .new_root_logger(root)
        .add_component(builder.new_appender_ref("Stdout"));
    builder
        .add_appender(console)
        .add_logger(db_logger)
        .add_root_logger(root)
        .build_component()
}

fn main() -> Result<()> {
    println!("=== Rust Logging Core - Basic Usage Example ===\n");

    let context = LoggerContext::new("basic");
    context.reconfigure(console_config(Level::TRACE, Level::TRACE))?;

    let app = context.get_logger("app");
    let db = context.get_logger("app.db.pool");

    // Log messages at different levels
    println!("1. Logging at different levels:");
    app.trace("This is a trace message");
    app.debug("This is a debug message");
    app.info("This is an info message");
    app.warn("This is a warning message");
    app.error("This is an error message");
    app.fatal("This is a fatal message");

    println!("\n2. Macros record the call site and format lazily:");
    info!(app, "Listening on port {}", 8080);
    debug!(db, "Pool size {}", 16);

    println!("\n3. Reconfiguring: root at INFO, app.db at WARN");
    context.reconfigure(console_config(Level::INFO, Level::WARN))?;
    app.debug("Debug message (hidden)");
    app.info("Info message (visible)");
    db.info("Pool info (hidden, app.db is at WARN)");
    db.warn("Pool warning (visible)");
    println!("   app.db.pool now resolves to '{}'", db.logger_config().name());

    context.stop(DEFAULT_SHUTDOWN_TIMEOUT);
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
