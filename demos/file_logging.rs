//! File logging example
//!
//! Demonstrates file output with property substitution, a custom level
//! and a configuration-wide filter.
//!
//! Run with: cargo run --example file_logging

use rust_logging_core::prelude::*;

fn main() -> Result<()> {
    println!("=== Rust Logging Core - File Logging Example ===\n");

    let builder = ConfigurationBuilder::new()
        .name("files")
        .add_property("logDir", ".")
        .add_custom_level("NOTICE", 350);
    let file = builder
        .new_appender("App", "File")
        .add_attribute("fileName", "${logDir}/application.log")
        .add_attribute("append", false);
    let console = builder.new_appender("Stdout", "Console");
    let secrets = builder
        .new_filter("StringMatchFilter", FilterResult::Deny, FilterResult::Neutral)
        .add_attribute("text", "password");
    let root = builder
        .new_root_logger(Level::DEBUG)
        .add_component(builder.new_appender_ref("App"))
        .add_component(builder.new_appender_ref("Stdout"));
    let component = builder
        .add_filter(secrets)
        .add_appender(file)
        .add_appender(console)
        .add_root_logger(root)
        .build_component();

    let context = LoggerContext::new("files");
    context.reconfigure(component)?;

    println!("1. Logging to both console and file:");
    let logger = context.get_logger("app");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.info("Configuration loaded successfully");
    logger.warn("Using default settings for some options");

    println!("\n2. Custom level between WARN and INFO:");
    if let Some(notice) = Level::get("NOTICE") {
        logger.log(notice, "Maintenance window scheduled");
    }

    println!("\n3. Filtered before reaching any logger:");
    logger.info("user=admin password=hunter2 (never written)");

    println!("\n4. Log injection is neutralized:");
    logger.info("line one\nFATAL forged entry");

    context.stop(DEFAULT_SHUTDOWN_TIMEOUT);
    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' for file output");

    Ok(())
}
