//! Async logging example
//!
//! Demonstrates an Async appender in front of the console, multi-threaded
//! producers and overflow policies.
//!
//! Run with: cargo run --example async_logging

use rust_logging_core::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Logging Core - Async Logging Example ===\n");

    let builder = ConfigurationBuilder::new().name("async");
    let console = builder.new_appender("Stdout", "Console");
    let queue = builder
        .new_appender("Queue", "Async")
        .add_attribute("bufferSize", 1000)
        .add_attribute("overflowPolicy", "Block")
        .add_component(builder.new_appender_ref("Stdout"));
    let root = builder
        .new_root_logger(Level::INFO)
        .add_component(builder.new_appender_ref("Queue"));
    let component = builder
        .add_appender(console)
        .add_appender(queue)
        .add_root_logger(root)
        .build_component();

    let context = Arc::new(LoggerContext::new("async"));
    context.reconfigure(component)?;

    println!("1. High-performance async logging:");
    let logger = context.get_logger("app");
    for i in 0..100 {
        logger.info(format!("Message #{}", i));
    }
    context.configuration().flush();
    println!("   Logged 100 messages asynchronously");

    println!("\n2. Multi-threaded logging:");
    let mut handles = vec![];
    for thread_id in 0..5 {
        let context = Arc::clone(&context);
        handles.push(thread::spawn(move || {
            let logger = context.get_logger(&format!("app.worker{}", thread_id));
            for i in 0..20 {
                logger.info(format!("Thread {} - Message {}", thread_id, i));
                thread::sleep(Duration::from_millis(10));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    context.configuration().flush();
    println!("   5 threads logged 20 messages each");

    println!("\n3. Overflow with DropNewest (errors are never dropped):");
    let slow = AsyncAppender::builder("Slow")
        .appender(Arc::new(ConsoleAppender::new("Console")))
        .queue_size(4)
        .overflow_policy(OverflowPolicy::DropNewest)
        .build()?;
    for i in 0..50 {
        let level = if i % 10 == 0 { Level::ERROR } else { Level::DEBUG };
        slow.append(&LogEvent::new("burst", level, format!("Burst {}", i)))?;
    }
    slow.flush()?;
    println!(
        "   delivered={} dropped={} critical_preserved={}",
        slow.metrics().delivered_count(),
        slow.metrics().dropped_count(),
        slow.metrics().critical_preserved()
    );
    slow.stop(DEFAULT_SHUTDOWN_TIMEOUT);

    context.stop(DEFAULT_SHUTDOWN_TIMEOUT);
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
