//! Criterion benchmarks for rust_logging_core

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_logging_core::config::{BuildContext, Node, PluginCategory, PluginObject};
use rust_logging_core::manager::Manager;
use rust_logging_core::prelude::*;
use rust_logging_core::ParameterizedMessageFactory;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// Discards everything; isolates routing cost from I/O
struct NullAppender {
    name: String,
}

impl Appender for NullAppender {
    fn append(&self, event: &LogEvent) -> Result<()> {
        black_box(event);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn null_plugins() -> Arc<PluginRegistry> {
    let plugins = PluginRegistry::with_core_plugins();
    plugins.register_fn(
        "Null",
        PluginCategory::Appender,
        |node: &Node, _children: Vec<PluginObject>, ctx: &mut BuildContext| {
            let name = ctx.required_attr(node, "name")?;
            Ok(PluginObject::Appender(Arc::new(NullAppender { name })))
        },
    );
    Arc::new(plugins)
}

/// Context whose root logs at `level` into a Null appender, optionally
/// behind an Async appender
fn null_context(level: Level, asynchronous: bool) -> LoggerContext {
    let context = LoggerContext::with_plugins("bench", null_plugins());
    let builder = ConfigurationBuilder::new().name("bench");
    let null = builder.new_appender("Null", "Null");
    let target = if asynchronous {
        let queue = builder
            .new_appender("Queue", "Async")
            .add_attribute("bufferSize", 10_000)
            .add_attribute("overflowPolicy", "DropNewest")
            .add_component(builder.new_appender_ref("Null"));
        let root = builder
            .new_root_logger(level)
            .add_component(builder.new_appender_ref("Queue"));
        builder.add_appender(null).add_appender(queue).add_root_logger(root)
    } else {
        let root = builder
            .new_root_logger(level)
            .add_component(builder.new_appender_ref("Null"));
        builder.add_appender(null).add_root_logger(root)
    };
    context
        .reconfigure(target.build_component())
        .expect("benchmark configuration is valid");
    context
}

// ============================================================================
// Logger Lookup Benchmarks
// ============================================================================

fn bench_logger_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("logger_lookup");
    group.throughput(Throughput::Elements(1));

    let context = LoggerContext::new("lookup");
    let held = context.get_logger("app.service");

    group.bench_function("existing", |b| {
        b.iter(|| black_box(context.get_logger(black_box("app.service"))));
    });

    group.bench_function("reclaimed", |b| {
        // Each iteration drops the only strong reference
        b.iter(|| black_box(context.get_logger(black_box("app.transient")).level()));
    });

    drop(held);
    group.finish();
}

// ============================================================================
// Logging Performance Benchmarks
// ============================================================================

fn bench_sync_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_logging");
    group.throughput(Throughput::Elements(1));

    let context = null_context(Level::INFO, false);
    let logger = context.get_logger("bench.sync");

    group.bench_function("info", |b| {
        b.iter(|| logger.info(black_box("Info message")));
    });

    group.bench_function("disabled_debug", |b| {
        b.iter(|| logger.debug(black_box("Debug message")));
    });

    group.bench_function("macro_with_args", |b| {
        b.iter(|| rust_logging_core::info!(logger, "request {} took {}ms", black_box(42), 7));
    });

    group.bench_function("parameterized", |b| {
        let id: &dyn Display = &42;
        b.iter(|| logger.log_params(Level::INFO, "user {} logged in", black_box(&[id])));
    });

    group.finish();
}

fn bench_async_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_logging");
    group.throughput(Throughput::Elements(1));

    let context = null_context(Level::TRACE, true);
    let logger = context.get_logger("bench.async");

    group.bench_function("info", |b| {
        b.iter(|| logger.info(black_box("Info message")));
    });

    group.bench_function("error", |b| {
        b.iter(|| logger.error(black_box("Error message")));
    });

    group.finish();
    context.stop(Duration::from_secs(5));
}

// ============================================================================
// Concurrent Logging Benchmarks
// ============================================================================

fn bench_concurrent_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_logging");

    let context = Arc::new(null_context(Level::INFO, true));

    group.bench_function("multi_thread_4", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let context = Arc::clone(&context);
                    std::thread::spawn(move || {
                        context.get_logger("bench.concurrent").info(black_box("Concurrent message"));
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

// ============================================================================
// Building Block Benchmarks
// ============================================================================

fn bench_cyclic_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("cyclic_buffer");

    let buffer = CyclicBuffer::new(512);
    group.bench_function("add_full", |b| {
        for i in 0..512 {
            buffer.add(i);
        }
        b.iter(|| black_box(buffer.add(black_box(1))));
    });

    group.bench_function("add_then_drain_64", |b| {
        b.iter(|| {
            for i in 0..64 {
                buffer.add(i);
            }
            black_box(buffer.remove_all())
        });
    });

    group.finish();
}

struct NoopManager;

impl Manager for NoopManager {
    fn name(&self) -> &str {
        "noop"
    }

    fn release(&self, _timeout: Duration) -> bool {
        true
    }
}

fn bench_manager_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_registry");
    let registry = ManagerRegistry::new();
    let factory = |_: &str, _: ()| -> Result<NoopManager> { Ok(NoopManager) };

    let held = registry.get_manager("held", (), &factory);
    group.bench_function("acquire_shared", |b| {
        b.iter(|| black_box(registry.get_manager("held", (), &factory)));
    });

    group.bench_function("create_and_release", |b| {
        b.iter(|| black_box(registry.get_manager("transient", (), &factory)));
    });

    drop(held);
    group.finish();
}

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    let event = LogEvent::new("bench.layout", Level::INFO, "Formatted message");

    group.bench_function("text_layout", |b| {
        let layout = rust_logging_core::TextLayout::new();
        b.iter(|| black_box(layout.encode(black_box(&event))));
    });

    group.bench_function("json_layout", |b| {
        let layout = rust_logging_core::JsonLayout::new();
        b.iter(|| black_box(layout.encode(black_box(&event))));
    });

    group.bench_function("message_factory", |b| {
        let params: [&dyn Display; 3] = [&1, &"two", &3.0];
        b.iter(|| {
            black_box(ParameterizedMessageFactory.new_message(black_box("{} {} {}"), &params))
        });
    });

    group.finish();
}

fn bench_configuration(c: &mut Criterion) {
    let mut group = c.benchmark_group("configuration");
    let plugins = null_plugins();

    group.bench_function("setup_and_initialize", |b| {
        b.iter(|| {
            let builder = ConfigurationBuilder::new();
            let null = builder.new_appender("Null", "Null");
            let db = builder
                .new_logger("app.db", Level::DEBUG)
                .add_component(builder.new_appender_ref("Null"));
            let root = builder.new_root_logger(Level::WARN);
            let mut built = builder
                .add_property("env", "bench")
                .add_appender(null)
                .add_logger(db)
                .add_root_logger(root)
                .build(Arc::clone(&plugins));
            built.setup().unwrap();
            let configuration = built.initialize(&ManagerRegistry::new()).unwrap();
            configuration.stop(Duration::from_secs(1));
            black_box(configuration)
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_logger_lookup,
    bench_sync_logging,
    bench_async_logging,
    bench_concurrent_logging,
    bench_cyclic_buffer,
    bench_manager_registry,
    bench_formatting,
    bench_configuration
);

criterion_main!(benches);
