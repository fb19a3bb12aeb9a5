//! Builders for the plugins shipped with the crate.

use super::logger_config::{AppenderRef, LoggerDefinition};
use super::node::Node;
use super::plugin::{BuildContext, PluginCategory, PluginObject, PluginRegistry};
use crate::appenders::{AsyncAppender, ConsoleAppender, ConsoleTarget, FileAppender};
use crate::core::{
    AppenderControl, CompositeFilter, Filter, FilterResult, JsonLayout, Layout, Level,
    LoggerError, OverflowPolicy, Result, StringMatchFilter, TextLayout, ThresholdFilter,
};
use std::sync::Arc;

/// Registers every built-in element with `registry`.
pub fn register_core_plugins(registry: &PluginRegistry) {
    registry.register_fn("Configuration", PluginCategory::Core, |_, children, _| Ok(PluginObject::List(children)));
    registry.register_fn("Properties", PluginCategory::Core, |_, children, _| Ok(PluginObject::List(children)));
    registry.register_fn("Property", PluginCategory::Core, build_property);
    registry.register_fn("CustomLevels", PluginCategory::Core, |_, children, _| Ok(PluginObject::List(children)));
    registry.register_fn("CustomLevel", PluginCategory::Core, build_custom_level);
    registry.register_fn("Appenders", PluginCategory::Core, |_, children, _| Ok(PluginObject::List(children)));
    registry.register_fn("Loggers", PluginCategory::Core, build_loggers);
    registry.register_fn("Logger", PluginCategory::Core, build_logger);
    registry.register_fn("Root", PluginCategory::Core, build_root);
    registry.register_fn("AppenderRef", PluginCategory::Core, build_appender_ref);

    registry.register_fn("Filters", PluginCategory::Filter, build_filters);
    registry.register_fn("ThresholdFilter", PluginCategory::Filter, build_threshold_filter);
    registry.register_fn("StringMatchFilter", PluginCategory::Filter, build_string_match_filter);

    registry.register_fn("TextLayout", PluginCategory::Layout, build_text_layout);
    registry.register_fn("JsonLayout", PluginCategory::Layout, build_json_layout);

    registry.register_fn("Console", PluginCategory::Appender, build_console);
    registry.register_fn("File", PluginCategory::Appender, build_file);
    registry.register_fn("Async", PluginCategory::Appender, build_async);
    #[cfg(feature = "network")]
    registry.register_fn("Socket", PluginCategory::Appender, build_socket);
    #[cfg(feature = "smtp")]
    registry.register_fn("SMTP", PluginCategory::Appender, build_smtp);
}

/// Children of an element sorted by what they are
#[derive(Default)]
struct Parts {
    layout: Option<Arc<dyn Layout>>,
    filters: Vec<Arc<dyn Filter>>,
    refs: Vec<AppenderRef>,
}

impl Parts {
    fn split(node: &Node, children: Vec<PluginObject>) -> Self {
        let mut parts = Parts::default();
        for child in children {
            match child {
                PluginObject::Layout(layout) if parts.layout.is_none() => parts.layout = Some(layout),
                PluginObject::Filter(filter) => parts.filters.push(filter),
                PluginObject::AppenderRef(r) => parts.refs.push(r),
                other => tracing::warn!(
                    element = node.name(),
                    kind = other.kind(),
                    "Ignoring unexpected child element"
                ),
            }
        }
        parts
    }

    /// Several filters on one element are combined in declaration order.
    fn filter(&mut self) -> Option<Arc<dyn Filter>> {
        match self.filters.len() {
            0 => None,
            1 => self.filters.pop(),
            _ => Some(Arc::new(CompositeFilter::new(std::mem::take(&mut self.filters)))),
        }
    }
}

fn build_property(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let name = ctx.required_attr(node, "name")?;
    let value = match node.value() {
        Some(value) => ctx.substitute(value),
        None => ctx.attr(node, "value").unwrap_or_default(),
    };
    ctx.set_property(name.clone(), value.clone());
    Ok(PluginObject::Property(name, value))
}

fn build_custom_level(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let name = ctx.required_attr(node, "name")?;
    let int_level: u32 = ctx
        .parse_attr(node, "intLevel")?
        .ok_or_else(|| LoggerError::config(node.name(), "missing required attribute 'intLevel'"))?;
    let level = Level::for_name(&name, int_level);
    if level.int_level() != int_level {
        tracing::warn!(
            level = level.name(),
            existing = level.int_level(),
            requested = int_level,
            "Level already registered with another severity, keeping the existing one"
        );
    }
    Ok(PluginObject::CustomLevel(level))
}

fn build_loggers(_: &Node, children: Vec<PluginObject>, _: &mut BuildContext) -> Result<PluginObject> {
    let roots = children
        .iter()
        .filter(|c| matches!(c, PluginObject::Logger(d) if d.root))
        .count();
    if roots > 1 {
        return Err(LoggerError::DuplicateRoot);
    }
    Ok(PluginObject::List(children))
}

fn build_logger(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut definition = LoggerDefinition::new(ctx.required_attr(node, "name")?);
    fill_logger(&mut definition, node, children, ctx)?;
    Ok(PluginObject::Logger(definition))
}

fn build_root(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut definition = LoggerDefinition::root(None);
    fill_logger(&mut definition, node, children, ctx)?;
    Ok(PluginObject::Logger(definition))
}

fn fill_logger(
    definition: &mut LoggerDefinition,
    node: &Node,
    children: Vec<PluginObject>,
    ctx: &BuildContext,
) -> Result<()> {
    let mut parts = Parts::split(node, children);
    definition.level = ctx.level_attr(node, "level")?;
    definition.additive = ctx.bool_attr(node, "additivity", true)?;
    definition.filter = parts.filter();
    definition.appender_refs = parts.refs;
    Ok(())
}

fn build_appender_ref(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    Ok(PluginObject::AppenderRef(AppenderRef::new(
        ctx.required_attr(node, "ref")?,
        ctx.level_attr(node, "level")?,
    )))
}

fn build_filters(node: &Node, children: Vec<PluginObject>, _: &mut BuildContext) -> Result<PluginObject> {
    let mut parts = Parts::split(node, children);
    let filter = parts
        .filter()
        .unwrap_or_else(|| Arc::new(CompositeFilter::new(Vec::new())));
    Ok(PluginObject::Filter(filter))
}

fn match_results(
    node: &Node,
    ctx: &BuildContext,
) -> Result<(FilterResult, FilterResult)> {
    Ok((
        ctx.parse_attr(node, "onMatch")?.unwrap_or(FilterResult::Neutral),
        ctx.parse_attr(node, "onMismatch")?.unwrap_or(FilterResult::Deny),
    ))
}

fn build_threshold_filter(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let level = ctx.level_attr(node, "level")?.unwrap_or(Level::ERROR);
    let (on_match, on_mismatch) = match_results(node, ctx)?;
    Ok(PluginObject::Filter(Arc::new(ThresholdFilter::new(level, on_match, on_mismatch))))
}

fn build_string_match_filter(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let text = ctx.required_attr(node, "text")?;
    let (on_match, on_mismatch) = match_results(node, ctx)?;
    Ok(PluginObject::Filter(Arc::new(StringMatchFilter::new(text, on_match, on_mismatch))))
}

fn build_text_layout(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut layout = TextLayout::new();
    if let Some(format) = ctx.attr(node, "timestampFormat") {
        layout = layout.with_timestamp_format(format);
    }
    Ok(PluginObject::Layout(Arc::new(layout)))
}

fn build_json_layout(node: &Node, _: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let layout = if ctx.bool_attr(node, "pretty", false)? {
        JsonLayout::pretty()
    } else {
        JsonLayout::new()
    };
    Ok(PluginObject::Layout(Arc::new(layout)))
}

fn build_console(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut parts = Parts::split(node, children);
    let mut appender = ConsoleAppender::new(ctx.required_attr(node, "name")?)
        .with_target(ctx.parse_attr::<ConsoleTarget>(node, "target")?.unwrap_or_default())
        .with_colors(ctx.bool_attr(node, "colors", true)?);
    if let Some(layout) = parts.layout.take() {
        appender = appender.with_layout(layout);
    }
    if let Some(filter) = parts.filter() {
        appender = appender.with_filter(filter);
    }
    Ok(PluginObject::Appender(Arc::new(appender)))
}

fn build_file(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut parts = Parts::split(node, children);
    let name = ctx.required_attr(node, "name")?;
    let path = ctx.required_attr(node, "fileName")?;
    let mut appender = FileAppender::open(name, path, ctx.bool_attr(node, "append", true)?)?
        .with_immediate_flush(ctx.bool_attr(node, "immediateFlush", true)?)
        .with_locking(ctx.bool_attr(node, "locking", false)?);
    if let Some(layout) = parts.layout.take() {
        appender = appender.with_layout(layout);
    }
    if let Some(filter) = parts.filter() {
        appender = appender.with_filter(filter);
    }
    Ok(PluginObject::Appender(Arc::new(appender)))
}

fn build_async(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut parts = Parts::split(node, children);
    let name = ctx.required_attr(node, "name")?;

    let mut builder = AsyncAppender::builder(name.clone());
    for r in &parts.refs {
        let target = ctx.appender(&r.reference).ok_or_else(|| {
            LoggerError::config(
                node.name(),
                format!(
                    "'{}' references appender '{}', which is not defined before it",
                    name, r.reference
                ),
            )
        })?;
        builder = builder.control(AppenderControl::new(target, r.level));
    }
    if let Some(size) = ctx.parse_attr::<usize>(node, "bufferSize")? {
        builder = builder.queue_size(size);
    }
    if let Some(policy) = ctx.parse_attr::<OverflowPolicy>(node, "overflowPolicy")? {
        builder = builder.overflow_policy(policy);
    }
    if let Some(filter) = parts.filter() {
        builder = builder.filter(filter);
    }
    Ok(PluginObject::Appender(Arc::new(builder.build()?)))
}

#[cfg(feature = "network")]
fn build_socket(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    use crate::appenders::{Protocol, SocketAppender};
    use crate::manager::datagram::DatagramManagerData;
    use crate::manager::tcp::{TcpManagerData, DEFAULT_PORT};

    let mut parts = Parts::split(node, children);
    let name = ctx.required_attr(node, "name")?;
    let host = ctx.required_attr(node, "host")?;
    let port = ctx.parse_attr::<u16>(node, "port")?.unwrap_or(DEFAULT_PORT);

    let mut appender = match ctx.parse_attr::<Protocol>(node, "protocol")?.unwrap_or_default() {
        Protocol::Tcp => {
            let mut data = TcpManagerData::new(host, port);
            if let Some(delay) = ctx.millis_attr(node, "reconnectionDelayMillis")? {
                data = data.with_reconnect_delay(delay);
            }
            if let Some(timeout) = ctx.millis_attr(node, "connectTimeoutMillis")? {
                data = data.with_connect_timeout(timeout);
            }
            SocketAppender::tcp(name, ctx.managers(), data)?
        }
        Protocol::Udp => SocketAppender::udp(name, ctx.managers(), DatagramManagerData::new(host, port))?,
    };
    if let Some(layout) = parts.layout.take() {
        appender = appender.with_layout(layout);
    }
    if let Some(filter) = parts.filter() {
        appender = appender.with_filter(filter);
    }
    Ok(PluginObject::Appender(Arc::new(appender)))
}

/// Filters on an SMTP element decide what triggers a mail rather than
/// what is accepted.
#[cfg(feature = "smtp")]
fn build_smtp(node: &Node, children: Vec<PluginObject>, ctx: &mut BuildContext) -> Result<PluginObject> {
    use crate::appenders::SmtpAppender;
    use crate::manager::smtp::{SmtpManagerData, DEFAULT_BUFFER_SIZE, DEFAULT_SMTP_PORT};

    let mut parts = Parts::split(node, children);
    let name = ctx.required_attr(node, "name")?;
    let addresses = |key: &str| -> Vec<String> {
        ctx.attr(node, key)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let data = SmtpManagerData {
        to: addresses("to"),
        cc: addresses("cc"),
        bcc: addresses("bcc"),
        from: ctx.attr(node, "from"),
        reply_to: ctx.attr(node, "replyTo"),
        subject: ctx.attr(node, "subject").unwrap_or_default(),
        host: ctx.attr(node, "smtpHost").unwrap_or_default(),
        port: ctx.parse_attr(node, "smtpPort")?.unwrap_or(DEFAULT_SMTP_PORT),
        buffer_size: ctx.parse_attr(node, "bufferSize")?.unwrap_or(DEFAULT_BUFFER_SIZE),
        transport: None,
    };

    let mut appender = SmtpAppender::new(name, ctx.managers(), data)?;
    if let Some(layout) = parts.layout.take() {
        appender = appender.with_layout(layout);
    }
    if let Some(trigger) = parts.filter() {
        appender = appender.with_trigger(trigger);
    } else if let Some(level) = ctx.level_attr(node, "triggerLevel")? {
        appender = appender.with_trigger_level(level);
    }
    Ok(PluginObject::Appender(Arc::new(appender)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationBuilder;
    use crate::config::ComponentBuilder;
    use crate::core::{Appender, LogEvent};
    use crate::manager::ManagerRegistry;
    use std::time::Duration;
    use tempfile::TempDir;

    fn registry() -> Arc<PluginRegistry> {
        Arc::new(PluginRegistry::with_core_plugins())
    }

    #[test]
    fn test_core_catalog() {
        let plugins = registry();
        for name in ["Configuration", "Loggers", "Root", "AppenderRef", "ThresholdFilter", "Async"] {
            assert!(plugins.contains(name), "{} missing", name);
        }
        assert_eq!(
            plugins.resolve("console").unwrap().category(),
            PluginCategory::Appender
        );
    }

    #[test]
    fn test_property_substitution_in_file_name() {
        let dir = TempDir::new().unwrap();
        let builder = ConfigurationBuilder::new().add_property("dir", &dir.path().display().to_string());
        let file = builder
            .new_appender("Out", "File")
            .add_attribute("fileName", "${dir}/app.log")
            .add_attribute("immediateFlush", false);
        let root = builder
            .new_root_logger(Level::INFO)
            .add_component(builder.new_appender_ref("Out"));

        let mut built = builder.add_appender(file).add_root_logger(root).build(registry());
        let config = built.initialize(&ManagerRegistry::new()).unwrap();

        assert_eq!(config.property("dir"), Some(dir.path().display().to_string().as_str()));
        assert!(dir.path().join("app.log").exists());
        assert!(config.stop(Duration::from_secs(1)));
    }

    #[test]
    fn test_async_requires_earlier_appender() {
        let builder = ConfigurationBuilder::new();
        let asynch = builder
            .new_appender("Async", "Async")
            .add_component(builder.new_appender_ref("Later"));
        let later = builder.new_appender("Later", "Console");

        let mut built = builder.add_appender(asynch).add_appender(later).build(registry());
        let err = built.initialize(&ManagerRegistry::new()).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_custom_level_and_logger_settings() {
        let builder = ConfigurationBuilder::new().add_custom_level("NOTICE", 350);
        let logger = builder
            .new_logger("com.example", Level::INFO)
            .add_attribute("additivity", false)
            .add_component(builder.new_filter("ThresholdFilter", FilterResult::Neutral, FilterResult::Deny))
            .add_component(
                builder
                    .new_filter("StringMatchFilter", FilterResult::Deny, FilterResult::Neutral)
                    .add_attribute("text", "secret"),
            );

        let mut built = builder.add_logger(logger).build(registry());
        let config = built.initialize(&ManagerRegistry::new()).unwrap();

        assert_eq!(config.custom_levels()[0].name(), "NOTICE");
        let logger = config.logger_config("com.example.db");
        assert_eq!(logger.name(), "com.example");
        assert!(!logger.is_additive());
        assert!(logger.filter().is_some());
        assert!(config.stop(Duration::from_secs(1)));
    }

    #[test]
    fn test_threshold_filter_defaults() {
        let builder = ConfigurationBuilder::new();
        let console = builder
            .new_appender("Stdout", "Console")
            .add_component(builder.new_layout("JsonLayout").add_attribute("pretty", true))
            .add_component(
                ComponentBuilder::new("ThresholdFilter")
                    .add_attribute("level", "warn"),
            );
        let mut built = builder.add_appender(console).build(registry());
        let config = built.initialize(&ManagerRegistry::new()).unwrap();

        let appender = config.appender("Stdout").unwrap();
        let filter = appender.filter().unwrap();
        let quiet = LogEvent::new("t", Level::INFO, "quiet");
        let loud = LogEvent::new("t", Level::WARN, "loud");
        assert_eq!(filter.filter(&quiet), FilterResult::Deny);
        assert_eq!(filter.filter(&loud), FilterResult::Neutral);
        assert!(config.stop(Duration::from_secs(1)));
    }
}
