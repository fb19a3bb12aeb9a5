//! Mail appender: quiet events are buffered, a triggering event sends them
//! all in one message.

use crate::core::{
    Appender, AppenderBase, Filter, FilterResult, Layout, Level, LogEvent, LoggerError, Result,
    TextLayout, ThresholdFilter,
};
use crate::manager::smtp::{get_smtp_manager, SmtpManager, SmtpManagerData};
use crate::manager::{ManagerHandle, ManagerRegistry};
use std::sync::Arc;
use std::time::Duration;

pub struct SmtpAppender {
    base: AppenderBase,
    manager: ManagerHandle<SmtpManager>,
    layout: Arc<dyn Layout>,
    trigger: Arc<dyn Filter>,
}

impl SmtpAppender {
    pub fn new(name: impl Into<String>, managers: &ManagerRegistry, data: SmtpManagerData) -> Result<Self> {
        let key = data.key();
        let manager =
            get_smtp_manager(managers, data).ok_or_else(|| LoggerError::manager_unavailable(key))?;
        Ok(Self {
            base: AppenderBase::new(name, None),
            manager,
            layout: Arc::new(TextLayout::new()),
            trigger: Arc::new(ThresholdFilter::new(
                Level::ERROR,
                FilterResult::Neutral,
                FilterResult::Deny,
            )),
        })
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = layout;
        self
    }

    /// Events this filter denies are buffered; any other result sends.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Arc<dyn Filter>) -> Self {
        self.trigger = trigger;
        self
    }

    #[must_use]
    pub fn with_trigger_level(self, level: Level) -> Self {
        self.with_trigger(Arc::new(ThresholdFilter::new(
            level,
            FilterResult::Neutral,
            FilterResult::Deny,
        )))
    }

    pub fn manager(&self) -> &SmtpManager {
        &self.manager
    }
}

impl Appender for SmtpAppender {
    fn append(&self, event: &LogEvent) -> Result<()> {
        self.base.ensure_started()?;
        if self.trigger.filter(event) == FilterResult::Deny {
            self.manager.add(event.clone());
            return Ok(());
        }
        self.manager.send_events(self.layout.as_ref(), event)
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn stop(&self, timeout: Duration) -> bool {
        if !self.base.mark_stopped() {
            return true;
        }
        self.manager.close(timeout)
    }

    fn is_started(&self) -> bool {
        self.base.is_started()
    }
}
