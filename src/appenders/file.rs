//! File appender implementation

use crate::core::{Appender, AppenderBase, Filter, Layout, LogEvent, LoggerError, Result, TextLayout};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct FileAppender {
    base: AppenderBase,
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    layout: Arc<dyn Layout>,
    immediate_flush: bool,
    locking: bool,
}

impl FileAppender {
    /// Opens `path` for appending, creating it and missing parent
    /// directories.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(name, path, true)
    }

    /// Like [`new`](Self::new) but truncates an existing file when `append`
    /// is false.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>, append: bool) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation("creating log directory", parent.display().to_string(), e)
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|e| LoggerError::io_operation("opening log file", path.display().to_string(), e))?;

        Ok(Self {
            base: AppenderBase::new(name, None),
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
            layout: Arc::new(TextLayout::new()),
            immediate_flush: true,
            locking: false,
        })
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.base.set_filter(Some(filter));
        self
    }

    /// When false, output is flushed on `flush`, on stop and when the
    /// buffer fills.
    #[must_use]
    pub fn with_immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.immediate_flush = immediate_flush;
        self
    }

    /// Holds an exclusive advisory lock on the file while writing, for
    /// several processes sharing one file. Needs the `file` feature.
    #[must_use]
    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking && cfg!(feature = "file");
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_locking(&self) -> bool {
        self.locking
    }

    fn write_locked(&self, writer: &mut BufWriter<File>, bytes: &[u8]) -> std::io::Result<()> {
        #[cfg(feature = "file")]
        if self.locking {
            use fs2::FileExt;

            writer.get_ref().lock_exclusive()?;
            let result = writer.write_all(bytes).and_then(|_| writer.flush());
            let unlocked = writer.get_ref().unlock();
            return result.and(unlocked);
        }

        writer.write_all(bytes)?;
        if self.immediate_flush {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Appender for FileAppender {
    fn append(&self, event: &LogEvent) -> Result<()> {
        self.base.ensure_started()?;
        let bytes = self.layout.encode(event)?;

        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        self.write_locked(writer, &bytes)
            .map_err(|e| LoggerError::io_operation("writing log file", self.path.display().to_string(), e))
    }

    fn flush(&self) -> Result<()> {
        if let Some(ref mut writer) = *self.writer.lock() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.base.filter()
    }

    fn stop(&self, _timeout: Duration) -> bool {
        if !self.base.mark_stopped() {
            return true;
        }
        match self.writer.lock().take() {
            Some(mut writer) => {
                if let Some(footer) = self.layout.footer() {
                    let _ = writer.write_all(&footer);
                }
                writer.flush().is_ok()
            }
            None => true,
        }
    }

    fn is_started(&self) -> bool {
        self.base.is_started()
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = Appender::flush(self);
    }
}
