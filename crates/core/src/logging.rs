//! Repository logging port.
//!
//! The engine never writes to a log sink directly. Debug lines and failures
//! go through a [`RepoLogger`] so hosts can route them wherever they like;
//! [`TracingLogger`] forwards to `tracing` and is what the registry uses
//! unless told otherwise.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

/// Sink for cache debug lines and failures.
pub trait RepoLogger: Send + Sync {
    /// Emit a debug line.
    fn log(&self, tag: &str, message: &str);

    /// Report a failure together with its cause.
    fn error(&self, error: &dyn Error, tag: &str, message: &str);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl RepoLogger for TracingLogger {
    fn log(&self, tag: &str, message: &str) {
        debug!(tag = %tag, "{message}");
    }

    fn error(&self, err: &dyn Error, tag: &str, message: &str) {
        error!(tag = %tag, error = %err, "{message}");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl RepoLogger for NoopLogger {
    fn log(&self, _tag: &str, _message: &str) {}

    fn error(&self, _error: &dyn Error, _tag: &str, _message: &str) {}
}

/// Tagged handle over a shared [`RepoLogger`].
///
/// Debug lines are only forwarded when the handle is enabled; errors are
/// always forwarded.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn RepoLogger>,
    tag: Arc<str>,
    debug: bool,
}

impl Logger {
    pub fn new(sink: Arc<dyn RepoLogger>, tag: impl AsRef<str>, debug: bool) -> Self {
        Self { sink, tag: Arc::from(tag.as_ref()), debug }
    }

    /// Handle over [`TracingLogger`].
    pub fn tracing(tag: impl AsRef<str>, debug: bool) -> Self {
        Self::new(Arc::new(TracingLogger), tag, debug)
    }

    /// Handle that drops every line.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopLogger), "", false)
    }

    /// Child handle tagged `parent:suffix`, sharing the sink and debug flag.
    pub fn child(&self, suffix: &str) -> Self {
        let tag = if self.tag.is_empty() {
            Arc::from(suffix)
        } else {
            Arc::from(format!("{}:{suffix}", self.tag))
        };
        Self { sink: Arc::clone(&self.sink), tag, debug: self.debug }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn log(&self, message: impl AsRef<str>) {
        if self.debug {
            self.sink.log(&self.tag, message.as_ref());
        }
    }

    pub fn error(&self, err: &dyn Error, message: impl AsRef<str>) {
        self.sink.error(err, &self.tag, message.as_ref());
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("tag", &self.tag).field("debug", &self.debug).finish()
    }
}
