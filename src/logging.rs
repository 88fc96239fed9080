use crate::error::{DiscoveryError, ErrorHandler};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

pub trait DiscoveryLogger: Send + Sync {
    fn log(&self, level: LogLevel, component: &str, msg: &str);
}

/// Forwards to the `log` facade, using `ssdp::<component>` as the target.
pub struct LogFacade;

impl LogFacade {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl DiscoveryLogger for LogFacade {
    fn log(&self, level: LogLevel, component: &str, msg: &str) {
        let target = format!("ssdp::{}", component);
        log::log!(target: target.as_str(), log::Level::from(level), "{}", msg);
    }
}

pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl DiscoveryLogger for ConsoleLogger {
    fn log(&self, level: LogLevel, component: &str, msg: &str) {
        let level_str = match level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        };
        println!("[{}] [{}] {}", level_str, component, msg);
    }
}

/// Logger bound to one component, plus the optional hook that background
/// failures are forwarded to.
#[derive(Clone)]
pub(crate) struct Diagnostics {
    logger: Arc<dyn DiscoveryLogger>,
    on_error: Option<ErrorHandler>,
    component: &'static str,
}

impl Diagnostics {
    pub(crate) fn new(
        logger: Arc<dyn DiscoveryLogger>,
        on_error: Option<ErrorHandler>,
        component: &'static str,
    ) -> Self {
        Diagnostics { logger, on_error, component }
    }

    pub(crate) fn component(&self, component: &'static str) -> Self {
        Diagnostics { component, ..self.clone() }
    }

    pub(crate) fn with_error_handler(&self, on_error: ErrorHandler) -> Self {
        Diagnostics { on_error: Some(on_error), ..self.clone() }
    }

    pub(crate) fn on_error(&self) -> Option<ErrorHandler> {
        self.on_error.clone()
    }

    pub(crate) fn debug(&self, msg: &str) {
        self.logger.log(LogLevel::Debug, self.component, msg);
    }

    pub(crate) fn info(&self, msg: &str) {
        self.logger.log(LogLevel::Info, self.component, msg);
    }

    pub(crate) fn warn(&self, msg: &str) {
        self.logger.log(LogLevel::Warn, self.component, msg);
    }

    /// Log a failure nobody can return an error for, then hand it to the hook.
    pub(crate) fn failure(&self, context: &str, err: DiscoveryError) {
        self.report(context, &err);
    }

    /// Like [`Diagnostics::failure`], for an error that is also delivered elsewhere.
    pub(crate) fn report(&self, context: &str, err: &DiscoveryError) {
        self.logger.log(LogLevel::Error, self.component, &format!("{}: {}", context, err));
        if let Some(on_error) = &self.on_error {
            on_error(err);
        }
    }
}
