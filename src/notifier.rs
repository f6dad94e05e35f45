//! Logging and progress UI.
//!
//! [`Notifier`] puts `env_logger` (text logs) and `indicatif` (a progress bar) behind one
//! verbosity switch:
//! - [`VerbosityLevel::Quiet`] → warnings only; requested inputs are tracked on a bar.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] → text logs.
//!
//! Engine modules log through the `log` macros; [`Notifier::init_logging`] installs the
//! global logger those macros write to. That logger shares the bar with the notifier and
//! hides it while a record is printed.

use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Progress bar, warnings only
    Info = 1,  // Text logs at info level
    Debug = 2, // Text logs at debug level
    Trace = 3, // Text logs at trace level
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Global logger that clears the progress bar while a record is printed, so warnings
/// raised mid-run do not tear the bar.
struct BarAwareLogger {
    inner: env_logger::Logger,
    progress: SharedBar,
}

impl BarAwareLogger {
    fn active_bar(&self) -> Option<ProgressBar> {
        lock_bar(&self.progress).clone()
    }
}

impl Log for BarAwareLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.matches(record) {
            return;
        }
        // Clone out of the lock so a record logged from inside suspend cannot deadlock
        match self.active_bar() {
            Some(bar) => bar.suspend(|| self.inner.log(record)),
            None => self.inner.log(record),
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

type SharedBar = Arc<Mutex<Option<ProgressBar>>>;

fn lock_bar(progress: &SharedBar) -> MutexGuard<'_, Option<ProgressBar>> {
    progress.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    progress: SharedBar,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        Self {
            verbosity: VerbosityLevel::from(verbosity_level),
            progress: Arc::new(Mutex::new(None)),
        }
    }

    fn logger(&self) -> BarAwareLogger {
        let inner = env_logger::Builder::from_env(Env::default())
            .filter_level(self.verbosity.to_log_level())
            .format_timestamp(None)
            .build();
        BarAwareLogger {
            inner,
            progress: Arc::clone(&self.progress),
        }
    }

    /// Installs `env_logger` at the level matching the verbosity as the global logger.
    /// `RUST_LOG` still wins for individual modules. A logger installed earlier is left
    /// in place.
    pub fn init_logging(&self) {
        let logger = self.logger();
        let max_level = logger.inner.filter();
        if log::set_boxed_logger(Box::new(logger)).is_ok() {
            log::set_max_level(max_level);
        }
    }

    fn bar(&self) -> Option<ProgressBar> {
        lock_bar(&self.progress).clone()
    }

    pub fn info(&self, message: &str) {
        match self.bar() {
            Some(bar) => bar.set_message(message.to_string()),
            None => log::info!("{}", message),
        }
    }

    pub fn debug(&self, message: &str) {
        log::debug!("{}", message);
    }

    /// Starts a bar over `total` steps. Only drawn in Quiet mode.
    pub fn start_progress(&self, total: u64, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.info(message);
            return;
        }

        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}/{len:3} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message(message.to_string());
        *lock_bar(&self.progress) = Some(bar);
    }

    /// Marks one step done.
    pub fn advance(&self, current: u64, total: u64, message: &str) {
        match self.bar() {
            Some(bar) => bar.inc(1),
            None => log::info!("{}: {}/{}", message, current, total),
        }
    }

    pub fn finish(&self, message: &str) {
        let bar = lock_bar(&self.progress).take();
        match bar {
            Some(bar) => bar.finish_with_message(message.to_string()),
            None => log::info!("{}", message),
        }
    }

    /// Drops the bar without a completion message, used when a run aborts.
    pub fn abandon(&self) {
        let bar = lock_bar(&self.progress).take();
        if let Some(bar) = bar {
            bar.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(VerbosityLevel::from(0), VerbosityLevel::Quiet);
        assert_eq!(VerbosityLevel::from(2), VerbosityLevel::Debug);
        assert_eq!(VerbosityLevel::from(9), VerbosityLevel::Trace);
        assert_eq!(VerbosityLevel::Quiet.to_log_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_progress_only_in_quiet_mode() {
        let notifier = Notifier::new(1);
        notifier.start_progress(3, "Collecting");
        assert!(notifier.bar().is_none());

        let notifier = Notifier::new(0);
        notifier.start_progress(3, "Collecting");
        notifier.advance(1, 3, "Collecting");
        assert_eq!(notifier.bar().map(|b| b.position()), Some(1));
        notifier.finish("Done");
        assert!(notifier.bar().is_none());
    }

    #[test]
    fn test_logger_shares_the_bar() {
        let notifier = Notifier::new(0);
        let logger = notifier.logger();
        assert!(logger.active_bar().is_none());

        notifier.start_progress(2, "Collecting");
        assert!(logger.active_bar().is_some());

        let metadata = Metadata::builder()
            .level(log::Level::Warn)
            .target("scratchify::dependencies")
            .build();
        assert!(logger.enabled(&metadata));
        logger.log(
            &Record::builder()
                .metadata(metadata)
                .args(format_args!("libz.so.1 could not be resolved"))
                .build(),
        );
        logger.flush();
        // Printing through the bar leaves it running
        notifier.advance(1, 2, "Collecting");
        assert_eq!(logger.active_bar().map(|b| b.position()), Some(1));

        notifier.abandon();
        assert!(logger.active_bar().is_none());
    }
}
