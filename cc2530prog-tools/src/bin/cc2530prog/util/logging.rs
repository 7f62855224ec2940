use std::fs::File;
use std::path::PathBuf;

use indicatif::MultiProgress;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter as TracingLevel;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Progress bars currently on screen, log lines are printed above them.
static PROGRESS_BAR: Mutex<Option<MultiProgress>> = Mutex::new(None);

/// Keeps the JSON log writer alive, flushing it when dropped.
pub struct LogFileGuard {
    _writer: WorkerGuard,
    path: PathBuf,
}

impl Drop for LogFileGuard {
    fn drop(&mut self) {
        tracing::info!("Wrote log to {}", self.path.display());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[clap(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LevelFilter {
    /// The level selected by passing `-v` `count` times.
    pub fn from_verbosity(count: u8) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Self::Info),
            2 => Some(Self::Debug),
            _ => Some(Self::Trace),
        }
    }
}

impl From<LevelFilter> for TracingLevel {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        }
    }
}

/// Routes formatted events through [`eprintln`] so they land above the bars.
struct StderrWriter;

impl std::io::Write for StderrWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        eprintln(line.trim_end_matches(['\r', '\n']));
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Filter for stderr: an explicit level wins, otherwise `RUST_LOG`, otherwise WARN.
fn stderr_filter(level: Option<LevelFilter>) -> EnvFilter {
    let builder = EnvFilter::builder();
    match level {
        Some(level) => builder
            .with_default_directive(TracingLevel::from(level).into())
            .parse_lossy(""),
        None => builder
            .with_default_directive(TracingLevel::WARN.into())
            .from_env_lossy(),
    }
}

/// Install the global subscriber. With `log_path` every event down to
/// TRACE is also written to that file as JSON.
pub fn setup_logging(
    log_path: Option<PathBuf>,
    level: Option<LevelFilter>,
) -> anyhow::Result<Option<LogFileGuard>> {
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(|| StderrWriter)
        .with_filter(stderr_filter(level));

    let (file, guard) = match log_path {
        Some(path) => {
            let (writer, worker) = NonBlockingBuilder::default()
                .lossy(false)
                .finish(File::create(&path)?);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::FULL)
                .with_writer(writer)
                .with_filter(TracingLevel::TRACE);
            let guard = LogFileGuard {
                _writer: worker,
                path,
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stderr).with(file).init();

    if let Some(guard) = &guard {
        tracing::info!("Writing log to {}", guard.path.display());
    }
    Ok(guard)
}

pub fn set_progress_bar(progress: MultiProgress) {
    *PROGRESS_BAR.lock() = Some(progress);
}

pub fn clear_progress_bar() {
    *PROGRESS_BAR.lock() = None;
}

/// Write a line to stderr, above the progress bars if there are any.
pub fn eprintln(message: impl AsRef<str>) {
    match PROGRESS_BAR.lock().as_ref() {
        Some(bars) => {
            let _ = bars.println(message.as_ref());
        }
        None => eprintln!("{}", message.as_ref()),
    }
}

pub fn println(message: impl AsRef<str>) {
    match PROGRESS_BAR.lock().as_ref() {
        Some(bars) => {
            let _ = bars.println(message.as_ref());
        }
        None => println!("{}", message.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(LevelFilter::from_verbosity(0), None);
        assert_eq!(LevelFilter::from_verbosity(1), Some(LevelFilter::Info));
        assert_eq!(LevelFilter::from_verbosity(2), Some(LevelFilter::Debug));
        assert_eq!(LevelFilter::from_verbosity(5), Some(LevelFilter::Trace));
    }

    #[test]
    fn an_explicit_level_ignores_the_environment() {
        let filter = stderr_filter(Some(LevelFilter::Debug));
        assert_eq!(filter.max_level_hint(), Some(TracingLevel::DEBUG));
    }
}
