use std::time::Duration;

use cc2530prog::flashing::{ProgressEvent, BLOCK_SIZE};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use super::logging;

const TICK_CHARS: &str = "⠁⠁⠉⠙⠚⠒⠂⠂⠒⠲⠴⠤⠄⠄⠤⠠⠠⠤⠦⠖⠒⠐⠐⠒⠓⠋⠉⠈⠈✔";

fn style(template: &str, progress_chars: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars(TICK_CHARS)
        .progress_chars(progress_chars)
}

fn idle() -> ProgressStyle {
    style("{msg:.green.bold} {spinner} {percent:>3}% [{bar:20}]", "--")
}

fn active() -> ProgressStyle {
    style(
        "{msg:.green.bold} {spinner} {percent:>3}% [{bar:20}] {bytes:>10} @ {bytes_per_sec:>12} (ETA {eta})",
        "##-",
    )
}

fn finished() -> ProgressStyle {
    style(
        "{msg:.green.bold} {spinner} {percent:>3}% [{bar:20}] {bytes:>10} @ {bytes_per_sec:>12} (took {elapsed})",
        "##",
    )
}

/// A single bar for one stage of the download.
struct StageBar {
    bar: ProgressBar,
}

impl StageBar {
    fn new(multi_progress: &MultiProgress, message: &'static str) -> Self {
        let bar = multi_progress.add(ProgressBar::new(0));
        bar.set_message(message);
        bar.set_style(idle());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    fn start(&self, length: u64) {
        self.bar.set_length(length);
        self.bar.reset_elapsed();
        self.bar.reset_eta();
    }

    fn inc(&self, size: u64) {
        self.bar.set_style(active());
        self.bar.inc(size);
    }

    fn finish(&self) {
        self.bar.set_style(finished());
        self.bar.finish();
    }

    fn abandon(&self) {
        self.bar.abandon();
    }
}

struct ProgressBars {
    erase: StageBar,
    program: StageBar,
    verify: Option<StageBar>,
}

/// Renders [`ProgressEvent`]s as progress bars on stderr.
pub struct CliProgressBars {
    multi_progress: MultiProgress,
    progress_bars: Mutex<ProgressBars>,
}

impl CliProgressBars {
    pub fn new() -> Self {
        let multi_progress = MultiProgress::new();
        logging::set_progress_bar(multi_progress.clone());

        let progress_bars = Mutex::new(ProgressBars {
            erase: StageBar::new(&multi_progress, "      Erasing"),
            program: StageBar::new(&multi_progress, "  Programming"),
            verify: None,
        });

        Self {
            multi_progress,
            progress_bars,
        }
    }

    pub fn handle(&self, event: ProgressEvent) {
        let mut bars = self.progress_bars.lock();
        match event {
            ProgressEvent::Identified { chip } => {
                logging::println(format!("Found {chip}"));
            }
            ProgressEvent::StartedErasing => bars.erase.start(1),
            ProgressEvent::FinishedErasing => {
                bars.erase.inc(1);
                bars.erase.finish();
            }
            ProgressEvent::FailedErasing => {
                bars.erase.abandon();
                bars.program.abandon();
            }
            ProgressEvent::StartedProgramming { blocks } => {
                bars.program
                    .start(u64::from(blocks) * u64::from(BLOCK_SIZE));
            }
            ProgressEvent::BlockProgrammed { size, .. } => bars.program.inc(u64::from(size)),
            ProgressEvent::FinishedProgramming { .. } => bars.program.finish(),
            ProgressEvent::FailedProgramming => bars.program.abandon(),
            ProgressEvent::StartedVerifying { bytes } => {
                let verify = StageBar::new(&self.multi_progress, "    Verifying");
                verify.start(u64::from(bytes));
                bars.verify = Some(verify);
            }
            ProgressEvent::BytesVerified { bytes } => {
                if let Some(verify) = &bars.verify {
                    verify.inc(u64::from(bytes));
                }
            }
            ProgressEvent::FinishedVerifying { .. } => {
                if let Some(verify) = &bars.verify {
                    verify.finish();
                }
            }
            ProgressEvent::FailedVerifying => {
                if let Some(verify) = &bars.verify {
                    verify.abandon();
                }
            }
        }
    }
}

impl Drop for CliProgressBars {
    fn drop(&mut self) {
        // The bars disappear otherwise.
        logging::clear_progress_bar();
    }
}
