use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use cc2530prog::flashing::{download, DownloadOptions, FirmwareImage, FlashProgress};
use cc2530prog::Config;
use colored::Colorize;

use crate::util::common_options::open_session;
use crate::util::logging;
use crate::util::progress::CliProgressBars;

#[derive(clap::Parser)]
pub struct Cmd {
    /// The raw binary image to write to flash.
    path: PathBuf,

    /// After programming, read back the flash and compare it with the image.
    #[arg(long, help_heading = "DOWNLOAD CONFIGURATION")]
    verify: bool,

    /// Show progress bars while erasing, programming and verifying.
    #[arg(long, help_heading = "DOWNLOAD CONFIGURATION")]
    progress: bool,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let image = FirmwareImage::from_file(&self.path)
            .with_context(|| format!("Failed to read the image '{}'.", self.path.display()))?;
        anyhow::ensure!(!image.is_empty(), "The image '{}' is empty.", self.path.display());

        let progress = if self.progress {
            let bars = CliProgressBars::new();
            FlashProgress::new(move |event| bars.handle(event))
        } else {
            FlashProgress::empty()
        };
        let options = DownloadOptions {
            verify: self.verify,
            progress,
        };

        let mut session = open_session(config)?;
        let timer = Instant::now();

        let result = download(&mut session, &image, &options);
        // Drops the progress bars before anything else is printed.
        drop(options);

        let report = result
            .with_context(|| format!("Programming '{}' failed.", self.path.display()))?;
        session.close()?;

        logging::eprintln(format!(
            "     {} {} bytes in {:.02}s",
            "Finished".green().bold(),
            image.len(),
            timer.elapsed().as_secs_f32(),
        ));
        tracing::debug!(
            "Flash controller was already idle after {} of {} blocks",
            report.program.idle_blocks,
            report.program.blocks
        );
        if let Some(verify) = report.verify {
            logging::eprintln(format!(
                "     {} {} bytes",
                "Verified".green().bold(),
                verify.compared
            ));
        }

        Ok(())
    }
}
