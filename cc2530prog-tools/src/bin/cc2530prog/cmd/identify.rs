use anyhow::Context;
use cc2530prog::{chip, Config};
use colored::Colorize;

use crate::util::common_options::attach;

#[derive(clap::Parser)]
pub struct Cmd {}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let mut session = attach(config)?;

        let info = chip::identify(session.interface()?).context("Failed to identify the target.")?;

        println!("{}", info.to_string().green().bold());
        println!("  Extended address: {}", info.extended_address_string());
        println!(
            "  USB:              {}",
            if info.usb() { "available" } else { "not available" }
        );
        match info.flash_size() {
            Some(size) => println!("  Flash:            {size}"),
            None => println!(
                "  Flash:            unknown size code {}",
                info.chip_info0.flash_size_code()
            ),
        }
        println!(
            "  CHIPINFO:         {:#04x} {:#04x}",
            info.chip_info0.0, info.chip_info1
        );

        session.close()?;
        Ok(())
    }
}
