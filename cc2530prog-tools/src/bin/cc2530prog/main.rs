mod cmd;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use cc2530prog::Config;
use clap::Parser;
use figment::providers::{Env, Format as _, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::util::common_options::TargetOptions;
use crate::util::logging::{setup_logging, LevelFilter};

const CONFIG_FILE: &str = "cc2530prog.toml";
const ENV_PREFIX: &str = "CC2530PROG_";

/// Settings read from configuration files and the environment.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<LevelFilter>,
    #[serde(flatten)]
    programmer: Config,
}

#[derive(clap::Parser)]
#[clap(
    name = "cc2530prog",
    about = "Identify, erase, program and verify TI CC2530 chips over GPIOs",
    version
)]
struct Cli {
    /// Log more, twice for debug output.
    #[clap(short, long, global = true, action = clap::ArgAction::Count, help_heading = "LOG CONFIGURATION")]
    verbose: u8,
    /// Log level, overrides `-v` and `RUST_LOG`.
    #[clap(long, global = true, value_enum, help_heading = "LOG CONFIGURATION")]
    log_level: Option<LevelFilter>,
    /// Also write a JSON log with wire level traffic to this file.
    #[clap(long, global = true, help_heading = "LOG CONFIGURATION")]
    log_file: Option<PathBuf>,

    #[clap(flatten)]
    target: TargetOptions,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Read the chip id, extended address and flash size
    Identify(cmd::identify::Cmd),
    /// Erase the chip and write a raw binary image to flash
    Program(cmd::program::Cmd),
    /// Run a single debug command by name
    Command(cmd::command::Cmd),
    /// List the debug commands
    List(cmd::list::Cmd),
}

impl Cli {
    fn run(self, config: &Config) -> Result<()> {
        match self.subcommand {
            Subcommand::Identify(cmd) => cmd.run(config),
            Subcommand::Program(cmd) => cmd.run(config),
            Subcommand::Command(cmd) => cmd.run(config),
            Subcommand::List(cmd) => cmd.run(),
        }
    }
}

fn main() -> Result<()> {
    let matches = Cli::parse();

    let file_config = load_config(config_paths()).context("Failed to load configuration.")?;

    let level = matches
        .log_level
        .or_else(|| LevelFilter::from_verbosity(matches.verbose))
        .or(file_config.log_level);
    let _logger_guard = setup_logging(matches.log_file.clone(), level)?;

    let mut config = file_config.programmer;
    matches.target.apply(&mut config);
    tracing::debug!("Using {:?}", config);

    matches.run(&config)
}

/// Directories searched for the configuration file, in increasing priority.
fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = directories::UserDirs::new().map(|user| user.home_dir().to_path_buf()) {
        paths.push(home);
    }
    paths.push(PathBuf::from("."));
    paths
}

fn load_config(paths: Vec<PathBuf>) -> Result<FileConfig> {
    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    for path in paths {
        figment = figment.merge(Toml::file(path.join(CONFIG_FILE)));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    Ok(figment.extract()?)
}
