use anyhow::Context;
use cc2530prog::Config;

use crate::util::common_options::attach;
use crate::util::{hex_bytes, parse_u8};

#[derive(clap::Parser)]
pub struct Cmd {
    /// Name of the debug command, or the start of one.
    name: String,

    /// Parameter bytes, e.g. `0x22`.
    #[clap(value_parser = parse_u8)]
    params: Vec<u8>,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let mut session = attach(config)?;

        let response = session
            .interface()?
            .execute_named(&self.name, &self.params)
            .with_context(|| format!("Failed to run '{}'.", self.name))?;

        println!("result: {}", hex_bytes(&response));

        session.close()?;
        Ok(())
    }
}
