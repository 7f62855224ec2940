use cc2530prog::command::{Parameters, COMMANDS};

#[derive(clap::Parser)]
pub struct Cmd {}

impl Cmd {
    pub fn run(self) -> anyhow::Result<()> {
        println!("{:<14} {:>6} {:>10} {:>9}", "name", "opcode", "parameters", "response");

        for command in COMMANDS.iter() {
            let parameters = match command.parameters {
                Parameters::Fixed(count) => count.to_string(),
                Parameters::Variable(_) => "variable".to_string(),
            };

            println!(
                "{:<14} {:>#6x} {:>10} {:>9}",
                command.name, command.opcode, parameters, command.response_len
            );
        }

        Ok(())
    }
}
