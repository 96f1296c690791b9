//! Completions command - print a shell completion script.

use clap::Args as ClapArgs;
use clap_complete::{generate, Shell};
use std::io;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn execute(args: &Args, cmd: &mut clap::Command) {
    let name = cmd.get_name().to_string();
    generate(args.shell, cmd, name, &mut io::stdout());
}
