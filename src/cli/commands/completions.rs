//! Completions command - print a shell completion script

use crate::cli::args::Cli;
use clap::CommandFactory;
use clap_complete::Shell;

/// Write the completion script for `shell` to stdout
pub fn execute(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
