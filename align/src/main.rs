use align::Cli;
use clap::Parser;

fn main() {
    let mut cmd: Cli = Cli::parse();
    cmd.run_program();
}
