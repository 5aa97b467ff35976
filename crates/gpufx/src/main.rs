mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = run::load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Probe(args) => run::probe(&config, args),
        Command::Catalog(args) => run::catalog(args),
        Command::Render(args) => run::render(&config, args),
        Command::Sequence(args) => run::sequence(&config, args),
    }
}
