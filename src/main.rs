mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use sheaf::{Site, watch};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let site = site_from_cli(&cli);

    match &cli.command {
        Commands::Build { .. } => site.build().map(|_| ()),
        Commands::Watch { .. } => watch::watch(&site),
    }
}

fn site_from_cli(cli: &Cli) -> Site {
    let site = Site::new(&cli.src)
        .with_env(cli.env())
        .with_drafts(cli.command.build_args().drafts);
    match &cli.dest {
        Some(dest) => site.with_dest(dest),
        None => site,
    }
}
