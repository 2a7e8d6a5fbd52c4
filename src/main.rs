use clap::Parser;
use seqclust::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{align, cluster},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Cluster(_) => "cluster",
        Command::Align(_) => "align",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Cluster(args) => cluster::cluster(args)?,
        Command::Align(args) => align::align(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
