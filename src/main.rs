mod app;
mod cli;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = cli::Cli::parse();
    app::run(cli)
}
