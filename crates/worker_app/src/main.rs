mod app;
mod cli;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    app::run_app(cli::Args::parse())
}
