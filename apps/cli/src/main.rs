//! lessonbuild CLI — one-shot lesson page builder.
//!
//! Turns a folder of Markdown lesson fragments with TeX math into a single
//! styled HTML page built from a template folder.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
