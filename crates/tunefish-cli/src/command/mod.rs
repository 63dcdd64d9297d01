use clap::{Parser, Subcommand};

use self::{export::ExportArg, init_manifest::InitManifestArg, tune::TuneArg};

mod export;
mod init_manifest;
mod tune;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Run a chunk of SPSA tuning iterations against the match runner
    Tune(#[clap(flatten)] TuneArg),
    /// Export tuned values for the parameter injector
    Export(#[clap(flatten)] ExportArg),
    /// Write a starter parameter manifest
    InitManifest(#[clap(flatten)] InitManifestArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Tune(arg) => tune::run(&arg)?,
        Mode::Export(arg) => export::run(&arg)?,
        Mode::InitManifest(arg) => init_manifest::run(&arg)?,
    }
    Ok(())
}
