use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use doctrans_core::MAX_RETENTION_DAYS;

#[derive(Parser, Debug)]
#[command(
    name = "doctrans",
    version,
    about = "Translate documents in bulk through a hosted translation service"
)]
pub struct Cli {
    /// Configuration file.
    #[arg(
        long,
        global = true,
        env = "DOCTRANS_CONFIG",
        default_value = "doctrans.toml"
    )]
    pub config: PathBuf,

    /// Emit logs and events as JSON lines.
    #[arg(long, global = true)]
    pub json: bool,

    /// Write Prometheus metrics to this file on exit.
    #[arg(long, global = true, value_name = "FILE")]
    pub metrics: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate files into another language.
    Translate(TranslateArgs),
    /// Delete containers left behind by abandoned runs.
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Documents to translate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Target language code, e.g. `de` or `zh-Hans`.
    #[arg(long = "to")]
    pub to: String,

    /// Source language code. Detected by the service when omitted.
    #[arg(long = "from")]
    pub from: Option<String>,

    /// Directory the translated documents are written to.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Glossary file to apply (repeatable).
    #[arg(long = "glossary")]
    pub glossaries: Vec<PathBuf>,

    /// Custom translation category.
    #[arg(long)]
    pub category: Option<String>,

    /// Keep the run's containers for inspection.
    #[arg(long)]
    pub no_delete: bool,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Override the configured retention window.
    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_RETENTION_DAYS))
    )]
    pub retention_days: Option<u32>,
}
