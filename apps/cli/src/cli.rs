use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "nimbus")]
#[command(version, about = "Nimbus function runtime", long_about = None)]
pub struct Cli {
    /// TOML settings file. `NIMBUS_*` variables override it.
    #[arg(short, long, global = true, env = "NIMBUS_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a function file without running it.
    Validate(ValidateArgs),
    /// Print the content hash of a function file.
    Hash(HashArgs),
    /// Load a function directory and list what registered.
    Load(DirArgs),
    /// Load a directory and invoke one function.
    Run(RunArgs),
    /// Load, watch and run schedules until interrupted.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Function source file.
    pub file: PathBuf,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct HashArgs {
    /// Files to hash.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DirArgs {
    /// Functions directory. Defaults to `loader.functions_dir`.
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub dir: DirArgs,

    /// Registered function name.
    pub name: String,

    /// JSON payload.
    #[arg(short, long, default_value = "null")]
    pub payload: String,

    /// Invoke without credentials, as an anonymous caller would.
    #[arg(long)]
    pub anonymous: bool,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub dir: DirArgs,

    /// JSON file with schedules to install at start.
    #[arg(short, long, value_name = "FILE")]
    pub schedules: Option<PathBuf>,

    /// Do not reload functions when files change.
    #[arg(long)]
    pub no_watch: bool,
}
