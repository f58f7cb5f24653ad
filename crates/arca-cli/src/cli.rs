use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arca", about = "Arca: content-addressable file archive", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Archive root directory
    #[arg(long, global = true, default_value = ".arca")]
    pub root: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an archive and its config file
    Init(InitArgs),
    /// Store files in the archive
    Add(AddArgs),
    /// Show a file's record, optionally extracting its content
    Get(GetArgs),
    /// Write a file's content to stdout
    Cat(IdArg),
    /// Remove files from the archive
    Rm(RmArgs),
    /// List stored files
    Ls(LsArgs),
    /// Refresh a file's access time
    Touch(IdArg),
    /// Add a display name to a stored file
    Alias(AliasArgs),
    /// Re-hash stored content and compare with its record
    Verify(VerifyArgs),
    /// Print the id a file would be stored under, without storing it
    Hash(HashArgs),
    /// Read or write a file's custom attachment
    Custom(CustomArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Archive name recorded in arca.toml
    #[arg(long)]
    pub name: Option<String>,
    /// fsync every value before it is committed
    #[arg(long)]
    pub sync: bool,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Ingest through the streaming path instead of reading into memory
    #[arg(long)]
    pub stream: bool,
    /// Display name to record instead of the file name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
    /// Write the content to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct IdArg {
    pub id: String,
}

#[derive(Args)]
pub struct RmArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Only list ids starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args)]
pub struct AliasArgs {
    pub id: String,
    pub name: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Ids to check; every stored file when omitted
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct HashArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct CustomArgs {
    #[command(subcommand)]
    pub action: CustomAction,
}

#[derive(Subcommand)]
pub enum CustomAction {
    /// Attach a JSON value (or raw text with --raw)
    Set {
        id: String,
        value: String,
        #[arg(long)]
        raw: bool,
    },
    /// Show the attachment
    Get { id: String },
    /// Drop the attachment
    Clear { id: String },
}
