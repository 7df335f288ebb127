use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stash",
    about = "Inspect and transform stash streams and chunk files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter events at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with filter and chunk settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compress a file into an LZO block stream
    Compress(CompressArgs),
    /// Decompress an LZO block stream
    Decompress(TransformArgs),
    /// Base64-encode a file
    Encode(TransformArgs),
    /// Decode a base64 file
    Decode(TransformArgs),
    /// Print the rolling checksum of each file
    Checksum(ChecksumArgs),
    /// Print the chunk tree of a chunk file
    Dump(DumpArgs),
}

#[derive(Args)]
pub struct TransformArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Args)]
pub struct CompressArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Uncompressed bytes per block (overrides the config file)
    #[arg(long)]
    pub block_size: Option<usize>,
}

#[derive(Args)]
pub struct ChecksumArgs {
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DumpArgs {
    pub input: PathBuf,
    /// Also list the micro-chunks of data chunks
    #[arg(short, long)]
    pub micro: bool,
}
