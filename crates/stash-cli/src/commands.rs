use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use stash_chunk::{ChunkReader, ChunkResult};
use stash_filter::{
    Base64DecodeSink, Base64EncodeSink, CacheFilter, ChecksumFilter, LzoCompressSource,
    LzoDecompressSource, NodeId, PullChain, PushChain, PushFilter, StorageSink, StorageSource,
};
use tracing::debug;

use crate::cli::*;
use crate::config::StashConfig;

const COPY_BUF: usize = 64 * 1024;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = StashConfig::load(cli.config.as_deref())?;
    debug!(?config, "configuration loaded");
    match cli.command {
        Command::Compress(args) => {
            if let Some(block_size) = args.block_size {
                config.filter.lzo_block_size = block_size;
                config.filter.validate()?;
            }
            cmd_compress(&config, &args.input, &args.output)
        }
        Command::Decompress(args) => cmd_decompress(&config, &args.input, &args.output),
        Command::Encode(args) => cmd_push(Base64EncodeSink::new(), &args.input, &args.output, "encoded"),
        Command::Decode(args) => cmd_push(Base64DecodeSink::new(), &args.input, &args.output, "decoded"),
        Command::Checksum(args) => cmd_checksum(&config, &args.inputs),
        Command::Dump(args) => cmd_dump(&config, &args),
    }
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("opening {}", path.display()))
}

fn create(path: &Path) -> anyhow::Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

/// Drain `head` into `output`, returning the byte count.
fn drain(chain: &mut PullChain, head: NodeId, output: &mut impl Write) -> anyhow::Result<u64> {
    let mut buf = vec![0u8; COPY_BUF];
    let mut total = 0;
    loop {
        let n = chain.get(head, &mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
}

fn report(verb: &str, input: &Path, read: u64, output: &Path, written: u64) {
    println!(
        "{} {} {} ({} bytes) -> {} ({} bytes)",
        "✓".green().bold(),
        verb,
        input.display().to_string().bold(),
        read,
        output.display().to_string().bold(),
        written
    );
}

fn cmd_compress(config: &StashConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    let source = open(input)?;
    let read = source.metadata()?.len();
    let mut chain = PullChain::new();
    let ids = [
        chain.add(LzoCompressSource::from_config(&config.filter)?),
        chain.add(CacheFilter::from_config(&config.filter)?),
        chain.add(StorageSource::new(source)),
    ];
    let head = chain
        .link_all(&ids)?
        .context("empty filter chain")?;
    let mut out = create(output)?;
    let written = drain(&mut chain, head, &mut out)?;
    out.flush()?;
    report("compressed", input, read, output, written);
    println!("  block size: {}", config.filter.lzo_block_size.to_string().cyan());
    Ok(())
}

fn cmd_decompress(config: &StashConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    let source = open(input)?;
    let read = source.metadata()?.len();
    let mut chain = PullChain::new();
    let ids = [
        chain.add(LzoDecompressSource::new()),
        chain.add(CacheFilter::from_config(&config.filter)?),
        chain.add(StorageSource::new(source)),
    ];
    let head = chain
        .link_all(&ids)?
        .context("empty filter chain")?;
    let mut out = create(output)?;
    let written = drain(&mut chain, head, &mut out)
        .with_context(|| format!("decompressing {}", input.display()))?;
    out.flush()?;
    report("decompressed", input, read, output, written);
    Ok(())
}

/// Push `input` through `filter` into `output`.
fn cmd_push(filter: impl PushFilter, input: &Path, output: &Path, verb: &str) -> anyhow::Result<()> {
    let mut source = open(input)?;
    let mut chain = PushChain::new();
    let ids = [chain.add(filter), chain.add(StorageSink::new(create(output)?))];
    let head = chain
        .link_all(&ids)?
        .context("empty filter chain")?;

    let mut buf = vec![0u8; COPY_BUF];
    let mut read = 0u64;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        chain.put(head, &buf[..n])?;
        read += n as u64;
    }
    chain.end(head)?;

    let written = chain
        .filter::<StorageSink<File>>(ids[1])
        .map_or(0, StorageSink::written);
    chain.dispose(head)?;
    report(verb, input, read, output, written);
    Ok(())
}

fn cmd_checksum(config: &StashConfig, inputs: &[std::path::PathBuf]) -> anyhow::Result<()> {
    for input in inputs {
        let mut chain = PullChain::new();
        let ids = [
            chain.add(ChecksumFilter::new()),
            chain.add(CacheFilter::from_config(&config.filter)?),
            chain.add(StorageSource::new(open(input)?)),
        ];
        let head = chain
            .link_all(&ids)?
            .context("empty filter chain")?;
        let len = drain(&mut chain, head, &mut std::io::sink())?;
        let digest = chain
            .filter::<ChecksumFilter>(head)
            .map(ChecksumFilter::digest)
            .context("checksum filter missing from chain")?;
        println!(
            "{}  {}  {}",
            hex::encode(digest.to_be_bytes()).yellow(),
            format!("{len:>10}").dimmed(),
            input.display()
        );
    }
    Ok(())
}

/// Render a chunk id as its four-character code when printable.
fn fourcc(id: u32) -> String {
    let bytes = id.to_le_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("'{}'", String::from_utf8_lossy(&bytes))
    } else {
        format!("{id:#010x}")
    }
}

fn cmd_dump(config: &StashConfig, args: &DumpArgs) -> anyhow::Result<()> {
    let mut reader = ChunkReader::with_config(open(&args.input)?, &config.chunk)?;
    let mut count = 0;
    dump_level(&mut reader, args.micro, &mut count)
        .with_context(|| format!("walking {}", args.input.display()))?;
    println!("{} chunks", count.to_string().bold());
    Ok(())
}

fn dump_level(reader: &mut ChunkReader<File>, micro: bool, count: &mut usize) -> ChunkResult<()> {
    while reader.open_chunk()? {
        *count += 1;
        let indent = "  ".repeat(reader.depth() - 1);
        let id = reader.chunk_id().unwrap_or_default();
        let len = reader.chunk_len().unwrap_or_default();
        if reader.contains_chunks() {
            println!("{indent}{} {} bytes", fourcc(id).cyan().bold(), len);
            dump_level(reader, micro, count)?;
        } else {
            println!("{indent}{} {} bytes", fourcc(id).cyan(), len);
            if micro {
                dump_micro_chunks(reader, &indent)?;
            }
        }
        reader.close_chunk()?;
    }
    Ok(())
}

fn dump_micro_chunks(reader: &mut ChunkReader<File>, indent: &str) -> ChunkResult<()> {
    while reader.open_micro_chunk()? {
        let id = reader.micro_chunk_id().unwrap_or_default();
        let len = reader.micro_chunk_len().unwrap_or_default();
        let preview = reader.read_vec(usize::from(len).min(16))?;
        let ellipsis = if len > 16 { "..." } else { "" };
        println!(
            "{indent}  {} {:>3} bytes  {}{}",
            format!("#{id}").yellow(),
            len,
            hex::encode(&preview).dimmed(),
            ellipsis
        );
        reader.close_micro_chunk()?;
    }
    Ok(())
}
