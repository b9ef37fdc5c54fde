use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use newc::{Limits, Reader, WriterOptions};

/// cpioctl
#[derive(Debug, Parser)]
#[clap(name = "cpioctl", version)]
pub struct App {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Packs a directory tree into a newc archive
    Pack {
        /// the directory to pack; the directory itself is not recorded
        dir: PathBuf,
        /// where to write the archive ('-' for stdout)
        #[clap(long, short, default_value = "-")]
        output: PathBuf,
        /// modification time stamped on every entry
        #[clap(long, default_value_t = 0)]
        mtime: u32,
        #[clap(long, default_value_t = 0)]
        uid: u32,
        #[clap(long, default_value_t = 0)]
        gid: u32,
    },
    /// Extracts an archive into a directory
    Unpack {
        /// the archive to read ('-' for stdin)
        archive: PathBuf,
        /// the destination directory, created if missing
        dir: PathBuf,
        /// use tighter size limits for untrusted input
        #[clap(long)]
        strict: bool,
    },
    /// Lists the entries of an archive
    List {
        /// the archive to read ('-' for stdin)
        archive: PathBuf,
        #[clap(long)]
        strict: bool,
    },
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn limits(strict: bool) -> Limits {
    if strict {
        Limits::strict()
    } else {
        Limits::default()
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    match args.cmd {
        Command::Pack {
            dir,
            output,
            mtime,
            uid,
            gid,
        } => {
            let options = WriterOptions { uid, gid, mtime };
            let sink = open_output(&output)?;
            let mut sink = newc::pack_dir(&dir, sink, options)
                .with_context(|| format!("packing {}", dir.display()))?;
            sink.flush()?;
        }
        Command::Unpack {
            archive,
            dir,
            strict,
        } => {
            let source = open_input(&archive)?;
            let count = newc::unpack_with_limits(source, &dir, limits(strict))
                .with_context(|| format!("unpacking into {}", dir.display()))?;
            log::info!("extracted {count} entries into {}", dir.display());
        }
        Command::List { archive, strict } => {
            let mut reader = Reader::with_limits(open_input(&archive)?, limits(strict));
            let mut out = BufWriter::new(io::stdout().lock());
            while let Some(entry) = reader
                .next_entry()
                .with_context(|| format!("reading {}", archive.display()))?
            {
                writeln!(out, "{entry}")?;
            }
            out.flush()?;
        }
    }

    Ok(())
}
