//! Command line access to blob store files.
//!
//! ```text
//! blobstore get <name> <blob-file>...
//! blobstore merge <input>... <output>
//! ```

use anyhow::{bail, Context};
use blobstore::{
    BlobStoreReader, BlobStoreWriter, Error, FileBlobStoreReader, FileBlobStoreWriter,
    MultiFileBlobStoreReader,
};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blobstore", version, about = "Read and merge blob store files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the decoded contents of one entry to stdout.
    Get {
        /// Entry name.
        name: String,

        /// Blob files to search, in order. The first file containing the entry wins.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge several stores into a new one.
    Merge {
        /// Input stores followed by the output file, which must not exist.
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Get { name, files } => get(&name, &files),
        Command::Merge { mut files } => {
            let output = files.pop().context("missing output file")?;
            merge(&files, output)
        }
    }
}

fn get(name: &str, files: &[PathBuf]) -> anyhow::Result<()> {
    let reader = MultiFileBlobStoreReader::open(files).context("failed to open blob files")?;
    let Some(mut contents) = reader.decoded_contents_by_name(name)? else {
        bail!("Not found: '{}'", name);
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut contents, &mut out)?;
    out.flush()?;
    Ok(())
}

fn merge(inputs: &[PathBuf], output: PathBuf) -> anyhow::Result<()> {
    if inputs.is_empty() {
        bail!("at least one input file is required");
    }
    for input in inputs {
        if !input.exists() {
            bail!("Input file {:?} not found", input);
        }
    }
    if output.exists() {
        bail!("Output file {:?} already exists", output);
    }

    log::info!("Output to: {:?}", output);
    let writer = FileBlobStoreWriter::builder()
        .blob_file(&output)
        .build()
        .with_context(|| format!("failed to create {:?}", output))?;

    for input in inputs {
        let merged = FileBlobStoreReader::open(input).and_then(|reader| {
            log::info!("Merging: {:?}", input);
            writer.merge_from(&reader)
        });
        match merged {
            Ok(()) => {}
            Err(Error::Format(msg)) => {
                log::warn!("NOT merging {:?}, seems to be broken: {}", input, msg)
            }
            Err(e) => return Err(e).with_context(|| format!("failed to merge {:?}", input)),
        }
    }

    writer.close().with_context(|| format!("failed to finish {:?}", output))?;
    log::info!("Done.");
    Ok(())
}
