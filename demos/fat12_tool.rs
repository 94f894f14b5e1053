//! A minimal demonstration binary that exercises the `fat12volume`
//! library end to end. Not a general-purpose CLI: just enough argument
//! parsing to create an image, import a file, list, and export, so the
//! library's public API can be driven from a terminal.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fat12volume::{ops, CreateOptions, PathChain, Volume};
use simplelog::{Config, LevelFilter, SimpleLogger};

#[derive(Parser)]
#[command(name = "fat12-tool", about = "Drive the fat12volume library from a shell")]
struct Cli {
    /// Path to the disk image file.
    #[arg(long)]
    image: PathBuf,

    /// Emit library-level debug/trace logging to stderr.
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates a fresh, empty image.
    Create {
        /// Requested image size in KiB (1440, 1232, 720, ...). Defaults
        /// to 1440 (a standard 3.5" floppy) when omitted.
        #[arg(long)]
        volume_size_kib: Option<u32>,
    },
    /// Lists a directory's contents.
    List {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Copies a host file into the image.
    Import {
        host_path: PathBuf,
        #[arg(default_value = "/")]
        dest_dir: String,
    },
    /// Copies a file out of the image to stdout.
    Export { path: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Trace } else { LevelFilter::Warn };
    SimpleLogger::init(level, Config::default()).context("initializing logger")?;

    match cli.command {
        Command::Create { volume_size_kib } => {
            let options = CreateOptions {
                volume_size_kib,
                ..Default::default()
            };
            let volume_id = fat12volume::volume::generate_volume_id_now(0, 1);
            let volume = Volume::create(&options, volume_id);
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&cli.image)
                .with_context(|| format!("opening {}", cli.image.display()))?;
            volume.create_image(&mut file)?;
            println!("created {}", cli.image.display());
        }
        Command::List { path } => {
            let mut file = OpenOptions::new().read(true).open(&cli.image)?;
            let volume = Volume::read_volume(&mut file)?;
            let target = if path == "/" {
                PathChain::root()
            } else {
                PathChain::parse(&path)?
            };
            for child in ops::list_directory(&volume, &target)? {
                println!(
                    "{:<12} {:>8} {}",
                    child.short_name.display_name(),
                    child.file_size,
                    if child.is_directory() { "<DIR>" } else { "" }
                );
            }
        }
        Command::Import { host_path, dest_dir } => {
            let mut file = OpenOptions::new().read(true).write(true).open(&cli.image)?;
            let mut volume = Volume::read_volume(&mut file)?;
            let mut data = Vec::new();
            std::fs::File::open(&host_path)?.read_to_end(&mut data)?;
            let name = host_path
                .file_name()
                .and_then(|s| s.to_str())
                .context("host path has no file name")?;
            let dest = if dest_dir == "/" {
                PathChain::root()
            } else {
                PathChain::parse(&dest_dir)?
            };
            file.seek(SeekFrom::Start(0))?;
            ops::import_file(&mut volume, &mut file, &dest, name, &data, 0)?;
            println!("imported {} into {}", host_path.display(), dest_dir);
        }
        Command::Export { path } => {
            let mut file = OpenOptions::new().read(true).open(&cli.image)?;
            let volume = Volume::read_volume(&mut file)?;
            let target = PathChain::parse(&path)?;
            let data = ops::export_file(&volume, &mut file, &target)?;
            use std::io::Write;
            std::io::stdout().write_all(&data)?;
        }
    }

    Ok(())
}
