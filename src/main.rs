//! strata CLI - manage manifests and blobs in a content-addressed store

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use strata::{ingest_dir, materialize, DiskStore, Manifest, OverlayFs};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "copy-on-write overlay over a content-addressed blob store")]
#[command(version)]
struct Cli {
    /// store path
    #[arg(short, long, default_value = ".")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new blob store
    Init {
        /// path to create the store at
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// import a directory tree into the store, writing a manifest
    Import {
        /// source directory to import
        source: PathBuf,

        /// manifest file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// write a manifest's tree out to a directory
    Export {
        /// manifest file to read
        manifest: PathBuf,

        /// destination directory
        destination: PathBuf,
    },

    /// list a directory inside a manifest
    Ls {
        /// manifest file to read
        manifest: PathBuf,

        /// directory path inside the tree
        #[arg(default_value = "")]
        path: String,
    },

    /// print a file's content from a manifest
    Cat {
        /// manifest file to read
        manifest: PathBuf,

        /// file path inside the tree
        path: String,
    },

    /// merge a base manifest and a layer manifest into one
    Flatten {
        /// base manifest file
        base: PathBuf,

        /// layer manifest file
        layer: PathBuf,

        /// merged manifest file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// delete blobs no listed manifest references
    Gc {
        /// manifests whose content stays live
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// only show what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> strata::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            DiskStore::init(&path)?;
            println!("initialized strata store at {}", path.display());
        }

        Commands::Import { source, output } => {
            let store = DiskStore::open(&cli.store)?;
            let manifest = ingest_dir(&store, &source)?;
            manifest.save(&output)?;
            println!("imported {} entries", manifest.len());
        }

        Commands::Export {
            manifest,
            destination,
        } => {
            let store = DiskStore::open(&cli.store)?;
            let manifest = Manifest::load(&manifest)?;
            materialize(&store, &manifest, &destination)?;
            println!("exported to {}", destination.display());
        }

        Commands::Ls { manifest, path } => {
            let store = Arc::new(DiskStore::open(&cli.store)?);
            let fs = OverlayFs::with_base(Manifest::load(&manifest)?, store);

            for entry in fs.read_dir(&path)? {
                let m = &entry.metadata;
                let suffix = match m.symlink_target() {
                    Some(target) => format!(" -> {}", target),
                    None if m.is_dir() => "/".to_string(),
                    None => String::new(),
                };
                println!("{:o}\t{}\t{}{}", m.mode, m.size(), entry.name, suffix);
            }
        }

        Commands::Cat { manifest, path } => {
            let store = Arc::new(DiskStore::open(&cli.store)?);
            let fs = OverlayFs::with_base(Manifest::load(&manifest)?, store);

            let content = fs.read_file(&path)?;
            use std::io::Write;
            std::io::stdout()
                .write_all(&content)
                .map_err(|source| strata::Error::Io {
                    path: "<stdout>".into(),
                    source,
                })?;
        }

        Commands::Flatten {
            base,
            layer,
            output,
        } => {
            let store = Arc::new(DiskStore::open(&cli.store)?);
            let fs = OverlayFs::with_base_and_layer(
                Manifest::load(&base)?,
                Manifest::load(&layer)?,
                store,
            );

            let merged = fs.flatten()?;
            merged.save(&output)?;
            println!("flattened {} entries", merged.len());
        }

        Commands::Gc { manifests, dry_run } => {
            let store = Arc::new(DiskStore::open(&cli.store)?);

            let mut live = std::collections::HashSet::new();
            for path in &manifests {
                let fs = OverlayFs::with_base(Manifest::load(path)?, store.clone());
                live.extend(fs.referenced_fingerprints());
            }

            let stats = store.sweep(&live, dry_run)?;
            if dry_run {
                println!(
                    "would remove {} blobs ({} bytes)",
                    stats.blobs_removed, stats.bytes_freed
                );
            } else {
                println!(
                    "removed {} blobs ({} bytes)",
                    stats.blobs_removed, stats.bytes_freed
                );
            }
        }
    }

    Ok(())
}
