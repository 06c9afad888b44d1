use clap::{Parser, Subcommand};
use pg_gallery::gallery::{Gallery, GalleryOptions};
use pg_gallery::imaging::{self, ImageBackend, RustBackend};
use pg_gallery::source::ImageFile;
use pg_gallery::store::{JsonFileStore, MANIFEST_FILENAME};
use pg_gallery::upload::HttpUploader;
use pg_gallery::{config, output};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "pg-gallery")]
#[command(about = "Compress, validate and upload gallery images")]
#[command(long_about = "\
Compress, validate and upload gallery images

Images are compressed to a JPEG byte budget (quality first, then width),
checked against a hard size ceiling, uploaded to the storage endpoint and
appended to the gallery list. The list lives in a JSON manifest that is
saved after every change.

Compression schedule (defaults):
  width   min(1280, source)
  quality 0.80 → 0.65 → 0.50 → 0.35 → 0.20, then width ×0.85 (min 640)
  budget  110 KiB target, 0.25 MiB hard ceiling, at most 8 attempts

Run 'pg-gallery gen-config' to generate a documented config.toml.
Set RUST_LOG=debug to trace each compression attempt.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Gallery manifest (the image list)
    #[arg(long, default_value = MANIFEST_FILENAME, global = true)]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress one image locally and report the result
    Compress {
        file: PathBuf,
        /// Write the compressed JPEG here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Compress, upload and append images (directories are expanded)
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove the image at a 1-based position
    Remove { position: usize },
    /// Show the gallery
    List,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let store = JsonFileStore::new(cli.manifest.clone());

    match cli.command {
        Command::Compress { file, output: out } => {
            let config = config::load_config(&cli.config_dir)?;
            let file = ImageFile::open(&file).await?;
            let backend = RustBackend::new();
            let schedule = config.compression.schedule();
            let target = config.compression.target();
            let image = backend.decode(&file.bytes)?;
            let source = backend.dimensions(&image);
            let compressed = imaging::compress(&backend, &image, &schedule, target.target_bytes)?;
            let ok = imaging::within_size_limit(&compressed.data_uri, target.hard_limit_mib);
            if let Some(path) = out {
                std::fs::write(&path, compressed.jpeg_bytes()?)?;
            }
            output::print_compress_report(&file.name, source, &compressed, ok, target.hard_limit_mib);
        }
        Command::Add { paths } => {
            let config = config::load_config(&cli.config_dir)?;
            let options = GalleryOptions::from_config(&config);
            let current = store.load()?;
            let uploader = HttpUploader::new(&config.upload.endpoint, config.upload.timeout())?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_gallery_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let gallery = Gallery::new(
                Arc::new(RustBackend::new()),
                Arc::new(uploader),
                options.clone(),
                |images| tracing::debug!(count = images.len(), "owner list replaced"),
            )
            .with_auto_save(Arc::new(store.clone()))
            .with_events(tx);

            let result = gallery.add_paths(&current, &paths).await;
            drop(gallery);
            // Pending job clears hold the last senders until their delay elapses
            let _ = tokio::task::spawn_blocking(move || printer.join()).await;
            output::print_add_outcome(&result?, &current, options.max_images);
        }
        Command::Remove { position } => {
            let config = config::load_config(&cli.config_dir)?;
            let options = GalleryOptions::from_config(&config);
            let current = store.load()?;
            let uploader = HttpUploader::new(&config.upload.endpoint, config.upload.timeout())?;
            let gallery = Gallery::new(
                Arc::new(RustBackend::new()),
                Arc::new(uploader),
                options.clone(),
                |images| tracing::debug!(count = images.len(), "owner list replaced"),
            )
            .with_auto_save(Arc::new(store.clone()));
            let index = position.checked_sub(1).ok_or("positions start at 1")?;
            let commit = gallery.remove_at(&current, index).await?;
            output::print_commit(&commit, options.max_images);
        }
        Command::List => {
            let config = config::load_config(&cli.config_dir)?;
            output::print_image_list(&store.load()?, config.gallery.max_images);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
