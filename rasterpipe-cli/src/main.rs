//! Rasterpipe CLI - command-line frontend for the rasterpipe library.
//!
//! Runs a raster pipeline against the built-in in-memory backend and
//! prints a JSON run report on stdout.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::error;

use rasterpipe::config::PipelineConfig;
use rasterpipe::coord::ZoomRange;
use rasterpipe::logging;
use rasterpipe::ops::{EncodeOptions, ReprojectOptions};
use rasterpipe::pipeline::{Artifact, Pipeline};
use rasterpipe::raster::{MemoryBackend, RasterFormat, Resampling};
use rasterpipe::tasks::{EncodeImageTask, GenerateTilesTask, ReadDataTask, ReprojectTask};
use rasterpipe::tiler::TileOptions;

#[derive(Debug, Clone, ValueEnum)]
enum ImageFormat {
    /// Lossless PNG
    Png,
    /// JPEG at 90% quality
    Jpeg,
}

impl From<&ImageFormat> for RasterFormat {
    fn from(format: &ImageFormat) -> Self {
        match format {
            ImageFormat::Png => RasterFormat::Png,
            ImageFormat::Jpeg => RasterFormat::Jpeg,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum ResamplingArg {
    /// Nearest-neighbor lookup
    Nearest,
    /// Bilinear interpolation
    Bilinear,
}

impl From<&ResamplingArg> for Resampling {
    fn from(arg: &ResamplingArg) -> Self {
        match arg {
            ResamplingArg::Nearest => Resampling::NearestNeighbor,
            ResamplingArg::Bilinear => Resampling::Bilinear,
        }
    }
}

#[derive(Parser)]
#[command(name = "rasterpipe")]
#[command(about = "Raster pipelines and web-mercator tile pyramids", version)]
struct Cli {
    /// Root folder outputs and logs live under
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Pipeline name used in logs and reports
    #[arg(long, default_value = "rasterpipe")]
    name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Slice a raster into a web-mercator tile pyramid
    Tiles {
        /// Source raster
        #[arg(long)]
        input: PathBuf,

        /// Edge length of a tile before the one-pixel overlap
        #[arg(long, default_value = "256")]
        tile_size: usize,

        /// Lowest zoom level to generate
        #[arg(long, default_value = "0")]
        min_zoom: u8,

        /// Highest zoom level to generate (inclusive)
        #[arg(long, default_value = "4")]
        max_zoom: u8,

        /// Keep existing tiles and caches instead of regenerating them
        #[arg(long)]
        keep: bool,

        /// Rescale each tile to the 0-255 gray range
        #[arg(long)]
        gray: bool,

        /// Skip tiles outside the source extent
        #[arg(long)]
        clip: bool,

        /// Also encode the tiles as images in this format
        #[arg(long, value_enum)]
        image: Option<ImageFormat>,
    },

    /// Reproject a raster onto a web-mercator grid
    Reproject {
        /// Source raster
        #[arg(long)]
        input: PathBuf,

        /// Destination raster
        #[arg(long)]
        output: PathBuf,

        /// Destination width in pixels
        #[arg(long, default_value = "1024")]
        width: usize,

        /// Destination height in pixels
        #[arg(long, default_value = "1024")]
        height: usize,

        /// Resampling method
        #[arg(long, value_enum, default_value = "nearest")]
        resampling: ResamplingArg,
    },
}

fn build_pipeline(cli: &Cli, backend: Arc<MemoryBackend>) -> Pipeline<MemoryBackend> {
    let mut pipeline = Pipeline::new(backend);
    pipeline.register(ReadDataTask::new());
    match &cli.command {
        Command::Tiles {
            tile_size,
            min_zoom,
            max_zoom,
            keep,
            gray,
            clip,
            image,
            ..
        } => {
            let options = TileOptions {
                clear: !keep,
                tile_size: *tile_size,
                zooms: ZoomRange::Range {
                    start: *min_zoom,
                    end: max_zoom.saturating_add(1),
                    step: 1,
                },
                gray: *gray,
                clip_extent: *clip,
                ..TileOptions::default()
            };
            pipeline.register(GenerateTilesTask::new(&cli.workspace, options));
            if let Some(format) = image {
                let options = EncodeOptions {
                    clear: !keep,
                    format: format.into(),
                    image_folder: match format {
                        ImageFormat::Png => "png".to_string(),
                        ImageFormat::Jpeg => "jpeg".to_string(),
                    },
                    ..EncodeOptions::default()
                };
                pipeline.register(EncodeImageTask::new(&cli.workspace, options));
            }
        }
        Command::Reproject {
            output,
            width,
            height,
            resampling,
            ..
        } => {
            let options = ReprojectOptions {
                width: *width,
                height: *height,
                resampling: resampling.into(),
                ..ReprojectOptions::default()
            };
            pipeline.register(ReprojectTask::new(output, options));
        }
    }
    pipeline
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = PipelineConfig::new(cli.name.clone(), cli.workspace.clone());
    let _guard = logging::init_logging_or_stdout(&config);

    let input = match &cli.command {
        Command::Tiles { input, .. } => input.clone(),
        Command::Reproject { input, .. } => input.clone(),
    };

    let backend = Arc::new(MemoryBackend::new());
    let pipeline = build_pipeline(&cli, backend.clone());

    match pipeline.run(Artifact::Path(input)).await {
        Ok(result) => {
            let report = json!({
                "name": config.name,
                "artifact": result.artifact,
                "provenance": result.provenance,
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
        Err(err) => {
            error!(stage = err.failing_stage(), error = %err, "pipeline failed");
            eprintln!("Error in stage '{}': {}", err.failing_stage(), err);
            process::exit(1);
        }
    }
}
