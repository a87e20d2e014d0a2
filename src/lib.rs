//! Seglabel: COCO segmentations to label images.
//!
//! Seglabel turns COCO-style object annotations (polygons, uncompressed RLE
//! and compressed RLE) into per-pixel label maps, writes Pascal VOC style
//! XML, and resizes datasets while keeping annotation geometry consistent
//! with the resized images.
//!
//! # Modules
//!
//! - [`ir`]: Dataset model, COCO JSON I/O, and VOC XML writers
//! - [`mask`]: RLE codec, polygon rasterizer, and label map compositor
//! - [`resize`]: Scale factors and annotation/image rescaling
//! - [`export`]: Batch export of label maps to PNG and NumPy files
//! - [`error`]: Error types for seglabel operations

pub mod error;
pub mod export;
pub mod ir;
pub mod mask;
pub mod resize;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub use error::{MaskError, ResizeError, SeglabelError};

use export::{FileManifest, SegExportOptions};
use ir::io_voc_xml::VocInstanceLayout;
use resize::{ImageFileFormat, ResizeOptions, Size};

/// The seglabel CLI application.
#[derive(Parser)]
#[command(name = "seglabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write class, instance, and identity label maps for each image.
    Seg(SegArgs),
    /// Convert a COCO dataset to a VOC layout: label maps, XML, and images.
    Voc(VocArgs),
    /// Resize a COCO dataset's annotations (and optionally its images).
    Resize(ResizeArgs),
}

/// Arguments for the seg subcommand.
#[derive(clap::Args)]
struct SegArgs {
    /// COCO annotation file.
    input: PathBuf,

    /// Directory receiving the label maps.
    #[arg(long)]
    output_dir: PathBuf,

    /// Only convert the first N images of the dataset.
    #[arg(long)]
    limit: Option<usize>,

    /// Write identity maps as raw .npy instead of compressed .npz.
    #[arg(long)]
    no_compress: bool,

    /// Also write VOC palette colored class maps.
    #[arg(long)]
    colorize: bool,

    /// Abort on the first image whose masks cannot be built.
    #[arg(long)]
    fail_fast: bool,
}

/// Arguments for the voc subcommand.
#[derive(clap::Args)]
struct VocArgs {
    /// COCO annotation file.
    input: PathBuf,

    /// Root directory of the VOC layout.
    #[arg(long)]
    output_dir: PathBuf,

    /// Annotation kind ('instance' or 'keypoint').
    #[arg(long, default_value = "instance")]
    kind: String,

    /// Replicate instance XML into one directory per category.
    #[arg(long)]
    separate_categories: bool,

    /// Skip the VOC palette colored class maps.
    #[arg(long)]
    no_colorize: bool,

    /// Directory holding the source images.
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Copy the source images into JPEGImages/.
    #[arg(long, requires = "image_dir")]
    copy_images: bool,
}

/// Arguments for the resize subcommand.
#[derive(clap::Args)]
struct ResizeArgs {
    /// COCO annotation file.
    input: PathBuf,

    /// Output COCO annotation file.
    #[arg(long)]
    output: PathBuf,

    /// Target (maximum, unless --no-preserve-aspect) width.
    #[arg(long)]
    width: u32,

    /// Target (maximum, unless --no-preserve-aspect) height.
    #[arg(long)]
    height: u32,

    /// Scale each axis to its target independently.
    #[arg(long)]
    no_preserve_aspect: bool,

    /// Directory holding the source images; enables image resizing.
    #[arg(long, requires = "output_image_dir")]
    image_dir: Option<PathBuf>,

    /// Directory receiving the resized images.
    #[arg(long, requires = "image_dir")]
    output_image_dir: Option<PathBuf>,

    /// Output image format ('png' or 'jpeg'); defaults to the first image's.
    #[arg(long)]
    format: Option<String>,
}

/// Run the seglabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), SeglabelError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Seg(args)) => run_seg(args),
        Some(Commands::Voc(args)) => run_voc(args),
        Some(Commands::Resize(args)) => run_resize(args),
        None => {
            println!("seglabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("COCO segmentations to label images.");
            println!();
            println!("Run 'seglabel --help' for usage information.");
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("seglabel={default_level}")));
    // Logs go to stderr so stdout stays reserved for reports.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Execute the seg subcommand.
fn run_seg(args: SegArgs) -> Result<(), SeglabelError> {
    let dataset = ir::io_coco_json::read_coco_json(&args.input)?;
    let options = SegExportOptions {
        limit: args.limit,
        compress: !args.no_compress,
        colorize: args.colorize,
        fail_fast: args.fail_fast,
    };

    std::fs::create_dir_all(&args.output_dir)?;
    let mut manifest = FileManifest::in_dir(&args.output_dir)?;
    let report = export::export_segmentation(&dataset, &args.output_dir, &options, &mut manifest)?;
    print!("{}", report);
    Ok(())
}

/// Annotation kinds the voc subcommand can write as XML.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VocKind {
    Instance,
    Keypoint,
}

impl VocKind {
    fn parse(name: &str) -> Result<Self, SeglabelError> {
        match name.to_ascii_lowercase().as_str() {
            "instance" | "instances" => Ok(VocKind::Instance),
            "keypoint" | "keypoints" => Ok(VocKind::Keypoint),
            other => Err(SeglabelError::UnsupportedFormat(format!(
                "'{}' (supported: instance, keypoint)",
                other
            ))),
        }
    }
}

/// Execute the voc subcommand.
fn run_voc(args: VocArgs) -> Result<(), SeglabelError> {
    let kind = VocKind::parse(&args.kind)?;
    let dataset = ir::io_coco_json::read_coco_json(&args.input)?;

    std::fs::create_dir_all(&args.output_dir)?;
    let mut manifest = FileManifest::in_dir(&args.output_dir)?;
    let options = SegExportOptions {
        colorize: !args.no_colorize,
        ..Default::default()
    };
    let report = export::export_segmentation(&dataset, &args.output_dir, &options, &mut manifest)?;
    print!("{}", report);

    let xml_files = match kind {
        VocKind::Instance => {
            let layout = if args.separate_categories {
                VocInstanceLayout::PerCategory
            } else {
                VocInstanceLayout::Annotations
            };
            ir::io_voc_xml::write_voc_instances(&dataset, &args.output_dir, layout)?
        }
        VocKind::Keypoint => {
            ir::io_voc_xml::write_voc_keypoints(&dataset, &args.output_dir.join("Annotations"))?
        }
    };
    println!("Wrote {} XML file(s)", xml_files);

    if args.copy_images {
        if let Some(image_dir) = &args.image_dir {
            let copied = export::copy_images(image_dir, &args.output_dir)?;
            println!("Copied {} image(s)", copied);
        }
    }

    println!("Converted {} to VOC layout in {}", args.input.display(), args.output_dir.display());
    Ok(())
}

/// Execute the resize subcommand.
fn run_resize(args: ResizeArgs) -> Result<(), SeglabelError> {
    let dataset = ir::io_coco_json::read_coco_json(&args.input)?;
    let options = ResizeOptions {
        target: Size::new(args.width, args.height),
        preserve_aspect: !args.no_preserve_aspect,
    };
    let mut resized = resize::resize_dataset(&dataset, &options)?;

    if let (Some(image_dir), Some(output_image_dir)) = (&args.image_dir, &args.output_image_dir) {
        let format = match &args.format {
            Some(name) => ImageFileFormat::parse(name)?,
            None => dataset
                .images
                .first()
                .map(|image| ImageFileFormat::from_file_name(&image.file_name))
                .unwrap_or(ImageFileFormat::Jpeg),
        };
        let written = resize::resize_image_dir(&mut resized, image_dir, output_image_dir, format)?;
        println!("Resized {} image file(s) into {}", written, output_image_dir.display());
    }

    ir::io_coco_json::write_coco_json(&args.output, &resized.dataset)?;
    println!(
        "Resized {} image(s) and {} annotation(s) into {}",
        resized.dataset.images.len(),
        resized.dataset.annotations.len(),
        args.output.display()
    );
    Ok(())
}
