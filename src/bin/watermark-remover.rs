use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use watermark_remover::{
    default_output_path, logging, Detector, FillInpainter, FixedDetector, Inpainter, Method,
    ProcessResult, ProcessingConfig, SidecarDetector, WatermarkRemover,
};

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Webp,
    Jpg,
}

impl FormatArg {
    fn tag(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Webp => "WEBP",
            Self::Jpg => "JPG",
        }
    }
}

#[derive(Parser)]
#[command(
    name = "watermark-remover",
    about = "Remove detected watermark regions by inpainting or making them transparent",
    version,
    after_help = "Detections are read from --detections FILE, or from <image>.detections.json\n\
                  next to each image (no file = nothing detected)."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default for a file: <name>_cleaned.<ext>)
    output: Option<PathBuf>,

    /// Overwrite existing output files (batch mode skips them otherwise)
    #[arg(long)]
    overwrite: bool,

    /// Make watermark regions transparent instead of inpainting them
    #[arg(long)]
    transparent: bool,

    /// Maximum share of the image one detected box may cover, in percent
    #[arg(long, value_name = "PERCENT")]
    max_bbox_percent: Option<f64>,

    /// Force the output format (default: input format)
    #[arg(long, value_enum, ignore_case = true)]
    force_format: Option<FormatArg>,

    /// JSON detection file applied to every input image
    #[arg(short, long, value_name = "FILE")]
    detections: Option<PathBuf>,

    /// Detection text prompt
    #[arg(long)]
    prompt: Option<String>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker threads for batch processing (0 = one per core)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Only detect: write the mask to OUTPUT and print statistics as JSON
    #[arg(long)]
    detect_only: bool,

    /// Enable verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn processing_config(&self) -> watermark_remover::Result<ProcessingConfig> {
        let mut config = match &self.config {
            Some(path) => ProcessingConfig::from_json_file(path)?,
            None => ProcessingConfig::default(),
        };
        if self.transparent {
            config.method = Method::Transparent;
        }
        if self.overwrite {
            config.overwrite = true;
        }
        if let Some(p) = self.max_bbox_percent {
            config.max_bbox_percent = p;
        }
        if let Some(f) = self.force_format {
            config.force_format = Some(f.tag().to_string());
        }
        if let Some(prompt) = &self.prompt {
            config.text_prompt.clone_from(prompt);
        }
        if let Some(t) = self.threads {
            config.threads = t;
        }
        Ok(config)
    }

    fn detector(&self) -> watermark_remover::Result<Box<dyn Detector>> {
        let detector: Box<dyn Detector> = match &self.detections {
            Some(path) => Box::new(FixedDetector::from_json_file(path)?),
            None => Box::new(SidecarDetector::new()),
        };
        Ok(detector)
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    error!("{msg}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.quiet) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let config = cli
        .processing_config()
        .unwrap_or_else(|e| fail(format_args!("Invalid configuration: {e}")));
    let detector = cli
        .detector()
        .unwrap_or_else(|e| fail(format_args!("Failed to load detections: {e}")));
    let inpainter: Option<Box<dyn Inpainter>> = match config.method {
        Method::Inpaint => Some(Box::new(FillInpainter::new())),
        Method::Transparent => None,
    };

    if !cli.input.exists() {
        fail(format_args!("Input path does not exist: {}", cli.input.display()));
    }

    info!(
        method = %config.method,
        max_bbox_percent = config.max_bbox_percent,
        prompt = %config.text_prompt,
        "starting"
    );

    let remover = WatermarkRemover::new(detector, inpainter, config)
        .unwrap_or_else(|e| fail(format_args!("Failed to initialize: {e}")));

    let output = match &cli.output {
        Some(path) => path.clone(),
        None if cli.input.is_dir() => fail("OUTPUT is required for directory input"),
        None => default_output_path(&cli.input),
    };

    if cli.detect_only {
        detect_only(&remover, &cli.input, &output);
        return;
    }

    let results = if cli.input.is_dir() {
        remover
            .process_directory(&cli.input, &output)
            .unwrap_or_else(|e| fail(format_args!("Batch processing failed: {e}")))
    } else {
        vec![remover.process_file(&cli.input, &output)]
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.verbose > 0, cli.quiet);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn detect_only(remover: &WatermarkRemover, input: &Path, output: &Path) {
    if input.is_dir() {
        fail("--detect-only takes a single image");
    }
    let img = image::open(input).unwrap_or_else(|e| fail(format_args!("Failed to load: {e}")));
    let report = remover
        .detect_at(input, &img)
        .unwrap_or_else(|e| fail(format_args!("Detection failed: {e}")));

    let mask_path = output.with_extension("png");
    if let Err(e) = report.mask.save(&mask_path) {
        fail(format_args!("Failed to save mask: {e}"));
    }
    info!(path = %mask_path.display(), "mask saved");

    match serde_json::to_string_pretty(&report.stats) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}

fn print_result(result: &ProcessResult, verbose: bool, quiet: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        eprintln!("[SKIP] {filename}: {}", result.message);
    } else if result.success {
        match &result.output {
            Some(out) => eprintln!(
                "[OK] {filename} -> {} ({:.2}% masked)",
                out.display(),
                result.detection_ratio * 100.0
            ),
            None => eprintln!("[OK] {filename}"),
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
