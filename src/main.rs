//! Command-line interface for the keyframe extractor
//!
//! Takes a local video or a URL, extracts slide keyframes into
//! `<output-dir>/<name>_slides/` and bundles them into `<name>_notes.pdf`.

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use anyhow::{bail, Context};
use tracing::{info, warn, debug};
use rust_keyframes::{
    get_video_info, init_tracing, is_remote,
    DocumentExporter, ExtractionConfig, FeatureExtractor, LocalFile, PdfExporter,
    Pipeline, PipelineReport, ReplacePolicy, TesseractCli, VideoFetcher, YtDlp,
};

/// Command-line arguments structure
#[derive(Debug, Default)]
struct Args {
    locator: String,
    content_name: Option<String>,
    output_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    interval: Option<f64>,
    similarity: Option<f64>,
    min_sharpness: Option<f64>,
    sharpness_factor: Option<f64>,
    text_extra: Option<u32>,
    policy: Option<ReplacePolicy>,
    ocr: bool,
    no_pdf: bool,
    verbose: bool,
    show_video_info: bool,
    output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum OutputFormat {
    #[default]
    Simple,     // Just the slide paths
    Detailed,   // Paths with timestamps and run counters
    Json,       // JSON format for integration
}

const USAGE: &str = "Options:
  --name <name>            Content name used for output files (default: video file stem)
  --output-dir <dir>       Where slides and the PDF go (default: output)
  --config <file>          JSON file with extraction settings
  --interval <seconds>     Seconds between samples (default: 5.0)
  --similarity <t>         Histogram correlation treated as same slide (default: 0.90)
  --min-sharpness <v>      Laplacian variance below which frames are blurry (default: 50.0)
  --sharpness-factor <f>   Sharpness gain required to replace a slide (default: 1.10)
  --text-extra <n>         Extra text characters required to replace a slide (default: 10)
  --policy <p>             Replacement rule: either|both (default: either)
  --ocr                    Measure on-screen text with tesseract
  --no-pdf                 Skip PDF export
  --verbose                Enable debug logging
  --info                   Show video information only
  --format <fmt>           Output format: simple|detailed|json (default: simple)
  --help                   Show this help message";

fn main() {
    if let Err(e) = run(env::args().collect()) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(argv: Vec<String>) -> anyhow::Result<()> {
    let args = parse_args(&argv)?;

    let log_level = if args.verbose { "debug" } else { "info" };
    init_tracing(log_level);

    info!("Keyframe extraction CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if args.show_video_info {
        return show_video_info(&args.locator);
    }

    let config = build_config(&args)?;
    let content_name = content_name(&args);
    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("output"));

    let fetcher: Box<dyn VideoFetcher> = if is_remote(&args.locator) {
        Box::new(YtDlp::new(&output_dir))
    } else {
        Box::new(LocalFile)
    };
    let exporter: Option<Box<dyn DocumentExporter>> = if args.no_pdf {
        None
    } else {
        Some(Box::new(PdfExporter::new(&output_dir)))
    };

    let mut pipeline = Pipeline::new(config, &output_dir, fetcher, exporter)?;
    if args.ocr {
        let tesseract = TesseractCli::default();
        if tesseract.is_available() {
            pipeline = pipeline.with_scorer(Box::new(FeatureExtractor::with_recognizer(Box::new(tesseract))));
        } else {
            warn!("tesseract not found, continuing without text measurement");
        }
    }

    let report = pipeline.process(&args.locator, &content_name)
        .with_context(|| format!("processing {}", args.locator))?;

    output_results(&report, &args)?;

    if let Some(diagnostic) = &report.diagnostic {
        bail!("{}", diagnostic);
    }
    Ok(())
}

fn parse_args(argv: &[String]) -> anyhow::Result<Args> {
    let program = argv.first().map(String::as_str).unwrap_or("rust-keyframes");

    if argv.len() < 2 {
        bail!(
            "Usage: {} <video_path_or_url> [OPTIONS]\n\n{}\n\n\
            Examples:\n\
            {} lecture.mp4\n\
            {} https://www.youtube.com/watch?v=abc --name week1 --verbose\n\
            {} lecture.mp4 --interval 2 --format detailed",
            program, USAGE, program, program, program
        );
    }

    let mut parsed_args = Args {
        locator: argv[1].clone(),
        ..Default::default()
    };

    let mut i = 2;
    while i < argv.len() {
        let flag = argv[i].as_str();
        let value = || argv.get(i + 1)
            .map(String::as_str)
            .with_context(|| format!("{} requires a value", flag));

        match flag {
            "--name" => parsed_args.content_name = Some(value()?.to_string()),
            "--output-dir" => parsed_args.output_dir = Some(PathBuf::from(value()?)),
            "--config" => parsed_args.config_file = Some(PathBuf::from(value()?)),
            "--interval" => parsed_args.interval = Some(value()?.parse()
                .context("Invalid interval value")?),
            "--similarity" => parsed_args.similarity = Some(value()?.parse()
                .context("Invalid similarity value")?),
            "--min-sharpness" => parsed_args.min_sharpness = Some(value()?.parse()
                .context("Invalid min-sharpness value")?),
            "--sharpness-factor" => parsed_args.sharpness_factor = Some(value()?.parse()
                .context("Invalid sharpness-factor value")?),
            "--text-extra" => parsed_args.text_extra = Some(value()?.parse()
                .context("Invalid text-extra value")?),
            "--policy" => parsed_args.policy = Some(match value()? {
                "either" => ReplacePolicy::Either,
                "both" => ReplacePolicy::Both,
                _ => bail!("Invalid policy. Use 'either' or 'both'"),
            }),
            "--format" => parsed_args.output_format = match value()? {
                "simple" => OutputFormat::Simple,
                "detailed" => OutputFormat::Detailed,
                "json" => OutputFormat::Json,
                _ => bail!("Invalid format. Use 'simple', 'detailed', or 'json'"),
            },
            "--ocr" => parsed_args.ocr = true,
            "--no-pdf" => parsed_args.no_pdf = true,
            "--verbose" => parsed_args.verbose = true,
            "--info" => parsed_args.show_video_info = true,
            "--help" => bail!(
                "Slide keyframe extractor\n\n\
                Usage: {} <video_path_or_url> [OPTIONS]\n\n{}",
                program, USAGE
            ),
            _ => bail!("Unknown option: {}", flag),
        }

        i += if takes_value(flag) { 2 } else { 1 };
    }

    Ok(parsed_args)
}

fn takes_value(flag: &str) -> bool {
    matches!(
        flag,
        "--name" | "--output-dir" | "--config" | "--interval" | "--similarity"
            | "--min-sharpness" | "--sharpness-factor" | "--text-extra" | "--policy" | "--format"
    )
}

/// File settings first, then individual flags on top
fn build_config(args: &Args) -> anyhow::Result<ExtractionConfig> {
    let mut config = match &args.config_file {
        Some(path) => ExtractionConfig::from_json_file(path)?,
        None => ExtractionConfig::default(),
    };

    if let Some(interval) = args.interval {
        config.capture_interval_seconds = interval;
    }
    if let Some(similarity) = args.similarity {
        config.similarity_threshold = similarity;
    }
    if let Some(min_sharpness) = args.min_sharpness {
        config.min_sharpness = min_sharpness;
    }
    if let Some(factor) = args.sharpness_factor {
        config.replace_sharpness_factor = factor;
    }
    if let Some(extra) = args.text_extra {
        config.replace_text_extra = extra;
    }
    if let Some(policy) = args.policy {
        config.replace_policy = policy;
    }

    config.validate()?;
    debug!("Configuration: {:?}", config);
    Ok(config)
}

/// Explicit `--name`, else the file stem of a local path, else "video"
fn content_name(args: &Args) -> String {
    if let Some(name) = &args.content_name {
        return name.clone();
    }
    if is_remote(&args.locator) {
        return "video".to_string();
    }
    Path::new(&args.locator)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("video")
        .to_string()
}

fn show_video_info(video_path: &str) -> anyhow::Result<()> {
    info!("Analyzing video: {}", video_path);

    let video_info = get_video_info(video_path)
        .context("Failed to get video info")?;

    println!("Video Information:");
    println!("  Path: {}", video_info.path);
    println!("  Dimensions: {}x{}", video_info.width, video_info.height);
    println!("  Frame Rate: {:.2} fps", video_info.fps);
    println!("  Frame Count: {}", video_info.frame_count);
    println!("  Duration: {:.2} seconds", video_info.duration_seconds);
    println!("  Samples at default interval: {}", video_info.sample_count(&ExtractionConfig::default()));

    if !video_info.is_valid() {
        warn!("Video properties appear invalid - extraction may fail");
    }

    Ok(())
}

fn output_results(report: &PipelineReport, args: &Args) -> anyhow::Result<()> {
    match args.output_format {
        OutputFormat::Simple => {
            for path in report.keyframes.sorted_references() {
                println!("{}", path.display());
            }
            if let Some(document) = &report.document {
                println!("{}", document.display());
            }
        }
        OutputFormat::Detailed => {
            let stats = &report.stats;
            println!("Keyframe Extraction Results:");
            println!("  Processing time: {:.1}s", report.elapsed_ms as f64 / 1000.0);
            println!("  Video: {} frames at {:.2}fps ({:.1}s)",
                     stats.total_frame_count, stats.fps, stats.video_duration_seconds);
            println!("  Samples: {} ({} undecodable, {} blurry, {} similar, {} replacements, {} write failures)",
                     stats.samples_taken, stats.decode_skips, stats.blur_rejects,
                     stats.similar_rejects, stats.replacements, stats.write_failures);
            if stats.fallback_used {
                println!("  Fallback capture added {} frames", stats.fallback_added);
            }
            println!("  Keyframes: {}", report.keyframes.len());
            for record in &report.keyframes {
                println!("    {:>8.1}s  {}  (sharpness {:.1}, text {})",
                         record.timestamp_seconds, record.storage_reference.display(),
                         record.sharpness, record.text_amount);
            }
            match (&report.document, &report.diagnostic) {
                (Some(document), _) => println!("  Document: {}", document.display()),
                (None, Some(diagnostic)) => println!("  Document: none ({})", diagnostic),
                (None, None) => println!("  Document: skipped"),
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)
                .context("JSON serialization failed")?);
        }
    }

    info!("Extraction completed in {}ms, {} keyframes", report.elapsed_ms, report.keyframes.len());

    Ok(())
}
