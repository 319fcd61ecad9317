use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use liveface_core::detection::domain::face_box::FaceBox;
use liveface_core::detection::domain::face_detector::DetectorSettings;
use liveface_core::detection::domain::model_config::{load_model_config, load_model_configs};
use liveface_core::engine::domain::face_engine::EngineSpec;
use liveface_core::engine::infrastructure::onnx_backend_factory::OnnxBackendFactory;
use liveface_core::host::api::{self, HostImage, HostLiveness};
use liveface_core::host::result_marshaller::WireFaceBox;
use liveface_core::host::status::Status;
use liveface_core::host::{capability_table, Capability, DetectEntry, FunctionTable};
use liveface_core::liveness::domain::liveness_engine::LivenessSettings;
use liveface_core::shared::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LIVE_THRESHOLD, DEFAULT_NMS_IOU_THRESHOLD,
    ENGINE_API_VERSION, IMAGE_EXTENSIONS, INVALID_HANDLE,
};

/// Face detection and liveness scoring on image files.
#[derive(Parser)]
#[command(name = "liveface")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect faces in an image, optionally scoring liveness.
    Detect(DetectArgs),
}

#[derive(Args)]
struct DetectArgs {
    /// Input image file.
    image: PathBuf,

    /// Directory holding `<name>.onnx` for every configured model.
    #[arg(long)]
    model_dir: PathBuf,

    /// JSON file with the detector's model config.
    #[arg(long)]
    detector_config: PathBuf,

    /// JSON file with a list of liveness model configs.
    #[arg(long)]
    liveness_config: Option<PathBuf>,

    /// Score this box (x1,y1,x2,y2) instead of the top detected face.
    #[arg(long, value_delimiter = ',', requires = "liveness_config")]
    face_box: Option<Vec<f32>>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence: f32,

    /// NMS IoU threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_NMS_IOU_THRESHOLD)]
    nms_iou: f32,

    /// Liveness score at or above which a face counts as live.
    #[arg(long, default_value_t = DEFAULT_LIVE_THRESHOLD)]
    live_threshold: f32,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    image: PathBuf,
    width: u32,
    height: u32,
    faces: Vec<FaceBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    liveness: Option<LivenessReport>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum LivenessReport {
    Scored {
        face: FaceBox,
        score: f32,
        is_live: bool,
    },
    NoFace,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Detect(args) => run_detect(&args),
    }
}

fn run_detect(args: &DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate(args)?;

    let detector_config = load_model_config(&args.detector_config)?;
    let detector_settings = DetectorSettings {
        confidence_threshold: args.confidence,
        nms_iou_threshold: args.nms_iou,
    };

    let rgb = image::open(&args.image)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.into_raw();
    let image = HostImage::Rgb {
        data: &pixels,
        width,
        height,
    };

    api::install(Box::new(OnnxBackendFactory::new(&args.model_dir)));

    let faces = detect_faces(
        &EngineSpec::Detector {
            config: detector_config.clone(),
            settings: detector_settings,
        },
        &image,
    )?;

    let liveness = match &args.liveness_config {
        Some(path) => {
            let spec = EngineSpec::Liveness {
                detector: detector_config,
                detector_settings,
                models: load_model_configs(path)?,
                settings: LivenessSettings {
                    live_threshold: args.live_threshold,
                },
            };
            Some(score_liveness(&spec, &image, args.face_box.as_deref())?)
        }
        None => None,
    };

    let report = Report {
        image: args.image.clone(),
        width,
        height,
        faces,
        liveness,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}

fn detect_faces(
    spec: &EngineSpec,
    image: &HostImage,
) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
    let table = table(Capability::FaceDetection)?;
    let DetectEntry::Faces(detect) = table.entry else {
        return Err("face detection table has no detect entry".into());
    };

    let handle = allocate(table, spec)?;
    let result = detect(handle, image);
    release(table, handle);

    check(result.status)?;
    Ok(result.boxes.into_iter().map(FaceBox::from).collect())
}

fn score_liveness(
    spec: &EngineSpec,
    image: &HostImage,
    face_box: Option<&[f32]>,
) -> Result<LivenessReport, Box<dyn std::error::Error>> {
    let result = match face_box {
        Some(&[x1, y1, x2, y2]) => {
            let table = table(Capability::LivenessOnBox)?;
            let DetectEntry::LivenessOnBox(score_box) = table.entry else {
                return Err("liveness-on-box table has no score entry".into());
            };
            let face = WireFaceBox {
                confidence: 1.0,
                x1,
                y1,
                x2,
                y2,
            };
            let handle = allocate(table, spec)?;
            let result = score_box(handle, image, &face);
            release(table, handle);
            result
        }
        Some(other) => {
            return Err(format!("--face-box needs 4 values, got {}", other.len()).into());
        }
        None => {
            let table = table(Capability::Liveness)?;
            let DetectEntry::Liveness(detect_liveness) = table.entry else {
                return Err("liveness table has no detect entry".into());
            };
            let handle = allocate(table, spec)?;
            let result = detect_liveness(handle, image);
            release(table, handle);
            result
        }
    };
    to_report(result)
}

fn to_report(result: HostLiveness) -> Result<LivenessReport, Box<dyn std::error::Error>> {
    if result.status == Status::NoFace {
        return Ok(LivenessReport::NoFace);
    }
    check(result.status)?;
    Ok(LivenessReport::Scored {
        face: FaceBox::from(result.face),
        score: result.score,
        is_live: result.is_live,
    })
}

fn table(capability: Capability) -> Result<&'static FunctionTable, Box<dyn std::error::Error>> {
    capability_table(ENGINE_API_VERSION, capability).ok_or_else(|| {
        format!("engine does not serve {capability:?} at version {ENGINE_API_VERSION}").into()
    })
}

fn allocate(
    table: &FunctionTable,
    spec: &EngineSpec,
) -> Result<i64, Box<dyn std::error::Error>> {
    let handle = (table.allocate)(spec);
    if handle == INVALID_HANDLE {
        return Err(format!(
            "failed to load model '{}' (run with RUST_LOG=warn for details)",
            spec.name()
        )
        .into());
    }
    Ok(handle)
}

fn release(table: &FunctionTable, handle: i64) {
    let status = (table.release)(handle);
    if status != Status::Ok {
        log::warn!("Release of handle {handle:#x} returned {status:?}");
    }
}

fn check(status: Status) -> Result<(), Box<dyn std::error::Error>> {
    if status.is_error() {
        return Err(format!("engine returned {status:?} ({})", status.code()).into());
    }
    Ok(())
}

fn print_text(report: &Report) {
    println!(
        "{} ({}x{}): {} face(s)",
        report.image.display(),
        report.width,
        report.height,
        report.faces.len()
    );
    for (i, face) in report.faces.iter().enumerate() {
        println!(
            "  #{i}: confidence {:.3}, box ({:.1}, {:.1}) - ({:.1}, {:.1})",
            face.confidence, face.x1, face.y1, face.x2, face.y2
        );
    }
    match &report.liveness {
        Some(LivenessReport::Scored { score, is_live, .. }) => {
            let verdict = if *is_live { "live" } else { "spoof" };
            println!("  liveness: {score:.3} ({verdict})");
        }
        Some(LivenessReport::NoFace) => println!("  liveness: no face"),
        None => {}
    }
}

fn validate(args: &DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.image.exists() {
        return Err(format!("Input file not found: {}", args.image.display()).into());
    }
    if !is_image(&args.image) {
        return Err(format!(
            "Unsupported image type: {} (expected one of {})",
            args.image.display(),
            IMAGE_EXTENSIONS.join(", ")
        )
        .into());
    }
    if !args.model_dir.is_dir() {
        return Err(format!("Model directory not found: {}", args.model_dir.display()).into());
    }
    for (flag, value) in [
        ("Confidence", args.confidence),
        ("NMS IoU", args.nms_iou),
        ("Live threshold", args.live_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("{flag} must be between 0.0 and 1.0, got {value}").into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
