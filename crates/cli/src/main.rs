use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use facetrace_core::hashing::domain::perceptual_hash::hamming_distance;
use facetrace_core::hashing::infrastructure::dct_image_hasher::{compute_hash, DctImageHasher};
use facetrace_core::identity::domain::face_detector::FaceDetector;
use facetrace_core::identity::domain::face_store::FaceStore;
use facetrace_core::identity::domain::image_store::ImageStore;
use facetrace_core::identity::infrastructure::directory_image_store::{
    DirectoryImageStore, DEFAULT_CROP_PADDING,
};
use facetrace_core::identity::infrastructure::http_face_detector::HttpFaceDetector;
use facetrace_core::identity::infrastructure::json_file_face_store::JsonFileFaceStore;
use facetrace_core::pipeline::deduplicate_faces_use_case::DeduplicateFacesUseCase;
use facetrace_core::pipeline::enroll_face_use_case::EnrollFaceUseCase;
use facetrace_core::pipeline::identification::{
    Classification, IdentifiedFace, IdentifyOutcome, MatchBasis,
};
use facetrace_core::pipeline::identify_faces_use_case::IdentifyFacesUseCase;
use facetrace_core::pipeline::map_faces_use_case::MapFacesUseCase;
use facetrace_core::pipeline::pipeline_logger::{LogPipelineLogger, PipelineLogger};
use facetrace_core::shared::config::EngineConfig;
use facetrace_core::shared::constants::{
    DEFAULT_ATTENDANCE_LIMIT, DEFAULT_UNASSIGNED_LIMIT, FACES_DIR_NAME, IMAGE_EXTENSIONS,
    RECORDS_FILE_NAME,
};

/// Kiosk face identification and unassigned-face bookkeeping.
#[derive(Parser)]
#[command(name = "facetrace")]
#[command(version)]
struct Cli {
    /// Config file (default: platform config dir/FaceTrace/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding records.json and stored face images.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the detection engine.
    #[arg(long, global = true)]
    engine_url: Option<String>,

    /// Similarity above which a face matches a known identity.
    #[arg(long, global = true)]
    known_threshold: Option<f64>,

    /// Similarity above which a face reuses an unassigned record.
    #[arg(long, global = true)]
    unknown_threshold: Option<f64>,

    /// Maximum image-hash bit distance treated as the same snapshot.
    #[arg(long, global = true)]
    phash_threshold: Option<u32>,

    /// Similarity above which the cleanup pass treats records as duplicates.
    #[arg(long, global = true)]
    batch_threshold: Option<f64>,

    /// Ignore detections scoring below this (0.0-1.0).
    #[arg(long, global = true)]
    min_detection_score: Option<f64>,

    /// Store a padded square crop of the face instead of the full snapshot.
    #[arg(long, global = true)]
    crop_faces: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identify every face in one or more snapshots.
    Identify {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Enroll a reference photo for an owner.
    Enroll {
        #[arg(long)]
        owner: String,
        image: PathBuf,
    },
    /// Assign unassigned faces to an owner.
    Assign {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        face_ids: Vec<String>,
    },
    /// Delete unassigned faces.
    Discard {
        #[arg(required = true)]
        face_ids: Vec<String>,
    },
    /// Remove unassigned faces without images and collapse duplicates.
    Dedup,
    /// List the newest unassigned faces.
    Unassigned {
        #[arg(long, default_value_t = DEFAULT_UNASSIGNED_LIMIT)]
        limit: usize,
    },
    /// List the newest attendance entries.
    Attendance {
        #[arg(long, default_value_t = DEFAULT_ATTENDANCE_LIMIT)]
        limit: usize,
    },
    /// Print the perceptual hash of image files.
    Hash {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Bit distance between two hex hashes.
    Distance { h1: String, h2: String },
}

#[derive(Serialize)]
struct ImageResult<'a> {
    image: &'a Path,
    #[serde(flatten)]
    outcome: IdentifyOutcome,
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
    validate(&cli)?;

    match &cli.command {
        Command::Hash { images } => return run_hash(images, cli.json),
        Command::Distance { h1, h2 } => return run_distance(h1, h2, cli.json),
        _ => {}
    }

    let config = load_config(&cli)?;
    let data_dir = config.resolve_data_dir()?;
    log::debug!("Using data directory {}", data_dir.display());
    let store: Arc<dyn FaceStore> = Arc::new(JsonFileFaceStore::open(&data_dir.join(RECORDS_FILE_NAME))?);
    let images = build_image_store(&config, &data_dir);

    match &cli.command {
        Command::Identify { images: inputs } => {
            let detector = build_detector(&config)?;
            let use_case = IdentifyFacesUseCase::new(
                detector,
                store,
                images,
                Arc::new(DctImageHasher::new()),
                config,
            );
            run_identify(&use_case, inputs, cli.json)
        }
        Command::Enroll { owner, image } => {
            let detector = build_detector(&config)?;
            let use_case = EnrollFaceUseCase::new(detector, store, images);
            let identity = use_case.execute(owner, &fs::read(image)?)?;
            if cli.json {
                print_json(&identity)
            } else {
                println!(
                    "Enrolled identity {} for {} (image: {})",
                    identity.id,
                    identity.owner_id,
                    identity.image_ref.as_deref().unwrap_or("none")
                );
                Ok(())
            }
        }
        Command::Assign { owner, face_ids } => {
            let report = MapFacesUseCase::new(store).assign(face_ids, owner)?;
            if cli.json {
                return print_json(&report);
            }
            for identity in &report.created {
                println!(
                    "Assigned {} to {} as identity {}",
                    identity.image_ref.as_deref().unwrap_or("face"),
                    identity.owner_id,
                    identity.id
                );
            }
            for id in &report.missing {
                println!("skipped {id}: not found");
            }
            Ok(())
        }
        Command::Discard { face_ids } => {
            let deleted = MapFacesUseCase::new(store).discard(face_ids)?;
            if cli.json {
                print_json(&serde_json::json!({ "deleted": deleted }))
            } else {
                println!("Discarded {deleted} of {} face(s)", face_ids.len());
                Ok(())
            }
        }
        Command::Dedup => {
            let report = DeduplicateFacesUseCase::new(store, images, &config).execute()?;
            if cli.json {
                return print_json(&report);
            }
            for pair in &report.duplicates {
                println!(
                    "{} duplicates {} (similarity {:.3})",
                    pair.duplicate_id, pair.kept_id, pair.similarity
                );
            }
            println!(
                "Removed {} without images, {} duplicates; {} remaining",
                report.removed_missing_image, report.removed_duplicates, report.remaining
            );
            Ok(())
        }
        Command::Unassigned { limit } => {
            let faces = MapFacesUseCase::new(store).recent_unassigned(*limit)?;
            if cli.json {
                return print_json(&faces);
            }
            for face in &faces {
                println!(
                    "{}  {}  hash={}  image={}",
                    face.created_at.to_rfc3339(),
                    face.id,
                    face.perceptual_hash
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |h| h.to_string()),
                    face.image_ref.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Attendance { limit } => {
            let entries = MapFacesUseCase::new(store).recent_attendance(*limit)?;
            if cli.json {
                return print_json(&entries);
            }
            for entry in &entries {
                println!(
                    "{}  {}  {:.3}",
                    entry.checked_in_at.to_rfc3339(),
                    entry.owner_id,
                    entry.confidence_score
                );
            }
            Ok(())
        }
        Command::Hash { .. } | Command::Distance { .. } => Ok(()),
    }
}

fn run_identify(
    use_case: &IdentifyFacesUseCase,
    inputs: &[PathBuf],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = LogPipelineLogger::new();
    let mut results = Vec::with_capacity(inputs.len());

    for (i, path) in inputs.iter().enumerate() {
        logger.progress(i + 1, inputs.len());
        let bytes = fs::read(path)?;
        let outcome = use_case.execute(&bytes, &mut logger)?;
        if !json {
            println!("{}: {} face(s)", path.display(), outcome.faces.len());
            for face in &outcome.faces {
                println!("  {}", describe(face));
            }
            if !outcome.skipped.is_empty() {
                println!("  {} low-confidence detection(s) skipped", outcome.skipped.len());
            }
        }
        results.push(ImageResult {
            image: path,
            outcome,
        });
    }

    if inputs.len() > 1 {
        logger.summary();
    }
    if json {
        print_json(&results)?;
    }
    Ok(())
}

fn run_hash(inputs: &[PathBuf], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut hashes = Vec::with_capacity(inputs.len());
    for path in inputs {
        let hash = compute_hash(&fs::read(path)?);
        if !json {
            let note = if hash.is_degraded() { "  (checksum fallback)" } else { "" };
            println!("{hash}  {}{note}", path.display());
        }
        hashes.push(serde_json::json!({ "image": path, "hash": hash }));
    }
    if json {
        print_json(&hashes)?;
    }
    Ok(())
}

fn run_distance(h1: &str, h2: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let distance = hamming_distance(h1, h2)
        .ok_or_else(|| format!("Hashes are not comparable: '{h1}' vs '{h2}'"))?;
    if json {
        print_json(&serde_json::json!({ "distance": distance }))
    } else {
        println!("{distance}");
        Ok(())
    }
}

fn describe(face: &IdentifiedFace) -> String {
    let mut line = match &face.classification {
        Classification::Known {
            owner_id,
            identity_id,
        } => format!("known   owner={owner_id} identity={identity_id}"),
        Classification::UnknownReused { record_id } => format!("reused  record={record_id}"),
        Classification::UnknownNew { record_id } => format!("new     record={record_id}"),
    };
    match (&face.basis, face.score) {
        (MatchBasis::PerceptualHash { distance }, _) => {
            line.push_str(&format!(" hash-distance={distance}"));
        }
        (MatchBasis::Embedding, Some(score)) => line.push_str(&format!(" score={score:.3}")),
        (MatchBasis::Embedding, None) => {}
    }
    for failure in &face.persistence_failures {
        line.push_str(&format!(" [{:?} failed: {}]", failure.step, failure.message));
    }
    line
}

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match cli.config.clone().or_else(EngineConfig::default_path) {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    apply_overrides(cli, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut EngineConfig) {
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(url) = &cli.engine_url {
        config.engine_url = url.clone();
    }
    if let Some(t) = cli.known_threshold {
        config.known_threshold = t;
    }
    if let Some(t) = cli.unknown_threshold {
        config.unknown_threshold = t;
    }
    if let Some(t) = cli.phash_threshold {
        config.phash_threshold = t;
    }
    if let Some(t) = cli.batch_threshold {
        config.batch_similarity_threshold = t;
    }
    if let Some(s) = cli.min_detection_score {
        config.min_detection_score = s;
    }
    if cli.crop_faces {
        config.crop_faces = true;
    }
}

fn build_detector(config: &EngineConfig) -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Using detection engine at {}", config.engine_url);
    Ok(Arc::new(HttpFaceDetector::new(&config.engine_url)?))
}

fn build_image_store(config: &EngineConfig, data_dir: &Path) -> Arc<dyn ImageStore> {
    let store = DirectoryImageStore::new(data_dir.join(FACES_DIR_NAME));
    if config.crop_faces {
        Arc::new(store.with_crop(DEFAULT_CROP_PADDING))
    } else {
        Arc::new(store)
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let inputs: &[PathBuf] = match &cli.command {
        Command::Identify { images } | Command::Hash { images } => images,
        Command::Enroll { image, .. } => std::slice::from_ref(image),
        _ => &[],
    };
    for path in inputs {
        if !path.is_file() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
        if !is_image(path) {
            log::warn!("{} does not have an image extension", path.display());
        }
    }
    if let Command::Enroll { owner, .. } | Command::Assign { owner, .. } = &cli.command {
        if owner.trim().is_empty() {
            return Err("--owner must not be empty".into());
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

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
