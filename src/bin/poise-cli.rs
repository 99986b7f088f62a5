use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::error;
use tracing::level_filters::LevelFilter;

use poise::backends::face_mesh::{InputLayout, OnnxFaceMesh};
use poise::backends::ffmpeg::FfmpegReader;
use poise::gaze::GazeEstimator;
use poise::{Opts, Poise};

fn main() {
    poise::logging::init(LevelFilter::ERROR);

    if let Err(err) = run() {
        error!(error = ?err, "poise-cli failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let params = Params::parse();

    let opts = Opts {
        language: Some(params.language.clone()),
        ..Opts::default()
    };
    let poise = Poise::new(&params.model_path, opts).context("failed to load whisper model")?;

    let report = if params.audio_only {
        poise.analyze_video(&params.video_path, None)?
    } else {
        let Some(face_mesh_path) = &params.face_mesh_path else {
            bail!("--face-mesh is required unless --audio-only is set");
        };
        let detector = OnnxFaceMesh::with_layout(face_mesh_path, params.face_mesh_layout)?;
        let reader = FfmpegReader::new()?;
        let estimator =
            GazeEstimator::new(&reader, &detector, poise.opts().eye_openness_threshold);
        poise.analyze_video(&params.video_path, Some(&estimator))?
    };

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "poise")]
#[command(about = "Score the delivery of a recorded interview answer")]
struct Params {
    /// Path to a whisper.cpp model file (e.g. `ggml-small.bin`).
    #[arg(short = 'm', long = "model")]
    model_path: String,

    /// Path to a face-mesh ONNX model.
    #[arg(short = 'f', long = "face-mesh", required_unless_present = "audio_only")]
    face_mesh_path: Option<PathBuf>,

    /// Tensor layout of the face-mesh model input.
    #[arg(long = "face-mesh-layout", value_enum, default_value_t = InputLayout::Nchw)]
    face_mesh_layout: InputLayout,

    /// Recording to analyze (any container with an audio track).
    #[arg(short = 'i', long = "video")]
    video_path: PathBuf,

    /// Skip eye-contact estimation.
    #[arg(long = "audio-only", default_value_t = false)]
    audio_only: bool,

    /// Spoken language hint passed to whisper.
    #[arg(long = "language", default_value = poise::opts::DEFAULT_LANGUAGE)]
    language: String,
}
