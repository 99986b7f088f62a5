use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::level_filters::LevelFilter;
use tracing::{Instrument, Level, debug, error, info, info_span, warn};

mod metrics;
mod questions;

use poise::backends::face_mesh::{InputLayout, OnnxFaceMesh};
use poise::backends::ffmpeg::FfmpegReader;
use poise::backends::whisper::WhisperTranscriber;
use poise::batch::{BatchReport, ScopedUpload, upload_suffix};
use poise::frame::VideoReader;
use poise::gaze::GazeEstimator;
use poise::landmarks::LandmarkDetector;
use poise::message::{AudioChunk, ClientMessage};
use poise::session::{ChunkOutcome, ChunkTranscript};
use poise::{Error, Opts, Poise, ScoreSnapshot, Session, Transcriber};

type SharedPoise = Poise<Box<dyn Transcriber>>;

#[derive(Parser, Debug)]
#[command(name = "poise-server")]
#[command(about = "HTTP/WebSocket server scoring spoken interview answers")]
struct Params {
    /// Path to a whisper.cpp model file (e.g. `ggml-small.bin`).
    #[arg(short = 'm', long = "model", required = true)]
    model_path: String,

    /// Path to a face-mesh ONNX model. Without it, video uploads are scored on audio only.
    #[arg(short = 'f', long = "face-mesh")]
    face_mesh_path: Option<PathBuf>,

    /// Tensor layout of the face-mesh model input.
    #[arg(long = "face-mesh-layout", value_enum, default_value_t = InputLayout::Nchw)]
    face_mesh_layout: InputLayout,

    /// Spoken language hint passed to whisper.
    #[arg(long = "language", default_value = poise::opts::DEFAULT_LANGUAGE)]
    language: String,

    /// Whisper worker threads per call (defaults to the number of CPUs).
    #[arg(long = "threads")]
    threads: Option<usize>,

    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 8000)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 100 * 1024 * 1024)]
    max_bytes: usize,

    /// Seconds a streamed chunk may take before a degraded snapshot is sent instead.
    #[arg(long = "chunk-timeout-secs", default_value_t = 30)]
    chunk_timeout_secs: u64,

    /// Seconds a video analysis may take before the request fails with 504.
    #[arg(long = "batch-timeout-secs", default_value_t = 600)]
    batch_timeout_secs: u64,
}

#[derive(Clone)]
struct AppState {
    poise: Arc<SharedPoise>,
    reader: Arc<dyn VideoReader>,
    detector: Option<Arc<dyn LandmarkDetector>>,
    chunk_timeout: Duration,
    batch_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Decode(_) | Error::Video(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }

        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    poise::logging::init(LevelFilter::INFO);

    if let Err(err) = run().await {
        error!(error = ?err, "poise-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    if let Err(err) = metrics::init() {
        warn!(error = ?err, "metrics disabled (init failed)");
    }

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let state = load_state(&params).context("failed to initialize models")?;

    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/question", get(question))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/ws", get(ws_handler))
        .route("/analyze_video", post(analyze_video))
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(params.max_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        );

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Load every model once; handlers only ever borrow them.
fn load_state(params: &Params) -> Result<AppState> {
    let opts = Opts {
        language: Some(params.language.clone()),
        threads: params.threads.unwrap_or_else(num_cpus::get),
        ..Opts::default()
    };

    let transcriber = WhisperTranscriber::new(&params.model_path)
        .with_context(|| format!("failed to load whisper model '{}'", params.model_path))?;
    info!(model = %params.model_path, "whisper model loaded");

    let detector: Option<Arc<dyn LandmarkDetector>> = match &params.face_mesh_path {
        Some(path) => {
            let mesh = OnnxFaceMesh::with_layout(path, params.face_mesh_layout)
                .with_context(|| format!("failed to load face mesh '{}'", path.display()))?;
            info!(model = %path.display(), "face mesh model loaded");
            let mesh: Arc<dyn LandmarkDetector> = Arc::new(mesh);
            Some(mesh)
        }
        None => {
            warn!("no face mesh model given; video uploads are scored without eye contact");
            None
        }
    };

    let boxed: Box<dyn Transcriber> = Box::new(transcriber);
    Ok(AppState {
        poise: Arc::new(Poise::with_transcriber(boxed, opts)),
        reader: Arc::new(FfmpegReader::new()?),
        detector,
        chunk_timeout: Duration::from_secs(params.chunk_timeout_secs),
        batch_timeout: Duration::from_secs(params.batch_timeout_secs),
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[derive(Debug, Serialize)]
struct Status {
    status: &'static str,
}

async fn root() -> Json<Status> {
    Json(Status { status: "ok" })
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct Question {
    question: &'static str,
}

async fn question() -> Json<Question> {
    Json(Question {
        question: questions::random_question(),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let session = Session::new();
        let span = info_span!("session", id = %session.id());
        let (tx, rx) = socket.split();
        session_loop(rx, tx, state, session).instrument(span)
    })
}

/// Drive one streaming session until the client goes away.
///
/// Frames are handled one at a time, so chunk `n + 1` is never read before chunk `n`'s
/// snapshot has been sent.
async fn session_loop<Rx, Tx>(mut rx: Rx, mut tx: Tx, state: AppState, mut session: Session)
where
    Rx: Stream<Item = std::result::Result<Message, axum::Error>> + Unpin,
    Tx: Sink<Message> + Unpin,
    Tx::Error: std::fmt::Display,
{
    let _gauge = metrics::SessionGauge::open();
    let mut runner = ChunkRunner::new(state.chunk_timeout);
    info!("session opened");

    while let Some(frame) = rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                info!(?frame, "closed by client");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(err) => {
                warn!(error = %Error::transport(err), "session ended");
                break;
            }
        };

        let ClientMessage::AudioChunk(chunk) = ClientMessage::parse(text.as_str()) else {
            debug!("ignoring message without audio");
            continue;
        };

        let processed = process_chunk(&state, &mut runner, &chunk).await;
        let outcome = match session.ingest(processed) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "unrecoverable chunk failure");
                break;
            }
        };
        metrics::record_chunk(matches!(outcome, ChunkOutcome::Scored(_)));

        if let Err(err) = send_snapshot(&mut tx, outcome.snapshot()).await {
            warn!(error = %err, "session ended");
            break;
        }
    }

    session.close();
}

async fn process_chunk(
    state: &AppState,
    runner: &mut ChunkRunner<ChunkTranscript>,
    chunk: &AudioChunk,
) -> poise::Result<ChunkTranscript> {
    let bytes = chunk.decode()?;
    let poise = Arc::clone(&state.poise);
    runner.run(move || poise.transcribe_chunk(bytes)).await
}

/// Runs blocking chunk work under a deadline.
///
/// A chunk that overruns keeps its blocking thread until it finishes. The runner holds on to
/// it and waits for it before starting the next chunk, so a session never has more than one
/// blocking task in flight.
struct ChunkRunner<T> {
    timeout: Duration,
    overrun: Option<JoinHandle<poise::Result<T>>>,
}

impl<T: Send + 'static> ChunkRunner<T> {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            overrun: None,
        }
    }

    async fn run<F>(&mut self, work: F) -> poise::Result<T>
    where
        F: FnOnce() -> poise::Result<T> + Send + 'static,
    {
        if let Some(overrun) = self.overrun.take() {
            debug!("waiting for the previous chunk to finish");
            if let Err(err) = overrun.await {
                warn!(error = %err, "overrun chunk task failed");
            }
        }

        let mut task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(res)) => res,
            Ok(Err(join_err)) => Err(Error::Transcription(format!(
                "transcription task failed: {join_err}"
            ))),
            Err(_) => {
                self.overrun = Some(task);
                Err(Error::timeout("chunk processing"))
            }
        }
    }
}

async fn send_snapshot<Tx>(tx: &mut Tx, snapshot: &ScoreSnapshot) -> poise::Result<()>
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: std::fmt::Display,
{
    let json = serde_json::to_string(snapshot)?;
    tx.send(Message::Text(json.into()))
        .await
        .map_err(Error::transport)
}

async fn analyze_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<ScoreSnapshot>, AppError> {
    let upload = receive_upload(&mut multipart).await?;
    let timeout = state.batch_timeout;

    // The upload moves into the blocking task so the file outlives a timed-out or cancelled
    // request until the analysis that reads it has finished.
    let task = tokio::task::spawn_blocking(move || {
        let report = analyze_upload(&state, upload.path());
        drop(upload);
        report
    });

    let report = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(res)) => res?,
        Ok(Err(join_err)) => return Err(AppError::internal(join_err)),
        Err(_) => return Err(Error::timeout("video analysis").into()),
    };

    Ok(Json(report.snapshot))
}

fn analyze_upload(state: &AppState, path: &Path) -> poise::Result<BatchReport> {
    match &state.detector {
        Some(detector) => {
            let estimator = GazeEstimator::new(
                state.reader.as_ref(),
                detector.as_ref(),
                state.poise.opts().eye_openness_threshold,
            );
            state.poise.analyze_video(path, Some(&estimator))
        }
        None => state.poise.analyze_video(path, None),
    }
}

/// Stream the `file` field of a multipart body into a temp file.
async fn receive_upload(multipart: &mut Multipart) -> std::result::Result<ScopedUpload, AppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let upload = ScopedUpload::new(&upload_suffix(field.file_name()))
            .map_err(AppError::internal)?;
        let mut file = tokio::fs::File::from_std(upload.reopen().map_err(AppError::internal)?);

        let mut written = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?
        {
            file.write_all(&chunk).await.map_err(AppError::internal)?;
            written += chunk.len();
        }
        file.flush().await.map_err(AppError::internal)?;

        if written == 0 {
            return Err(AppError::bad_request("uploaded file was empty"));
        }
        debug!(bytes = written, path = %upload.path().display(), "upload stored");
        return Ok(upload);
    }

    Err(AppError::bad_request("multipart field `file` is required"))
}
