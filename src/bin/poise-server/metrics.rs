use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts as PromOpts, Registry,
    TextEncoder,
};

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_in_flight_requests: IntGauge,
    ws_sessions_active: IntGauge,
    ws_chunks_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build() -> prometheus::Result<Metrics> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        PromOpts::new(
            "poise_http_requests_total",
            "Total HTTP requests served by poise-server.",
        ),
        &["route", "status"],
    )?;

    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "poise_http_request_duration_seconds",
            "HTTP request latency in seconds.",
        ),
        &["route", "status"],
    )?;

    let http_in_flight_requests = IntGauge::new(
        "poise_http_in_flight_requests",
        "Current number of in-flight HTTP requests.",
    )?;

    let ws_sessions_active = IntGauge::new(
        "poise_ws_sessions_active",
        "Current number of open streaming sessions.",
    )?;

    let ws_chunks_total = IntCounterVec::new(
        PromOpts::new(
            "poise_ws_chunks_total",
            "Streamed audio chunks processed, by outcome.",
        ),
        &["outcome"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(http_in_flight_requests.clone()))?;
    registry.register(Box::new(ws_sessions_active.clone()))?;
    registry.register(Box::new(ws_chunks_total.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        http_in_flight_requests,
        ws_sessions_active,
        ws_chunks_total,
    })
}

/// Register all metrics. Until this succeeds every recording call is a no-op.
pub fn init() -> prometheus::Result<()> {
    if METRICS.get().is_none() {
        let _ = METRICS.set(build()?);
    }
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

pub async fn prometheus_metrics() -> Response {
    let Some(m) = metrics() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response();
    };

    let families = m.registry.gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        )],
        buf,
    )
        .into_response()
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or_else(|| req.uri().path())
        .to_owned();

    // Scrapes, probes and long-lived sockets would only skew the latency histogram.
    let Some(m) = metrics() else {
        return next.run(req).await;
    };
    if route == "/metrics" || route == "/healthz" || route == "/ws" {
        return next.run(req).await;
    }

    let start = Instant::now();

    m.http_in_flight_requests.inc();
    let response = next.run(req).await;
    m.http_in_flight_requests.dec();

    let status = response.status().as_u16().to_string();
    m.http_requests_total
        .with_label_values(&[route.as_str(), status.as_str()])
        .inc();
    m.http_request_duration_seconds
        .with_label_values(&[route.as_str(), status.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Counts one open streaming session for as long as it lives.
pub struct SessionGauge(());

impl SessionGauge {
    pub fn open() -> Self {
        if let Some(m) = metrics() {
            m.ws_sessions_active.inc();
        }
        Self(())
    }
}

impl Drop for SessionGauge {
    fn drop(&mut self) {
        if let Some(m) = metrics() {
            m.ws_sessions_active.dec();
        }
    }
}

pub fn record_chunk(scored: bool) {
    if let Some(m) = metrics() {
        let outcome = if scored { "scored" } else { "degraded" };
        m.ws_chunks_total.with_label_values(&[outcome]).inc();
    }
}
