//! Shared helpers for the HTTP integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use intellitrain_server::{AppState, Config, SqliteStore, build_router};
use serde_json::Value;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "intellitrain-test-boundary";

pub fn test_config() -> Config {
    Config {
        enable_swagger: false,
        audio_epochs: 40,
        image_epochs: 100,
        augment_count: 2,
        ..Config::default()
    }
}

/// Fresh in-memory database plus the router over it.
pub async fn setup_app(config: Config) -> (Router, Arc<AppState>) {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    let state = Arc::new(AppState::new(config, store).unwrap());
    (build_router(Arc::clone(&state)), state)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_empty(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()).await
}

pub struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.filename, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(
    app: &Router,
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(fields, file)))
        .unwrap();
    send(app, req).await
}

pub async fn upload_audio(app: &Router, class: &str, wav: &[u8]) -> (StatusCode, Value) {
    let file = FilePart { field: "audio", filename: "clip.wav", content_type: "audio/wav", bytes: wav };
    post_multipart(app, "/api/audio/samples", &[("class", class)], Some(file)).await
}

pub async fn predict_audio(app: &Router, wav: &[u8]) -> (StatusCode, Value) {
    let file = FilePart { field: "audio", filename: "query.wav", content_type: "audio/wav", bytes: wav };
    post_multipart(app, "/api/audio/predict", &[], Some(file)).await
}

/// 16-bit mono WAV of a sine tone.
pub fn tone_wav(freq: f32, secs: f32, amplitude: f32) -> Vec<u8> {
    let sample_rate = 16_000u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total = (secs * sample_rate as f32) as usize;
        for i in 0..total {
            let t = i as f32 / sample_rate as f32;
            let s = amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// PNG of a solid colour with a faint horizontal gradient so samples differ.
pub fn solid_png(colour: [u8; 3], jitter: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(64, 64, |x, _| {
        let shift = ((x as u16 * jitter as u16) / 64) as u8;
        image::Rgb([
            colour[0].saturating_sub(shift),
            colour[1].saturating_add(shift / 2),
            colour[2].saturating_sub(shift),
        ])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Poll the training status until it leaves `in_progress`.
pub async fn wait_for_training(app: &Router, modality: &str) -> Value {
    let uri = format!("/api/{modality}/training-status");
    for _ in 0..1200 {
        let (status, body) = get(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "in_progress" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("training on {modality} did not finish in time");
}
