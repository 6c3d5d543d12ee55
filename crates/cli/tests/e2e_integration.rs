//! End-to-end tests for the tightfit pipeline.
//!
//! These run real codecs (image and structural PDF) through the orchestrator,
//! and drive the bot through the HTTP webhook surface.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http_body_util::BodyExt;
use tower::ServiceExt;

use tightfit_channels::{ChannelRegistry, CompressionBot, WebhookChannel, WebhookConfig};
use tightfit_config::AppConfig;
use tightfit_core::{CancelToken, Channel, CompressError, CompressionRequest, SizePolicy};
use tightfit_encoders::CodecRouter;
use tightfit_engine::testing::{ScriptedEncoder, document_plan};
use tightfit_engine::{Compressor, SelectionEngine, StopReason};
use tightfit_gateway::{GatewayState, RepliesResponse, ReplyPayload};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn config_with_limits(hard: u64, ideal_min: u64, ideal_max: u64) -> (AppConfig, tempfile::TempDir) {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.limits.hard_max_bytes = hard;
    config.limits.ideal_min_bytes = ideal_min;
    config.limits.ideal_max_bytes = ideal_max;
    config.encoder.scratch_dir = scratch.path().to_path_buf();
    config.encoder.ghostscript_path = "/nonexistent/tightfit-test/gs".into();
    config.validate().unwrap();
    (config, scratch)
}

fn real_compressor(config: &AppConfig) -> Compressor {
    Compressor::from_config(config, Arc::new(CodecRouter::from_config(config))).unwrap()
}

/// A gradient with low-amplitude noise: large as PNG, cheap as JPEG.
fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x2545_F491;
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let noise = (state & 0x0F) as u8;
        image::Rgb([
            (x % 256) as u8 ^ noise,
            (y % 256) as u8 ^ noise,
            ((x + y) % 256) as u8 ^ noise,
        ])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// A one-page PDF carrying a large stream nothing references.
fn bloated_pdf(dead_bytes: usize) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 11.into()]),
    ];
    for line in 0..120 {
        operations.push(Operation::new("Td", vec![0.into(), (-12).into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(format!("Invoice line {line}: consulting services"))],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        Content { operations }.encode().unwrap(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let dead: Vec<u8> = (0..dead_bytes as u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 11) as u8)
        .collect();
    doc.add_object(Stream::new(dictionary! {}, dead));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn assert_no_scratch_left(scratch: &tempfile::TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path())
        .map(|rd| rd.filter_map(Result::ok).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "scratch not cleaned: {leftovers:?}");
}

// ── Orchestrator with real codecs ────────────────────────────────────────

#[tokio::test]
async fn small_input_comes_back_byte_identical() {
    let (config, _scratch) = config_with_limits(2_097_152, 1_572_864, 1_992_294);
    let png = noisy_png(64, 64);
    let request = CompressionRequest::new(png.clone(), "image/png", "tiny.png");

    let artifact = real_compressor(&config).compress(&request).await.unwrap();
    assert_eq!(artifact.bytes(), png.as_slice());
    assert_eq!(artifact.suggested_filename(), "tiny.png");

    // Idempotence: feeding the result back changes nothing.
    let again = CompressionRequest::new(artifact.bytes().to_vec(), "image/png", "tiny.png");
    let second = real_compressor(&config).compress(&again).await.unwrap();
    assert_eq!(second.bytes(), artifact.bytes());
}

/// What the image codec produces for `png`: decode, optional Lanczos3
/// downscale, baseline JPEG at `quality`.
fn reference_jpeg(png: &[u8], quality: u8, downscale: Option<f32>) -> Vec<u8> {
    let mut decoded = image::load_from_memory(png).unwrap();
    if let Some(factor) = downscale {
        let side = |s: u32| ((s as f32 * factor).round() as u32).clamp(1, s);
        decoded = decoded.resize_exact(
            side(decoded.width()),
            side(decoded.height()),
            image::imageops::FilterType::Lanczos3,
        );
    }
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&decoded.to_rgb8())
        .unwrap();
    out
}

#[tokio::test]
async fn oversized_image_is_reencoded_at_first_fitting_quality() {
    let png = noisy_png(512, 512);
    let q90 = reference_jpeg(&png, 90, None).len() as u64;
    assert!((png.len() as u64) > q90 + 2, "fixture must shrink as JPEG");

    // The ceiling sits between the q90 re-encode and the PNG, so the first
    // quality rung lands in the ideal band and stops the ladder.
    let hard = q90 + (png.len() as u64 - q90) / 2;
    let (config, scratch) = config_with_limits(hard, q90, hard);
    let request = CompressionRequest::new(png, "image/png", "photo.png");

    let artifact = real_compressor(&config).compress(&request).await.unwrap();
    assert_eq!(artifact.mime_type(), "image/jpeg");
    assert_eq!(artifact.suggested_filename(), "photo_compressed.jpg");
    assert_eq!(artifact.size_bytes(), q90);
    let decoded = image::load_from_memory(artifact.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (512, 512));
    assert_no_scratch_left(&scratch);
}

#[tokio::test]
async fn far_oversized_image_takes_the_downscale_rung() {
    let png = noisy_png(512, 512);
    let q90 = reference_jpeg(&png, 90, None).len() as u64;
    let downscaled = reference_jpeg(&png, 90, Some(0.8)).len() as u64;
    assert!(downscaled < q90, "downscale must shrink the fixture");

    // Only the downscaled candidate fits, and the input is far enough above
    // the ceiling for the ladder to include it.
    let hard = downscaled + (q90 - downscaled) / 2;
    let (mut config, scratch) = config_with_limits(hard, downscaled, hard);
    config.image.start_quality = 90;
    config.image.min_quality = 90;
    config.image.downscale_quality = 90;
    config.image.downscale_trigger_ratio = 1.01;
    config.validate().unwrap();
    assert!(png.len() as f64 > config.image.downscale_trigger_ratio * hard as f64);

    let request = CompressionRequest::new(png, "image/png", "photo.png");
    let artifact = real_compressor(&config).compress(&request).await.unwrap();
    assert_eq!(artifact.mime_type(), "image/jpeg");
    assert_eq!(artifact.suggested_filename(), "photo_compressed.jpg");
    assert_eq!(artifact.size_bytes(), downscaled);
    let decoded = image::load_from_memory(artifact.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (410, 410));
    assert_no_scratch_left(&scratch);
}

#[tokio::test]
async fn pdf_without_ghostscript_keeps_structural_rewrite() {
    let (config, scratch) = config_with_limits(40_000, 30_000, 38_000);
    let pdf = bloated_pdf(120 * 1024);
    assert!(pdf.len() > 40_000);
    let request = CompressionRequest::new(pdf, "application/pdf", "invoice.pdf");

    let artifact = real_compressor(&config).compress(&request).await.unwrap();
    assert_eq!(artifact.mime_type(), "application/pdf");
    assert_eq!(artifact.suggested_filename(), "invoice_compressed.pdf");
    assert!(artifact.size_bytes() <= 40_000);
    let reparsed = lopdf::Document::load_mem(artifact.bytes()).unwrap();
    assert_eq!(reparsed.get_pages().len(), 1);
    assert_no_scratch_left(&scratch);
}

#[tokio::test]
async fn undecodable_oversized_input_falls_back_to_summary() {
    let (config, _scratch) = config_with_limits(40_000, 30_000, 38_000);
    let request = CompressionRequest::new(vec![0x42; 80_000], "application/pdf", "broken.pdf");

    let artifact = real_compressor(&config).compress(&request).await.unwrap();
    assert!(artifact.mime_type().starts_with("text/plain"));
    assert!(artifact.size_bytes() < 30_000);
    assert_eq!(artifact.suggested_filename(), "broken_SUMMARY.txt");
    let text = String::from_utf8(artifact.into_bytes()).unwrap();
    assert!(text.contains("broken.pdf"));
}

#[tokio::test]
async fn unsupported_kind_is_rejected() {
    let (config, _scratch) = config_with_limits(40_000, 30_000, 38_000);
    let request = CompressionRequest::new(vec![0; 50_000], "video/mp4", "clip.mp4");
    let err = real_compressor(&config).compress(&request).await.unwrap_err();
    assert!(matches!(err, CompressError::UnsupportedMediaKind { .. }));
}

// ── Selection scenario from the size-band rules ──────────────────────────

#[tokio::test]
async fn selection_stops_at_first_ideal_candidate() {
    let policy = SizePolicy::new(2_000_000, 1_500_000, 1_900_000).unwrap();
    let encoder = ScriptedEncoder::sizes([2_500_000, 1_950_000, 1_700_000, 1_850_000]);

    let report = SelectionEngine::new(&encoder)
        .select(b"input", document_plan(4), &policy, &CancelToken::never())
        .await;

    assert_eq!(encoder.call_count(), 3);
    assert_eq!(report.stop, StopReason::IdealFound);
    assert_eq!(report.into_best_artifact().unwrap().size_bytes(), 1_700_000);
}

// ── Bot over the HTTP webhook ────────────────────────────────────────────

async fn post(app: axum::Router, body: serde_json::Value) -> StatusCode {
    let req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(req).await.unwrap().status()
}

async fn drain(app: axum::Router, chat_id: &str) -> Vec<ReplyPayload> {
    let req = Request::builder()
        .uri(format!("/webhook/replies/{chat_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice::<RepliesResponse>(&body).unwrap().replies
}

#[tokio::test]
async fn webhook_bot_round_trip() {
    let (config, _scratch) = config_with_limits(2_097_152, 1_572_864, 1_992_294);
    let bot = Arc::new(CompressionBot::new(
        Arc::new(real_compressor(&config)),
        tightfit_sessions::from_config(&config.sessions),
        config.bot.clone(),
    ));
    let webhook = Arc::new(WebhookChannel::new(WebhookConfig::default()));
    let mut registry = ChannelRegistry::new();
    registry.register(webhook.clone());
    let registry = Arc::new(registry);
    let runner = tokio::spawn(tightfit_channels::runner::run(registry.clone(), bot));

    let state = Arc::new(GatewayState {
        policy: config.size_policy().unwrap(),
        webhook: webhook.clone(),
        registry,
        start_time: chrono::Utc::now(),
    });
    let app = tightfit_gateway::build_router(state, config.gateway.max_body_bytes);

    // Wait for the runner to start the webhook channel.
    let mut status = StatusCode::SERVICE_UNAVAILABLE;
    for _ in 0..200 {
        status = post(app.clone(), serde_json::json!({ "sender_id": "555", "text": "help compress" })).await;
        if status != StatusCode::SERVICE_UNAVAILABLE {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status, StatusCode::ACCEPTED);

    let png = noisy_png(32, 32);
    let status = post(
        app.clone(),
        serde_json::json!({
            "sender_id": "555",
            "media": { "mime_type": "image/png", "filename": "logo.png", "data_base64": BASE64.encode(&png) }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut replies = Vec::new();
    for _ in 0..400 {
        replies.extend(drain(app.clone(), "555").await);
        if replies.len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(replies.len(), 3, "{replies:?}");
    assert!(matches!(&replies[0], ReplyPayload::Text { text } if text.contains("enabled")));
    assert!(matches!(&replies[1], ReplyPayload::Text { text } if text.contains("Compressing")));
    match &replies[2] {
        ReplyPayload::Media {
            filename,
            data_base64,
            caption,
            ..
        } => {
            assert_eq!(filename, "logo.png");
            assert_eq!(BASE64.decode(data_base64).unwrap(), png);
            assert_eq!(caption.as_deref(), Some("✅ Compressed file ready!"));
        }
        other => panic!("expected media reply, got {other:?}"),
    }

    // Group chats get nothing back.
    let status = post(
        app.clone(),
        serde_json::json!({ "sender_id": "555", "chat_id": "family", "is_group": true, "text": "help compress" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    webhook.stop().await.unwrap();
    runner.await.unwrap().unwrap();
    assert!(drain(app, "family").await.is_empty());
}
