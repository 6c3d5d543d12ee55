//! `tightfit compress`: One file in, one file out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tightfit_config::AppConfig;
use tightfit_core::artifact::guess_mime_type;
use tightfit_core::{CancelHandle, CompressionRequest};
use tightfit_encoders::CodecRouter;
use tightfit_engine::Compressor;
use tracing::warn;

pub async fn run(
    input: PathBuf,
    output: Option<PathBuf>,
    mime: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let bytes = tokio::fs::read(&input)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".into());
    let mime_type = match mime {
        Some(m) => m,
        None => guess_mime_type(&filename)
            .ok_or_else(|| format!("Cannot guess the media type of {filename}; pass --mime"))?
            .to_string(),
    };

    let encoder = Arc::new(CodecRouter::from_config(&config));
    let compressor = Compressor::from_config(&config, encoder)?;
    let policy = *compressor.policy();

    let (handle, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling compression");
            handle.cancel();
        }
    });

    let request = CompressionRequest::new(bytes, mime_type, filename);
    let input_size = request.size_bytes();
    let artifact = compressor.compress_with_cancel(&request, &token).await?;

    let out_path = output.unwrap_or_else(|| sibling(&input, artifact.suggested_filename()));
    tokio::fs::write(&out_path, artifact.bytes())
        .await
        .map_err(|e| format!("Cannot write {}: {e}", out_path.display()))?;

    println!(
        "{} → {} ({} → {} bytes, {:?}, limit {})",
        input.display(),
        out_path.display(),
        input_size,
        artifact.size_bytes(),
        policy.classify(artifact.size_bytes()),
        policy.hard_max()
    );

    Ok(())
}

fn sibling(input: &Path, filename: &str) -> PathBuf {
    input
        .parent()
        .map(|dir| dir.join(filename))
        .unwrap_or_else(|| PathBuf::from(filename))
}
