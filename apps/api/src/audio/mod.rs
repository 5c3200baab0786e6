//! Answer-audio pipeline: decode the transmitted payload, persist the
//! original encoding, then compress to a speech-tuned MP3.
//!
//! Compression is an optimization, not a correctness requirement: any codec
//! failure keeps the uncompressed original and the answer flow proceeds.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Invalid audio payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decodes a base64 audio payload, stripping the data-URL header if present.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, AudioError> {
    // Browsers send "data:audio/webm;base64,<payload>"; keep only the payload.
    let encoded = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };
    Ok(BASE64.decode(encoded.trim())?)
}

#[derive(Clone)]
pub struct AudioPipeline {
    upload_dir: PathBuf,
    ffmpeg: String,
}

impl AudioPipeline {
    pub fn new(upload_dir: PathBuf, ffmpeg: String) -> Self {
        Self { upload_dir, ffmpeg }
    }

    /// Persists decoded answer audio and returns the stored path, relative to
    /// the upload root. The original WebM is replaced by a compressed MP3 when
    /// the codec toolchain is available; otherwise the original is kept.
    pub async fn store(
        &self,
        audio: &[u8],
        application_id: Uuid,
        question_id: Uuid,
    ) -> Result<String, AudioError> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let stem = format!("app_{application_id}_q_{question_id}_{timestamp}");

        let dir = self.upload_dir.join("interviews");
        tokio::fs::create_dir_all(&dir).await?;

        let original = dir.join(format!("{stem}.webm"));
        let compressed = dir.join(format!("{stem}.mp3"));
        tokio::fs::write(&original, audio).await?;

        match self.compress(&original, &compressed).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(&original).await {
                    warn!("Failed to remove original audio {}: {e}", original.display());
                }
                debug!("Stored compressed answer audio {}", compressed.display());
                Ok(format!("interviews/{stem}.mp3"))
            }
            Err(e) => {
                warn!("Audio compression failed, keeping original: {e}");
                // Drop any partial compressor output.
                let _ = tokio::fs::remove_file(&compressed).await;
                Ok(format!("interviews/{stem}.webm"))
            }
        }
    }

    /// Transcodes to mono 22.05 kHz 64 kbps MP3: sufficient for speech and a
    /// large size reduction over browser-recorded WebM.
    async fn compress(&self, original: &Path, compressed: &Path) -> anyhow::Result<()> {
        let output = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(original)
            .args(["-ac", "1", "-ar", "22050", "-b:a", "64k"])
            .arg(compressed)
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let size = tokio::fs::metadata(compressed).await?.len();
        if size == 0 {
            anyhow::bail!("compressed file is empty");
        }
        Ok(())
    }
}
