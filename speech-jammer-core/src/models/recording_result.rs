use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::StreamFormat;

/// Result returned when a recording session is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    /// Absolute path of the finished WAV file.
    pub file_path: PathBuf,
    /// PCM payload size in bytes (file size minus the 44-byte header).
    pub data_size: u64,
    pub duration_secs: f64,
    /// Lowercase hex SHA-256 of the whole WAV file.
    pub checksum: String,
}

/// Metadata written alongside a recording as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_size: u64,
    pub checksum: String,
}

impl RecordingMetadata {
    pub fn from_result(result: &RecordingResult, format: &StreamFormat) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: result.file_path.to_string_lossy().to_string(),
            duration_secs: result.duration_secs,
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample(),
            data_size: result.data_size,
            checksum: result.checksum.clone(),
        }
    }
}
