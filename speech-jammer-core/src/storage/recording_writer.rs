use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::StreamFormat;
use crate::models::error::JammerError;
use crate::models::recording_result::RecordingResult;
use crate::processing::wav_format::{self, WAV_HEADER_SIZE};

/// Suffix appended to the target path to name the raw PCM spool file.
pub const TEMP_SUFFIX: &str = ".pcm.part";

/// Two-file WAV recorder with memory use independent of recording length.
///
/// While recording, raw 16-bit little-endian PCM is appended to a spool
/// file next to the target. `finish` writes the 44-byte header followed by
/// the spool contents copied in `copy_chunk_size` pieces, then deletes the
/// spool.
///
/// ```text
/// append ─▶ [target.pcm.part]  ──finish──▶  [target: header | payload]
/// ```
pub struct RecordingWriter {
    target_path: PathBuf,
    temp_path: PathBuf,
    temp_file: Option<BufWriter<File>>,
    temp_present: bool,
    bytes_written: u64,
    format: StreamFormat,
    copy_chunk_size: usize,
}

impl RecordingWriter {
    /// Create the spool file for a recording that will end up at `target_path`.
    ///
    /// Missing parent directories are created. Fails with `Io` when the
    /// target names no file (empty, ends in a separator, or is a directory).
    pub fn start(target_path: impl Into<PathBuf>, copy_chunk_size: usize) -> Result<Self, JammerError> {
        let target_path = target_path.into();
        if !names_a_file(&target_path) {
            return Err(JammerError::Io(format!(
                "recording path does not name a file: {:?}",
                target_path
            )));
        }
        let temp_path = temp_path_for(&target_path);

        if let Some(parent) = target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| JammerError::Io(format!("failed to create directory: {}", e)))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| JammerError::Io(format!("failed to create temp file: {}", e)))?;

        log::debug!("Recording spool opened at {}", temp_path.display());

        Ok(Self {
            target_path,
            temp_path,
            temp_file: Some(BufWriter::new(file)),
            temp_present: true,
            bytes_written: 0,
            format: StreamFormat::JAMMER,
            copy_chunk_size: copy_chunk_size.max(2),
        })
    }

    /// Append raw little-endian PCM bytes verbatim.
    pub fn append(&mut self, pcm: &[u8]) -> Result<(), JammerError> {
        let file = self
            .temp_file
            .as_mut()
            .ok_or_else(|| JammerError::Io("temp file is not open".into()))?;
        file.write_all(pcm)
            .map_err(|e| JammerError::Io(format!("write failed: {}", e)))?;
        self.bytes_written += pcm.len() as u64;
        Ok(())
    }

    /// Close the spool and produce the final WAV file.
    ///
    /// Returns `NoActiveRecording` if the spool file no longer exists. On any
    /// other failure the spool and the partial output are removed.
    pub fn finish(mut self) -> Result<RecordingResult, JammerError> {
        if let Some(mut file) = self.temp_file.take() {
            file.flush()
                .map_err(|e| JammerError::Io(format!("failed to flush temp file: {}", e)))?;
        }

        let data_size = match fs::metadata(&self.temp_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.temp_present = false;
                return Err(JammerError::NoActiveRecording);
            }
            Err(e) => return Err(JammerError::Io(format!("failed to stat temp file: {}", e))),
        };

        let checksum = match self.write_wav(data_size) {
            Ok(checksum) => checksum,
            Err(e) => {
                let _ = fs::remove_file(&self.target_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::remove_file(&self.temp_path) {
            log::warn!("Failed to remove temp file {}: {}", self.temp_path.display(), e);
        }
        self.temp_present = false;

        let file_path = fs::canonicalize(&self.target_path)
            .map_err(|e| JammerError::Io(format!("failed to resolve output path: {}", e)))?;

        log::info!("Recording saved: {} ({} bytes of PCM)", file_path.display(), data_size);

        Ok(RecordingResult {
            file_path,
            data_size,
            duration_secs: data_size as f64 / self.format.byte_rate() as f64,
            checksum,
        })
    }

    /// Discard the recording: close and delete the spool. Safe to call repeatedly.
    pub fn abort(&mut self) {
        self.temp_file = None;
        if self.temp_present {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                if e.kind() != ErrorKind::NotFound {
                    log::warn!("Failed to remove temp file {}: {}", self.temp_path.display(), e);
                }
            }
            self.temp_present = false;
        }
    }

    /// PCM bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Stream header + spool into the target, hashing as it goes.
    fn write_wav(&self, data_size: u64) -> Result<String, JammerError> {
        let data_size_u32 = u32::try_from(data_size)
            .ok()
            .filter(|size| size.checked_add(36).is_some())
            .ok_or_else(|| JammerError::Io(format!("recording too large for WAV: {} bytes", data_size)))?;

        let mut source = File::open(&self.temp_path)
            .map_err(|e| JammerError::Io(format!("failed to open temp file: {}", e)))?;
        let mut output = File::create(&self.target_path)
            .map_err(|e| JammerError::Io(format!("failed to create file: {}", e)))?;
        let mut hasher = Sha256::new();

        let header = wav_format::generate_wav_header(&self.format, data_size_u32);
        output
            .write_all(&header)
            .map_err(|e| JammerError::Io(format!("write failed: {}", e)))?;
        hasher.update(header);

        let mut chunk = vec![0u8; self.copy_chunk_size];
        let mut copied = 0u64;
        while copied < data_size {
            let want = (data_size - copied).min(chunk.len() as u64) as usize;
            let n = match source.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(JammerError::Io(format!("read failed: {}", e))),
            };
            output
                .write_all(&chunk[..n])
                .map_err(|e| JammerError::Io(format!("write failed: {}", e)))?;
            hasher.update(&chunk[..n]);
            copied += n as u64;
        }

        if copied != data_size {
            return Err(JammerError::Io(format!(
                "temp file truncated: expected {} bytes, copied {}",
                data_size, copied
            )));
        }

        output
            .flush()
            .map_err(|e| JammerError::Io(format!("failed to flush file: {}", e)))?;

        log::debug!(
            "Wrote {} header + {} payload bytes to {}",
            WAV_HEADER_SIZE,
            copied,
            self.target_path.display()
        );

        Ok(hex_encode(&hasher.finalize()))
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        self.abort();
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn names_a_file(path: &Path) -> bool {
    let ends_in_separator = path
        .as_os_str()
        .to_string_lossy()
        .ends_with(std::path::is_separator);
    path.file_name().is_some() && !ends_in_separator && !path.is_dir()
}
