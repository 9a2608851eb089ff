use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, error, instrument};

use crate::error::AudioError;

use super::buffer::{PcmBuffer, CHANNELS, SAMPLE_RATE};

/// Raw PCM format exchanged with ffmpeg, in host byte order
#[cfg(target_endian = "little")]
const PCM_FORMAT: &str = "f32le";
#[cfg(target_endian = "big")]
const PCM_FORMAT: &str = "f32be";

/// VBR quality target for lossy re-encodes
const QUALITY: &str = "3";

/// Decode a source file to PCM and encode PCM back to a file
pub trait AudioCodec: Send + Sync {
    fn decode(&self, path: &Path) -> impl Future<Output = Result<PcmBuffer, AudioError>> + Send;

    /// Encode `pcm` into `dest` using the container named by `format` (a file extension)
    fn encode(
        &self,
        pcm: &PcmBuffer,
        dest: &Path,
        format: &str,
    ) -> impl Future<Output = Result<(), AudioError>> + Send;
}

/// Muxer and encoder for a file extension
fn output_format(ext: &str) -> Result<(&'static str, &'static str), AudioError> {
    match ext.to_lowercase().as_str() {
        "ogg" => Ok(("ogg", "libvorbis")),
        "mp3" => Ok(("mp3", "libmp3lame")),
        "flac" => Ok(("flac", "flac")),
        "wav" => Ok(("wav", "pcm_s16le")),
        other => Err(AudioError::UnsupportedFormat(other.to_string())),
    }
}

/// Host-order f32 samples from raw bytes; a trailing partial sample is dropped
fn samples_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(&bytes[..bytes.len() - bytes.len() % 4])
}

/// Audio codec using an ffmpeg subprocess
#[derive(Debug, Default, Clone)]
pub struct FfmpegCodec;

impl FfmpegCodec {
    pub fn new() -> Self {
        Self
    }

    fn spawn(args: &[&str], stdin: Stdio) -> Result<Child, AudioError> {
        Command::new("ffmpeg")
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AudioError::FfmpegNotFound,
                _ => AudioError::FfmpegError(format!("Failed to spawn ffmpeg: {}", e)),
            })
    }
}

impl AudioCodec for FfmpegCodec {
    /// Decode a file to interleaved f32 PCM at the standard rate
    #[instrument(skip(self))]
    async fn decode(&self, path: &Path) -> Result<PcmBuffer, AudioError> {
        debug!("Decoding audio");

        let input = path.to_string_lossy();
        let child = Self::spawn(
            &[
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                &input,
                "-f",
                PCM_FORMAT,
                "-acodec",
                &format!("pcm_{}", PCM_FORMAT),
                "-ar",
                &SAMPLE_RATE.to_string(),
                "-ac",
                &CHANNELS.to_string(),
                "pipe:1",
            ],
            Stdio::null(),
        )?;

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr_str = String::from_utf8_lossy(&output.stderr);
            error!(stderr = %stderr_str, "ffmpeg failed");
            return Err(AudioError::FfmpegFailed(output.status));
        }

        if output.stdout.is_empty() {
            return Err(AudioError::DecodeError("ffmpeg produced no output".into()));
        }

        let samples = samples_from_bytes(&output.stdout);

        debug!(
            output_samples = samples.len(),
            duration_secs = samples.len() as f32 / (SAMPLE_RATE as f32 * CHANNELS as f32),
            "Decode complete"
        );

        Ok(PcmBuffer::new(samples, SAMPLE_RATE, CHANNELS))
    }

    /// Encode PCM to a file at a fixed quality
    #[instrument(skip(self, pcm), fields(duration_secs = pcm.duration_secs()))]
    async fn encode(&self, pcm: &PcmBuffer, dest: &Path, format: &str) -> Result<(), AudioError> {
        let (muxer, encoder) = output_format(format)?;
        debug!(muxer, encoder, "Encoding audio");

        let output = dest.to_string_lossy();
        let mut child = Self::spawn(
            &[
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                PCM_FORMAT,
                "-ar",
                &pcm.sample_rate.to_string(),
                "-ac",
                &pcm.channels.to_string(),
                "-i",
                "pipe:0",
                "-c:a",
                encoder,
                "-q:a",
                QUALITY,
                "-f",
                muxer,
                &output,
            ],
            Stdio::piped(),
        )?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AudioError::FfmpegError("Failed to get stdin".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AudioError::FfmpegError("Failed to get stderr".into()))?;

        // Write input concurrently with draining stderr to avoid deadlock
        let bytes: &[u8] = bytemuck::cast_slice(&pcm.samples);
        let write = async move {
            let result = stdin.write_all(bytes).await;
            drop(stdin); // Close stdin to signal EOF
            result
        };
        let mut stderr_output = Vec::new();
        let (write_result, stderr_result) = tokio::join!(write, stderr.read_to_end(&mut stderr_output));

        stderr_result.map_err(|e| AudioError::FfmpegError(format!("Failed to read stderr: {}", e)))?;

        let status = child.wait().await?;

        if !status.success() {
            let stderr_str = String::from_utf8_lossy(&stderr_output);
            error!(stderr = %stderr_str, "ffmpeg failed");
            return Err(AudioError::FfmpegFailed(status));
        }
        write_result?;

        Ok(())
    }
}
