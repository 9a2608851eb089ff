use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::error::{AudioError, LibraryError, Result};
use crate::library::{LoopWindow, Track};

use super::buffer::{PcmBuffer, NORMALIZE_PEAK};
use super::codec::AudioCodec;

/// Directory, next to the source, holding derived segments
pub const LOOPS_DIR: &str = "loops";

/// Intro and loop files derived from one source track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPair {
    /// Start of the track through the end of the loop window
    pub intro: PathBuf,
    /// The loop window alone
    pub looped: PathBuf,
}

impl SegmentPair {
    /// Where the segments of `source` live
    pub fn for_source(source: &Path) -> std::result::Result<Self, AudioError> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| AudioError::UnsupportedFormat(source.display().to_string()))?;
        let ext = extension(source)?;
        let dir = source
            .parent()
            .map(|p| p.join(LOOPS_DIR))
            .unwrap_or_else(|| PathBuf::from(LOOPS_DIR));

        Ok(Self {
            intro: dir.join(format!("{}-start.{}", stem, ext)),
            looped: dir.join(format!("{}-loop.{}", stem, ext)),
        })
    }

    fn exist(&self) -> bool {
        self.intro.is_file() && self.looped.is_file()
    }

    /// Delete both files, ignoring ones that are already gone
    fn remove(&self) -> std::io::Result<()> {
        for path in [&self.intro, &self.looped] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn extension(path: &Path) -> std::result::Result<String, AudioError> {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .ok_or_else(|| AudioError::UnsupportedFormat(path.display().to_string()))
}

/// Derives and caches intro/loop segments on disk
pub struct SegmentCache<C> {
    codec: C,
    normalize: bool,
    /// Per-source locks so one track is never cut twice at once
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: AudioCodec> SegmentCache<C> {
    pub fn new(codec: C, normalize: bool) -> Self {
        Self {
            codec,
            normalize,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, source: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(source.to_path_buf()).or_default())
    }

    /// Return the track's segments, cutting them first if missing or `force` is set
    #[instrument(skip(self, track), fields(track = %track.id))]
    pub async fn ensure_segments(
        &self,
        track: &Track,
        window: LoopWindow,
        force: bool,
    ) -> Result<SegmentPair> {
        if !track.path.is_file() {
            return Err(LibraryError::NotFound(format!(
                "song file not found at \"{}\"",
                track.path.display()
            ))
            .into());
        }

        let pair = SegmentPair::for_source(&track.path)?;

        let lock = self.lock_for(&track.path);
        let _guard = lock.lock().await;

        if !force && pair.exist() {
            debug!(intro = ?pair.intro, looped = ?pair.looped, "Reusing cached segments");
            return Ok(pair);
        }

        info!(source = ?track.path, force, "Cutting start and loop segments");

        let pcm = self.codec.decode(&track.path).await?;
        let source_secs = pcm.duration_secs();
        let frame_secs = 1.0 / pcm.sample_rate as f64;

        if !window.is_valid() || window.end_secs > source_secs + frame_secs / 2.0 {
            return Err(LibraryError::Precondition(format!(
                "loop window {}s..{}s does not fit {} ({:.3}s long)",
                window.start_secs,
                window.end_secs,
                track.filename(),
                source_secs
            ))
            .into());
        }

        info!(
            source_secs,
            loop_start = window.start_secs,
            loop_end = window.end_secs,
            loop_secs = window.loop_secs(),
            "Cutting loop"
        );

        let normalize = self.normalize;
        let (intro, looped) = tokio::task::spawn_blocking(move || cut(&pcm, window, normalize))
            .await
            .map_err(|e| AudioError::DecodeError(format!("cutting task failed: {}", e)))?;

        info!(
            intro_secs = intro.duration_secs(),
            loop_secs = looped.duration_secs(),
            "Segments cut"
        );

        if let Some(dir) = pair.intro.parent() {
            std::fs::create_dir_all(dir).map_err(AudioError::Io)?;
        }

        // A stale or half-written pair must never be reused
        pair.remove().map_err(AudioError::Io)?;

        let format = extension(&track.path)?;
        let intro_tmp = self.encode_temp(&intro, &pair.intro, &format).await?;
        let looped_tmp = self.encode_temp(&looped, &pair.looped, &format).await?;

        // Both encodes succeeded; commit them together
        intro_tmp
            .persist(&pair.intro)
            .map_err(|e| AudioError::Io(e.error))?;
        looped_tmp
            .persist(&pair.looped)
            .map_err(|e| AudioError::Io(e.error))?;
        debug!(intro = ?pair.intro, looped = ?pair.looped, "Wrote segments");

        Ok(pair)
    }

    /// Encode into a hidden temporary file next to `dest`, deleted on drop
    async fn encode_temp(&self, pcm: &PcmBuffer, dest: &Path, format: &str) -> Result<NamedTempFile> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(AudioError::Io)?;

        if let Err(e) = self.codec.encode(pcm, tmp.path(), format).await {
            warn!(dest = ?dest, error = %e, "Failed to encode segment");
            return Err(e.into());
        }
        Ok(tmp)
    }
}

/// Slice the intro `[0, end)` and loop `[start, end)`, normalising each on request
fn cut(pcm: &PcmBuffer, window: LoopWindow, normalize: bool) -> (PcmBuffer, PcmBuffer) {
    let mut intro = pcm.slice_secs(0.0, window.end_secs);
    let mut looped = pcm.slice_secs(window.start_secs, window.end_secs);
    if normalize {
        intro.normalize_peak(NORMALIZE_PEAK);
        looped.normalize_peak(NORMALIZE_PEAK);
    }
    (intro, looped)
}
