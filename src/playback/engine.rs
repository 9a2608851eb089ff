use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::PlaybackError;

/// Interval between volume steps while fading out
const FADE_STEP: Duration = Duration::from_millis(50);

/// Audio output capability driven by the scheduler
///
/// Calls are fire-and-forget; the only feedback is [`AudioOutput::is_busy`].
pub trait AudioOutput {
    /// Replace whatever is loaded with `path`, paused
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError>;

    /// Queue `path` after the loaded file, repeating forever
    fn queue_loop(&mut self, path: &Path) -> Result<(), PlaybackError>;

    /// Start playing what is loaded
    fn play(&mut self);

    /// Ramp the volume down over `duration`, then stop
    fn fadeout(&mut self, duration: Duration);

    /// Whether anything is still playing (including a fade in progress)
    fn is_busy(&self) -> bool;

    /// Stop immediately and drop everything loaded
    fn unload(&mut self);
}

/// Number of volume steps and the interval between them for a fade
fn fade_schedule(duration: Duration) -> (u32, Duration) {
    let steps = (duration.as_millis() / FADE_STEP.as_millis()).max(1) as u32;
    (steps, duration / steps)
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>, PlaybackError> {
    let file = File::open(path).map_err(|e| PlaybackError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Playback engine managing audio output
pub struct PlaybackEngine {
    /// Keep the stream alive (dropping it stops audio)
    _stream: OutputStream,
    /// Handle for creating sinks
    _stream_handle: OutputStreamHandle,
    /// Audio sink for playback control, shared with the fade task
    sink: Arc<Sink>,
    /// Volume restored after every fade
    volume: f32,
    /// Running fade-out, if any
    fade: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    /// Create a new playback engine on the default device
    #[instrument]
    pub fn new(volume: f32) -> Result<Self, PlaybackError> {
        info!("Initializing audio output");

        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| PlaybackError::Device(format!("Failed to open audio device: {}", e)))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| PlaybackError::Device(format!("Failed to create audio sink: {}", e)))?;

        let volume = volume.clamp(0.0, 1.0);
        sink.set_volume(volume);

        debug!(volume, "Audio output initialized");

        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
            volume,
            fade: None,
        })
    }

    fn cancel_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            fade.abort();
        }
    }
}

impl AudioOutput for PlaybackEngine {
    #[instrument(skip(self))]
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let source = open(path)?;

        self.cancel_fade();
        // clear() also pauses the sink until play()
        self.sink.clear();
        self.sink.set_volume(self.volume);
        self.sink.append(source);

        debug!(queued = self.sink.len(), "Loaded");
        Ok(())
    }

    #[instrument(skip(self))]
    fn queue_loop(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let source = open(path)?.repeat_infinite();
        self.sink.append(source);

        debug!(queued = self.sink.len(), "Queued loop");
        Ok(())
    }

    fn play(&mut self) {
        self.sink.play();
        debug!(
            sink_empty = self.sink.empty(),
            sink_volume = self.sink.volume(),
            "Playback started"
        );
    }

    #[instrument(skip(self))]
    fn fadeout(&mut self, duration: Duration) {
        self.cancel_fade();

        let sink = Arc::clone(&self.sink);
        let (steps, step) = fade_schedule(duration);
        let start = sink.volume();

        self.fade = Some(tokio::spawn(async move {
            for i in 1..=steps {
                tokio::time::sleep(step).await;
                sink.set_volume(start * (1.0 - i as f32 / steps as f32));
            }
            sink.clear();
        }));
    }

    fn is_busy(&self) -> bool {
        !self.sink.empty()
    }

    #[instrument(skip(self))]
    fn unload(&mut self) {
        debug!("Unloading");
        self.cancel_fade();
        self.sink.clear();
        self.sink.set_volume(self.volume);
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        debug!("Dropping playback engine");
        self.unload();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    use parking_lot::Mutex;

    #[test]
    fn test_fade_schedule() {
        let (steps, step) = fade_schedule(Duration::from_secs(2));
        assert_eq!(steps, 40);
        assert_eq!(step, Duration::from_millis(50));

        let (steps, step) = fade_schedule(Duration::from_millis(10));
        assert_eq!(steps, 1);
        assert_eq!(step, Duration::from_millis(10));
    }

    /// Device calls seen by [`FakeOutput`]
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum DeviceCall {
        Load(PathBuf),
        QueueLoop(PathBuf),
        Play,
        Fadeout(Duration),
        Unload,
    }

    /// Shared view into a [`FakeOutput`] for assertions
    #[derive(Clone, Default)]
    pub(crate) struct DeviceLog {
        pub calls: Arc<Mutex<Vec<DeviceCall>>>,
        /// When set, a playing one-shot track ends immediately
        pub one_shot_ends: Arc<Mutex<bool>>,
    }

    impl DeviceLog {
        pub(crate) fn calls(&self) -> Vec<DeviceCall> {
            self.calls.lock().clone()
        }

        pub(crate) fn loads(&self) -> Vec<PathBuf> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    DeviceCall::Load(p) => Some(p),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn fades(&self) -> Vec<Duration> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    DeviceCall::Fadeout(d) => Some(d),
                    _ => None,
                })
                .collect()
        }
    }

    /// In-memory device: busy from `play` until unloaded
    pub(crate) struct FakeOutput {
        log: DeviceLog,
        playing: bool,
        looping: bool,
    }

    impl FakeOutput {
        pub(crate) fn new() -> (Self, DeviceLog) {
            let log = DeviceLog::default();
            (
                Self {
                    log: log.clone(),
                    playing: false,
                    looping: false,
                },
                log,
            )
        }
    }

    impl AudioOutput for FakeOutput {
        fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
            if !path.is_file() {
                return Err(PlaybackError::Load {
                    path: path.to_path_buf(),
                    reason: "missing".into(),
                });
            }
            self.log.calls.lock().push(DeviceCall::Load(path.to_path_buf()));
            self.playing = false;
            self.looping = false;
            Ok(())
        }

        fn queue_loop(&mut self, path: &Path) -> Result<(), PlaybackError> {
            self.log.calls.lock().push(DeviceCall::QueueLoop(path.to_path_buf()));
            self.looping = true;
            Ok(())
        }

        fn play(&mut self) {
            self.log.calls.lock().push(DeviceCall::Play);
            self.playing = true;
        }

        fn fadeout(&mut self, duration: Duration) {
            self.log.calls.lock().push(DeviceCall::Fadeout(duration));
        }

        fn is_busy(&self) -> bool {
            if !self.looping && *self.log.one_shot_ends.lock() {
                return false;
            }
            self.playing
        }

        fn unload(&mut self) {
            self.log.calls.lock().push(DeviceCall::Unload);
            self.playing = false;
            self.looping = false;
        }
    }
}
