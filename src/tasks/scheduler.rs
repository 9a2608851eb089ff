use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::app::PlaybackState;
use crate::audio::{AudioCodec, SegmentCache};
use crate::error::Result;
use crate::library::{MusicLibrary, Track};
use crate::playback::AudioOutput;
use crate::weather::WeatherProvider;

use super::clock::{until_next_hour, Clock, SystemClock};
use super::rotation::{Request, RotationPolicy, WeatherRequest};

/// Scheduler timing configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between transition checks
    pub tick: Duration,
    /// Start fading when the next hour is closer than this
    pub boundary_threshold: Duration,
    pub boundary_fade: Duration,
    /// Fade between songs when a loop target expires
    pub transition_fade: Duration,
    /// Fade on shutdown
    pub stop_fade: Duration,
    /// Re-cut each looping track's segments the first time it loads
    pub force_cut: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            boundary_threshold: Duration::from_secs(10),
            boundary_fade: Duration::from_secs(10),
            transition_fade: Duration::from_secs(3),
            stop_fade: Duration::from_secs(2),
            force_cut: false,
        }
    }
}

/// What is playing right now
struct Session {
    track: Track,
    started: Instant,
    /// Play time before moving on, for looping tracks
    target: Option<Duration>,
}

/// Outcome of one tick
#[derive(Debug, PartialEq)]
enum Transition {
    Stay,
    Fade(Duration),
    /// The one-shot track finished; load the next one without fading
    Next,
    /// The one-shot track finished and nothing follows it
    End,
    Stop,
}

/// Drives the audio device from a rotation policy until cancelled
pub struct Scheduler<D, C, W> {
    config: SchedulerConfig,
    library: Arc<MusicLibrary>,
    segments: Arc<SegmentCache<C>>,
    device: D,
    weather: W,
    clock: Arc<dyn Clock>,
    policy: RotationPolicy,
    rng: StdRng,
    state: watch::Sender<PlaybackState>,
    session: Option<Session>,
    /// Hour to load at the clock boundary being faded through
    pending_hour: Option<u8>,
    /// Sources already re-cut this run under `force_cut`
    recut: HashSet<PathBuf>,
    cancel: CancellationToken,
}

impl<D, C, W> Scheduler<D, C, W>
where
    D: AudioOutput,
    C: AudioCodec,
    W: WeatherProvider,
{
    pub fn new(
        config: SchedulerConfig,
        library: Arc<MusicLibrary>,
        segments: Arc<SegmentCache<C>>,
        device: D,
        weather: W,
        policy: RotationPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            config,
            library,
            segments,
            device,
            weather,
            clock: Arc::new(SystemClock),
            policy,
            rng: StdRng::from_entropy(),
            state,
            session: None,
            pending_hour: None,
            recut: HashSet::new(),
            cancel,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: PlaybackState) {
        debug!(state = state.status_text(), "State change");
        self.state.send_replace(state);
    }

    /// Run until cancelled, a single song ends, or loading fails
    #[instrument(skip(self), name = "scheduler", fields(policy = self.policy.name()))]
    pub async fn run(mut self) -> Result<()> {
        info!("Scheduler starting");

        let result = self.drive().await;
        if let Err(e) = &result {
            error!(error = %e, "Playback aborted");
            self.device.unload();
            self.session = None;
        }

        self.set_state(PlaybackState::Stopped);
        info!("Scheduler stopped");
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();

        loop {
            self.set_state(PlaybackState::Loading);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Cancelled while loading");
                    self.device.unload();
                    return Ok(());
                }
                loaded = self.load_next() => loaded?,
            }

            let mut ticker = interval_at(Instant::now() + self.config.tick, self.config.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let transition = loop {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = ticker.tick() => {}
                }
                match self.evaluate() {
                    Transition::Stay => continue,
                    other => break other,
                }
            };

            match transition {
                Transition::Stop => {
                    self.stop().await;
                    return Ok(());
                }
                Transition::Fade(duration) => {
                    self.fade(duration).await;
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                }
                Transition::Next => {
                    debug!("Track finished");
                    self.session = None;
                }
                Transition::End => {
                    info!("Song finished");
                    self.device.unload();
                    self.session = None;
                    return Ok(());
                }
                Transition::Stay => {}
            }
        }
    }

    /// Decide what happens on this tick, in priority order
    fn evaluate(&mut self) -> Transition {
        if self.cancel.is_cancelled() {
            return Transition::Stop;
        }
        let Some(session) = &self.session else {
            return Transition::Next;
        };

        if self.policy.follows_clock() {
            let (remaining, next_hour) = until_next_hour(self.clock.now());
            if remaining < self.config.boundary_threshold {
                info!(next_hour, remaining_secs = remaining.as_secs_f64(), "Hour boundary");
                self.pending_hour = Some(next_hour);
                return Transition::Fade(self.config.boundary_fade);
            }
        }

        if session.track.is_loopable {
            if let Some(target) = session.target {
                if session.started.elapsed() >= target {
                    debug!(target_secs = target.as_secs(), "Loop target reached");
                    return Transition::Fade(self.config.transition_fade);
                }
            }
        } else if !self.device.is_busy() {
            return if self.policy.stops_after_one_shot() {
                Transition::End
            } else {
                Transition::Next
            };
        }

        Transition::Stay
    }

    /// Fade the current track out and unload it
    async fn fade(&mut self, duration: Duration) {
        self.set_state(PlaybackState::Fading);
        self.device.fadeout(duration);

        let cancel = self.cancel.clone();
        tokio::select! {
            _ = sleep(duration) => {}
            _ = cancel.cancelled() => {
                debug!("Cancelled while fading");
                self.device.fadeout(self.config.stop_fade);
                sleep(self.config.stop_fade).await;
            }
        }

        self.device.unload();
        self.session = None;
    }

    /// Fade out whatever is playing and unload the device
    pub async fn stop(&mut self) {
        if self.session.is_some() && self.device.is_busy() {
            info!(fade_secs = self.config.stop_fade.as_secs_f64(), "Fading out");
            self.set_state(PlaybackState::Fading);
            self.device.fadeout(self.config.stop_fade);
            sleep(self.config.stop_fade).await;
        }
        self.device.unload();
        self.session = None;
    }

    /// Resolve the next track, prepare it and start playing
    #[instrument(skip(self))]
    async fn load_next(&mut self) -> Result<()> {
        let request = self
            .policy
            .next_request(self.clock.now(), self.pending_hour.take(), &mut self.rng);

        let track = match request {
            Request::Hourly { hour, game, weather } => {
                let weather = match weather {
                    WeatherRequest::Known(weather) => weather,
                    WeatherRequest::Live(location) => self.weather.current(&location).await,
                };
                self.library.hourly(hour, game, weather)?
            }
            Request::Catalogue(track) => track,
        };
        let target = self.policy.loop_target(&mut self.rng);

        info!(
            track = %track.id,
            file = %track.filename(),
            loopable = track.is_loopable,
            target_secs = target.map(|t| t.as_secs_f64()),
            "Loading"
        );

        if track.is_loopable {
            let window = self.library.loop_window(&track)?;
            let force = self.config.force_cut && self.recut.insert(track.path.clone());
            let pair = self.segments.ensure_segments(&track, window, force).await?;
            self.device.load(&pair.intro)?;
            self.device.queue_loop(&pair.looped)?;
        } else {
            self.device.load(&track.path)?;
        }
        self.device.play();

        info!(track = %track.id, "Now playing");
        self.set_state(PlaybackState::Playing {
            track: track.id.clone(),
        });
        self.session = Some(Session {
            track,
            started: Instant::now(),
            target,
        });
        Ok(())
    }
}
