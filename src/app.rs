use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

use crate::cli::{Args, Command};
use crate::error::JukeboxError;
use crate::library::{Game, TrackId, Variant, Weather};

/// Environment variable naming the music root
pub const MUSIC_DIR_ENV: &str = "KKJUKEBOX_MUSIC_DIR";

/// Location value meaning "geolocate this machine"
pub const LOCAL_LOCATION: &str = "local";

/// Loop length used by setlist rotation when none is given
pub const DEFAULT_LOOP_SECS: u64 = 60;

/// Which hour's music to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourSetting {
    /// Follow the wall clock
    Now,
    Random,
    Fixed(u8),
}

/// Which game's music to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameSetting {
    Random,
    Fixed(Game),
}

/// Where the weather comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherSetting {
    /// Live weather at the configured location
    Location,
    Random,
    Fixed(Weather),
}

/// `--loop-length` value as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopLengthArg {
    Secs(u64),
    Random,
}

/// How long a looping song plays before moving on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopLength {
    Fixed(Duration),
    /// Drawn uniformly from `[lower, upper]` each time a song loads
    Random { lower: Duration, upper: Duration },
}

impl LoopLength {
    pub fn from_arg(arg: LoopLengthArg, lower_secs: u64, upper_secs: u64) -> Result<Self, JukeboxError> {
        match arg {
            LoopLengthArg::Secs(0) => Err(JukeboxError::Config(
                "loop length must be greater than zero".into(),
            )),
            LoopLengthArg::Secs(secs) => Ok(LoopLength::Fixed(Duration::from_secs(secs))),
            LoopLengthArg::Random if lower_secs > upper_secs => Err(JukeboxError::Config(format!(
                "loop length lower bound ({}s) is above the upper bound ({}s)",
                lower_secs, upper_secs
            ))),
            LoopLengthArg::Random => Ok(LoopLength::Random {
                lower: Duration::from_secs(lower_secs),
                upper: Duration::from_secs(upper_secs),
            }),
        }
    }

    /// Target play time for one song
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            LoopLength::Fixed(d) => d,
            LoopLength::Random { lower, upper } => {
                Duration::from_secs_f64(rng.gen_range(lower.as_secs_f64()..=upper.as_secs_f64()))
            }
        }
    }
}

/// Hourly music options
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySettings {
    pub hour: HourSetting,
    pub game: GameSetting,
    pub weather: WeatherSetting,
    pub location: String,
}

/// K.K. Slider options
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueSettings {
    pub variants: Vec<Variant>,
    pub song: Option<String>,
    /// `None` when no loop length was requested
    pub loop_length: Option<LoopLength>,
    /// Used by setlist rotation when `loop_length` is `None`
    pub default_loop_length: LoopLength,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Hourly(HourlySettings),
    Catalogue(CatalogueSettings),
}

/// Validated configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub music_root: PathBuf,
    pub timings_dir: PathBuf,
    pub force_cut: bool,
    pub normalize: bool,
    pub volume: f32,
    pub seed: Option<u64>,
    pub mode: Mode,
}

impl Settings {
    pub fn from_args(args: &Args) -> Result<Self, JukeboxError> {
        let music_root = args
            .music_dir
            .clone()
            .ok_or_else(|| JukeboxError::Config(format!("{} must be set", MUSIC_DIR_ENV)))?;
        if !music_root.is_dir() {
            return Err(JukeboxError::Config(format!(
                "music directory \"{}\" not found",
                music_root.display()
            )));
        }

        let timings_dir = args
            .timings_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("kkjukebox")))
            .unwrap_or_else(|| music_root.clone());

        if !(0.0..=1.0).contains(&args.volume) {
            return Err(JukeboxError::Config(format!(
                "volume must be between 0.0 and 1.0, got {}",
                args.volume
            )));
        }

        let mode = match &args.command {
            Command::Hourly {
                game,
                hour,
                weather,
                location,
            } => Mode::Hourly(HourlySettings {
                hour: *hour,
                game: *game,
                weather: *weather,
                location: location.clone(),
            }),
            Command::Kk {
                loop_length,
                ll_lower,
                ll_upper,
                variants,
                song_name,
            } => {
                let loop_length = loop_length
                    .map(|arg| LoopLength::from_arg(arg, *ll_lower, *ll_upper))
                    .transpose()?;
                Mode::Catalogue(CatalogueSettings {
                    variants: variants.0.clone(),
                    song: song_name.clone(),
                    loop_length,
                    default_loop_length: LoopLength::Fixed(Duration::from_secs(DEFAULT_LOOP_SECS)),
                })
            }
        };

        Ok(Self {
            music_root,
            timings_dir,
            force_cut: args.force_cut,
            normalize: args.normalize,
            volume: args.volume,
            seed: args.seed,
            mode,
        })
    }
}

/// Current scheduler state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    /// Nothing scheduled yet
    #[default]
    Idle,
    /// Resolving the next track and preparing its segments
    Loading,
    /// A track is playing
    Playing { track: TrackId },
    /// Current track is fading out
    Fading,
    /// Scheduler has exited
    Stopped,
}

impl PlaybackState {
    /// Get status string for display
    pub fn status_text(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Loading => "LOADING",
            PlaybackState::Playing { .. } => "PLAYING",
            PlaybackState::Fading => "FADING",
            PlaybackState::Stopped => "STOPPED",
        }
    }
}
