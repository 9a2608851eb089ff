use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Animal Crossing game whose hourly music is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Game {
    AnimalCrossing,
    WildWorld,
    NewLeaf,
    NewHorizons,
}

impl Game {
    pub const ALL: [Game; 4] = [
        Game::AnimalCrossing,
        Game::WildWorld,
        Game::NewLeaf,
        Game::NewHorizons,
    ];

    /// Directory name and metadata key
    pub fn as_str(&self) -> &'static str {
        match self {
            Game::AnimalCrossing => "animal-crossing",
            Game::WildWorld => "wild-world",
            Game::NewLeaf => "new-leaf",
            Game::NewHorizons => "new-horizons",
        }
    }
}

/// Weather category used to pick hourly music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weather {
    Sunny,
    Raining,
    Snowing,
}

impl Weather {
    pub const ALL: [Weather; 3] = [Weather::Sunny, Weather::Raining, Weather::Snowing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Sunny => "sunny",
            Weather::Raining => "raining",
            Weather::Snowing => "snowing",
        }
    }
}

/// K.K. Slider play-type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Live performance, played once start to finish
    Live,
    Aircheck,
    MusicBox,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Live, Variant::Aircheck, Variant::MusicBox];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Live => "live",
            Variant::Aircheck => "aircheck",
            Variant::MusicBox => "musicbox",
        }
    }

    /// Whether tracks of this variant get intro/loop segments
    pub fn is_loopable(&self) -> bool {
        match self {
            Variant::Live => false,
            Variant::Aircheck | Variant::MusicBox => true,
        }
    }
}

macro_rules! closed_set_str {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_lowercase();
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str() == lower)
                    .ok_or_else(|| {
                        let choices: Vec<_> = $ty::ALL.iter().map(|v| v.as_str()).collect();
                        format!("unknown {} \"{}\" (expected one of: {})", $what, s, choices.join(", "))
                    })
            }
        }
    };
}

closed_set_str!(Game, "game");
closed_set_str!(Weather, "weather");
closed_set_str!(Variant, "variant");

/// Identity of a playable track
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackId {
    Hourly {
        hour: u8,
        game: Game,
        weather: Weather,
    },
    Catalogue {
        name: String,
        variant: Variant,
    },
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Hourly { hour, game, weather } => {
                write!(f, "{:02} ({}/{})", hour, game, weather)
            }
            TrackId::Catalogue { name, variant } => write!(f, "{} ({})", name, variant),
        }
    }
}

/// A resolved track with its source file on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub is_loopable: bool,
}

impl Track {
    pub fn new(id: TrackId, path: PathBuf) -> Self {
        let is_loopable = match &id {
            TrackId::Hourly { .. } => true,
            TrackId::Catalogue { variant, .. } => variant.is_loopable(),
        };
        Self {
            id,
            path,
            is_loopable,
        }
    }

    /// File name of the source, for display
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Loop region of a source track, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl LoopWindow {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// Loop duration in seconds
    pub fn loop_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Check that the window describes a non-empty region after zero
    pub fn is_valid(&self) -> bool {
        self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.start_secs < self.end_secs
    }
}
