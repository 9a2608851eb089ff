use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::app::{CatalogueSettings, GameSetting, HourSetting, HourlySettings, LoopLength, WeatherSetting};
use crate::error::{JukeboxError, LibraryError, Result};
use crate::library::{Game, MusicLibrary, Track, Weather};

/// Draws every item once per round in random order
///
/// The first draw of a new round never repeats the last draw of the previous one.
#[derive(Debug, Clone)]
pub struct ShuffleBag<T> {
    items: Vec<T>,
    /// Indices still to draw this round, drawn from the back
    order: Vec<usize>,
    last: Option<usize>,
}

impl<T> ShuffleBag<T> {
    /// `None` if there is nothing to shuffle
    pub fn new(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            items,
            order: Vec::new(),
            last: None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &T {
        if self.order.is_empty() {
            self.order = (0..self.items.len()).collect();
            self.order.shuffle(rng);
            let n = self.order.len();
            if n > 1 && self.order.last().copied() == self.last {
                self.order.swap(0, n - 1);
            }
            debug!(size = n, "Reshuffled");
        }

        // order was refilled above and items is never empty
        let index = self.order.pop().unwrap_or(0);
        self.last = Some(index);
        &self.items[index]
    }
}

fn shuffled<T>(items: Vec<T>) -> Result<ShuffleBag<T>> {
    ShuffleBag::new(items).ok_or_else(|| JukeboxError::Config("nothing to shuffle".into()))
}

/// How the hour is chosen for each load
#[derive(Debug, Clone)]
pub enum HourPick {
    /// The wall-clock hour, or the upcoming one after a clock boundary
    Clock,
    Fixed(u8),
    Shuffled(ShuffleBag<u8>),
}

/// A fixed value or a shuffled draw over a closed set
#[derive(Debug, Clone)]
pub enum Pick<T> {
    Fixed(T),
    Shuffled(ShuffleBag<T>),
}

impl<T: Copy> Pick<T> {
    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> T {
        match self {
            Pick::Fixed(value) => *value,
            Pick::Shuffled(bag) => *bag.draw(rng),
        }
    }
}

/// How the weather is chosen for each load
#[derive(Debug, Clone)]
pub enum WeatherPick {
    Fixed(Weather),
    Shuffled(ShuffleBag<Weather>),
    /// Asked of the weather provider on every load
    Live { location: String },
}

/// Weather for a request, possibly still to be looked up
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherRequest {
    Known(Weather),
    Live(String),
}

/// What to load next
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Hourly {
        hour: u8,
        game: Game,
        weather: WeatherRequest,
    },
    Catalogue(Track),
}

/// Strategy for choosing what plays next, fixed for a whole run
#[derive(Debug, Clone)]
pub enum RotationPolicy {
    /// Hourly music, re-drawn at every top of the hour
    HourlyClock {
        hour: HourPick,
        game: Pick<Game>,
        weather: WeatherPick,
    },
    /// One song; replayed from its intro every `loop_length` if set, looped forever if not
    Fixed {
        track: Track,
        loop_length: Option<LoopLength>,
    },
    /// Every song of the requested variants in shuffled rounds
    RandomNoImmediateRepeat {
        setlist: ShuffleBag<Track>,
        loop_length: LoopLength,
    },
}

impl RotationPolicy {
    /// Hourly policy; `location` is required when the weather is live
    pub fn hourly(settings: &HourlySettings, location: Option<String>) -> Result<Self> {
        let hour = match settings.hour {
            HourSetting::Now => HourPick::Clock,
            HourSetting::Fixed(hour) => HourPick::Fixed(hour),
            HourSetting::Random => HourPick::Shuffled(shuffled((0..24).collect())?),
        };
        let game = match settings.game {
            GameSetting::Fixed(game) => Pick::Fixed(game),
            GameSetting::Random => Pick::Shuffled(shuffled(Game::ALL.to_vec())?),
        };
        let weather = match settings.weather {
            WeatherSetting::Fixed(weather) => WeatherPick::Fixed(weather),
            WeatherSetting::Random => WeatherPick::Shuffled(shuffled(Weather::ALL.to_vec())?),
            WeatherSetting::Location => WeatherPick::Live {
                location: location.ok_or_else(|| {
                    JukeboxError::Config("could not determine location for real-time weather".into())
                })?,
            },
        };

        Ok(RotationPolicy::HourlyClock { hour, game, weather })
    }

    /// K.K. policy: one named song, or a setlist of every song in the variants
    #[instrument(skip(settings, library, rng), fields(song = ?settings.song))]
    pub fn catalogue<R: Rng + ?Sized>(
        settings: &CatalogueSettings,
        library: &MusicLibrary,
        rng: &mut R,
    ) -> Result<Self> {
        if let Some(name) = &settings.song {
            for variant in &settings.variants {
                if let Some(track) = library.catalogue(Some(name.as_str()), *variant, rng)? {
                    info!(track = %track.id, "Matched song");
                    return Ok(RotationPolicy::Fixed {
                        track,
                        loop_length: settings.loop_length,
                    });
                }
            }
            return Err(JukeboxError::SongNotFound(name.clone()));
        }

        let tracks: Vec<Track> = library
            .setlist(&settings.variants)?
            .into_iter()
            .map(|entry| entry.into_track())
            .collect();
        let setlist = ShuffleBag::new(tracks)
            .ok_or_else(|| LibraryError::NotFound("setlist is empty".into()))?;
        info!(songs = setlist.len(), "Built setlist");

        Ok(RotationPolicy::RandomNoImmediateRepeat {
            setlist,
            loop_length: settings.loop_length.unwrap_or(settings.default_loop_length),
        })
    }

    /// Draw the next request
    ///
    /// `pending_hour` is the hour a clock boundary is moving to, if any.
    pub fn next_request<R: Rng + ?Sized>(
        &mut self,
        now: NaiveDateTime,
        pending_hour: Option<u8>,
        rng: &mut R,
    ) -> Request {
        match self {
            RotationPolicy::HourlyClock { hour, game, weather } => {
                let hour = match hour {
                    HourPick::Clock => pending_hour.unwrap_or(now.hour() as u8),
                    HourPick::Fixed(h) => *h,
                    HourPick::Shuffled(bag) => *bag.draw(rng),
                };
                let weather = match weather {
                    WeatherPick::Fixed(w) => WeatherRequest::Known(*w),
                    WeatherPick::Shuffled(bag) => WeatherRequest::Known(*bag.draw(rng)),
                    WeatherPick::Live { location } => WeatherRequest::Live(location.clone()),
                };
                Request::Hourly {
                    hour,
                    game: game.next(rng),
                    weather,
                }
            }
            RotationPolicy::Fixed { track, .. } => Request::Catalogue(track.clone()),
            RotationPolicy::RandomNoImmediateRepeat { setlist, .. } => {
                Request::Catalogue(setlist.draw(rng).clone())
            }
        }
    }

    /// Play time for a freshly loaded looping track; `None` plays until something else ends it
    pub fn loop_target<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Duration> {
        match self {
            RotationPolicy::HourlyClock { .. } => None,
            RotationPolicy::Fixed { loop_length, .. } => loop_length.map(|l| l.draw(rng)),
            RotationPolicy::RandomNoImmediateRepeat { loop_length, .. } => Some(loop_length.draw(rng)),
        }
    }

    /// Whether the top of the hour triggers a transition
    pub fn follows_clock(&self) -> bool {
        matches!(self, RotationPolicy::HourlyClock { .. })
    }

    /// Whether a one-shot track finishing ends the session
    pub fn stops_after_one_shot(&self) -> bool {
        matches!(self, RotationPolicy::Fixed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            RotationPolicy::HourlyClock { .. } => "hourly",
            RotationPolicy::Fixed { .. } => "single",
            RotationPolicy::RandomNoImmediateRepeat { .. } => "setlist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{LoopTimings, Variant};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::fs;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn library(songs: &[(&str, &str)]) -> (tempfile::TempDir, MusicLibrary) {
        let root = tempfile::tempdir().unwrap();
        for (variant, name) in songs {
            let dir = root.path().join("kk").join(variant);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), b"mp3").unwrap();
        }
        let library = MusicLibrary::new(root.path().to_path_buf(), LoopTimings::default());
        (root, library)
    }

    fn kk_settings(variants: &[Variant], song: Option<&str>) -> CatalogueSettings {
        CatalogueSettings {
            variants: variants.to_vec(),
            song: song.map(String::from),
            loop_length: None,
            default_loop_length: LoopLength::Fixed(Duration::from_secs(60)),
        }
    }

    #[test]
    fn test_shuffle_bag_draws_each_once_per_round() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut bag = ShuffleBag::new((0..7).collect::<Vec<u32>>()).unwrap();

        for _ in 0..20 {
            let round: HashSet<u32> = (0..7).map(|_| *bag.draw(&mut rng)).collect();
            assert_eq!(round.len(), 7);
        }
    }

    #[test]
    fn test_shuffle_bag_never_repeats_across_rounds() {
        for n in 2..6 {
            let mut rng = StdRng::seed_from_u64(n as u64);
            let mut bag = ShuffleBag::new((0..n).collect::<Vec<usize>>()).unwrap();
            let mut last = *bag.draw(&mut rng);
            for _ in 0..500 {
                let next = *bag.draw(&mut rng);
                assert_ne!(next, last, "immediate repeat with {} items", n);
                last = next;
            }
        }
    }

    #[test]
    fn test_shuffle_bag_edge_sizes() {
        assert!(ShuffleBag::<u8>::new(Vec::new()).is_none());

        let mut rng = StdRng::seed_from_u64(0);
        let mut bag = ShuffleBag::new(vec!["only"]).unwrap();
        for _ in 0..3 {
            assert_eq!(*bag.draw(&mut rng), "only");
        }
    }

    #[test]
    fn test_clock_hour_follows_pending_boundary() {
        let settings = HourlySettings {
            hour: HourSetting::Now,
            game: GameSetting::Fixed(Game::WildWorld),
            weather: WeatherSetting::Fixed(Weather::Raining),
            location: "local".into(),
        };
        let mut policy = RotationPolicy::hourly(&settings, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let expected = |hour| Request::Hourly {
            hour,
            game: Game::WildWorld,
            weather: WeatherRequest::Known(Weather::Raining),
        };
        assert_eq!(policy.next_request(at(9, 15), None, &mut rng), expected(9));
        assert_eq!(policy.next_request(at(9, 59), Some(10), &mut rng), expected(10));
        assert!(policy.follows_clock());
        assert_eq!(policy.loop_target(&mut rng), None);
    }

    #[test]
    fn test_random_hourly_identity() {
        let settings = HourlySettings {
            hour: HourSetting::Random,
            game: GameSetting::Random,
            weather: WeatherSetting::Random,
            location: "local".into(),
        };
        let mut policy = RotationPolicy::hourly(&settings, None).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let hours: HashSet<u8> = (0..24)
            .map(|_| match policy.next_request(at(3, 0), None, &mut rng) {
                Request::Hourly { hour, .. } => hour,
                other => panic!("unexpected request {:?}", other),
            })
            .collect();
        assert_eq!(hours.len(), 24);
    }

    #[test]
    fn test_live_weather_needs_location() {
        let settings = HourlySettings {
            hour: HourSetting::Fixed(8),
            game: GameSetting::Fixed(Game::NewLeaf),
            weather: WeatherSetting::Location,
            location: "local".into(),
        };
        assert!(matches!(
            RotationPolicy::hourly(&settings, None),
            Err(JukeboxError::Config(_))
        ));

        let mut policy = RotationPolicy::hourly(&settings, Some("Oslo".into())).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            policy.next_request(at(1, 0), None, &mut rng),
            Request::Hourly {
                hour: 8,
                game: Game::NewLeaf,
                weather: WeatherRequest::Live("Oslo".into()),
            }
        );
    }

    #[test]
    fn test_named_song_first_variant_wins() {
        let (_root, library) = library(&[
            ("aircheck", "K.K. Bossa.mp3"),
            ("musicbox", "K.K. Bossa.mp3"),
        ]);
        let mut rng = StdRng::seed_from_u64(0);

        let policy = RotationPolicy::catalogue(
            &kk_settings(&[Variant::MusicBox, Variant::Aircheck], Some("bossa")),
            &library,
            &mut rng,
        )
        .unwrap();

        match &policy {
            RotationPolicy::Fixed { track, loop_length } => {
                assert!(track.path.ends_with("kk/musicbox/K.K. Bossa.mp3"));
                assert!(loop_length.is_none());
            }
            other => panic!("expected fixed policy, got {:?}", other),
        }
        assert!(policy.stops_after_one_shot());
        assert_eq!(policy.loop_target(&mut rng), None);
    }

    #[test]
    fn test_unknown_song() {
        let (_root, library) = library(&[("aircheck", "K.K. Bossa.mp3")]);
        let mut rng = StdRng::seed_from_u64(0);

        let err = RotationPolicy::catalogue(
            &kk_settings(&[Variant::Aircheck], Some("stroll")),
            &library,
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, JukeboxError::SongNotFound(name) if name == "stroll"));
    }

    #[test]
    fn test_setlist_uses_default_loop_length() {
        let (_root, library) = library(&[
            ("aircheck", "Agent K.K.mp3"),
            ("musicbox", "Agent K.K.mp3"),
            ("musicbox", "Space K.K.mp3"),
        ]);
        let mut rng = StdRng::seed_from_u64(2);

        let mut policy = RotationPolicy::catalogue(
            &kk_settings(&[Variant::Aircheck, Variant::MusicBox], None),
            &library,
            &mut rng,
        )
        .unwrap();
        assert_eq!(policy.name(), "setlist");
        assert_eq!(policy.loop_target(&mut rng), Some(Duration::from_secs(60)));

        let drawn: HashSet<_> = (0..3)
            .map(|_| match policy.next_request(at(0, 0), None, &mut rng) {
                Request::Catalogue(track) => track.id,
                other => panic!("unexpected request {:?}", other),
            })
            .collect();
        assert_eq!(drawn.len(), 3);
    }
}
