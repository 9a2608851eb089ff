use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::LibraryError;

use super::types::{LoopWindow, TrackId};

pub const HOURLY_TIMINGS_FILE: &str = "hour_loop_times.json";
pub const CATALOGUE_TIMINGS_FILE: &str = "kk_loop_times.json";

/// Seconds stored either as a JSON number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(f64),
    Text(String),
}

impl Seconds {
    fn value(&self) -> Option<f64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Raw `{start, end}` entry as stored in the metadata files
#[derive(Debug, Clone, Deserialize)]
struct RawWindow {
    start: Seconds,
    end: Seconds,
}

/// game -> weather -> hour ("00".."23") -> window
type HourlyTable = HashMap<String, HashMap<String, HashMap<String, RawWindow>>>;

/// song name -> variant -> window
type CatalogueTable = HashMap<String, HashMap<String, RawWindow>>;

/// Read-only loop-timing metadata
#[derive(Debug, Default)]
pub struct LoopTimings {
    hourly: HourlyTable,
    catalogue: CatalogueTable,
}

impl LoopTimings {
    /// Load both timing documents from a directory; absent files are empty tables
    #[instrument]
    pub fn load_dir(dir: &Path) -> Result<Self, LibraryError> {
        let hourly: HourlyTable = read_table(&dir.join(HOURLY_TIMINGS_FILE))?.unwrap_or_default();
        let catalogue: CatalogueTable = read_table(&dir.join(CATALOGUE_TIMINGS_FILE))?.unwrap_or_default();

        debug!(
            games = hourly.len(),
            songs = catalogue.len(),
            "Loaded loop timings"
        );

        Ok(Self { hourly, catalogue })
    }

    /// Parse timing documents from JSON text
    #[cfg(test)]
    pub fn from_json(hourly: &str, catalogue: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            hourly: serde_json::from_str(hourly)?,
            catalogue: serde_json::from_str(catalogue)?,
        })
    }

    /// Look up the loop window for a track identity
    pub fn lookup(&self, id: &TrackId) -> Result<LoopWindow, LibraryError> {
        let raw = match id {
            TrackId::Hourly { hour, game, weather } => self
                .hourly
                .get(game.as_str())
                .and_then(|w| w.get(weather.as_str()))
                .and_then(|h| h.get(&format!("{:02}", hour))),
            TrackId::Catalogue { name, variant } => self
                .catalogue
                .get(name)
                .and_then(|v| v.get(variant.as_str())),
        }
        .ok_or_else(|| LibraryError::NotFound(format!("no loop timing for {}", id)))?;

        let (start, end) = match (raw.start.value(), raw.end.value()) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(LibraryError::Precondition(format!(
                    "loop timing for {} is not numeric",
                    id
                )))
            }
        };

        let window = LoopWindow::new(start, end);
        if !window.is_valid() {
            return Err(LibraryError::Precondition(format!(
                "loop timing for {} is invalid ({}s..{}s)",
                id, start, end
            )));
        }
        Ok(window)
    }
}

fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, LibraryError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = ?path, "Loop timing file not found");
            return Ok(None);
        }
        Err(source) => {
            return Err(LibraryError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| LibraryError::Json {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::types::{Game, Variant, Weather};

    const HOURLY: &str = r#"{
        "new-horizons": {
            "sunny": {
                "13": {"start": "12.345", "end": "71.5"},
                "05": {"start": 3, "end": 40.25}
            }
        },
        "wild-world": {
            "raining": {
                "02": {"start": "50", "end": "20"}
            }
        }
    }"#;

    const CATALOGUE: &str = r#"{
        "Forest Life (A Yeti in the Mood)": {
            "aircheck": {"start": "4.2", "end": "98.0"}
        }
    }"#;

    fn timings() -> LoopTimings {
        LoopTimings::from_json(HOURLY, CATALOGUE).unwrap()
    }

    #[test]
    fn test_hourly_lookup_accepts_strings_and_numbers() {
        let t = timings();
        let w = t
            .lookup(&TrackId::Hourly {
                hour: 13,
                game: Game::NewHorizons,
                weather: Weather::Sunny,
            })
            .unwrap();
        assert!((w.start_secs - 12.345).abs() < 1e-9);
        assert!((w.end_secs - 71.5).abs() < 1e-9);

        let w = t
            .lookup(&TrackId::Hourly {
                hour: 5,
                game: Game::NewHorizons,
                weather: Weather::Sunny,
            })
            .unwrap();
        assert_eq!(w, LoopWindow::new(3.0, 40.25));
    }

    #[test]
    fn test_catalogue_lookup() {
        let w = timings()
            .lookup(&TrackId::Catalogue {
                name: "Forest Life (A Yeti in the Mood)".into(),
                variant: Variant::Aircheck,
            })
            .unwrap();
        assert_eq!(w, LoopWindow::new(4.2, 98.0));
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let err = timings()
            .lookup(&TrackId::Catalogue {
                name: "Forest Life (A Yeti in the Mood)".into(),
                variant: Variant::MusicBox,
            })
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let err = timings()
            .lookup(&TrackId::Hourly {
                hour: 2,
                game: Game::WildWorld,
                weather: Weather::Raining,
            })
            .unwrap_err();
        assert!(matches!(err, LibraryError::Precondition(_)));
    }

    #[test]
    fn test_load_dir_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CATALOGUE_TIMINGS_FILE), CATALOGUE).unwrap();

        let t = LoopTimings::load_dir(dir.path()).unwrap();
        assert!(t.hourly.is_empty());
        assert_eq!(t.catalogue.len(), 1);
    }

    #[test]
    fn test_load_dir_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HOURLY_TIMINGS_FILE), "{ not json").unwrap();

        let err = LoopTimings::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LibraryError::Json { .. }));
    }
}
