use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::LibraryError;

use super::types::{Game, Track, TrackId, Weather};
use super::audio_files;

/// Outcome of scanning a directory for a track
#[derive(Debug, PartialEq)]
pub enum Resolution {
    Found(Track),
    NotFound,
    Ambiguous(Vec<PathBuf>),
}

impl Resolution {
    /// Turn the scan outcome into a result, naming the identity on failure
    pub fn into_result(self, identity: &TrackId) -> Result<Track, LibraryError> {
        match self {
            Resolution::Found(track) => Ok(track),
            Resolution::NotFound => Err(LibraryError::NotFound(format!(
                "no file found for {}",
                identity
            ))),
            Resolution::Ambiguous(candidates) => Err(LibraryError::Ambiguous {
                identity: identity.to_string(),
                candidates,
            }),
        }
    }
}

/// Hour actually used for lookup; Animal Crossing has a single rain track
pub fn effective_hour(hour: u8, game: Game, weather: Weather) -> u8 {
    match (game, weather) {
        (Game::AnimalCrossing, Weather::Raining) => 0,
        _ => hour,
    }
}

/// Resolve the hourly track for `(hour, game, weather)` under `root`
#[instrument(skip(root))]
pub fn resolve(root: &Path, hour: u8, game: Game, weather: Weather) -> Result<Track, LibraryError> {
    if hour > 23 {
        return Err(LibraryError::Precondition(format!(
            "hour must be between 0 and 23, got {}",
            hour
        )));
    }

    let hour = effective_hour(hour, game, weather);
    let id = TrackId::Hourly { hour, game, weather };
    let dir = root.join(game.as_str()).join(weather.as_str());

    scan(&dir, hour, &id)?.into_result(&id)
}

/// Scan `dir` for the single file whose name contains the zero-padded hour
fn scan(dir: &Path, hour: u8, id: &TrackId) -> Result<Resolution, LibraryError> {
    if !dir.is_dir() {
        return Err(LibraryError::NotFound(format!(
            "directory \"{}\" not found",
            dir.display()
        )));
    }

    let hour_match = format!("{:02}", hour);
    let mut matches: Vec<PathBuf> = audio_files(dir)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().contains(&hour_match))
                .unwrap_or(false)
        })
        .collect();

    debug!(dir = ?dir, hour = %hour_match, matches = matches.len(), "Scanned hourly directory");

    Ok(match matches.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Found(Track::new(id.clone(), matches.remove(0))),
        _ => Resolution::Ambiguous(matches),
    })
}
