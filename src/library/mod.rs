mod catalogue;
mod hourly;
mod timings;
mod types;

pub use catalogue::CatalogueEntry;
pub use timings::LoopTimings;
pub use types::{Game, LoopWindow, Track, TrackId, Variant, Weather};

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, instrument};

use crate::error::LibraryError;

/// Extensions recognised as source audio
const AUDIO_EXTENSIONS: [&str; 4] = ["ogg", "mp3", "flac", "wav"];

/// Regular, non-hidden audio files directly inside `dir`, sorted
pub(crate) fn audio_files(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let read = std::fs::read_dir(dir).map_err(|source| LibraryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            let audio = path
                .extension()
                .map(|e| {
                    let ext = e.to_string_lossy().to_lowercase();
                    AUDIO_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false);
            !hidden && audio
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Music assets on disk plus their loop timings
pub struct MusicLibrary {
    root: PathBuf,
    timings: LoopTimings,
}

impl MusicLibrary {
    pub fn new(root: PathBuf, timings: LoopTimings) -> Self {
        debug!(root = ?root, "Opened music library");
        Self { root, timings }
    }

    /// Resolve the hourly track for an hour, game and weather
    pub fn hourly(&self, hour: u8, game: Game, weather: Weather) -> Result<Track, LibraryError> {
        hourly::resolve(&self.root, hour, game, weather)
    }

    /// Resolve a named (fuzzy) or random K.K. song
    pub fn catalogue<R: Rng + ?Sized>(
        &self,
        name: Option<&str>,
        variant: Variant,
        rng: &mut R,
    ) -> Result<Option<Track>, LibraryError> {
        catalogue::resolve(&self.root, name, variant, rng)
    }

    /// All songs across the given variants, in variant then name order
    #[instrument(skip(self))]
    pub fn setlist(&self, variants: &[Variant]) -> Result<Vec<CatalogueEntry>, LibraryError> {
        let mut setlist = Vec::new();
        for variant in variants {
            setlist.extend(catalogue::entries(&self.root, *variant)?);
        }
        if setlist.is_empty() {
            return Err(LibraryError::NotFound(format!(
                "no songs found for {:?}",
                variants
            )));
        }
        Ok(setlist)
    }

    /// Loop window for a track
    pub fn loop_window(&self, track: &Track) -> Result<LoopWindow, LibraryError> {
        self.timings.lookup(&track.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_audio_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.OGG", ".hidden.ogg", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("loops.ogg")).unwrap();

        let files = audio_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.OGG", "b.mp3"]);
    }

    #[test]
    fn test_setlist_is_union_of_variants() {
        let root = tempfile::tempdir().unwrap();
        for (variant, name) in [("aircheck", "Agent K.K.mp3"), ("musicbox", "Agent K.K.mp3"), ("musicbox", "Space K.K.mp3")] {
            let dir = root.path().join("kk").join(variant);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), b"x").unwrap();
        }

        let library = MusicLibrary::new(root.path().to_path_buf(), LoopTimings::default());
        let setlist = library.setlist(&[Variant::Aircheck, Variant::MusicBox]).unwrap();
        let pairs: Vec<_> = setlist.iter().map(|e| (e.variant, e.name.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (Variant::Aircheck, "Agent K.K"),
                (Variant::MusicBox, "Agent K.K"),
                (Variant::MusicBox, "Space K.K"),
            ]
        );
    }

    #[test]
    fn test_empty_setlist_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("kk/live")).unwrap();

        let library = MusicLibrary::new(root.path().to_path_buf(), LoopTimings::default());
        assert!(matches!(
            library.setlist(&[Variant::Live]),
            Err(LibraryError::NotFound(_))
        ));
    }
}
