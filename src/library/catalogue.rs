use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument};

use crate::error::LibraryError;

use super::audio_files;
use super::types::{Track, TrackId, Variant};

/// Directory under the music root holding K.K. Slider songs
pub const CATALOGUE_DIR: &str = "kk";

/// A song available in a variant directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogueEntry {
    pub name: String,
    pub variant: Variant,
    pub path: PathBuf,
}

impl CatalogueEntry {
    pub fn into_track(self) -> Track {
        Track::new(
            TrackId::Catalogue {
                name: self.name,
                variant: self.variant,
            },
            self.path,
        )
    }
}

/// Reduce a name to lower-case letters only
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// List every song in a variant's directory, sorted by name
#[instrument(skip(root))]
pub fn entries(root: &Path, variant: Variant) -> Result<Vec<CatalogueEntry>, LibraryError> {
    let dir = root.join(CATALOGUE_DIR).join(variant.as_str());
    if !dir.is_dir() {
        return Err(LibraryError::NotFound(format!(
            "directory \"{}\" not found",
            dir.display()
        )));
    }

    let mut entries: Vec<CatalogueEntry> = audio_files(&dir)?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().into_owned();
            Some(CatalogueEntry {
                name,
                variant,
                path,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(dir = ?dir, count = entries.len(), "Listed catalogue");
    Ok(entries)
}

/// First entry whose normalized name contains the normalized query
pub fn fuzzy_match<'a>(entries: &'a [CatalogueEntry], query: &str) -> Option<&'a CatalogueEntry> {
    let query = normalize(query);
    entries.iter().find(|e| normalize(&e.name).contains(&query))
}

/// Resolve a named or random song of one variant; `None` if nothing matches
pub fn resolve<R: Rng + ?Sized>(
    root: &Path,
    name: Option<&str>,
    variant: Variant,
    rng: &mut R,
) -> Result<Option<Track>, LibraryError> {
    let entries = entries(root, variant)?;
    let entry = match name {
        Some(query) => fuzzy_match(&entries, query),
        None => entries.choose(rng),
    };
    Ok(entry.cloned().map(CatalogueEntry::into_track))
}
