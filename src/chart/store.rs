//! JSON persistence of note maps, one file per source clip.

use std::path::{Path, PathBuf};

use super::model::NoteMap;
use crate::error::{MapError, Result};

const FILE_SUFFIX: &str = "_BeatMap.json";

/// A directory of persisted maps keyed by sanitized source name. Each
/// source owns its own file, so different sources never contend.
#[derive(Debug, Clone)]
pub struct MapStore {
    dir: PathBuf,
}

impl MapStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/beatmap`, or `./beatmaps` when the platform has none.
    pub fn default_location() -> Self {
        let dir = dirs::data_dir()
            .map(|d| d.join("beatmap"))
            .unwrap_or_else(|| PathBuf::from("beatmaps"));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", sanitize_file_name(source_id), FILE_SUFFIX))
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.path_for(source_id).is_file()
    }

    pub fn load(&self, source_id: &str) -> Result<NoteMap> {
        let path = self.path_for(source_id);
        let json = std::fs::read_to_string(&path).map_err(|source| MapError::PersistenceIo {
            path: path.clone(),
            source,
        })?;
        let map: NoteMap = serde_json::from_str(&json)
            .map_err(|source| MapError::PersistenceFormat { path: path.clone(), source })?;

        log::info!("Loaded {} notes from {}", map.notes.len(), path.display());
        Ok(map)
    }

    /// Writes `map` under its clip name and returns the file path.
    pub fn save(&self, map: &NoteMap) -> Result<PathBuf> {
        let path = self.path_for(&map.clip_name);
        std::fs::create_dir_all(&self.dir).map_err(|source| MapError::PersistenceIo {
            path: self.dir.clone(),
            source,
        })?;
        let json = serde_json::to_string_pretty(map)
            .map_err(|source| MapError::PersistenceFormat { path: path.clone(), source })?;
        std::fs::write(&path, json).map_err(|source| MapError::PersistenceIo {
            path: path.clone(),
            source,
        })?;

        log::info!("Saved {} notes to {}", map.notes.len(), path.display());
        Ok(path)
    }
}

/// Replaces every character that is invalid in a file name with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
