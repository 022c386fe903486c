// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! The per-note asset store.
//!
//! Each note has at most one asset of each kind, named by its zero-padded note number. A
//! request for a missing note falls back to the same pitch class in another octave.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::segments::{NoteSegment, MAX_NOTE};

/// Notes per octave.
const PITCH_CLASSES: u8 = 12;

/// Highest octave searched during fallback.
const MAX_OCTAVE: u8 = 10;

/// The kinds of asset stored per note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// The pitch-corrected audio.
    Audio,
    /// The video clip carrying the pitch-corrected audio.
    Video,
}

impl AssetKind {
    /// The file extension used for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Audio => "wav",
            AssetKind::Video => "mp4",
        }
    }
}

/// No asset exists for the note in any octave.
#[derive(Debug, thiserror::Error)]
#[error("could not find an asset for note {note:03} in any octave under {}", .root.display())]
pub struct ResolutionError {
    pub note: u8,
    pub root: PathBuf,
}

/// The asset chosen for a requested note.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// The note that was asked for.
    pub requested: u8,
    /// The note whose asset was found.
    pub note: u8,
    /// Where the asset lives.
    pub path: PathBuf,
}

impl ResolvedAsset {
    /// Returns true if the asset comes from a different octave than requested.
    pub fn is_substitute(&self) -> bool {
        self.requested != self.note
    }
}

/// A directory of per-note assets.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> AssetStore {
        AssetStore { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it doesn't exist.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// The file name for a note's asset, e.g. `061.mp4`.
    pub fn file_name(note: u8, kind: AssetKind) -> String {
        format!("{:03}.{}", note, kind.extension())
    }

    /// The path a note's asset lives at, whether or not it exists.
    pub fn path(&self, note: u8, kind: AssetKind) -> PathBuf {
        self.root.join(Self::file_name(note, kind))
    }

    fn exists(&self, note: u8, kind: AssetKind) -> bool {
        note <= MAX_NOTE && self.path(note, kind).exists()
    }

    /// Finds the asset for a note. The exact note wins if present; otherwise octaves of the same
    /// pitch class are tried from the lowest upward and the first hit is returned.
    pub fn resolve(&self, note: u8, kind: AssetKind) -> Result<ResolvedAsset, ResolutionError> {
        if self.exists(note, kind) {
            return Ok(ResolvedAsset {
                requested: note,
                note,
                path: self.path(note, kind),
            });
        }

        let pitch_class = note % PITCH_CLASSES;
        let fallback = (0..=MAX_OCTAVE)
            .filter_map(|octave| {
                let candidate = u16::from(octave) * u16::from(PITCH_CLASSES) + u16::from(pitch_class);
                u8::try_from(candidate).ok()
            })
            .inspect(|candidate| debug!(note, candidate, "Checking octave fallback"))
            .find(|candidate| self.exists(*candidate, kind));

        match fallback {
            Some(candidate) => {
                info!(note, substitute = candidate, "Note asset not found, using another octave");
                Ok(ResolvedAsset {
                    requested: note,
                    note: candidate,
                    path: self.path(candidate, kind),
                })
            }
            None => Err(ResolutionError {
                note,
                root: self.root.clone(),
            }),
        }
    }
}

/// Which detected segment each note's assets were built from. A segment is recorded once its
/// assets are in the store, replacing any earlier segment for the same note.
#[derive(Clone, Debug, Default)]
pub struct NoteAssets {
    by_note: BTreeMap<u8, NoteSegment>,
}

impl NoteAssets {
    /// Creates an empty map.
    pub fn new() -> NoteAssets {
        NoteAssets::default()
    }

    /// Records the segment as the source of its note's assets. Returns the segment it displaced,
    /// if the note already had one.
    pub fn insert(&mut self, segment: NoteSegment) -> Option<NoteSegment> {
        self.by_note.insert(segment.note, segment)
    }

    /// The notes that have assets, ascending.
    pub fn notes(&self) -> Vec<u8> {
        self.by_note.keys().copied().collect()
    }
}
