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
//! Turns detected segments into per-note assets.
//!
//! Each kept segment is cut out of the performance, its audio is tuned to the segment's note,
//! and the tuned audio is remuxed over the clip's video. Only when every step has worked are the
//! tuned audio (`NNN.wav`) and the remuxed clip (`NNN.mp4`) copied into the asset store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, span, warn, Level};

use crate::assets::{AssetKind, AssetStore, NoteAssets};
use crate::engine::{Engine, EngineError};
use crate::ffmpeg;
use crate::pitch::{Correction, PitchCorrector, PitchError};
use crate::render::OutputCodec;
use crate::segments::NoteSegment;

/// The directory under the work directory that holds raw clips.
pub const CLIP_DIR: &str = "clips";

/// The directory under the clip directory where finished assets are built before they are
/// copied into the store.
const TUNED_DIR: &str = "tuned";

/// Failures while preparing one segment.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("unable to cut clip: {0}")]
    Cut(#[source] EngineError),

    #[error("unable to extract clip audio: {0}")]
    Extract(#[source] EngineError),

    #[error(transparent)]
    Pitch(#[from] PitchError),

    #[error("unable to remux clip: {0}")]
    Remux(#[source] EngineError),

    #[error("unable to copy assets into the store: {0}")]
    Store(#[source] io::Error),
}

/// A segment that was not turned into an asset.
#[derive(Debug)]
pub struct Skipped {
    pub segment: NoteSegment,
    pub reason: PrepareError,
}

/// The outcome of preparing a set of segments.
#[derive(Debug, Default)]
pub struct PreparedAssets {
    /// Notes now present in the asset store, ascending.
    pub notes: Vec<u8>,
    /// Segments replaced by a later segment for the same note.
    pub displaced: Vec<NoteSegment>,
    /// Segments whose preparation failed.
    pub skipped: Vec<Skipped>,
}

/// Prepares note assets from a performance video.
pub struct Preparer<'a> {
    engine: &'a dyn Engine,
    store: &'a AssetStore,
    codec: &'a OutputCodec,
    sample_rate: u32,
    clip_dir: PathBuf,
}

impl<'a> Preparer<'a> {
    /// Creates a preparer writing raw clips under `work_dir`.
    pub fn new(
        engine: &'a dyn Engine,
        store: &'a AssetStore,
        codec: &'a OutputCodec,
        sample_rate: u32,
        work_dir: &Path,
    ) -> Preparer<'a> {
        Preparer {
            engine,
            store,
            codec,
            sample_rate,
            clip_dir: work_dir.join(CLIP_DIR),
        }
    }

    /// Prepares an asset for every note in `segments`, in input order. When a note appears more
    /// than once the last segment that prepares successfully wins. Failures skip the segment and
    /// leave the store untouched; only filesystem setup errors are returned.
    pub fn prepare(&self, source: &Path, segments: Vec<NoteSegment>) -> io::Result<PreparedAssets> {
        let span = span!(Level::INFO, "prepare assets", root = %self.store.root().display());
        let _enter = span.enter();

        self.store.ensure_root()?;
        fs::create_dir_all(self.clip_dir.join(TUNED_DIR))?;

        let mut assets = NoteAssets::new();
        let mut prepared = PreparedAssets::default();
        for segment in segments {
            match self.prepare_segment(source, &segment) {
                Ok(correction) => {
                    info!(note = segment.note, ?correction, "Prepared note asset");
                    if let Some(displaced) = assets.insert(segment) {
                        info!(
                            note = displaced.note,
                            start = displaced.start,
                            "Asset replaced by a later segment for the same note"
                        );
                        prepared.displaced.push(displaced);
                    }
                }
                Err(e) => {
                    warn!(
                        note = segment.note,
                        start = segment.start,
                        end = segment.end,
                        err = %e,
                        "Skipping segment"
                    );
                    prepared.skipped.push(Skipped { segment, reason: e });
                }
            }
        }
        prepared.notes = assets.notes();

        info!(
            prepared = prepared.notes.len(),
            skipped = prepared.skipped.len(),
            displaced = prepared.displaced.len(),
            "Prepared note assets"
        );
        Ok(prepared)
    }

    /// Builds both assets under the clip directory, then copies them into the store.
    fn prepare_segment(&self, source: &Path, segment: &NoteSegment) -> Result<Correction, PrepareError> {
        let video_name = AssetStore::file_name(segment.note, AssetKind::Video);
        let audio_name = AssetStore::file_name(segment.note, AssetKind::Audio);
        let clip = self.clip_dir.join(&video_name);
        let raw_audio = self.clip_dir.join(&audio_name);
        let tuned_audio = self.clip_dir.join(TUNED_DIR).join(&audio_name);
        let tuned_clip = self.clip_dir.join(TUNED_DIR).join(&video_name);

        self.engine
            .run(&ffmpeg::cut_clip(
                source,
                segment.start,
                segment.end,
                self.codec,
                &clip,
            ))
            .map_err(PrepareError::Cut)?;
        self.engine
            .run(&ffmpeg::extract_audio(&clip, &raw_audio, self.sample_rate))
            .map_err(PrepareError::Extract)?;

        let correction = PitchCorrector::new(self.engine).correct(
            &raw_audio,
            &tuned_audio,
            f64::from(segment.note),
        )?;

        self.engine
            .run(&ffmpeg::replace_audio(
                &clip,
                &tuned_audio,
                self.codec,
                &tuned_clip,
            ))
            .map_err(PrepareError::Remux)?;

        fs::copy(&tuned_clip, self.store.path(segment.note, AssetKind::Video))
            .map_err(PrepareError::Store)?;
        fs::copy(&tuned_audio, self.store.path(segment.note, AssetKind::Audio))
            .map_err(PrepareError::Store)?;
        Ok(correction)
    }
}
