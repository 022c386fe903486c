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
//! Drops segments that are much quieter than the performance as a whole.
//!
//! Measurement failures never delete content: if the track mean can't be measured the filter
//! does nothing, and a segment whose own level can't be measured is kept.

use std::path::Path;

use tracing::{info, span, warn, Level};

use crate::engine::{Engine, EngineError};
use crate::ffmpeg;
use crate::segments::NoteSegment;

/// The token ffmpeg's volumedetect filter prints before the mean level.
const MEAN_VOLUME_TOKEN: &str = "mean_volume:";

/// A failed loudness measurement.
#[derive(Debug, thiserror::Error)]
pub enum MeasurementError {
    #[error("loudness analysis failed: {0}")]
    Engine(#[from] EngineError),

    #[error("no mean_volume value in loudness analysis output")]
    Missing,
}

/// Finds the mean level, in dB, in volumedetect output.
pub fn parse_mean_volume(text: &str) -> Option<f64> {
    text.lines()
        .filter(|line| line.contains(MEAN_VOLUME_TOKEN))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            fields.find(|field| *field == MEAN_VOLUME_TOKEN)?;
            fields.next()?.parse::<f64>().ok()
        })
}

/// Returns true if a segment at `segment_volume` is loud enough to keep.
pub fn is_loud_enough(segment_volume: f64, mean_volume: f64, threshold_db: f64) -> bool {
    segment_volume >= mean_volume - threshold_db
}

/// Measures mean loudness through the external engine.
pub struct LoudnessMeter<'a> {
    engine: &'a dyn Engine,
}

impl<'a> LoudnessMeter<'a> {
    /// Creates a meter backed by the given engine.
    pub fn new(engine: &'a dyn Engine) -> LoudnessMeter<'a> {
        LoudnessMeter { engine }
    }

    /// Mean loudness of the whole file, in dB.
    pub fn mean_volume(&self, source: &Path) -> Result<f64, MeasurementError> {
        self.measure(source, None)
    }

    /// Mean loudness of `[start, end]`, in dB.
    pub fn segment_volume(
        &self,
        source: &Path,
        start: f64,
        end: f64,
    ) -> Result<f64, MeasurementError> {
        self.measure(source, Some((start, end)))
    }

    fn measure(&self, source: &Path, window: Option<(f64, f64)>) -> Result<f64, MeasurementError> {
        let output = self.engine.run(&ffmpeg::volume_detect(source, window))?;
        parse_mean_volume(&output.combined()).ok_or(MeasurementError::Missing)
    }

    /// Keeps the segments no quieter than the track mean minus `threshold_db`.
    pub fn filter(
        &self,
        source: &Path,
        segments: Vec<NoteSegment>,
        threshold_db: f64,
    ) -> Vec<NoteSegment> {
        let span = span!(Level::INFO, "loudness filter");
        let _enter = span.enter();

        let mean_volume = match self.mean_volume(source) {
            Ok(mean_volume) => mean_volume,
            Err(e) => {
                warn!(err = %e, "Could not measure mean volume, skipping loudness filtering");
                return segments;
            }
        };
        info!(mean_volume, threshold_db, "Measured mean volume");

        let before = segments.len();
        let floor = mean_volume - threshold_db;
        let kept: Vec<NoteSegment> = segments
            .into_iter()
            .filter(|segment| {
                match self.segment_volume(source, segment.start, segment.end) {
                    Ok(volume) if is_loud_enough(volume, mean_volume, threshold_db) => true,
                    Ok(volume) => {
                        info!(
                            note = segment.note,
                            start = segment.start,
                            end = segment.end,
                            volume,
                            floor,
                            "Filtered out quiet segment"
                        );
                        false
                    }
                    Err(e) => {
                        warn!(
                            note = segment.note,
                            start = segment.start,
                            end = segment.end,
                            err = %e,
                            "Could not measure segment volume, keeping it"
                        );
                        true
                    }
                }
            })
            .collect();

        info!(
            before,
            after = kept.len(),
            removed = before - kept.len(),
            "Loudness filtering complete"
        );
        kept
    }
}
