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
//! Pitch detection and correction of note excerpts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::engine::{Engine, EngineError, Invocation, Tool};

/// Reference pitch A4, in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI note number of A4.
pub const A4_NOTE: f64 = 69.0;

/// Cents in one equal-tempered semitone.
pub const CENTS_PER_SEMITONE: f64 = 100.0;

/// Shifts smaller than this, in cents, are not worth a correction pass.
pub const IN_TUNE_CENTS: f64 = 1.0;

/// Failures while correcting one excerpt.
#[derive(Debug, thiserror::Error)]
pub enum PitchError {
    #[error("pitch detection failed: {0}")]
    Detection(#[source] EngineError),

    #[error("no pitch detected in {}", .0.display())]
    NoPitch(PathBuf),

    #[error("pitch shift failed: {0}")]
    Shift(#[source] EngineError),

    #[error("unable to copy in-tune audio: {0}")]
    Copy(#[from] std::io::Error),
}

/// What the corrector did to an excerpt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Correction {
    /// Already within tolerance; the audio was copied unchanged.
    PassThrough { detected: f64 },
    /// Shifted by `cents`.
    Shifted { detected: f64, cents: f64 },
}

/// Converts a frequency in Hz to a (fractional) MIDI note number.
pub fn frequency_to_midi(frequency: f64) -> f64 {
    A4_NOTE + 12.0 * (frequency / A4_FREQUENCY).log2()
}

/// Converts a (fractional) MIDI note number to a frequency in Hz.
pub fn midi_to_frequency(note: f64) -> f64 {
    A4_FREQUENCY * 2f64.powf((note - A4_NOTE) / 12.0)
}

/// The shift, in cents, that moves `detected` onto `target`.
pub fn cents_between(detected: f64, target: f64) -> f64 {
    CENTS_PER_SEMITONE * (target - detected)
}

/// The median of the values, or None if there are none. Even-length inputs average the two
/// middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Collects the positive frequency estimates from pitch-detector output. Each record is
/// `<time> <frequency> ...`; unparsable or non-positive frequencies are ignored.
pub fn parse_frequencies(text: &str) -> Vec<f64> {
    text.lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|field| field.parse::<f64>().ok())
        .filter(|frequency| frequency.is_finite() && *frequency > 0.0)
        .collect()
}

/// Detects the pitch of an excerpt and moves it onto a target note.
pub struct PitchCorrector<'a> {
    engine: &'a dyn Engine,
}

impl<'a> PitchCorrector<'a> {
    /// Creates a corrector backed by the given engine.
    pub fn new(engine: &'a dyn Engine) -> PitchCorrector<'a> {
        PitchCorrector { engine }
    }

    /// Returns the dominant frequency of the audio in Hz: the median of the detector's
    /// estimates, which discards unvoiced and transient frames.
    pub fn detect(&self, source: &Path) -> Result<f64, PitchError> {
        let output = self
            .engine
            .run(&Invocation::new(Tool::AubioPitch).arg("-i").path(source))
            .map_err(PitchError::Detection)?;

        let frequencies = parse_frequencies(&output.stdout);
        debug!(estimates = frequencies.len(), "Parsed pitch estimates");
        median(&frequencies).ok_or_else(|| PitchError::NoPitch(source.to_path_buf()))
    }

    /// Writes `dest` as `source` tuned to `target` (a MIDI note number, possibly fractional).
    pub fn correct(&self, source: &Path, dest: &Path, target: f64) -> Result<Correction, PitchError> {
        let frequency = self.detect(source)?;
        let detected = frequency_to_midi(frequency);
        let cents = cents_between(detected, target);
        debug!(frequency, detected, target, cents, "Computed pitch correction");

        if cents.abs() < IN_TUNE_CENTS {
            info!(detected, target, "Pitch already at target, no correction needed");
            fs::copy(source, dest)?;
            return Ok(Correction::PassThrough { detected });
        }

        let shift = Invocation::new(Tool::Sox)
            .path(source)
            .path(dest)
            .arg("pitch")
            .arg(format!("{:.2}", cents));
        self.engine.run(&shift).map_err(PitchError::Shift)?;

        info!(detected, target, cents, "Pitch corrected");
        Ok(Correction::Shifted { detected, cents })
    }
}
