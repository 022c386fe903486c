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
//! Note segments detected in the performed audio.

use std::path::Path;

use tracing::{debug, info};

use crate::engine::{Engine, EngineError, Invocation, Tool};

/// Shortest note excerpt worth cutting, in seconds. Segments exactly this long are kept.
pub const MIN_CLIP_DURATION: f64 = 0.25;

/// Slack when comparing durations. Times are exchanged with the tools at millisecond precision, so
/// anything within half a millisecond of the minimum counts as reaching it.
const DURATION_TOLERANCE: f64 = 0.0005;

/// Highest valid MIDI note number.
pub const MAX_NOTE: u8 = 127;

/// A time-bounded note excerpt detected in the source performance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteSegment {
    /// Start of the excerpt, in seconds.
    pub start: f64,
    /// End of the excerpt, in seconds.
    pub end: f64,
    /// The MIDI note that was played.
    pub note: u8,
}

impl NoteSegment {
    /// Returns the length of the excerpt in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Parses one onset-detector record of the form `<note> <start> <end>`. Returns None for
/// anything else, including notes outside the MIDI range.
fn parse_record(line: &str) -> Option<NoteSegment> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [note, start, end] = fields.as_slice() else {
        return None;
    };

    let note = note.parse::<f64>().ok().filter(|note| note.is_finite())?;
    let start = start.parse::<f64>().ok().filter(|start| start.is_finite())?;
    let end = end.parse::<f64>().ok().filter(|end| end.is_finite())?;

    let note = note.trunc();
    if !(0.0..=f64::from(MAX_NOTE)).contains(&note) {
        return None;
    }

    Some(NoteSegment {
        start,
        end,
        note: note as u8,
    })
}

/// Converts onset-detector output into note segments, in input order. Malformed lines and
/// segments shorter than `min_duration` are dropped without error.
pub fn extract_segments<'a, I>(lines: I, min_duration: f64) -> Vec<NoteSegment>
where
    I: IntoIterator<Item = &'a str>,
{
    let segments: Vec<NoteSegment> = lines
        .into_iter()
        .filter_map(parse_record)
        .filter(|segment| {
            let keep = segment.duration() + DURATION_TOLERANCE >= min_duration;
            if !keep {
                debug!(
                    note = segment.note,
                    start = segment.start,
                    end = segment.end,
                    "Dropping short segment"
                );
            }
            keep
        })
        .collect();

    info!(count = segments.len(), "Segments parsed");
    segments
}

/// Runs the onset detector over the audio file and extracts the segments it reports.
pub fn detect_segments(
    engine: &dyn Engine,
    audio: &Path,
    min_duration: f64,
) -> Result<Vec<NoteSegment>, EngineError> {
    let output = engine.run(&Invocation::new(Tool::AubioNotes).path(audio))?;
    Ok(extract_segments(output.stdout.lines(), min_duration))
}
