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
use serde::Deserialize;

use crate::segments::MIN_CLIP_DURATION;

/// Default loudness margin below the track mean, in dB.
pub const DEFAULT_LOUDNESS_THRESHOLD_DB: f64 = 6.0;

/// Segment extraction settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Segments {
    /// Shortest segment kept, in seconds (default: 0.25).
    min_clip_duration: Option<f64>,
}

impl Segments {
    /// Returns the minimum clip duration in seconds.
    pub fn min_clip_duration(&self) -> f64 {
        self.min_clip_duration.unwrap_or(MIN_CLIP_DURATION)
    }
}

/// Loudness filter settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Loudness {
    /// Whether quiet segments are filtered at all (default: true).
    enabled: Option<bool>,

    /// How far below the track mean a segment may be and still be kept, in dB.
    threshold_db: Option<f64>,
}

impl Loudness {
    /// Returns whether the loudness filter runs.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Returns the threshold margin in dB.
    pub fn threshold_db(&self) -> f64 {
        self.threshold_db.unwrap_or(DEFAULT_LOUDNESS_THRESHOLD_DB)
    }
}
