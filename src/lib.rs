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
//! Rebuilds a performance video as a note-triggered video driven by a MIDI score.
//!
//! A recorded performance is cut into one clip per detected note, each clip is tuned to its
//! note, and a score is then rendered by compositing those clips at the times the score asks
//! for them.

pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod loudness;
pub mod pipeline;
pub mod pitch;
pub mod prepare;
pub mod render;
pub mod score;
pub mod segments;
#[cfg(test)]
mod testutil;
pub mod util;

pub use error::Error;
