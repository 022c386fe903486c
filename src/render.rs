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
//! Turns note events into rendered video.
//!
//! The compiler builds a typed composition graph per batch, the scheduler splits large scores
//! into batches and renders them in order, and the concatenator joins the batch renders.

use crate::assets::ResolutionError;
use crate::engine::EngineError;

pub mod batch;
pub mod compiler;
pub mod concat;
pub mod graph;


pub use batch::{RenderBatch, RenderSummary, Schedule, Scheduler};
pub use compiler::{Compiler, Placement, RenderMode, RenderPlan};
pub use graph::CompositionGraph;

/// The frame every note clip is composited onto.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Background colour.
    pub background: String,
    /// Pixel format of the composited video.
    pub pixel_format: String,
    /// Sample rate of the silence bed.
    pub sample_rate: u32,
}

/// Encoder parameters for rendered files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputCodec {
    /// Video encoder.
    pub video: String,
    /// Audio encoder.
    pub audio: String,
    /// Output pixel format.
    pub pixel_format: String,
}

/// Failures while rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no note events to render")]
    NoEvents,

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("no intermediate renders to concatenate")]
    EmptyManifest,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("render engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
