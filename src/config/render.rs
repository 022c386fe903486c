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

use crate::render::batch::DEFAULT_BATCH_SIZE;
use crate::render::{Canvas, OutputCodec, RenderMode};

const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;
const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A YAML representation of the render settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Render {
    /// Maximum number of note events compiled into one graph (default: 50).
    batch_size: Option<usize>,

    /// How note clips are positioned on the canvas (default: shifted).
    mode: Option<RenderMode>,

    /// Canvas width in pixels (default: 1920).
    width: Option<u32>,

    /// Canvas height in pixels (default: 1080).
    height: Option<u32>,

    /// Background colour, in any form ffmpeg accepts (default: black).
    background: Option<String>,

    /// Output video codec (default: libx264).
    video_codec: Option<String>,

    /// Output audio codec (default: aac).
    audio_codec: Option<String>,

    /// Output pixel format (default: yuv420p).
    pixel_format: Option<String>,

    /// Sample rate of extracted audio and the silence bed (default: 44100).
    sample_rate: Option<u32>,

    /// Keep intermediate batch renders on disk after the run (default: false).
    keep_intermediates: Option<bool>,
}

impl Render {
    /// Returns the batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Returns the render mode.
    pub fn mode(&self) -> RenderMode {
        self.mode.unwrap_or_default()
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns whether batch intermediates are kept.
    pub fn keep_intermediates(&self) -> bool {
        self.keep_intermediates.unwrap_or(false)
    }

    /// Returns the canvas every batch is composited onto.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width.unwrap_or(DEFAULT_WIDTH),
            height: self.height.unwrap_or(DEFAULT_HEIGHT),
            background: self
                .background
                .clone()
                .unwrap_or_else(|| "black".to_string()),
            pixel_format: self.pixel_format(),
            sample_rate: self.sample_rate(),
        }
    }

    /// Returns the encoder parameters for rendered files.
    pub fn codec(&self) -> OutputCodec {
        OutputCodec {
            video: self
                .video_codec
                .clone()
                .unwrap_or_else(|| "libx264".to_string()),
            audio: self
                .audio_codec
                .clone()
                .unwrap_or_else(|| "aac".to_string()),
            pixel_format: self.pixel_format(),
        }
    }

    fn pixel_format(&self) -> String {
        self.pixel_format
            .clone()
            .unwrap_or_else(|| "yuv420p".to_string())
    }
}
