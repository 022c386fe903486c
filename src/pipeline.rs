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
//! The end to end run: performance video and score in, note-triggered video out.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, span, Level};

use crate::assets::AssetStore;
use crate::config::Settings;
use crate::engine::Engine;
use crate::error::Error;
use crate::ffmpeg;
use crate::loudness::LoudnessMeter;
use crate::prepare::{PreparedAssets, Preparer};
use crate::render::{Canvas, Compiler, OutputCodec, RenderPlan, RenderSummary, Schedule, Scheduler};
use crate::score::{self, NoteEvent};
use crate::segments::{self, NoteSegment};

/// The name of the performance audio extracted into the work directory.
const PERFORMANCE_AUDIO: &str = "audio.wav";

/// What a full run did.
#[derive(Debug)]
pub struct RunReport {
    /// Segments kept after detection and loudness filtering.
    pub segments: usize,
    /// The asset preparation outcome.
    pub prepared: PreparedAssets,
    /// The render outcome.
    pub render: RenderSummary,
}

/// Runs the stages of the pipeline against one configuration.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    engine: &'a dyn Engine,
    store: AssetStore,
    canvas: Canvas,
    codec: OutputCodec,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a Settings, engine: &'a dyn Engine) -> Pipeline<'a> {
        Pipeline {
            settings,
            engine,
            store: AssetStore::new(settings.asset_root()),
            canvas: settings.render().canvas(),
            codec: settings.render().codec(),
        }
    }

    /// Extracts the performance audio and returns the note segments worth keeping.
    pub fn detect(&self, video: &Path) -> Result<Vec<NoteSegment>, Error> {
        let span = span!(Level::INFO, "detect", video = %video.display());
        let _enter = span.enter();

        let work_dir = self.settings.work_dir();
        fs::create_dir_all(&work_dir)?;
        let audio = work_dir.join(PERFORMANCE_AUDIO);
        self.engine.run(&ffmpeg::extract_audio(
            video,
            &audio,
            self.settings.render().sample_rate(),
        ))?;

        let min_duration = self.settings.segments().min_clip_duration();
        let mut segments = segments::detect_segments(self.engine, &audio, min_duration)?;

        let loudness = self.settings.loudness();
        if loudness.enabled() {
            segments = LoudnessMeter::new(self.engine).filter(&audio, segments, loudness.threshold_db());
        }

        if segments.is_empty() {
            return Err(Error::NoSegments { min_duration });
        }
        info!(segments = segments.len(), "Detected note segments");
        Ok(segments)
    }

    /// Builds per-note assets from the segments.
    pub fn prepare(&self, video: &Path, segments: Vec<NoteSegment>) -> Result<PreparedAssets, Error> {
        let preparer = Preparer::new(
            self.engine,
            &self.store,
            &self.codec,
            self.settings.render().sample_rate(),
            &self.settings.work_dir(),
        );
        Ok(preparer.prepare(video, segments)?)
    }

    /// Reads the score, rejecting scores without notes.
    pub fn read_score(&self, path: &Path) -> Result<Vec<NoteEvent>, Error> {
        let events = score::read_score(path)?;
        if events.is_empty() {
            return Err(Error::EmptyScore(path.to_path_buf()));
        }
        Ok(events)
    }

    /// Compiles the score against the current assets without rendering.
    pub fn plan(&self, score: &Path) -> Result<(Schedule, Vec<RenderPlan>), Error> {
        let events = self.read_score(score)?;
        let scheduler = self.scheduler();
        let schedule = scheduler.schedule(&events)?;
        let plans = scheduler.plans(&events)?;
        Ok((schedule, plans))
    }

    /// Renders the events to `output`.
    pub fn render(&self, events: &[NoteEvent], output: &Path) -> Result<RenderSummary, Error> {
        Ok(self.scheduler().render(events, output)?)
    }

    /// Runs every stage in order.
    pub fn run(&self, video: &Path, score: &Path, output: &Path) -> Result<RunReport, Error> {
        let segments = self.detect(video)?;
        let count = segments.len();
        let prepared = self.prepare(video, segments)?;
        let events = self.read_score(score)?;
        let render = self.render(&events, output)?;

        info!(output = %output.display(), "Run complete");
        Ok(RunReport {
            segments: count,
            prepared,
            render,
        })
    }

    /// The path the output goes to when none is given.
    pub fn default_output(&self) -> PathBuf {
        self.settings.output()
    }

    fn scheduler(&self) -> Scheduler<'_> {
        let render = self.settings.render();
        Scheduler::new(
            self.engine,
            Compiler::new(&self.store, &self.canvas, render.mode()),
            &self.codec,
            render.batch_size(),
            self.settings.work_dir(),
        )
        .keep_intermediates(render.keep_intermediates())
    }
}
