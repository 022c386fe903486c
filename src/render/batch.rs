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
//! Splits large scores into bounded batches and renders them in order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, span, warn, Level};

use super::compiler::{Compiler, RenderPlan};
use super::concat;
use super::{OutputCodec, RenderError};
use crate::engine::Engine;
use crate::score::NoteEvent;
use crate::util::filename_display;

/// The maximum number of events compiled into one graph unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// The directory under the work directory that holds intermediate batch renders.
pub const BATCH_DIR: &str = "batches";

/// A contiguous run of events, shifted so the earliest starts at zero.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderBatch {
    /// Position of the batch in the timeline.
    pub index: usize,
    /// The global time of the batch's local zero.
    pub offset: f64,
    /// Canvas duration of the batch.
    pub duration: f64,
    /// The events, with starts relative to `offset`.
    pub events: Vec<NoteEvent>,
}

/// The batches a score is rendered in.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    batches: Vec<RenderBatch>,
    duration: f64,
}

impl Schedule {
    /// The batches, in timeline order.
    pub fn batches(&self) -> &[RenderBatch] {
        &self.batches
    }

    /// The global duration: the latest end of any event.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// True if the score fits in one batch and renders straight to the output.
    pub fn is_single(&self) -> bool {
        self.batches.len() == 1
    }
}

/// Sorts events by start time. Events starting together keep their relative order.
pub fn sort_events(events: &mut [NoteEvent]) {
    events.sort_by(|a, b| a.start.total_cmp(&b.start));
}

/// The latest end time of any event, or zero for no events.
pub fn timeline_end(events: &[NoteEvent]) -> f64 {
    events.iter().map(NoteEvent::end).fold(0.0, f64::max)
}

/// Partitions events into batches of at most `batch_size`.
///
/// A score that fits in one batch is kept on the global timeline with the global duration as
/// its canvas. Otherwise each batch is shifted by its earliest start and sized to its own
/// latest end.
pub fn partition(events: &[NoteEvent], batch_size: usize) -> Result<Schedule, RenderError> {
    if batch_size == 0 {
        return Err(RenderError::InvalidBatchSize);
    }
    if events.is_empty() {
        return Err(RenderError::NoEvents);
    }

    let mut sorted = events.to_vec();
    sort_events(&mut sorted);
    let duration = timeline_end(&sorted);

    if sorted.len() <= batch_size {
        return Ok(Schedule {
            batches: vec![RenderBatch {
                index: 0,
                offset: 0.0,
                duration,
                events: sorted,
            }],
            duration,
        });
    }

    let batches = sorted
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| {
            let offset = chunk
                .iter()
                .map(|event| event.start)
                .fold(f64::INFINITY, f64::min);
            let end = timeline_end(chunk);
            RenderBatch {
                index,
                offset,
                duration: end - offset,
                events: chunk.iter().map(|event| event.shifted(offset)).collect(),
            }
        })
        .collect();

    Ok(Schedule { batches, duration })
}

/// What a render produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSummary {
    /// Number of events rendered.
    pub events: usize,
    /// Number of batches rendered.
    pub batches: usize,
    /// Duration of the output, in seconds.
    pub duration: f64,
}

/// Renders a score batch by batch.
pub struct Scheduler<'a> {
    engine: &'a dyn Engine,
    compiler: Compiler<'a>,
    codec: &'a OutputCodec,
    batch_size: usize,
    work_dir: PathBuf,
    keep_intermediates: bool,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler. Intermediate renders go under `work_dir`.
    pub fn new(
        engine: &'a dyn Engine,
        compiler: Compiler<'a>,
        codec: &'a OutputCodec,
        batch_size: usize,
        work_dir: impl Into<PathBuf>,
    ) -> Scheduler<'a> {
        Scheduler {
            engine,
            compiler,
            codec,
            batch_size,
            work_dir: work_dir.into(),
            keep_intermediates: false,
        }
    }

    /// Keeps intermediate batch renders on disk instead of removing them after the run.
    pub fn keep_intermediates(mut self, keep: bool) -> Scheduler<'a> {
        self.keep_intermediates = keep;
        self
    }

    /// Partitions the events with this scheduler's batch size.
    pub fn schedule(&self, events: &[NoteEvent]) -> Result<Schedule, RenderError> {
        partition(events, self.batch_size)
    }

    /// Compiles every batch without rendering anything.
    pub fn plans(&self, events: &[NoteEvent]) -> Result<Vec<RenderPlan>, RenderError> {
        let schedule = self.schedule(events)?;
        schedule
            .batches()
            .iter()
            .map(|batch| {
                self.compiler
                    .compile(&batch.events, batch.duration)
                    .map_err(RenderError::from)
            })
            .collect()
    }

    /// Renders the events to `output`. Any failure aborts the run.
    pub fn render(&self, events: &[NoteEvent], output: &Path) -> Result<RenderSummary, RenderError> {
        let span = span!(Level::INFO, "render");
        let _enter = span.enter();

        let schedule = self.schedule(events)?;
        let summary = RenderSummary {
            events: events.len(),
            batches: schedule.batches().len(),
            duration: schedule.duration(),
        };
        info!(
            events = summary.events,
            batches = summary.batches,
            duration = summary.duration,
            "Rendering score"
        );

        if schedule.is_single() {
            let batch = &schedule.batches()[0];
            let plan = self.compiler.compile(&batch.events, batch.duration)?;
            self.engine.run(&plan.invocation(output, self.codec))?;
            info!(output = %output.display(), "Rendered output");
            return Ok(summary);
        }

        let batch_dir = self.work_dir.join(BATCH_DIR);
        fs::create_dir_all(&batch_dir)?;
        let mut intermediates = Intermediates::new(&batch_dir, self.keep_intermediates);

        for batch in schedule.batches() {
            let plan = self.compiler.compile(&batch.events, batch.duration)?;
            let path = batch_dir.join(format!("segment_{:03}.mp4", batch.index));
            intermediates.push(path.clone());

            info!(
                batch = batch.index,
                file = filename_display(&path),
                events = batch.events.len(),
                offset = batch.offset,
                duration = batch.duration,
                "Rendering batch"
            );
            self.engine.run(&plan.invocation(&path, self.codec))?;
        }

        concat::concatenate(
            self.engine,
            intermediates.paths(),
            output,
            schedule.duration(),
            &self.work_dir,
        )?;
        info!(output = %output.display(), "Rendered output");
        Ok(summary)
    }
}

/// Intermediate batch renders, removed when dropped unless kept.
struct Intermediates {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    keep: bool,
}

impl Intermediates {
    fn new(dir: &Path, keep: bool) -> Intermediates {
        Intermediates {
            dir: dir.to_path_buf(),
            paths: Vec::new(),
            keep,
        }
    }

    fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for Intermediates {
    fn drop(&mut self) {
        if self.keep {
            debug!(dir = %self.dir.display(), "Keeping intermediate renders");
            return;
        }
        for path in self.paths.iter() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), err = %e, "Unable to remove intermediate render"),
            }
        }
        // Only succeeds if nothing else was left in the directory.
        let _ = fs::remove_dir(&self.dir);
    }
}
