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
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use notereel::config::Settings;
use notereel::engine::{ProcessEngine, Tool};
use notereel::pipeline::Pipeline;
use notereel::util::timestamp_display;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Rebuilds a performance video as a note-triggered video driven by a MIDI score."
)]
struct Cli {
    /// The path to the YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds note assets from a performance and renders a score with them.
    Render {
        /// The performance video.
        video: PathBuf,
        /// The MIDI score to render.
        midi: PathBuf,
        /// Where to write the rendered video. Overrides the configured output.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Lists the note segments detected in a performance without building assets.
    Segments {
        /// The performance video.
        video: PathBuf,
    },
    /// Prints the batches and composition graphs for a score without rendering.
    Plan {
        /// The MIDI score to plan.
        midi: PathBuf,
    },
    /// Checks that the external tools can be found.
    Check {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let engine = ProcessEngine::new(settings.tools().clone());
    let pipeline = Pipeline::new(&settings, &engine);

    match cli.command {
        Commands::Render {
            video,
            midi,
            output,
        } => {
            let output = output.unwrap_or_else(|| pipeline.default_output());
            let report = pipeline.run(&video, &midi, &output)?;

            println!(
                "Prepared {} of {} segments ({} skipped, {} replaced).",
                report.prepared.notes.len(),
                report.segments,
                report.prepared.skipped.len(),
                report.prepared.displaced.len()
            );
            for skipped in report.prepared.skipped.iter() {
                println!("- note {:03}: {}", skipped.segment.note, skipped.reason);
            }
            println!(
                "Rendered {} notes in {} batch(es), {} long: {}",
                report.render.events,
                report.render.batches,
                timestamp_display(report.render.duration),
                output.display()
            );
        }
        Commands::Segments { video } => {
            let segments = pipeline.detect(&video)?;

            println!("Segments (count: {}):", segments.len());
            for segment in segments.iter() {
                println!(
                    "- note {:03}: {} - {}",
                    segment.note,
                    timestamp_display(segment.start),
                    timestamp_display(segment.end)
                );
            }
        }
        Commands::Plan { midi } => {
            let (schedule, plans) = pipeline.plan(&midi)?;

            println!(
                "Batches (count: {}, duration: {}):",
                schedule.batches().len(),
                timestamp_display(schedule.duration())
            );
            for (batch, plan) in schedule.batches().iter().zip(plans.iter()) {
                println!(
                    "\nBatch {} at {} ({} notes, {}):",
                    batch.index,
                    timestamp_display(batch.offset),
                    batch.events.len(),
                    timestamp_display(batch.duration)
                );
                for placement in plan.placements() {
                    let substitute = if placement.is_substitute() {
                        format!(" (using {:03})", placement.note)
                    } else {
                        String::new()
                    };
                    println!(
                        "- note {:03}{} at {}",
                        placement.requested,
                        substitute,
                        timestamp_display(placement.start)
                    );
                }
                println!("Graph:");
                for chain in plan.graph().chains() {
                    println!("  {}", chain);
                }
            }
        }
        Commands::Check {} => {
            let mut missing = 0;
            for tool in Tool::ALL {
                match engine.resolve(tool) {
                    Ok(path) => println!("- {}: {}", tool, path.display()),
                    Err(e) => {
                        missing += 1;
                        println!("- {}: {}", tool, e);
                    }
                }
            }
            if missing > 0 {
                return Err(format!("{} tool(s) missing", missing).into());
            }
        }
    }

    Ok(())
}
