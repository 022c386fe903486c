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
//! Compiles timed note events into a render plan.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::graph::{CompositionGraph, Media, Node, Pad};
use super::{Canvas, OutputCodec};
use crate::assets::{AssetKind, AssetStore, ResolutionError};
use crate::engine::{Invocation, Tool};
use crate::score::NoteEvent;
use crate::util::seconds_arg;

/// Label of the composited video stream.
pub const VIDEO_OUT: &str = "vout";

/// Label of the mixed audio stream.
pub const AUDIO_OUT: &str = "aout";

/// Per-note audio is treated as stereo.
const AUDIO_CHANNELS: usize = 2;

/// How note clips are placed on the canvas.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Each clip is rescaled to the canvas and shifted to its start time, then overlaid
    /// unconditionally.
    #[default]
    Shifted,
    /// Clips are only trimmed; each overlay is enabled during its note's window.
    Gated,
}

/// Where one note lands in a plan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// The note the score asked for.
    pub requested: u8,
    /// The note whose asset is used.
    pub note: u8,
    /// Start within the plan's canvas, in seconds.
    pub start: f64,
    /// Length, in seconds.
    pub duration: f64,
}

impl Placement {
    /// Returns true if the note is played with another octave's asset.
    pub fn is_substitute(&self) -> bool {
        self.requested != self.note
    }
}

/// A compiled graph plus everything needed to submit it.
#[derive(Clone, Debug)]
pub struct RenderPlan {
    inputs: Vec<PathBuf>,
    graph: CompositionGraph,
    placements: Vec<Placement>,
    duration: f64,
}

impl RenderPlan {
    /// The input files, in graph index order.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// The composition graph.
    pub fn graph(&self) -> &CompositionGraph {
        &self.graph
    }

    /// The notes placed by this plan, in event order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// The canvas duration, which also caps the rendered output.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Builds the render engine invocation writing this plan to `output`.
    pub fn invocation(&self, output: &Path, codec: &OutputCodec) -> Invocation {
        let mut invocation = Invocation::new(Tool::Ffmpeg);
        for input in self.inputs.iter() {
            invocation = invocation.arg("-i").path(input);
        }
        invocation
            .arg("-filter_complex")
            .arg(self.graph.to_string())
            .arg("-map")
            .arg(format!("[{}]", VIDEO_OUT))
            .arg("-map")
            .arg(format!("[{}]", AUDIO_OUT))
            .arg("-c:v")
            .arg(codec.video.as_str())
            .arg("-c:a")
            .arg(codec.audio.as_str())
            .arg("-pix_fmt")
            .arg(codec.pixel_format.as_str())
            .arg("-t")
            .arg(seconds_arg(self.duration))
            .arg("-y")
            .path(output)
    }
}

/// Compiles note events against an asset store.
pub struct Compiler<'a> {
    store: &'a AssetStore,
    canvas: &'a Canvas,
    mode: RenderMode,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler.
    pub fn new(store: &'a AssetStore, canvas: &'a Canvas, mode: RenderMode) -> Compiler<'a> {
        Compiler {
            store,
            canvas,
            mode,
        }
    }

    /// Builds the plan for `events` on a canvas `duration` seconds long. Event starts are
    /// relative to the start of the canvas. Any note without an asset fails the whole plan.
    pub fn compile(&self, events: &[NoteEvent], duration: f64) -> Result<RenderPlan, ResolutionError> {
        let mut graph = CompositionGraph::new();
        let mut inputs = Vec::with_capacity(events.len());
        let mut placements = Vec::with_capacity(events.len());
        let mut video_pads = Vec::with_capacity(events.len());
        let mut audio_pads = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            let asset = self.store.resolve(event.note, AssetKind::Video)?;
            if asset.is_substitute() {
                debug!(
                    index,
                    requested = asset.requested,
                    note = asset.note,
                    "Placing note from another octave"
                );
            }
            inputs.push(asset.path);
            placements.push(Placement {
                requested: event.note,
                note: asset.note,
                start: event.start,
                duration: event.duration,
            });

            video_pads.push(graph.chain(
                vec![Pad::Input {
                    index,
                    media: Media::Video,
                }],
                self.video_branch(event),
                format!("v{}", index),
            ));
            audio_pads.push(graph.chain(
                vec![Pad::Input {
                    index,
                    media: Media::Audio,
                }],
                audio_branch(event),
                format!("a{}", index),
            ));
        }

        let background_label = if events.is_empty() { VIDEO_OUT } else { "bg" };
        let mut current = graph.chain(
            vec![],
            vec![
                Node::BackgroundSource {
                    color: self.canvas.background.clone(),
                    width: self.canvas.width,
                    height: self.canvas.height,
                    duration,
                },
                Node::Format {
                    pixel_format: self.canvas.pixel_format.clone(),
                },
            ],
            background_label,
        );

        let last = video_pads.len().saturating_sub(1);
        for (index, (pad, event)) in video_pads.into_iter().zip(events.iter()).enumerate() {
            let window = match self.mode {
                RenderMode::Shifted => None,
                RenderMode::Gated => Some((event.start, event.end())),
            };
            let label = if index == last {
                VIDEO_OUT.to_string()
            } else {
                format!("tmp{}", index)
            };
            current = graph.chain(vec![current, pad], vec![Node::Overlay { window }], label);
        }

        // The silence bed keeps the mix alive for the whole canvas even with no note audio.
        let silence = graph.chain(
            vec![],
            vec![Node::SilenceSource {
                sample_rate: self.canvas.sample_rate,
                duration,
            }],
            "silence",
        );
        let mut mix_inputs = vec![silence];
        mix_inputs.extend(audio_pads);
        let inputs_count = mix_inputs.len();
        graph.chain(
            mix_inputs,
            vec![Node::Mix {
                inputs: inputs_count,
            }],
            AUDIO_OUT,
        );

        debug!(
            events = events.len(),
            duration,
            mode = ?self.mode,
            "Compiled render plan"
        );

        Ok(RenderPlan {
            inputs,
            graph,
            placements,
            duration,
        })
    }

    fn video_branch(&self, event: &NoteEvent) -> Vec<Node> {
        let mut nodes = vec![
            Node::Trim {
                media: Media::Video,
                duration: event.duration,
            },
            Node::ResetTimestamps {
                media: Media::Video,
            },
        ];
        if self.mode == RenderMode::Shifted {
            nodes.extend([
                Node::Rescale {
                    width: self.canvas.width,
                    height: self.canvas.height,
                },
                Node::TimeShift {
                    offset: event.start,
                },
                Node::Format {
                    pixel_format: self.canvas.pixel_format.clone(),
                },
            ]);
        }
        nodes
    }
}

fn audio_branch(event: &NoteEvent) -> Vec<Node> {
    vec![
        Node::Trim {
            media: Media::Audio,
            duration: event.duration,
        },
        Node::ResetTimestamps {
            media: Media::Audio,
        },
        Node::Delay {
            millis: (event.start * 1000.0).round().max(0.0) as u64,
            channels: AUDIO_CHANNELS,
        },
        Node::Gate {
            start: event.start,
            end: event.end(),
        },
    ]
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::{Compiler, RenderMode, AUDIO_OUT, VIDEO_OUT};
    use crate::assets::{AssetKind, AssetStore};
    use crate::render::graph::{Node, Pad};
    use crate::render::{Canvas, OutputCodec};
    use crate::testutil::{events, touch_assets};

    fn canvas() -> Canvas {
        Canvas {
            width: 1920,
            height: 1080,
            background: "black".to_string(),
            pixel_format: "yuv420p".to_string(),
            sample_rate: 44100,
        }
    }

    fn codec() -> OutputCodec {
        OutputCodec {
            video: "libx264".to_string(),
            audio: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }

    #[test]
    fn test_shifted_plan() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch_assets(dir.path(), &[48, 62], AssetKind::Video);
        let store = AssetStore::new(dir.path());
        let canvas = canvas();
        let compiler = Compiler::new(&store, &canvas, RenderMode::Shifted);

        let plan = compiler
            .compile(&events(&[(60, 0.0, 1.0), (62, 0.5, 1.5)]), 2.0)
            .expect("plan should compile");

        assert_eq!(
            vec![dir.path().join("048.mp4"), dir.path().join("062.mp4")],
            plan.inputs()
        );
        assert_eq!(48, plan.placements()[0].note);
        assert_eq!(60, plan.placements()[0].requested);
        assert!(plan.placements()[0].is_substitute());
        assert!(!plan.placements()[1].is_substitute());
        assert_eq!(2.0, plan.duration());

        let graph = plan.graph();
        let v1 = graph.producer("v1").expect("v1 chain");
        assert!(v1.nodes().contains(&Node::TimeShift { offset: 0.5 }));
        assert!(v1.nodes().contains(&Node::Rescale {
            width: 1920,
            height: 1080
        }));

        let a1 = graph.producer("a1").expect("a1 chain");
        assert!(a1.nodes().contains(&Node::Delay {
            millis: 500,
            channels: 2
        }));
        assert!(a1.nodes().contains(&Node::Gate {
            start: 0.5,
            end: 2.0
        }));

        // Overlays fold onto the background in event order, unconditionally.
        let tmp0 = graph.producer("tmp0").expect("tmp0 chain");
        assert_eq!(&[Pad::label("bg"), Pad::label("v0")], tmp0.inputs());
        assert_eq!(&[Node::Overlay { window: None }], tmp0.nodes());
        let vout = graph.producer(VIDEO_OUT).expect("vout chain");
        assert_eq!(&[Pad::label("tmp0"), Pad::label("v1")], vout.inputs());

        let aout = graph.producer(AUDIO_OUT).expect("aout chain");
        assert_eq!(
            &[Pad::label("silence"), Pad::label("a0"), Pad::label("a1")],
            aout.inputs()
        );
        assert_eq!(&[Node::Mix { inputs: 3 }], aout.nodes());
    }

    #[test]
    fn test_gated_plan() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch_assets(dir.path(), &[60], AssetKind::Video);
        let store = AssetStore::new(dir.path());
        let canvas = canvas();
        let compiler = Compiler::new(&store, &canvas, RenderMode::Gated);

        let plan = compiler
            .compile(&events(&[(60, 1.0, 0.5), (60, 3.0, 0.25)]), 3.25)
            .expect("plan should compile");
        let graph = plan.graph();

        assert!(!graph
            .nodes()
            .any(|node| matches!(node, Node::Rescale { .. } | Node::TimeShift { .. })));
        assert_eq!(
            &[Node::Overlay {
                window: Some((1.0, 1.5))
            }],
            graph.producer("tmp0").expect("tmp0 chain").nodes()
        );
        assert_eq!(
            &[Node::Overlay {
                window: Some((3.0, 3.25))
            }],
            graph.producer(VIDEO_OUT).expect("vout chain").nodes()
        );
    }

    #[test]
    fn test_empty_plan_still_has_both_outputs() {
        let store = AssetStore::new("does-not-exist");
        let canvas = canvas();
        let plan = Compiler::new(&store, &canvas, RenderMode::Shifted)
            .compile(&[], 1.5)
            .expect("empty plan should compile");

        assert!(plan.inputs().is_empty());
        let graph = plan.graph();
        assert!(graph.producer(VIDEO_OUT).is_some());
        assert_eq!(
            &[Node::Mix { inputs: 1 }],
            graph.producer(AUDIO_OUT).expect("aout chain").nodes()
        );
        assert!(graph.nodes().any(|node| node
            == &Node::SilenceSource {
                sample_rate: 44100,
                duration: 1.5
            }));
    }

    #[test]
    fn test_missing_asset_fails_plan() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch_assets(dir.path(), &[60], AssetKind::Video);
        let store = AssetStore::new(dir.path());
        let canvas = canvas();

        let err = Compiler::new(&store, &canvas, RenderMode::Shifted)
            .compile(&events(&[(60, 0.0, 1.0), (61, 1.0, 1.0)]), 2.0)
            .expect_err("61 has no asset in any octave");
        assert_eq!(61, err.note);
    }

    #[test]
    fn test_invocation() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch_assets(dir.path(), &[60], AssetKind::Video);
        let store = AssetStore::new(dir.path());
        let canvas = canvas();
        let plan = Compiler::new(&store, &canvas, RenderMode::Shifted)
            .compile(&events(&[(60, 0.0, 1.0)]), 1.0)
            .expect("plan should compile");

        let invocation = plan.invocation(Path::new("out.mp4"), &codec());
        let args = invocation.arguments();

        let input = dir.path().join("060.mp4").to_string_lossy().into_owned();
        assert_eq!(Some(input.as_str()), invocation.value_of("-i"));
        assert_eq!(
            Some(plan.graph().to_string().as_str()),
            invocation.value_of("-filter_complex")
        );
        assert_eq!(Some("1.000"), invocation.value_of("-t"));
        assert_eq!(Some("yuv420p"), invocation.value_of("-pix_fmt"));
        assert_eq!(
            vec!["-map", "[vout]", "-map", "[aout]"],
            args.iter()
                .skip_while(|arg| *arg != "-map")
                .take(4)
                .map(String::as_str)
                .collect::<Vec<&str>>()
        );
        assert_eq!(
            &["-y".to_string(), "out.mp4".to_string()],
            &args[args.len() - 2..]
        );
    }
}
