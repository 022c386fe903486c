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
//! A typed composition graph and its serialization to an ffmpeg filtergraph.
//!
//! The graph is a list of chains. Each chain reads one or more pads, runs its nodes in order and
//! writes a single labeled pad that later chains can read.

use std::fmt;

use crate::util::seconds_arg;

/// Which stream of a media input a pad carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Media {
    Video,
    Audio,
}

/// A stream endpoint: either a stream of an input file or the output of an earlier chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pad {
    /// A stream of the input file at `index`.
    Input { index: usize, media: Media },
    /// A labeled chain output.
    Label(String),
}

impl Pad {
    /// A labeled pad.
    pub fn label(name: impl Into<String>) -> Pad {
        Pad::Label(name.into())
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Input {
                index,
                media: Media::Video,
            } => write!(f, "[{}:v]", index),
            Pad::Input {
                index,
                media: Media::Audio,
            } => write!(f, "[{}:a]", index),
            Pad::Label(name) => write!(f, "[{}]", name),
        }
    }
}

/// One operation in a chain.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Cut the stream to `duration` seconds.
    Trim { media: Media, duration: f64 },
    /// Restart the stream's timestamps at zero.
    ResetTimestamps { media: Media },
    /// Scale to fit inside the canvas, letterboxing the remainder.
    Rescale { width: u32, height: u32 },
    /// Move the video timeline later by `offset` seconds.
    TimeShift { offset: f64 },
    /// Convert to a pixel format.
    Format { pixel_format: String },
    /// Delay every audio channel by `millis`.
    Delay { millis: u64, channels: usize },
    /// Only let audio through while `start <= t <= end`.
    Gate { start: f64, end: f64 },
    /// Draw the second input over the first, optionally only within a time window.
    Overlay { window: Option<(f64, f64)> },
    /// Mix `inputs` audio streams, lasting as long as the longest.
    Mix { inputs: usize },
    /// Silent stereo audio.
    SilenceSource { sample_rate: u32, duration: f64 },
    /// A solid colour frame.
    BackgroundSource {
        color: String,
        width: u32,
        height: u32,
        duration: f64,
    },
}

/// `between(t,start,end)` with tool precision.
fn between(start: f64, end: f64) -> String {
    format!("between(t,{},{})", seconds_arg(start), seconds_arg(end))
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Trim {
                media: Media::Video,
                duration,
            } => write!(f, "trim=duration={}", seconds_arg(*duration)),
            Node::Trim {
                media: Media::Audio,
                duration,
            } => write!(f, "atrim=duration={}", seconds_arg(*duration)),
            Node::ResetTimestamps { media: Media::Video } => write!(f, "setpts=PTS-STARTPTS"),
            Node::ResetTimestamps { media: Media::Audio } => write!(f, "asetpts=PTS-STARTPTS"),
            Node::Rescale { width, height } => write!(
                f,
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
                w = width,
                h = height
            ),
            Node::TimeShift { offset } => write!(f, "setpts=PTS+{}/TB", seconds_arg(*offset)),
            Node::Format { pixel_format } => write!(f, "format={}", pixel_format),
            Node::Delay { millis, channels } => {
                let per_channel = vec![millis.to_string(); (*channels).max(1)];
                write!(f, "adelay={}", per_channel.join("|"))
            }
            Node::Gate { start, end } => {
                write!(f, "volume=enable='{}':volume=1", between(*start, *end))
            }
            Node::Overlay { window: None } => write!(f, "overlay=shortest=0:eof_action=pass"),
            Node::Overlay {
                window: Some((start, end)),
            } => write!(
                f,
                "overlay=shortest=0:eof_action=pass:enable='{}'",
                between(*start, *end)
            ),
            Node::Mix { inputs } => write!(f, "amix=inputs={}:duration=longest", inputs),
            Node::SilenceSource {
                sample_rate,
                duration,
            } => write!(
                f,
                "anullsrc=channel_layout=stereo:sample_rate={}:d={}",
                sample_rate,
                seconds_arg(*duration)
            ),
            Node::BackgroundSource {
                color,
                width,
                height,
                duration,
            } => write!(
                f,
                "color=c={}:s={}x{}:d={}",
                color,
                width,
                height,
                seconds_arg(*duration)
            ),
        }
    }
}

/// Pads in, nodes applied in order, one labeled pad out.
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    inputs: Vec<Pad>,
    nodes: Vec<Node>,
    output: String,
}

impl Chain {
    /// The pads the chain reads.
    pub fn inputs(&self) -> &[Pad] {
        &self.inputs
    }

    /// The nodes, in application order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The label of the chain's output.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in self.inputs.iter() {
            write!(f, "{}", input)?;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", node)?;
        }
        write!(f, "[{}]", self.output)
    }
}

/// A composition graph, built chain by chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositionGraph {
    chains: Vec<Chain>,
}

impl CompositionGraph {
    /// Creates an empty graph.
    pub fn new() -> CompositionGraph {
        CompositionGraph::default()
    }

    /// Appends a chain and returns the pad of its output.
    pub fn chain(&mut self, inputs: Vec<Pad>, nodes: Vec<Node>, output: impl Into<String>) -> Pad {
        let output = output.into();
        self.chains.push(Chain {
            inputs,
            nodes,
            output: output.clone(),
        });
        Pad::Label(output)
    }

    /// The chains, in build order.
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Finds the chain that writes `label`.
    pub fn producer(&self, label: &str) -> Option<&Chain> {
        self.chains.iter().find(|chain| chain.output() == label)
    }

    /// Every node in the graph, in build order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.chains.iter().flat_map(|chain| chain.nodes.iter())
    }
}

impl fmt::Display for CompositionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}
