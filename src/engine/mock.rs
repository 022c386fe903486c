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
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use super::{EngineError, Invocation, Output, Tool};

/// A scripted reply for the next call to a tool.
enum Reply {
    Success(Output),
    Failure(String),
}

/// A mock engine. Records every invocation and replays scripted replies per tool. Tools with no
/// scripted reply left succeed with empty output.
#[derive(Default)]
pub struct Engine {
    calls: Mutex<Vec<Invocation>>,
    replies: Mutex<HashMap<Tool, VecDeque<Reply>>>,
    touch_outputs: bool,
}

impl Engine {
    /// Creates a mock engine with no scripted replies.
    pub fn new() -> Engine {
        Engine::default()
    }

    /// Makes successful ffmpeg and sox calls create their output file, so
    /// later stages that check for files on disk see them.
    pub fn touching_outputs(mut self) -> Engine {
        self.touch_outputs = true;
        self
    }

    /// Queues a successful reply for the next unanswered call to the tool.
    pub fn reply(&self, tool: Tool, output: Output) -> &Engine {
        self.replies
            .lock()
            .expect("unable to get replies lock")
            .entry(tool)
            .or_default()
            .push_back(Reply::Success(output));
        self
    }

    /// Queues a failing reply for the next unanswered call to the tool.
    pub fn fail(&self, tool: Tool, detail: &str) -> &Engine {
        self.replies
            .lock()
            .expect("unable to get replies lock")
            .entry(tool)
            .or_default()
            .push_back(Reply::Failure(detail.to_string()));
        self
    }

    /// Every invocation so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().expect("unable to get calls lock").clone()
    }

    /// The invocations of a single tool, in call order.
    pub fn calls_to(&self, tool: Tool) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.tool() == tool)
            .collect()
    }
}

impl super::Engine for Engine {
    fn run(&self, invocation: &Invocation) -> Result<Output, EngineError> {
        debug!(command = %invocation, "Mock engine call");
        self.calls
            .lock()
            .expect("unable to get calls lock")
            .push(invocation.clone());

        let reply = self
            .replies
            .lock()
            .expect("unable to get replies lock")
            .get_mut(&invocation.tool())
            .and_then(|queue| queue.pop_front());

        match reply {
            Some(Reply::Failure(detail)) => Err(EngineError::Failed {
                tool: invocation.tool(),
                status: "exit status: 1".to_string(),
                detail,
            }),
            Some(Reply::Success(output)) => {
                self.touch(invocation);
                Ok(output)
            }
            None => {
                self.touch(invocation);
                Ok(Output::default())
            }
        }
    }
}

impl Engine {
    fn touch(&self, invocation: &Invocation) {
        if !self.touch_outputs {
            return;
        }
        // ffmpeg takes its output last, sox takes it second.
        let output = match invocation.tool() {
            Tool::Ffmpeg => invocation.arguments().last(),
            Tool::Sox => invocation.arguments().get(1),
            _ => None,
        };
        if let Some(output) = output {
            let path = Path::new(output);
            if path.extension().is_some() {
                let _ = fs::write(path, b"");
            }
        }
    }
}
