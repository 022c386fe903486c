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
//! The seam between the pipeline and the external processing engines.
//!
//! Everything that decodes, encodes, analyses or shifts media runs out of process. The pipeline
//! only builds [Invocation]s and reads back the text the tools print.

use std::fmt;
use std::path::Path;

mod process;

#[cfg(test)]
pub mod mock;

pub use process::ProcessEngine;

/// The external tools the pipeline drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Decoding, encoding, filtering, loudness analysis and concatenation.
    Ffmpeg,
    /// Note onset detection.
    AubioNotes,
    /// Frame-wise pitch detection.
    AubioPitch,
    /// Pitch shifting.
    Sox,
}

impl Tool {
    /// Every tool, in the order they are first needed by a run.
    pub const ALL: [Tool; 4] = [Tool::Ffmpeg, Tool::AubioNotes, Tool::AubioPitch, Tool::Sox];

    /// The executable name looked up on the PATH when no explicit path is configured.
    pub fn default_program(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::AubioNotes => "aubionotes",
            Tool::AubioPitch => "aubiopitch",
            Tool::Sox => "sox",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_program())
    }
}

/// A single blocking call into an external tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    tool: Tool,
    args: Vec<String>,
}

impl Invocation {
    /// Starts an invocation of the given tool with no arguments.
    pub fn new(tool: Tool) -> Invocation {
        Invocation {
            tool,
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Invocation {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends a path argument.
    pub fn path(self, path: &Path) -> Invocation {
        let arg = path.to_string_lossy().into_owned();
        self.arg(arg)
    }

    /// The tool to run.
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// The arguments, in order.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Returns the argument following the first occurrence of `flag`, if any.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|pos| self.args.get(pos + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in self.args.iter() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The text a tool printed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Creates an output that only wrote to stdout.
    pub fn stdout(text: impl Into<String>) -> Output {
        Output {
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    /// Creates an output that only wrote to stderr.
    pub fn stderr(text: impl Into<String>) -> Output {
        Output {
            stdout: String::new(),
            stderr: text.into(),
        }
    }

    /// Stdout followed by stderr. ffmpeg reports its analysis on stderr, so parsers read both.
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        combined.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }
}

/// Failures of an external tool.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{tool} could not be found")]
    NotFound { tool: Tool },

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {detail}")]
    Failed {
        tool: Tool,
        status: String,
        detail: String,
    },
}

/// Runs external tools. Calls block until the tool exits.
pub trait Engine {
    /// Runs the invocation to completion. A non-zero exit is an error.
    fn run(&self, invocation: &Invocation) -> Result<Output, EngineError>;
}
