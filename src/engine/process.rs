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
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, span, Level};

use super::{EngineError, Invocation, Output, Tool};
use crate::config::Tools;

/// Number of trailing stderr lines kept when a tool fails.
const FAILURE_DETAIL_LINES: usize = 12;

/// Runs tools as child processes.
pub struct ProcessEngine {
    tools: Tools,
}

impl ProcessEngine {
    /// Creates a process engine that looks tools up through the given configuration.
    pub fn new(tools: Tools) -> ProcessEngine {
        ProcessEngine { tools }
    }

    /// Finds the executable for a tool. Configured paths win; bare names are searched on the PATH.
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf, EngineError> {
        let program = self.tools.program(tool);
        let path = Path::new(program);
        if path.components().count() > 1 {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(EngineError::NotFound { tool });
        }

        which::which(program).map_err(|_| EngineError::NotFound { tool })
    }
}

impl super::Engine for ProcessEngine {
    fn run(&self, invocation: &Invocation) -> Result<Output, EngineError> {
        let tool = invocation.tool();
        let span = span!(Level::DEBUG, "engine", tool = %tool);
        let _enter = span.enter();

        let program = self.resolve(tool)?;
        debug!(command = %invocation, "Running external tool");

        let result = Command::new(&program)
            .args(invocation.arguments())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EngineError::Spawn { tool, source })?;

        let output = Output {
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        };

        if !result.status.success() {
            return Err(EngineError::Failed {
                tool,
                status: result.status.to_string(),
                detail: tail(&output.stderr, FAILURE_DETAIL_LINES),
            });
        }

        Ok(output)
    }
}

/// The last `lines` non-empty lines of the text, joined with newlines.
fn tail(text: &str, lines: usize) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    kept[kept.len().saturating_sub(lines)..].join("\n")
}
