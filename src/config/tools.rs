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

use crate::engine::Tool;

/// Where to find the external tools. Each entry is either a bare program name, searched for on
/// the PATH, or a path to the executable.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Tools {
    ffmpeg: Option<String>,
    aubionotes: Option<String>,
    aubiopitch: Option<String>,
    sox: Option<String>,
}

impl Tools {
    /// Returns the configured program for the tool, or its default name.
    pub fn program(&self, tool: Tool) -> &str {
        let configured = match tool {
            Tool::Ffmpeg => &self.ffmpeg,
            Tool::AubioNotes => &self.aubionotes,
            Tool::AubioPitch => &self.aubiopitch,
            Tool::Sox => &self.sox,
        };
        configured.as_deref().unwrap_or(tool.default_program())
    }
}
