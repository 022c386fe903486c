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
//! Joins intermediate renders into the final output without re-encoding.

use std::io::Write;
use std::path::{self, Path, PathBuf};

use tracing::{info, warn};

use super::RenderError;
use crate::engine::{Engine, Invocation, Tool};
use crate::util::seconds_arg;

/// Builds the concat demuxer manifest: one `file '<path>'` line per segment, in order. Paths are
/// made absolute so the manifest can live anywhere.
pub fn manifest_contents(segments: &[PathBuf]) -> std::io::Result<String> {
    let mut contents = String::new();
    for segment in segments.iter() {
        let absolute = path::absolute(segment)?;
        let quoted = absolute.to_string_lossy().replace('\'', r"'\''");
        contents.push_str(&format!("file '{}'\n", quoted));
    }
    Ok(contents)
}

/// The stream-copy invocation that joins the manifest's files into `output`, capped at
/// `duration` seconds.
pub fn invocation(manifest: &Path, output: &Path, duration: f64) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-f", "concat", "-safe", "0", "-i"])
        .path(manifest)
        .args(["-c", "copy", "-t"])
        .arg(seconds_arg(duration))
        .arg("-y")
        .path(output)
}

/// Concatenates `segments` in order into `output`. The manifest is written to `work_dir` and
/// removed afterwards whether or not the engine succeeded.
pub fn concatenate(
    engine: &dyn Engine,
    segments: &[PathBuf],
    output: &Path,
    duration: f64,
    work_dir: &Path,
) -> Result<(), RenderError> {
    if segments.is_empty() {
        return Err(RenderError::EmptyManifest);
    }

    let mut manifest = tempfile::Builder::new()
        .prefix("concat_")
        .suffix(".txt")
        .tempfile_in(work_dir)?;
    manifest.write_all(manifest_contents(segments)?.as_bytes())?;
    manifest.flush()?;

    info!(segments = segments.len(), duration, "Concatenating batches");
    let result = engine.run(&invocation(manifest.path(), output, duration));

    if let Err(e) = manifest.close() {
        warn!(err = %e, "Unable to remove concat manifest");
    }
    result?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{concatenate, manifest_contents};
    use crate::engine::{mock, Tool};
    use crate::render::RenderError;

    #[test]
    fn test_manifest_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let segments = vec![dir.path().join("a.mp4"), dir.path().join("it's.mp4")];

        let contents = manifest_contents(&segments).expect("manifest");
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(2, lines.len());
        assert_eq!(format!("file '{}'", segments[0].display()), lines[0]);
        assert!(lines[1].ends_with(r"it'\''s.mp4'"));
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let contents = manifest_contents(&[PathBuf::from("segment_000.mp4")]).expect("manifest");
        let path = contents
            .trim_end()
            .strip_prefix("file '")
            .and_then(|rest| rest.strip_suffix('\''))
            .expect("quoted path");
        assert!(Path::new(path).is_absolute());
    }

    #[test]
    fn test_empty_manifest_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = mock::Engine::new();

        let result = concatenate(&engine, &[], &dir.path().join("out.mp4"), 1.0, dir.path());

        assert!(matches!(result, Err(RenderError::EmptyManifest)));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_concatenate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = mock::Engine::new().touching_outputs();
        let segments = vec![dir.path().join("segment_000.mp4"), dir.path().join("segment_001.mp4")];

        concatenate(&engine, &segments, &dir.path().join("out.mp4"), 12.5, dir.path())
            .expect("concatenate");

        let calls = engine.calls_to(Tool::Ffmpeg);
        assert_eq!(1, calls.len());
        assert_eq!(Some("concat"), calls[0].value_of("-f"));
        assert_eq!(Some("copy"), calls[0].value_of("-c"));
        assert_eq!(Some("12.500"), calls[0].value_of("-t"));

        let manifest = calls[0].value_of("-i").expect("manifest path");
        assert!(!Path::new(manifest).exists());
        assert_eq!(
            1,
            fs::read_dir(dir.path()).expect("read work dir").count(),
            "only the output should remain"
        );
    }

    #[test]
    fn test_manifest_removed_on_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = mock::Engine::new();
        engine.fail(Tool::Ffmpeg, "concat failed");

        let result = concatenate(
            &engine,
            &[dir.path().join("segment_000.mp4")],
            &dir.path().join("out.mp4"),
            1.0,
            dir.path(),
        );

        assert!(matches!(result, Err(RenderError::Engine(_))));
        let manifest = engine.calls()[0]
            .value_of("-i")
            .expect("manifest path")
            .to_string();
        assert!(!Path::new(&manifest).exists());
    }
}
