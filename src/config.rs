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

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub use self::analysis::{Loudness, Segments};
pub use self::error::ConfigError;
pub use self::render::Render;
pub use self::tools::Tools;

mod analysis;
pub mod error;
mod render;
mod tools;

/// Prefix of environment variables that override file settings, e.g.
/// `NOTEREEL__RENDER__BATCH_SIZE=20`.
const ENV_PREFIX: &str = "NOTEREEL";

/// The configuration for a run. Every value is optional and falls back to a default.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// Scratch directory for extracted audio, clips and batch renders (default: work).
    work_dir: Option<String>,

    /// Directory holding the per-note assets (default: assets).
    asset_root: Option<String>,

    /// Final output file (default: final_output_with_audio.mp4).
    output: Option<String>,

    /// External tool locations.
    #[serde(default)]
    tools: Tools,

    /// Segment extraction settings.
    #[serde(default)]
    segments: Segments,

    /// Loudness filter settings.
    #[serde(default)]
    loudness: Loudness,

    /// Render settings.
    #[serde(default)]
    render: Render,
}

impl Settings {
    /// Loads settings from an optional YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a YAML string, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Settings, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.render.batch_size() == 0 {
            return Err(ConfigError::Invalid {
                field: "render.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        let canvas = self.render.canvas();
        if canvas.width == 0 || canvas.height == 0 {
            return Err(ConfigError::Invalid {
                field: "render.width/render.height",
                reason: format!("canvas {}x{} has no area", canvas.width, canvas.height),
            });
        }
        if self.render.sample_rate() == 0 {
            return Err(ConfigError::Invalid {
                field: "render.sample_rate",
                reason: "must be positive".to_string(),
            });
        }
        let threshold = self.loudness.threshold_db();
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "loudness.threshold_db",
                reason: format!("{} is not a non-negative margin", threshold),
            });
        }
        let min_clip = self.segments.min_clip_duration();
        if !min_clip.is_finite() || min_clip < 0.0 {
            return Err(ConfigError::Invalid {
                field: "segments.min_clip_duration",
                reason: format!("{} is not a non-negative duration", min_clip),
            });
        }
        Ok(())
    }

    /// Returns the scratch directory.
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(self.work_dir.as_deref().unwrap_or("work"))
    }

    /// Returns the asset root.
    pub fn asset_root(&self) -> PathBuf {
        PathBuf::from(self.asset_root.as_deref().unwrap_or("assets"))
    }

    /// Returns the default final output path.
    pub fn output(&self) -> PathBuf {
        PathBuf::from(
            self.output
                .as_deref()
                .unwrap_or("final_output_with_audio.mp4"),
        )
    }

    /// Returns the tool locations.
    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    /// Returns the segment extraction settings.
    pub fn segments(&self) -> &Segments {
        &self.segments
    }

    /// Returns the loudness filter settings.
    pub fn loudness(&self) -> &Loudness {
        &self.loudness
    }

    /// Returns the render settings.
    pub fn render(&self) -> &Render {
        &self.render
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::{ConfigError, Settings};
    use crate::engine::Tool;
    use crate::render::RenderMode;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(PathBuf::from("work"), settings.work_dir());
        assert_eq!(PathBuf::from("assets"), settings.asset_root());
        assert_eq!(50, settings.render().batch_size());
        assert_eq!(RenderMode::Shifted, settings.render().mode());
        assert_eq!(0.25, settings.segments().min_clip_duration());
        assert!(settings.loudness().enabled());
        assert_eq!("ffmpeg", settings.tools().program(Tool::Ffmpeg));
        assert!(!settings.render().keep_intermediates());

        let canvas = settings.render().canvas();
        assert_eq!((1920, 1080), (canvas.width, canvas.height));
        assert_eq!("black", canvas.background);
        assert_eq!(44100, canvas.sample_rate);

        let codec = settings.render().codec();
        assert_eq!("libx264", codec.video);
        assert_eq!("aac", codec.audio);
        assert_eq!("yuv420p", codec.pixel_format);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_yaml(
            r#"
            work_dir: /tmp/scratch
            asset_root: /tmp/notes
            tools:
              ffmpeg: /opt/ffmpeg/bin/ffmpeg
            loudness:
              enabled: false
              threshold_db: 1.3
            render:
              batch_size: 10
              mode: gated
              width: 1280
              height: 720
              keep_intermediates: true
            "#,
        )
        .expect("settings should parse");

        assert_eq!(PathBuf::from("/tmp/scratch"), settings.work_dir());
        assert_eq!(PathBuf::from("/tmp/notes"), settings.asset_root());
        assert_eq!("/opt/ffmpeg/bin/ffmpeg", settings.tools().program(Tool::Ffmpeg));
        assert_eq!("sox", settings.tools().program(Tool::Sox));
        assert!(!settings.loudness().enabled());
        assert_eq!(1.3, settings.loudness().threshold_db());
        assert_eq!(10, settings.render().batch_size());
        assert_eq!(RenderMode::Gated, settings.render().mode());
        assert_eq!(1280, settings.render().canvas().width);
        assert!(settings.render().keep_intermediates());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = Settings::from_yaml(
            r#"
            render:
              batch_size: 0
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "render.batch_size",
                ..
            })
        ));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = Settings::from_yaml(
            r#"
            loudness:
              threshold_db: -2.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = Settings::from_yaml(
            r#"
            render:
              mode: sideways
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
