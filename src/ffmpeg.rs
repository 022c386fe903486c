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
//! Builders for the ffmpeg invocations used outside the render graph.

use std::path::Path;

use crate::engine::{Invocation, Tool};
use crate::render::OutputCodec;
use crate::util::seconds_arg;

/// Extracts the audio track of a media file as 16-bit stereo PCM.
pub fn extract_audio(source: &Path, dest: &Path, sample_rate: u32) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-y", "-i"])
        .path(source)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
        .arg(sample_rate.to_string())
        .args(["-ac", "2"])
        .path(dest)
}

/// Cuts `[start, end]` out of a video, re-encoding so the cut is frame exact.
pub fn cut_clip(source: &Path, start: f64, end: f64, codec: &OutputCodec, dest: &Path) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-y", "-i"])
        .path(source)
        .arg("-ss")
        .arg(seconds_arg(start))
        .arg("-to")
        .arg(seconds_arg(end))
        .arg("-c:v")
        .arg(codec.video.as_str())
        .arg("-c:a")
        .arg(codec.audio.as_str())
        .path(dest)
}

/// Replaces the audio of a clip, copying its video stream untouched.
pub fn replace_audio(clip: &Path, audio: &Path, codec: &OutputCodec, dest: &Path) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-y", "-i"])
        .path(clip)
        .arg("-i")
        .path(audio)
        .args(["-c:v", "copy", "-c:a"])
        .arg(codec.audio.as_str())
        .args(["-map", "0:v:0", "-map", "1:a:0"])
        .path(dest)
}

/// Measures loudness of the whole file, or of `window` (start, end) when given. The report is
/// written to stderr.
pub fn volume_detect(source: &Path, window: Option<(f64, f64)>) -> Invocation {
    let mut invocation = Invocation::new(Tool::Ffmpeg);
    if let Some((start, end)) = window {
        invocation = invocation
            .arg("-ss")
            .arg(seconds_arg(start))
            .arg("-t")
            .arg(seconds_arg(end - start));
    }
    invocation
        .arg("-i")
        .path(source)
        .args(["-af", "volumedetect", "-vn", "-f", "null", "-"])
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::{cut_clip, volume_detect};
    use crate::render::OutputCodec;

    #[test]
    fn test_segment_volume_detect() {
        let invocation = volume_detect(Path::new("audio.wav"), Some((1.0, 1.75)));
        assert_eq!(
            "ffmpeg -ss 1.000 -t 0.750 -i audio.wav -af volumedetect -vn -f null -",
            invocation.to_string()
        );
    }

    #[test]
    fn test_cut_clip() {
        let codec = OutputCodec {
            video: "libx264".to_string(),
            audio: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
        };
        let invocation = cut_clip(
            Path::new("in.mp4"),
            2.0,
            2.5,
            &codec,
            Path::new("clips/0000_060.mp4"),
        );
        assert_eq!(
            "ffmpeg -y -i in.mp4 -ss 2.000 -to 2.500 -c:v libx264 -c:a aac clips/0000_060.mp4",
            invocation.to_string()
        );
    }
}
