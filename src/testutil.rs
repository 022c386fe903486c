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

//! Shared fixtures for unit tests.

use std::fs;
use std::path::Path;

use midly::num::{u15, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::assets::{AssetKind, AssetStore};
use crate::score::NoteEvent;

/// Creates empty asset files for the given notes under `root`.
pub fn touch_assets(root: &Path, notes: &[u8], kind: AssetKind) {
    fs::create_dir_all(root).expect("unable to create asset root");
    for note in notes {
        fs::write(root.join(AssetStore::file_name(*note, kind)), b"")
            .expect("unable to create asset");
    }
}

/// Builds note events from (note, start, duration) triples.
pub fn events(specs: &[(u8, f64, f64)]) -> Vec<NoteEvent> {
    specs
        .iter()
        .map(|(note, start, duration)| NoteEvent::new(*note, *start, *duration))
        .collect()
}

/// Builds `count` back-to-back events cycling through a single octave starting at middle C.
pub fn sequential_events(count: usize, spacing: f64, duration: f64) -> Vec<NoteEvent> {
    (0..count)
        .map(|i| NoteEvent::new(60 + (i % 12) as u8, i as f64 * spacing, duration))
        .collect()
}

/// Writes a single track, single channel MIDI file at 480 ticks per beat and the default tempo.
/// Each note is (key, rest in ticks before it, length in ticks).
pub fn write_melody(path: &Path, notes: &[(u8, u32, u32)]) {
    let note = |delta: u32, message: MidiMessage| TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message,
        },
    };

    let mut track = Vec::new();
    for (key, rest, length) in notes.iter() {
        track.push(note(
            *rest,
            MidiMessage::NoteOn {
                key: u7::new(*key),
                vel: u7::new(100),
            },
        ));
        track.push(note(
            *length,
            MidiMessage::NoteOff {
                key: u7::new(*key),
                vel: u7::new(0),
            },
        ));
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))));
    smf.tracks.push(track);
    smf.save(path).expect("unable to write MIDI file");
}
