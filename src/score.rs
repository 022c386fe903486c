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
//! Note events read from the MIDI score.
//!
//! The score decides when each note appears in the rendered timeline. It is independent of the
//! performance the note assets were cut from.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, info};

/// Tempo assumed until the first tempo event: 120 BPM.
const DEFAULT_MICROS_PER_BEAT: f64 = 500_000.0;

/// A note instruction from the score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    /// The MIDI note number.
    pub note: u8,
    /// When the note starts, in seconds.
    pub start: f64,
    /// How long the note sounds, in seconds.
    pub duration: f64,
}

impl NoteEvent {
    /// Creates a new note event.
    pub fn new(note: u8, start: f64, duration: f64) -> NoteEvent {
        NoteEvent {
            note,
            start,
            duration,
        }
    }

    /// When the note stops, in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// The same note moved `offset` seconds earlier.
    pub fn shifted(&self, offset: f64) -> NoteEvent {
        NoteEvent {
            start: self.start - offset,
            ..*self
        }
    }
}

/// Failures while reading a score.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("unable to read score: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),
}

/// Converts absolute ticks into seconds.
enum Clock {
    /// Ticks are fractions of a beat; beat length follows the tempo map.
    Metrical {
        ticks_per_beat: f64,
        /// (tick, microseconds per beat), sorted by tick.
        tempo_changes: Vec<(u64, f64)>,
    },
    /// Ticks are fractions of a SMPTE frame and never change length.
    Timecode { seconds_per_tick: f64 },
}

impl Clock {
    fn new(smf: &Smf) -> Clock {
        match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => {
                let mut tempo_changes = Vec::new();
                for track in smf.tracks.iter() {
                    let mut tick: u64 = 0;
                    for event in track.iter() {
                        tick += u64::from(event.delta.as_int());
                        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                            tempo_changes.push((tick, f64::from(tempo.as_int())));
                        }
                    }
                }
                tempo_changes.sort_by_key(|(tick, _)| *tick);
                Clock::Metrical {
                    ticks_per_beat: f64::from(ticks_per_beat.as_int().max(1)),
                    tempo_changes,
                }
            }
            Timing::Timecode(fps, subframes) => Clock::Timecode {
                seconds_per_tick: 1.0 / (f64::from(fps.as_f32()) * f64::from(subframes.max(1))),
            },
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            Clock::Metrical {
                ticks_per_beat,
                tempo_changes,
            } => {
                let mut seconds = 0.0;
                let mut last_tick = 0;
                let mut micros_per_beat = DEFAULT_MICROS_PER_BEAT;
                for (change_tick, change_micros) in tempo_changes.iter() {
                    if *change_tick >= tick {
                        break;
                    }
                    seconds += (change_tick - last_tick) as f64 / ticks_per_beat * micros_per_beat
                        / 1_000_000.0;
                    last_tick = *change_tick;
                    micros_per_beat = *change_micros;
                }
                seconds + (tick - last_tick) as f64 / ticks_per_beat * micros_per_beat / 1_000_000.0
            }
            Clock::Timecode { seconds_per_tick } => tick as f64 * seconds_per_tick,
        }
    }
}

/// Reads the note events of a standard MIDI file.
pub fn read_score(path: &Path) -> Result<Vec<NoteEvent>, ScoreError> {
    let buf = fs::read(path)?;
    let events = parse_score(&buf)?;
    info!(path = ?path, events = events.len(), "Parsed score");
    Ok(events)
}

/// Parses note events from standard MIDI file bytes, sorted by start time.
///
/// All tracks are read against one shared tempo map. A note-on with velocity zero ends the
/// note. A second note-on for a sounding note restarts it, and notes that never end are dropped.
pub fn parse_score(buf: &[u8]) -> Result<Vec<NoteEvent>, ScoreError> {
    let smf = Smf::parse(buf)?;
    let clock = Clock::new(&smf);

    let mut events = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick: u64 = 0;
        let mut sounding: HashMap<(u8, u8), u64> = HashMap::new();

        for event in track.iter() {
            tick += u64::from(event.delta.as_int());
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };

            let (key, on) = match message {
                MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int() > 0),
                MidiMessage::NoteOff { key, .. } => (key.as_int(), false),
                _ => continue,
            };
            let id = (channel.as_int(), key);

            if on {
                sounding.insert(id, tick);
            } else if let Some(start_tick) = sounding.remove(&id) {
                let start = clock.seconds(start_tick);
                events.push(NoteEvent::new(key, start, clock.seconds(tick) - start));
            }
        }

        if !sounding.is_empty() {
            debug!(
                track = track_index,
                dropped = sounding.len(),
                "Dropping notes that never ended"
            );
        }
    }

    events.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(events)
}

#[cfg(test)]
mod test {
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    use super::{parse_score, NoteEvent, ScoreError};

    fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        }
    }

    fn on(delta: u32, key: u8) -> TrackEvent<'static> {
        midi(
            delta,
            0,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            },
        )
    }

    fn off(delta: u32, key: u8) -> TrackEvent<'static> {
        midi(
            delta,
            0,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn write(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(480)),
        ));
        for mut track in tracks {
            track.push(meta(0, MetaMessage::EndOfTrack));
            smf.tracks.push(track);
        }
        let mut buf = Vec::new();
        smf.write_std(&mut buf).expect("unable to write MIDI");
        buf
    }

    fn assert_event(expected: NoteEvent, actual: NoteEvent) {
        assert_eq!(expected.note, actual.note);
        assert!(
            (expected.start - actual.start).abs() < 1e-9,
            "start {} != {}",
            expected.start,
            actual.start
        );
        assert!(
            (expected.duration - actual.duration).abs() < 1e-9,
            "duration {} != {}",
            expected.duration,
            actual.duration
        );
    }

    #[test]
    fn test_default_tempo() {
        // 480 ticks per beat at 120 BPM is one beat per half second.
        let events = parse_score(&write(vec![vec![
            on(0, 60),
            off(480, 60),
            on(480, 62),
            off(960, 62),
        ]]))
        .expect("score should parse");

        assert_eq!(2, events.len());
        assert_event(NoteEvent::new(60, 0.0, 0.5), events[0]);
        assert_event(NoteEvent::new(62, 1.0, 1.0), events[1]);
    }

    #[test]
    fn test_tempo_change_in_conductor_track() {
        let conductor = vec![
            meta(0, MetaMessage::Tempo(u24::new(1_000_000))),
            meta(960, MetaMessage::Tempo(u24::new(250_000))),
        ];
        let notes = vec![on(0, 60), off(960, 60), on(0, 64), off(960, 64)];

        let events = parse_score(&write(vec![conductor, notes])).expect("score should parse");

        assert_eq!(2, events.len());
        // Two beats at 60 BPM, then two beats at 240 BPM.
        assert_event(NoteEvent::new(60, 0.0, 2.0), events[0]);
        assert_event(NoteEvent::new(64, 2.0, 0.5), events[1]);
    }

    #[test]
    fn test_zero_velocity_ends_note() {
        let events = parse_score(&write(vec![vec![
            on(0, 60),
            midi(
                240,
                0,
                MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            ),
        ]]))
        .expect("score should parse");

        assert_eq!(1, events.len());
        assert_event(NoteEvent::new(60, 0.0, 0.25), events[0]);
    }

    #[test]
    fn test_unterminated_and_unmatched_notes() {
        let events = parse_score(&write(vec![vec![
            off(0, 50),
            on(0, 60),
            on(480, 67),
            off(480, 67),
        ]]))
        .expect("score should parse");

        assert_eq!(1, events.len());
        assert_eq!(67, events[0].note);
    }

    #[test]
    fn test_channels_tracked_separately() {
        let events = parse_score(&write(vec![vec![
            on(0, 60),
            midi(
                240,
                1,
                MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(90),
                },
            ),
            off(240, 60),
            midi(
                480,
                1,
                MidiMessage::NoteOff {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            ),
        ]]))
        .expect("score should parse");

        assert_eq!(2, events.len());
        assert_event(NoteEvent::new(60, 0.0, 0.5), events[0]);
        assert_event(NoteEvent::new(60, 0.25, 0.75), events[1]);
    }

    #[test]
    fn test_events_sorted_across_tracks() {
        let events = parse_score(&write(vec![
            vec![on(960, 72), off(480, 72)],
            vec![on(0, 48), off(480, 48)],
        ]))
        .expect("score should parse");

        let notes: Vec<u8> = events.iter().map(|event| event.note).collect();
        assert_eq!(vec![48, 72], notes);
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            parse_score(b"not a midi file"),
            Err(ScoreError::Midi(_))
        ));
    }

    #[test]
    fn test_shifted() {
        let event = NoteEvent::new(60, 12.5, 0.5);
        assert_eq!(NoteEvent::new(60, 2.5, 0.5), event.shifted(10.0));
        assert_eq!(13.0, event.end());
    }
}
