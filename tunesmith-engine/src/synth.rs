// Melody rendering to Standard MIDI Files.
//
// The note list is looped, every token becomes a MIDI key and every duration the gap
// to the next onset. Notes sound for a quarter bar each, so zero gaps make chords. Output is SMF format 1: a tempo track plus one melody track.

use anyhow::{Context, anyhow};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::PathBuf;
use thiserror::Error;
use tunesmith_core::config::{DEFAULT_LOOP_REPEAT, PLAYBACK_MULTIPLIER, PipelineConfig};
use tunesmith_core::types::MusicSpec;

use crate::workspace::Workspace;

/// Final artifact name inside the workspace. Also returned bare when nothing was rendered.
pub const MUSIC_FILE_NAME: &str = "music.mid";

/// Fixed render target, renamed to [`MUSIC_FILE_NAME`] once complete.
pub(crate) const RENDER_FILE_NAME: &str = "temp.mid";

const TICKS_PER_QUARTER: u16 = 480;

/// Durations are measured in bars of four quarters.
const TICKS_PER_BAR: f64 = TICKS_PER_QUARTER as f64 * 4.0;

/// Every note sounds for a quarter of a bar regardless of its interval.
const NOTE_TICKS: u32 = TICKS_PER_QUARTER as u32;

const NOTE_VELOCITY: u8 = 80;
const MAX_TICKS: u32 = (1 << 28) - 1;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("no music specification")]
    NoMusic,

    #[error("malformed music specification: {notes} notes, {durations} durations, bpm {bpm}")]
    Malformed {
        notes: usize,
        durations: usize,
        bpm: u32,
    },

    #[error("invalid pitch token {0:?}")]
    InvalidPitch(String),

    #[error("pitch {token:?} maps to key {key}, outside 0..=127")]
    PitchOutOfRange { token: String, key: i64 },

    #[error("duration {0} cannot be rendered")]
    InvalidDuration(f64),

    #[error("tempo {0} bpm is out of range")]
    InvalidTempo(u32),
}

/// Parses `C4`, `G#4`, `Bb3`, `C#-1` into a MIDI key as `12 * octave + semitone`.
pub fn parse_pitch(token: &str) -> Result<u8, SynthError> {
    let invalid = || SynthError::InvalidPitch(token.to_string());
    let mut chars = token.trim().chars().peekable();

    let letter = chars.next().ok_or_else(invalid)?;
    let mut semitone: i64 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    while let Some(&c) = chars.peek() {
        match c {
            '#' => semitone += 1,
            'b' => semitone -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: String = chars.collect();
    let octave: i64 = octave.parse().map_err(|_| invalid())?;
    let key = octave
        .checked_mul(12)
        .and_then(|k| k.checked_add(semitone))
        .ok_or_else(invalid)?;

    u8::try_from(key)
        .ok()
        .filter(|k| *k <= 127)
        .ok_or(SynthError::PitchOutOfRange {
            token: token.to_string(),
            key,
        })
}

fn duration_ticks(duration: f64) -> Result<u32, SynthError> {
    let ticks = (duration * TICKS_PER_BAR).round();
    if !ticks.is_finite() || ticks < 0.0 || ticks > MAX_TICKS as f64 {
        return Err(SynthError::InvalidDuration(duration));
    }
    Ok(ticks as u32)
}

#[derive(Debug, Clone)]
pub struct MusicSynthesizer {
    loop_repeat: usize,
}

impl Default for MusicSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_REPEAT)
    }
}

impl MusicSynthesizer {
    pub fn new(loop_repeat: usize) -> Self {
        Self {
            loop_repeat: loop_repeat.max(1),
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::new(cfg.loop_repeat)
    }

    /// Renders `music` into the workspace and returns the artifact path.
    ///
    /// Never fails: on any error the full chain is logged and the bare
    /// [`MUSIC_FILE_NAME`] is returned, meaning no artifact was produced.
    pub fn synthesize(&self, music: Option<&MusicSpec>, workspace: &Workspace) -> PathBuf {
        match self.render(music, workspace) {
            Ok(path) => path,
            Err(e) => {
                log::error!("music synthesis failed: {e:?}");
                PathBuf::from(MUSIC_FILE_NAME)
            }
        }
    }

    pub fn render(
        &self,
        music: Option<&MusicSpec>,
        workspace: &Workspace,
    ) -> anyhow::Result<PathBuf> {
        let spec = music.ok_or(SynthError::NoMusic)?;
        if !spec.is_well_formed() {
            return Err(SynthError::Malformed {
                notes: spec.notes.len(),
                durations: spec.durations.len(),
                bpm: spec.bpm,
            }
            .into());
        }

        let keys = spec
            .notes
            .iter()
            .map(|n| parse_pitch(n))
            .collect::<Result<Vec<_>, _>>()?;
        let ticks = spec
            .durations
            .iter()
            .map(|d| duration_ticks(*d))
            .collect::<Result<Vec<_>, _>>()?;

        let keys = keys.repeat(self.loop_repeat);
        let ticks = ticks.repeat(self.loop_repeat);
        let playback_bpm = spec
            .bpm
            .checked_mul(PLAYBACK_MULTIPLIER)
            .ok_or(SynthError::InvalidTempo(spec.bpm))?;

        let smf = melody_to_smf(&keys, &ticks, playback_bpm);
        let mut buf = Vec::new();
        smf.write(&mut buf)
            .map_err(|e| anyhow!("encode MIDI: {e}"))?;

        let render_path = workspace.path_for(RENDER_FILE_NAME);
        let music_path = workspace.path_for(MUSIC_FILE_NAME);
        std::fs::write(&render_path, &buf)
            .with_context(|| format!("write {}", render_path.display()))?;
        std::fs::rename(&render_path, &music_path)
            .with_context(|| format!("move render to {}", music_path.display()))?;

        log::info!(
            "rendered {} notes at {} bpm to {}",
            keys.len(),
            playback_bpm,
            music_path.display()
        );
        Ok(music_path)
    }
}

fn melody_to_smf(keys: &[u8], ticks: &[u32], playback_bpm: u32) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo
    let micros_per_quarter = (60_000_000 / playback_bpm.max(1)).clamp(1, 0x00FF_FFFF);
    let tempo_track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    smf.tracks.push(tempo_track);

    // Track 1: melody, piano on channel 0
    let channel = u4::new(0);
    let mut track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Melody")),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program: u7::new(0) },
            },
        },
    ];

    let mut last = 0u64;
    let mut end = 0u64;
    for (at, on, key) in schedule(keys, ticks) {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(NOTE_VELOCITY),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(clamp_delta(at - last)),
            kind: TrackEventKind::Midi { channel, message },
        });
        last = at;
        end = end.max(at);
    }

    // The loop keeps the trailing gap of the last interval.
    let total: u64 = ticks.iter().map(|&t| u64::from(t)).sum();
    track.push(TrackEvent {
        delta: u28::new(clamp_delta(total.max(end) - last)),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}

// (absolute tick, is note-on, key), time ordered. Onsets are spaced by the intervals and
// every note sounds for NOTE_TICKS, so zero intervals stack into chords.
fn schedule(keys: &[u8], intervals: &[u32]) -> Vec<(u64, bool, u8)> {
    let mut events = Vec::with_capacity(keys.len() * 2);
    let mut onset = 0u64;
    for (&key, &interval) in keys.iter().zip(intervals) {
        events.push((onset, true, key));
        events.push((onset + u64::from(NOTE_TICKS), false, key));
        onset += u64::from(interval);
    }
    // Stable: at equal ticks note-offs go first, otherwise input order.
    events.sort_by_key(|&(at, on, _)| (at, on));
    events
}

fn clamp_delta(delta: u64) -> u32 {
    u32::try_from(delta).unwrap_or(MAX_TICKS).min(MAX_TICKS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(notes: &[&str], durations: &[f64], bpm: u32) -> MusicSpec {
        MusicSpec {
            notes: notes.iter().map(|n| n.to_string()).collect(),
            durations: durations.to_vec(),
            bpm,
        }
    }

    #[test]
    fn parses_pitches() {
        assert_eq!(parse_pitch("C5").unwrap(), 60);
        assert_eq!(parse_pitch("C4").unwrap(), 48);
        assert_eq!(parse_pitch("G#4").unwrap(), 56);
        assert_eq!(parse_pitch("Gb4").unwrap(), 54);
        assert_eq!(parse_pitch("B##3").unwrap(), 49);
        assert_eq!(parse_pitch("C0").unwrap(), 0);
    }

    #[test]
    fn rejects_bad_pitches() {
        assert!(matches!(parse_pitch("Am"), Err(SynthError::InvalidPitch(_))));
        assert!(matches!(parse_pitch("H4"), Err(SynthError::InvalidPitch(_))));
        assert!(matches!(parse_pitch(""), Err(SynthError::InvalidPitch(_))));
        assert!(matches!(parse_pitch("C"), Err(SynthError::InvalidPitch(_))));
        assert_eq!(parse_pitch("G10").unwrap(), 127);
        assert!(matches!(
            parse_pitch("G#10"),
            Err(SynthError::PitchOutOfRange { key: 128, .. })
        ));
        assert!(matches!(
            parse_pitch("C-1"),
            Err(SynthError::PitchOutOfRange { key: -12, .. })
        ));
    }

    #[test]
    fn renders_looped_melody() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let synth = MusicSynthesizer::default();

        let path = synth.synthesize(Some(&spec(&["C4", "E4"], &[0.5, 0.25], 100)), &ws);
        assert_eq!(path, ws.path_for(MUSIC_FILE_NAME));
        assert!(path.exists());
        assert!(!ws.path_for(RENDER_FILE_NAME).exists());

        let bytes = std::fs::read(&path).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);

        let tempo = smf.tracks[0].iter().find_map(|e| match e.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        });
        // 100 bpm * 4 = 400 quarter notes per minute.
        assert_eq!(tempo, Some(60_000_000 / 400));

        assert_eq!(
            sounding(&smf.tracks[1]),
            vec![(48, 0, 480), (52, 960, 480), (48, 1440, 480), (52, 2400, 480)]
        );
        assert_eq!(track_length(&smf.tracks[1]), 2880);
    }

    // (key, onset, length) per note, pairing each NoteOn with the next NoteOff of its key.
    fn sounding(track: &[TrackEvent<'_>]) -> Vec<(u8, u32, u32)> {
        let mut now = 0u32;
        let mut open: Vec<(u8, u32)> = Vec::new();
        let mut notes = Vec::new();
        for event in track {
            now += event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => open.push((key.as_int(), now)),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => {
                    let i = open.iter().position(|(k, _)| *k == key.as_int()).unwrap();
                    let (k, start) = open.remove(i);
                    notes.push((k, start, now - start));
                }
                _ => {}
            }
        }
        assert!(open.is_empty());
        notes.sort_by_key(|&(k, start, _)| (start, k));
        notes
    }

    fn track_length(track: &[TrackEvent<'_>]) -> u32 {
        track.iter().map(|e| e.delta.as_int()).sum()
    }

    #[test]
    fn zero_intervals_sound_as_a_chord() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let path = MusicSynthesizer::new(1)
            .synthesize(Some(&spec(&["C4", "E4", "G4"], &[0.0, 0.0, 1.0], 100)), &ws);

        let bytes = std::fs::read(&path).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(
            sounding(&smf.tracks[1]),
            vec![(48, 0, 480), (52, 0, 480), (55, 0, 480)]
        );
        assert_eq!(track_length(&smf.tracks[1]), 1920);
    }

    #[test]
    fn long_intervals_leave_rests_between_notes() {
        let keys = [60, 62];
        let events = schedule(&keys, &[1920, 1920]);
        assert_eq!(
            events,
            vec![(0, true, 60), (480, false, 60), (1920, true, 62), (2400, false, 62)]
        );
    }

    #[test]
    fn rerender_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let synth = MusicSynthesizer::new(1);

        synth.synthesize(Some(&spec(&["C4"], &[1.0], 60)), &ws);
        let first = std::fs::read(ws.path_for(MUSIC_FILE_NAME)).unwrap();
        synth.synthesize(Some(&spec(&["C4", "D4", "E4"], &[1.0, 1.0, 1.0], 60)), &ws);
        let second = std::fs::read(ws.path_for(MUSIC_FILE_NAME)).unwrap();
        assert_ne!(first, second);
        assert_eq!(ws.files().unwrap().len(), 1);
    }

    #[test]
    fn failures_fall_back_to_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let synth = MusicSynthesizer::default();

        let cases = [
            None,
            Some(spec(&["C4", "E4"], &[0.5], 100)),
            Some(spec(&[], &[], 100)),
            Some(spec(&["C4"], &[0.5], 0)),
            Some(spec(&["Am"], &[0.5], 100)),
            Some(spec(&["C4"], &[f64::NAN], 100)),
        ];
        for case in &cases {
            let path = synth.synthesize(case.as_ref(), &ws);
            assert_eq!(path, PathBuf::from(MUSIC_FILE_NAME));
        }
        assert!(ws.files().unwrap().is_empty());
    }

    #[test]
    fn io_failure_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path().join("gone")).unwrap();
        std::fs::remove_dir(ws.root()).unwrap();

        let path = MusicSynthesizer::default().synthesize(Some(&spec(&["C4"], &[1.0], 90)), &ws);
        assert_eq!(path, PathBuf::from(MUSIC_FILE_NAME));
    }
}
