use crate::{io::midi::MidiEvent, synth::message::SynthMessage};

/// Map a MIDI event to an engine note message.
///
/// MIDI has no note identifiers, so the key doubles as the note id; that keeps
/// a note-off paired with the note-on for the same key.
pub fn midi_to_synth(midi: MidiEvent) -> Option<SynthMessage> {
    match midi {
        MidiEvent::NoteOn {
            channel,
            key,
            velocity,
        } => Some(SynthMessage::NoteOn {
            channel,
            key: key as i32,
            note_id: key as i32,
            velocity: velocity as f32 / 127.0,
            detune: 0.0,
        }),
        MidiEvent::NoteOff { channel, key, .. } => Some(SynthMessage::NoteOff {
            channel,
            key: key as i32,
            note_id: key as i32,
        }),
        // CC 123: all notes off
        MidiEvent::ControlChange {
            controller: 123, ..
        } => Some(SynthMessage::AllNotesOff),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_uses_key_as_note_id() {
        let msg = midi_to_synth(MidiEvent::NoteOn { channel: 2, key: 61, velocity: 127 });
        match msg {
            Some(SynthMessage::NoteOn { channel, key, note_id, velocity, .. }) => {
                assert_eq!(channel, 2);
                assert_eq!(key, 61);
                assert_eq!(note_id, 61);
                assert!((velocity - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unrelated_events_are_ignored() {
        assert!(midi_to_synth(MidiEvent::ProgramChange { channel: 0, program: 3 }).is_none());
    }
}
