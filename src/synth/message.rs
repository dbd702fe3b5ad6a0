#[cfg(feature = "rtrb")]
use rtrb::Consumer;

/// Note traffic for the audio thread.
///
/// Keys are signed: hosts may send negative keys, which match no zone.
/// `note_id` pairs a note-off with the note-on that started it; `-1` on a
/// note-off matches any id.
#[derive(Debug, Copy, Clone)]
pub enum SynthMessage {
    NoteOn {
        channel: u8,
        key: i32,
        note_id: i32,
        velocity: f32,
        detune: f32,
    },
    NoteOff {
        channel: u8,
        key: i32,
        note_id: i32,
    },
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}
