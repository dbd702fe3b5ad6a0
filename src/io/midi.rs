#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Parse a raw three-byte channel message. Running status is not handled.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0f;
        let d0 = data.first().copied().unwrap_or(0) & 0x7f;
        let d1 = data.get(1).copied().unwrap_or(0) & 0x7f;
        match status & 0xf0 {
            // A note-on with zero velocity is a note-off by convention
            0x90 if d1 == 0 => Some(MidiEvent::NoteOff { channel, key: d0, velocity: 0 }),
            0x90 => Some(MidiEvent::NoteOn { channel, key: d0, velocity: d1 }),
            0x80 => Some(MidiEvent::NoteOff { channel, key: d0, velocity: d1 }),
            0xb0 => Some(MidiEvent::ControlChange { channel, controller: d0, value: d1 }),
            0xc0 => Some(MidiEvent::ProgramChange { channel, program: d0 }),
            0xe0 => {
                let raw = ((d1 as i16) << 7) | d0 as i16;
                Some(MidiEvent::PitchBend { channel, value: raw - 8192 })
            }
            _ => None,
        }
    }
}
